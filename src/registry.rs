// src/registry.rs
//! Fixed catalog of automation actions, grouped by category.
use crate::action_config::{ActionConfig, defaults};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    RandomVideoInteraction,
    KeywordVideoInteraction,
    UserVideoInteraction,
    SpecificVideoInteraction,
    RandomLiveInteraction,
    SpecificLiveInteraction,
    FollowUser,
    FollowBack,
    UnfollowUser,
    SendMessage,
    CreatePost,
    UpdateAvatar,
    ChangeName,
    ChangeBio,
}

impl ActionType {
    pub const ALL: [ActionType; 14] = [
        ActionType::RandomVideoInteraction,
        ActionType::KeywordVideoInteraction,
        ActionType::UserVideoInteraction,
        ActionType::SpecificVideoInteraction,
        ActionType::RandomLiveInteraction,
        ActionType::SpecificLiveInteraction,
        ActionType::FollowUser,
        ActionType::FollowBack,
        ActionType::UnfollowUser,
        ActionType::SendMessage,
        ActionType::CreatePost,
        ActionType::UpdateAvatar,
        ActionType::ChangeName,
        ActionType::ChangeBio,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::RandomVideoInteraction => "random_video_interaction",
            ActionType::KeywordVideoInteraction => "keyword_video_interaction",
            ActionType::UserVideoInteraction => "user_video_interaction",
            ActionType::SpecificVideoInteraction => "specific_video_interaction",
            ActionType::RandomLiveInteraction => "random_live_interaction",
            ActionType::SpecificLiveInteraction => "specific_live_interaction",
            ActionType::FollowUser => "follow_user",
            ActionType::FollowBack => "follow_back",
            ActionType::UnfollowUser => "unfollow_user",
            ActionType::SendMessage => "send_message",
            ActionType::CreatePost => "create_post",
            ActionType::UpdateAvatar => "update_avatar",
            ActionType::ChangeName => "change_name",
            ActionType::ChangeBio => "change_bio",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AppError::NotFound(format!("Action type \"{}\"", s)))
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Interaction,
    FollowMessage,
    AccountFeatures,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::Interaction,
        Category::FollowMessage,
        Category::AccountFeatures,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Interaction => "Interaction",
            Category::FollowMessage => "Follow & message",
            Category::AccountFeatures => "Account features",
        }
    }

    /// Definitions in this category, in catalog order.
    pub fn list_actions(self) -> Vec<&'static ActionDefinition> {
        CATALOG.iter().filter(|d| d.category == self).collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    ComingSoon,
}

#[derive(Serialize, Clone, Debug)]
pub struct ActionDefinition {
    pub action_type: ActionType,
    pub name: &'static str,
    pub description: &'static str,
    pub category: Category,
    pub availability: Availability,
    #[serde(skip)]
    default_config: fn() -> ActionConfig,
}

impl ActionDefinition {
    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
    }

    pub fn default_config(&self) -> ActionConfig {
        (self.default_config)()
    }
}

// Indexed by `ActionType as usize`; keep in enum order.
static CATALOG: [ActionDefinition; 14] = [
    ActionDefinition {
        action_type: ActionType::RandomVideoInteraction,
        name: "Random video interaction",
        description: "Scroll the For You feed and interact with random videos",
        category: Category::Interaction,
        availability: Availability::Available,
        default_config: defaults::random_video,
    },
    ActionDefinition {
        action_type: ActionType::KeywordVideoInteraction,
        name: "Keyword video interaction",
        description: "Search by keyword and interact with the results",
        category: Category::Interaction,
        availability: Availability::Available,
        default_config: defaults::keyword_video,
    },
    ActionDefinition {
        action_type: ActionType::UserVideoInteraction,
        name: "User video interaction",
        description: "Open user profiles and interact with their videos",
        category: Category::Interaction,
        availability: Availability::Available,
        default_config: defaults::user_video,
    },
    ActionDefinition {
        action_type: ActionType::SpecificVideoInteraction,
        name: "Specific video interaction",
        description: "Interact with an explicit list of video links",
        category: Category::Interaction,
        availability: Availability::Available,
        default_config: defaults::specific_video,
    },
    ActionDefinition {
        action_type: ActionType::RandomLiveInteraction,
        name: "Random live interaction",
        description: "Watch and interact with random live streams",
        category: Category::Interaction,
        availability: Availability::ComingSoon,
        default_config: defaults::random_live,
    },
    ActionDefinition {
        action_type: ActionType::SpecificLiveInteraction,
        name: "Specific live interaction",
        description: "Watch and interact with live streams of chosen users",
        category: Category::Interaction,
        availability: Availability::ComingSoon,
        default_config: defaults::specific_live,
    },
    ActionDefinition {
        action_type: ActionType::FollowUser,
        name: "Follow user",
        description: "Follow a list of users",
        category: Category::FollowMessage,
        availability: Availability::Available,
        default_config: defaults::follow_user,
    },
    ActionDefinition {
        action_type: ActionType::FollowBack,
        name: "Follow back",
        description: "Follow back new followers",
        category: Category::FollowMessage,
        availability: Availability::ComingSoon,
        default_config: defaults::follow_back,
    },
    ActionDefinition {
        action_type: ActionType::UnfollowUser,
        name: "Unfollow user",
        description: "Unfollow followed accounts",
        category: Category::FollowMessage,
        availability: Availability::ComingSoon,
        default_config: defaults::unfollow_user,
    },
    ActionDefinition {
        action_type: ActionType::SendMessage,
        name: "Send message",
        description: "Send direct messages to a list of users",
        category: Category::FollowMessage,
        availability: Availability::ComingSoon,
        default_config: defaults::send_message,
    },
    ActionDefinition {
        action_type: ActionType::CreatePost,
        name: "Create post",
        description: "Publish videos from links or the content library",
        category: Category::AccountFeatures,
        availability: Availability::Available,
        default_config: defaults::create_post,
    },
    ActionDefinition {
        action_type: ActionType::UpdateAvatar,
        name: "Update avatar",
        description: "Replace the profile picture",
        category: Category::AccountFeatures,
        availability: Availability::Available,
        default_config: defaults::update_avatar,
    },
    ActionDefinition {
        action_type: ActionType::ChangeName,
        name: "Change name",
        description: "Pick a new display name from a list",
        category: Category::AccountFeatures,
        availability: Availability::Available,
        default_config: defaults::change_name,
    },
    ActionDefinition {
        action_type: ActionType::ChangeBio,
        name: "Change bio",
        description: "Pick a new profile bio from a list",
        category: Category::AccountFeatures,
        availability: Availability::ComingSoon,
        default_config: defaults::change_bio,
    },
];

pub fn list_categories() -> &'static [Category] {
    &Category::ALL
}

pub fn definition(action_type: ActionType) -> &'static ActionDefinition {
    &CATALOG[action_type as usize]
}

/// Looks up an action for use. Coming-soon actions are rejected.
pub fn select(action_type: ActionType) -> Result<&'static ActionDefinition, AppError> {
    let def = definition(action_type);
    if def.is_available() {
        Ok(def)
    } else {
        Err(AppError::Unavailable(action_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_indexed_by_action_type() {
        for action_type in ActionType::ALL {
            assert_eq!(definition(action_type).action_type, action_type);
        }
    }

    #[test]
    fn every_action_belongs_to_exactly_one_category() {
        let total: usize = list_categories()
            .iter()
            .map(|c| c.list_actions().len())
            .sum();
        assert_eq!(total, ActionType::ALL.len());
    }

    #[test]
    fn coming_soon_actions_are_rejected_in_every_category() {
        for category in list_categories() {
            for def in category.list_actions() {
                let result = select(def.action_type);
                if def.is_available() {
                    assert!(result.is_ok(), "{} should be selectable", def.action_type);
                } else {
                    assert!(matches!(result, Err(AppError::Unavailable(t)) if t == def.action_type));
                }
            }
        }
    }

    #[test]
    fn action_type_parses_from_wire_name() {
        assert_eq!(
            "follow_user".parse::<ActionType>().ok(),
            Some(ActionType::FollowUser)
        );
        assert!("follow_everyone".parse::<ActionType>().is_err());
        assert_eq!(
            serde_json::to_string(&ActionType::CreatePost).unwrap(),
            "\"create_post\""
        );
    }
}
