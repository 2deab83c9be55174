// src/scenario.rs
use crate::action_config::{self, ActionConfig};
use crate::error::AppError;
use crate::registry::{self, ActionType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub type SharedScenarios = RwLock<ScenarioStore>;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    Active,
    Inactive,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Action {
    pub id: Uuid,
    pub action_type: ActionType,
    pub name: String,
    pub scenario_id: Uuid,
    pub config: ActionConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Scenario {
    pub id: Uuid,
    pub name: String,
    pub status: ScenarioStatus,
    /// Execution order.
    pub actions: Vec<Action>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An action picked from the catalog but not yet saved. Dropping it discards it.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ActionDraft {
    pub scenario_id: Uuid,
    pub action_type: ActionType,
    pub name: String,
    pub config: ActionConfig,
    pub is_new: bool,
}

#[derive(Serialize, Clone, Debug, Default)]
pub struct ScenarioSnapshot {
    pub scenarios: Vec<Scenario>,
    pub selected_id: Option<Uuid>,
}

impl ScenarioSnapshot {
    pub fn scenario(&self, id: Uuid) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    pub fn selected(&self) -> Option<&Scenario> {
        self.selected_id.and_then(|id| self.scenario(id))
    }

    pub fn list_actions(&self) -> impl Iterator<Item = &Action> {
        self.scenarios.iter().flat_map(|s| s.actions.iter())
    }

    pub fn action(&self, id: Uuid) -> Option<&Action> {
        self.list_actions().find(|a| a.id == id)
    }

    fn scenario_mut(&mut self, id: Uuid) -> Option<&mut Scenario> {
        self.scenarios.iter_mut().find(|s| s.id == id)
    }

    fn action_mut(&mut self, id: Uuid) -> Option<&mut Action> {
        self.scenarios
            .iter_mut()
            .flat_map(|s| s.actions.iter_mut())
            .find(|a| a.id == id)
    }
}

#[derive(Debug, Default)]
pub struct ScenarioStore {
    current: Arc<ScenarioSnapshot>,
}

fn scenario_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Scenario {}", id))
}

fn action_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Action {}", id))
}

impl ScenarioStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<ScenarioSnapshot> {
        Arc::clone(&self.current)
    }

    pub fn list_scenarios(&self) -> Vec<Scenario> {
        self.current.scenarios.clone()
    }

    fn edit(&mut self) -> &mut ScenarioSnapshot {
        Arc::make_mut(&mut self.current)
    }

    // Names are unique ignoring case and surrounding whitespace.
    fn checked_name(&self, name: &str, except: Option<Uuid>) -> Result<String, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("name", "Scenario name is required"));
        }
        let taken = self.current.scenarios.iter().any(|s| {
            Some(s.id) != except && s.name.trim().eq_ignore_ascii_case(name)
        });
        if taken {
            return Err(AppError::validation(
                "name",
                format!("A scenario named \"{}\" already exists", name),
            ));
        }
        Ok(name.to_string())
    }

    pub fn create_scenario(&mut self, name: &str) -> Result<Scenario, AppError> {
        let name = self.checked_name(name, None)?;
        let now = Utc::now();
        let scenario = Scenario {
            id: Uuid::new_v4(),
            name,
            status: ScenarioStatus::Active,
            actions: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let snapshot = self.edit();
        snapshot.scenarios.push(scenario.clone());
        if snapshot.selected_id.is_none() {
            snapshot.selected_id = Some(scenario.id);
        }
        Ok(scenario)
    }

    pub fn rename_scenario(&mut self, id: Uuid, name: &str) -> Result<Scenario, AppError> {
        if self.current.scenario(id).is_none() {
            return Err(scenario_not_found(id));
        }
        let name = self.checked_name(name, Some(id))?;
        self.modify_scenario(id, |s| s.name = name)
    }

    pub fn set_status(&mut self, id: Uuid, status: ScenarioStatus) -> Result<Scenario, AppError> {
        self.modify_scenario(id, |s| s.status = status)
    }

    fn modify_scenario(
        &mut self,
        id: Uuid,
        apply: impl FnOnce(&mut Scenario),
    ) -> Result<Scenario, AppError> {
        if self.current.scenario(id).is_none() {
            return Err(scenario_not_found(id));
        }
        let scenario = self
            .edit()
            .scenario_mut(id)
            .ok_or_else(|| scenario_not_found(id))?;
        apply(scenario);
        scenario.updated_at = Utc::now();
        Ok(scenario.clone())
    }

    /// Removes the scenario with all of its actions.
    pub fn delete_scenario(&mut self, id: Uuid) -> Result<Scenario, AppError> {
        let index = self
            .current
            .scenarios
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| scenario_not_found(id))?;

        let snapshot = self.edit();
        let removed = snapshot.scenarios.remove(index);
        if snapshot.selected_id == Some(id) {
            snapshot.selected_id = snapshot.scenarios.first().map(|s| s.id);
        }
        Ok(removed)
    }

    pub fn select_scenario(&mut self, id: Uuid) -> Result<(), AppError> {
        if self.current.scenario(id).is_none() {
            return Err(scenario_not_found(id));
        }
        self.edit().selected_id = Some(id);
        Ok(())
    }

    /// Starts configuring a new action with its default configuration.
    pub fn draft_action(
        &self,
        scenario_id: Uuid,
        action_type: ActionType,
    ) -> Result<ActionDraft, AppError> {
        if self.current.scenario(scenario_id).is_none() {
            return Err(scenario_not_found(scenario_id));
        }
        let definition = registry::select(action_type)?;
        Ok(ActionDraft {
            scenario_id,
            action_type,
            name: definition.name.to_string(),
            config: definition.default_config(),
            is_new: true,
        })
    }

    pub fn save_draft(&mut self, draft: ActionDraft) -> Result<Action, AppError> {
        self.add_action(
            draft.scenario_id,
            draft.action_type,
            Some(draft.name),
            draft.config,
        )
    }

    /// Appends a validated action to the end of the scenario.
    pub fn add_action(
        &mut self,
        scenario_id: Uuid,
        action_type: ActionType,
        name: Option<String>,
        config: ActionConfig,
    ) -> Result<Action, AppError> {
        if self.current.scenario(scenario_id).is_none() {
            return Err(scenario_not_found(scenario_id));
        }
        let definition = registry::select(action_type)?;
        let config = action_config::validate(action_type, config)?;
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| definition.name.to_string());

        let action = Action {
            id: Uuid::new_v4(),
            action_type,
            name,
            scenario_id,
            config,
        };
        let scenario = self
            .edit()
            .scenario_mut(scenario_id)
            .ok_or_else(|| scenario_not_found(scenario_id))?;
        scenario.actions.push(action.clone());
        scenario.updated_at = Utc::now();
        Ok(action)
    }

    /// Replaces an action's configuration after validating it against the
    /// action's existing type.
    pub fn update_action_config(
        &mut self,
        action_id: Uuid,
        config: ActionConfig,
    ) -> Result<Action, AppError> {
        let action_type = self
            .current
            .action(action_id)
            .map(|a| a.action_type)
            .ok_or_else(|| action_not_found(action_id))?;
        let config = action_config::validate(action_type, config)?;

        let action = self
            .edit()
            .action_mut(action_id)
            .ok_or_else(|| action_not_found(action_id))?;
        action.config = config;
        Ok(action.clone())
    }

    /// Sets a single field of an action's configuration.
    pub fn update_action_field(
        &mut self,
        action_id: Uuid,
        path: &str,
        value: Value,
    ) -> Result<Action, AppError> {
        let config = self
            .current
            .action(action_id)
            .map(|a| a.config.with_field(path, value))
            .ok_or_else(|| action_not_found(action_id))??;
        self.update_action_config(action_id, config)
    }

    pub fn remove_action(&mut self, action_id: Uuid) -> Result<Action, AppError> {
        let scenario_id = self
            .current
            .action(action_id)
            .map(|a| a.scenario_id)
            .ok_or_else(|| action_not_found(action_id))?;

        let scenario = self
            .edit()
            .scenario_mut(scenario_id)
            .ok_or_else(|| scenario_not_found(scenario_id))?;
        let index = scenario
            .actions
            .iter()
            .position(|a| a.id == action_id)
            .ok_or_else(|| action_not_found(action_id))?;
        let removed = scenario.actions.remove(index);
        scenario.updated_at = Utc::now();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_config::{ActionConfig, default_config};
    use serde_json::json;

    fn store_with(name: &str) -> (ScenarioStore, Uuid) {
        let mut store = ScenarioStore::new();
        let id = store.create_scenario(name).unwrap().id;
        (store, id)
    }

    fn add_random(store: &mut ScenarioStore, scenario_id: Uuid) -> Action {
        store
            .add_action(
                scenario_id,
                ActionType::RandomVideoInteraction,
                None,
                default_config(ActionType::RandomVideoInteraction),
            )
            .unwrap()
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut store = ScenarioStore::new();
        for name in ["", "   "] {
            let err = store.create_scenario(name).unwrap_err();
            assert_eq!(err.first_field(), Some("name"));
        }

        let created = store.create_scenario("change avt").unwrap();
        assert!(store.list_scenarios().iter().any(|s| s.id == created.id));
        assert_eq!(store.snapshot().selected_id, Some(created.id));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (mut store, id) = store_with("warm up");
        assert!(store.create_scenario("  Warm Up ").is_err());

        let other = store.create_scenario("cool down").unwrap();
        assert!(store.rename_scenario(other.id, "WARM UP").is_err());
        // Renaming to its own name is fine.
        assert!(store.rename_scenario(id, "Warm up").is_ok());
    }

    #[test]
    fn rename_and_status_on_unknown_id() {
        let mut store = ScenarioStore::new();
        let missing = Uuid::new_v4();
        assert!(matches!(
            store.rename_scenario(missing, "x"),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            store.set_status(missing, ScenarioStatus::Inactive),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn select_switches_and_rejects_unknown_ids() {
        let (mut store, first) = store_with("first");
        let second = store.create_scenario("second").unwrap().id;
        assert_eq!(store.snapshot().selected_id, Some(first));

        store.select_scenario(second).unwrap();
        assert_eq!(store.snapshot().selected().map(|s| s.id), Some(second));

        // Re-selecting the current scenario keeps it selected.
        store.select_scenario(second).unwrap();
        assert_eq!(store.snapshot().selected_id, Some(second));

        assert!(matches!(
            store.select_scenario(Uuid::new_v4()),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(store.snapshot().selected_id, Some(second));
    }

    #[test]
    fn delete_cascades_and_moves_selection() {
        let (mut store, first) = store_with("first");
        let second = store.create_scenario("second").unwrap().id;
        add_random(&mut store, first);
        add_random(&mut store, first);
        add_random(&mut store, second);

        store.delete_scenario(first).unwrap();
        let snapshot = store.snapshot();
        assert_eq!(
            snapshot.list_actions().filter(|a| a.scenario_id == first).count(),
            0
        );
        assert_eq!(snapshot.list_actions().count(), 1);
        assert_eq!(snapshot.selected_id, Some(second));

        store.delete_scenario(second).unwrap();
        assert_eq!(store.snapshot().selected_id, None);
    }

    #[test]
    fn add_then_remove_restores_order() {
        let (mut store, id) = store_with("routine");
        let a = add_random(&mut store, id);
        let b = add_random(&mut store, id);
        let before: Vec<Uuid> = store.snapshot().scenario(id).unwrap().actions.iter().map(|x| x.id).collect();

        let extra = add_random(&mut store, id);
        store.remove_action(extra.id).unwrap();

        let after: Vec<Uuid> = store.snapshot().scenario(id).unwrap().actions.iter().map(|x| x.id).collect();
        assert_eq!(before, after);
        assert_eq!(after, vec![a.id, b.id]);
    }

    #[test]
    fn removing_last_action_keeps_scenario() {
        let (mut store, id) = store_with("solo");
        let action = add_random(&mut store, id);
        store.remove_action(action.id).unwrap();
        assert!(store.snapshot().scenario(id).unwrap().actions.is_empty());
    }

    #[test]
    fn add_action_checks_scenario_registry_and_schema() {
        let (mut store, id) = store_with("checks");

        let missing = store.add_action(
            Uuid::new_v4(),
            ActionType::RandomVideoInteraction,
            None,
            default_config(ActionType::RandomVideoInteraction),
        );
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let invalid = store.add_action(
            id,
            ActionType::KeywordVideoInteraction,
            None,
            default_config(ActionType::KeywordVideoInteraction),
        );
        assert_eq!(invalid.unwrap_err().first_field(), Some("target.keywords"));
        assert!(store.snapshot().scenario(id).unwrap().actions.is_empty());
    }

    #[test]
    fn coming_soon_never_produces_an_action() {
        let (mut store, id) = store_with("soon");
        for action_type in ActionType::ALL {
            if registry::definition(action_type).is_available() {
                continue;
            }
            assert!(store.draft_action(id, action_type).is_err());
            let result = store.add_action(id, action_type, None, default_config(action_type));
            assert!(matches!(result, Err(AppError::Unavailable(_))));
        }
        assert_eq!(store.snapshot().list_actions().count(), 0);
    }

    #[test]
    fn drafts_are_not_stored_until_saved() {
        let (mut store, id) = store_with("drafts");
        let draft = store.draft_action(id, ActionType::ChangeName).unwrap();
        assert!(draft.is_new);
        assert_eq!(store.snapshot().list_actions().count(), 0);

        // Saving with empty defaults fails and leaves nothing behind.
        assert!(store.save_draft(draft.clone()).is_err());

        let mut draft = draft;
        draft.config = draft.config.with_field("names", json!("Mia\nLeo")).unwrap();
        let action = store.save_draft(draft).unwrap();
        assert_eq!(action.name, "Change name");
        assert_eq!(store.snapshot().list_actions().count(), 1);
    }

    #[test]
    fn update_config_round_trips() {
        let (mut store, id) = store_with("round trip");
        let action = add_random(&mut store, id);

        let cfg = default_config(ActionType::RandomVideoInteraction)
            .with_field("comment.enabled", json!(true))
            .and_then(|c| c.with_field("comment.comment_contents", json!("great\nlove it")))
            .and_then(|c| c.with_field("like.rate", json!(55)))
            .unwrap();

        store.update_action_config(action.id, cfg.clone()).unwrap();
        assert_eq!(store.snapshot().action(action.id).unwrap().config, cfg);
    }

    #[test]
    fn invalid_update_leaves_config_unchanged() {
        let (mut store, id) = store_with("atomic");
        let action = add_random(&mut store, id);

        let result = store.update_action_field(action.id, "like.gap_from", json!(10));
        assert_eq!(result.unwrap_err().first_field(), Some("like.gap_to"));
        assert_eq!(store.snapshot().action(action.id).unwrap().config, action.config);
    }

    #[test]
    fn update_rejects_a_different_variant() {
        let (mut store, id) = store_with("variant");
        let action = add_random(&mut store, id);
        let result = store.update_action_config(
            action.id,
            ActionConfig::Name(crate::action_config::NameConfig {
                names: "x".to_string(),
            }),
        );
        assert_eq!(result.unwrap_err().first_field(), Some("kind"));
    }

    #[test]
    fn old_snapshots_are_unaffected_by_mutation() {
        let (mut store, id) = store_with("snapshots");
        let before = store.snapshot();
        add_random(&mut store, id);
        assert!(before.scenario(id).unwrap().actions.is_empty());
        assert_eq!(store.snapshot().scenario(id).unwrap().actions.len(), 1);
    }
}
