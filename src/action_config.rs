// src/action_config.rs
use crate::error::ValidationError;
use crate::registry::{self, ActionType};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const MIN_GAP_SECONDS: i64 = 1;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub from: i64,
    pub to: i64,
}

impl Bounds {
    pub const fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    fn check(&self, field: &str, min: i64, errors: &mut Vec<ValidationError>) {
        if self.from < min {
            errors.push(ValidationError::new(
                format!("{}.from", field),
                format!("From must be at least {}", min),
            ));
        } else if self.from > self.to {
            errors.push(ValidationError::new(
                format!("{}.to", field),
                "To must be greater than or equal to from",
            ));
        }
    }

    /// Uniform draw in `[from, to]`. A collapsed or inverted range yields `from`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        if self.from >= self.to {
            self.from
        } else {
            rng.gen_range(self.from..=self.to)
        }
    }
}

fn check_gap(field: &str, gap_from: i64, gap_to: i64, errors: &mut Vec<ValidationError>) {
    if gap_from < MIN_GAP_SECONDS {
        errors.push(ValidationError::new(
            format!("{}gap_from", field),
            format!("Gap from must be at least {} second", MIN_GAP_SECONDS),
        ));
    } else if gap_from > gap_to {
        errors.push(ValidationError::new(
            format!("{}gap_to", field),
            "Gap to must be greater than or equal to gap from",
        ));
    }
}

fn check_rate(field: &str, rate: i64, errors: &mut Vec<ValidationError>) {
    if !(0..=100).contains(&rate) {
        errors.push(ValidationError::new(
            format!("{}rate", field),
            "Rate must be between 0 and 100",
        ));
    }
}

pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

fn require_lines(field: &str, text: &str, what: &str, errors: &mut Vec<ValidationError>) {
    if split_lines(text).is_empty() {
        errors.push(ValidationError::new(
            field,
            format!("Enter at least one {}", what),
        ));
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BehaviorBlock {
    pub enabled: bool,
    pub rate: i64,
    pub gap_from: i64,
    pub gap_to: i64,
}

impl BehaviorBlock {
    pub const fn on() -> Self {
        Self {
            enabled: true,
            rate: 100,
            gap_from: 1,
            gap_to: 3,
        }
    }

    pub const fn off() -> Self {
        Self {
            enabled: false,
            ..Self::on()
        }
    }

    pub fn gap(&self) -> Bounds {
        Bounds::new(self.gap_from, self.gap_to)
    }

    fn check(&self, field: &str, errors: &mut Vec<ValidationError>) {
        if !self.enabled {
            return;
        }
        let prefix = format!("{}.", field);
        check_rate(&prefix, self.rate, errors);
        check_gap(&prefix, self.gap_from, self.gap_to, errors);
    }

    /// Decides whether the behavior fires and, if so, the delay before it.
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        let rate = self.rate.clamp(0, 100);
        if rng.gen_range(0..100) >= rate {
            return None;
        }
        let seconds = self.gap().sample(rng).max(0) as u64;
        Some(Duration::from_secs(seconds))
    }
}

// Text comes from literal lines or from a content library group and topic.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CommentBlock {
    pub enabled: bool,
    pub rate: i64,
    pub gap_from: i64,
    pub gap_to: i64,
    #[serde(default)]
    pub content_group: Option<String>,
    #[serde(default)]
    pub content_topic: Option<String>,
    #[serde(default)]
    pub comment_contents: String,
}

impl CommentBlock {
    pub fn off() -> Self {
        let base = BehaviorBlock::off();
        Self {
            enabled: base.enabled,
            rate: base.rate,
            gap_from: base.gap_from,
            gap_to: base.gap_to,
            content_group: None,
            content_topic: None,
            comment_contents: String::new(),
        }
    }

    pub fn behavior(&self) -> BehaviorBlock {
        BehaviorBlock {
            enabled: self.enabled,
            rate: self.rate,
            gap_from: self.gap_from,
            gap_to: self.gap_to,
        }
    }

    pub fn uses_library(&self) -> bool {
        has_text(&self.content_group) && has_text(&self.content_topic)
    }

    pub fn comments(&self) -> Vec<String> {
        split_lines(&self.comment_contents)
    }

    fn check(&self, field: &str, errors: &mut Vec<ValidationError>) {
        if !self.enabled {
            return;
        }
        self.behavior().check(field, errors);
        if self.comments().is_empty() && !self.uses_library() {
            errors.push(ValidationError::new(
                format!("{}.comment_contents", field),
                "Enter at least one comment or choose a content group and topic",
            ));
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    VideoCount,
    TimeLimit,
}

/// When a feed-style action stops. Only the bounds of the active mode matter.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopCondition {
    pub mode: StopMode,
    pub video_count: Bounds,
    /// Minutes.
    pub time_limit: Bounds,
}

impl StopCondition {
    pub const fn by_count() -> Self {
        Self {
            mode: StopMode::VideoCount,
            video_count: Bounds::new(10, 20),
            time_limit: Bounds::new(10, 30),
        }
    }

    pub fn active_bounds(&self) -> Bounds {
        match self.mode {
            StopMode::VideoCount => self.video_count,
            StopMode::TimeLimit => self.time_limit,
        }
    }

    fn check(&self, field: &str, errors: &mut Vec<ValidationError>) {
        match self.mode {
            StopMode::VideoCount => {
                self.video_count
                    .check(&format!("{}.video_count", field), 1, errors)
            }
            StopMode::TimeLimit => {
                self.time_limit
                    .check(&format!("{}.time_limit", field), 1, errors)
            }
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum VideoTarget {
    ForYou,
    Keywords { keywords: String },
    Usernames { usernames: String },
    VideoLinks { video_links: String },
}

impl VideoTarget {
    pub fn entries(&self) -> Vec<String> {
        match self {
            VideoTarget::ForYou => Vec::new(),
            VideoTarget::Keywords { keywords } => split_lines(keywords),
            VideoTarget::Usernames { usernames } => split_lines(usernames),
            VideoTarget::VideoLinks { video_links } => split_lines(video_links),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum LiveTarget {
    Random,
    Usernames { usernames: String },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VideoInteractionConfig {
    pub target: VideoTarget,
    /// Absent for explicit link lists, which stop when the list is exhausted.
    #[serde(default)]
    pub stop: Option<StopCondition>,
    /// Seconds spent on each video.
    pub watch_duration: Bounds,
    pub like: BehaviorBlock,
    pub follow: BehaviorBlock,
    pub favorite: BehaviorBlock,
    pub repost: BehaviorBlock,
    pub comment: CommentBlock,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LiveInteractionConfig {
    pub target: LiveTarget,
    pub stop: StopCondition,
    /// Seconds spent in each live.
    pub watch_duration: Bounds,
    pub like: BehaviorBlock,
    pub follow: BehaviorBlock,
    pub comment: CommentBlock,
    pub emotion: BehaviorBlock,
    pub add_to_cart: BehaviorBlock,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FollowConfig {
    #[serde(default)]
    pub usernames: String,
    pub count: Bounds,
    pub gap_from: i64,
    pub gap_to: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MessageConfig {
    pub usernames: String,
    pub message_contents: String,
    pub gap_from: i64,
    pub gap_to: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PostConfig {
    #[serde(default)]
    pub video_links: String,
    #[serde(default)]
    pub captions: String,
    #[serde(default)]
    pub content_group: Option<String>,
    #[serde(default)]
    pub content_topic: Option<String>,
    pub post_count: Bounds,
    pub gap_from: i64,
    pub gap_to: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AvatarConfig {
    #[serde(default)]
    pub image_links: String,
    #[serde(default)]
    pub content_group: Option<String>,
    #[serde(default)]
    pub content_topic: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NameConfig {
    pub names: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BioConfig {
    pub bios: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionConfig {
    VideoInteraction(VideoInteractionConfig),
    LiveInteraction(LiveInteractionConfig),
    Follow(FollowConfig),
    Message(MessageConfig),
    Post(PostConfig),
    Avatar(AvatarConfig),
    Name(NameConfig),
    Bio(BioConfig),
}

impl ActionConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionConfig::VideoInteraction(_) => "video_interaction",
            ActionConfig::LiveInteraction(_) => "live_interaction",
            ActionConfig::Follow(_) => "follow",
            ActionConfig::Message(_) => "message",
            ActionConfig::Post(_) => "post",
            ActionConfig::Avatar(_) => "avatar",
            ActionConfig::Name(_) => "name",
            ActionConfig::Bio(_) => "bio",
        }
    }

    /// Returns a copy with one field replaced. `path` is dotted, e.g.
    /// `like.rate` or `stop.video_count.to`. Text sent for a numeric field is
    /// parsed as a whole number. The variant itself cannot be changed.
    pub fn with_field(&self, path: &str, value: Value) -> Result<ActionConfig, ValidationError> {
        if path.is_empty() || path == "kind" {
            return Err(ValidationError::new(
                "kind",
                "The configuration kind cannot be changed",
            ));
        }

        let mut root = serde_json::to_value(self)
            .map_err(|e| ValidationError::new(path, e.to_string()))?;
        let mut slot = &mut root;
        for segment in path.split('.') {
            slot = match slot.get_mut(segment) {
                Some(next) => next,
                None => return Err(ValidationError::new(path, "Unknown field")),
            };
        }
        *slot = coerce(slot, value).ok_or_else(|| {
            ValidationError::new(path, "Must be a whole number")
        })?;

        serde_json::from_value(root)
            .map_err(|e| ValidationError::new(path, format!("Invalid value: {}", e)))
    }
}

fn coerce(current: &Value, value: Value) -> Option<Value> {
    match (current, value) {
        (Value::Number(_), Value::String(text)) => {
            text.trim().parse::<i64>().ok().map(Value::from)
        }
        (Value::Number(_), Value::Number(n)) => n.as_i64().map(Value::from),
        (_, other) => Some(other),
    }
}

pub fn default_config(action_type: ActionType) -> ActionConfig {
    registry::definition(action_type).default_config()
}

/// Checks `config` against the schema of `action_type`. Every failing field is
/// reported, in declaration order; the first one is what callers surface.
pub fn validate(
    action_type: ActionType,
    config: ActionConfig,
) -> Result<ActionConfig, Vec<ValidationError>> {
    let mut errors = Vec::new();
    check(action_type, &config, &mut errors);
    if errors.is_empty() {
        Ok(config)
    } else {
        Err(errors)
    }
}

fn mismatch(action_type: ActionType, field: &str, errors: &mut Vec<ValidationError>) {
    errors.push(ValidationError::new(
        field,
        format!("Configuration does not match action \"{}\"", action_type),
    ));
}

fn check(action_type: ActionType, config: &ActionConfig, errors: &mut Vec<ValidationError>) {
    use ActionType as T;

    match (action_type, config) {
        (
            T::RandomVideoInteraction
            | T::KeywordVideoInteraction
            | T::UserVideoInteraction
            | T::SpecificVideoInteraction,
            ActionConfig::VideoInteraction(c),
        ) => check_video(action_type, c, errors),
        (T::RandomLiveInteraction | T::SpecificLiveInteraction, ActionConfig::LiveInteraction(c)) => {
            check_live(action_type, c, errors)
        }
        (T::FollowUser | T::FollowBack | T::UnfollowUser, ActionConfig::Follow(c)) => {
            if action_type == T::FollowUser {
                require_lines("usernames", &c.usernames, "username", errors);
            }
            c.count.check("count", 1, errors);
            check_gap("", c.gap_from, c.gap_to, errors);
        }
        (T::SendMessage, ActionConfig::Message(c)) => {
            require_lines("usernames", &c.usernames, "username", errors);
            require_lines("message_contents", &c.message_contents, "message", errors);
            check_gap("", c.gap_from, c.gap_to, errors);
        }
        (T::CreatePost, ActionConfig::Post(c)) => {
            let library = has_text(&c.content_group) && has_text(&c.content_topic);
            if split_lines(&c.video_links).is_empty() && !library {
                errors.push(ValidationError::new(
                    "video_links",
                    "Enter at least one video link or choose a content group and topic",
                ));
            }
            c.post_count.check("post_count", 1, errors);
            check_gap("", c.gap_from, c.gap_to, errors);
        }
        (T::UpdateAvatar, ActionConfig::Avatar(c)) => {
            let library = has_text(&c.content_group) && has_text(&c.content_topic);
            if split_lines(&c.image_links).is_empty() && !library {
                errors.push(ValidationError::new(
                    "image_links",
                    "Enter at least one image link or choose a content group and topic",
                ));
            }
        }
        (T::ChangeName, ActionConfig::Name(c)) => require_lines("names", &c.names, "name", errors),
        (T::ChangeBio, ActionConfig::Bio(c)) => require_lines("bios", &c.bios, "bio", errors),
        _ => mismatch(action_type, "kind", errors),
    }
}

fn check_video(action_type: ActionType, c: &VideoInteractionConfig, errors: &mut Vec<ValidationError>) {
    use ActionType as T;

    match (action_type, &c.target) {
        (T::RandomVideoInteraction, VideoTarget::ForYou) => {}
        (T::KeywordVideoInteraction, VideoTarget::Keywords { keywords }) => {
            require_lines("target.keywords", keywords, "keyword", errors)
        }
        (T::UserVideoInteraction, VideoTarget::Usernames { usernames }) => {
            require_lines("target.usernames", usernames, "username", errors)
        }
        (T::SpecificVideoInteraction, VideoTarget::VideoLinks { video_links }) => {
            require_lines("target.video_links", video_links, "video link", errors)
        }
        _ => mismatch(action_type, "target.source", errors),
    }

    if action_type != T::SpecificVideoInteraction {
        match &c.stop {
            Some(stop) => stop.check("stop", errors),
            None => errors.push(ValidationError::new(
                "stop",
                "Choose when the action should stop",
            )),
        }
    }

    c.watch_duration.check("watch_duration", 1, errors);
    c.like.check("like", errors);
    c.follow.check("follow", errors);
    c.favorite.check("favorite", errors);
    c.repost.check("repost", errors);
    c.comment.check("comment", errors);
}

fn check_live(action_type: ActionType, c: &LiveInteractionConfig, errors: &mut Vec<ValidationError>) {
    match (action_type, &c.target) {
        (ActionType::RandomLiveInteraction, LiveTarget::Random) => {}
        (ActionType::SpecificLiveInteraction, LiveTarget::Usernames { usernames }) => {
            require_lines("target.usernames", usernames, "username", errors)
        }
        _ => mismatch(action_type, "target.source", errors),
    }

    c.stop.check("stop", errors);
    c.watch_duration.check("watch_duration", 1, errors);
    c.like.check("like", errors);
    c.follow.check("follow", errors);
    c.comment.check("comment", errors);
    c.emotion.check("emotion", errors);
    c.add_to_cart.check("add_to_cart", errors);
}

pub(crate) mod defaults {
    use super::*;

    fn video(target: VideoTarget, stop: Option<StopCondition>) -> ActionConfig {
        ActionConfig::VideoInteraction(VideoInteractionConfig {
            target,
            stop,
            watch_duration: Bounds::new(5, 15),
            like: BehaviorBlock::on(),
            follow: BehaviorBlock::off(),
            favorite: BehaviorBlock::off(),
            repost: BehaviorBlock::off(),
            comment: CommentBlock::off(),
        })
    }

    fn live(target: LiveTarget) -> ActionConfig {
        ActionConfig::LiveInteraction(LiveInteractionConfig {
            target,
            stop: StopCondition {
                mode: StopMode::TimeLimit,
                ..StopCondition::by_count()
            },
            watch_duration: Bounds::new(60, 300),
            like: BehaviorBlock::on(),
            follow: BehaviorBlock::off(),
            comment: CommentBlock::off(),
            emotion: BehaviorBlock::off(),
            add_to_cart: BehaviorBlock::off(),
        })
    }

    fn follow() -> ActionConfig {
        ActionConfig::Follow(FollowConfig {
            usernames: String::new(),
            count: Bounds::new(5, 10),
            gap_from: 1,
            gap_to: 3,
        })
    }

    pub fn random_video() -> ActionConfig {
        video(VideoTarget::ForYou, Some(StopCondition::by_count()))
    }

    pub fn keyword_video() -> ActionConfig {
        video(
            VideoTarget::Keywords {
                keywords: String::new(),
            },
            Some(StopCondition::by_count()),
        )
    }

    pub fn user_video() -> ActionConfig {
        video(
            VideoTarget::Usernames {
                usernames: String::new(),
            },
            Some(StopCondition::by_count()),
        )
    }

    pub fn specific_video() -> ActionConfig {
        video(
            VideoTarget::VideoLinks {
                video_links: String::new(),
            },
            None,
        )
    }

    pub fn random_live() -> ActionConfig {
        live(LiveTarget::Random)
    }

    pub fn specific_live() -> ActionConfig {
        live(LiveTarget::Usernames {
            usernames: String::new(),
        })
    }

    pub fn follow_user() -> ActionConfig {
        follow()
    }

    pub fn follow_back() -> ActionConfig {
        follow()
    }

    pub fn unfollow_user() -> ActionConfig {
        follow()
    }

    pub fn send_message() -> ActionConfig {
        ActionConfig::Message(MessageConfig {
            usernames: String::new(),
            message_contents: String::new(),
            gap_from: 1,
            gap_to: 3,
        })
    }

    pub fn create_post() -> ActionConfig {
        ActionConfig::Post(PostConfig {
            video_links: String::new(),
            captions: String::new(),
            content_group: None,
            content_topic: None,
            post_count: Bounds::new(1, 1),
            gap_from: 1,
            gap_to: 3,
        })
    }

    pub fn update_avatar() -> ActionConfig {
        ActionConfig::Avatar(AvatarConfig {
            image_links: String::new(),
            content_group: None,
            content_topic: None,
        })
    }

    pub fn change_name() -> ActionConfig {
        ActionConfig::Name(NameConfig {
            names: String::new(),
        })
    }

    pub fn change_bio() -> ActionConfig {
        ActionConfig::Bio(BioConfig {
            bios: String::new(),
        })
    }
}
