//! Quest document schema

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for quests
pub const QUEST_COLLECTION: &str = "quests";

/// Quest category, deciding how completion is verified
///
/// Unrecognized names survive a round trip through storage as `Unknown` so
/// that claiming them can be rejected with the offending name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestType {
    #[default]
    Daily,
    Weekly,
    Twitter,
    Telegram,
    Discord,
    Tap,
    Level,
    Referral,
    Achievement,
    Leaderboard,
    Bonus,
    Unknown(String),
}

impl QuestType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Twitter => "twitter",
            Self::Telegram => "telegram",
            Self::Discord => "discord",
            Self::Tap => "tap",
            Self::Level => "level",
            Self::Referral => "referral",
            Self::Achievement => "achievement",
            Self::Leaderboard => "leaderboard",
            Self::Bonus => "bonus",
            Self::Unknown(name) => name,
        }
    }
}

impl From<String> for QuestType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "twitter" => Self::Twitter,
            "telegram" => Self::Telegram,
            "discord" => Self::Discord,
            "tap" => Self::Tap,
            "level" => Self::Level,
            "referral" => Self::Referral,
            "achievement" => Self::Achievement,
            "leaderboard" => Self::Leaderboard,
            "bonus" => Self::Bonus,
            _ => Self::Unknown(value),
        }
    }
}

impl From<QuestType> for String {
    fn from(value: QuestType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for QuestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quest document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct QuestDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub quest_id: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    /// XP credited on a successful claim
    pub xp_reward: i64,

    #[serde(rename = "type")]
    pub quest_type: QuestType,

    pub expires_at: DateTime,

    /// Telegram quests: what the user must do (e.g. "join_channel")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Telegram quests: chat the user must belong to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,

    /// Tap and level quests: threshold to reach
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirement: Option<i64>,
}

impl QuestDoc {
    /// Create a new quest
    pub fn new(
        quest_id: String,
        title: String,
        xp_reward: i64,
        quest_type: QuestType,
        expires_at: DateTime,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            quest_id,
            title,
            description: String::new(),
            xp_reward,
            quest_type,
            expires_at,
            action: None,
            target_id: None,
            requirement: None,
        }
    }

    pub fn with_requirement(mut self, requirement: i64) -> Self {
        self.requirement = Some(requirement);
        self
    }

    pub fn with_telegram_target(mut self, action: String, target_id: String) -> Self {
        self.action = Some(action);
        self.target_id = Some(target_id);
        self
    }

    pub fn is_expired(&self, now: DateTime) -> bool {
        self.expires_at <= now
    }
}

impl IntoIndexes for QuestDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "quest_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("quest_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "expires_at": 1 },
                Some(
                    IndexOptions::builder()
                        .name("expires_at_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for QuestDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
