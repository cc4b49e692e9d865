//! User document schema
//!
//! Durable per-user progression state: XP, taps, GPU level, cooldown and
//! boost timers, completed quests and the referral link.

use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::Utc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Stable external identity
    pub user_id: String,

    /// Telegram user id supplied by the auth provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_id: Option<i64>,

    /// Display name, denormalized onto leaderboard entries
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub xp: i64,

    /// Accumulated resource mirroring XP gains
    #[serde(default)]
    pub compute: i64,

    /// XP granted per tap, raised by GPU level-ups
    #[serde(default = "default_compute_power")]
    pub compute_power: i64,

    #[serde(default)]
    pub total_taps: i64,

    #[serde(default)]
    pub gpu_level: i64,

    /// Taps are rejected while `now < cooldown_end_time`
    #[serde(default)]
    pub cooldown_end_time: Option<DateTime>,

    #[serde(default)]
    pub boost_count: i64,

    #[serde(default)]
    pub last_tap_time: Option<DateTime>,

    #[serde(default)]
    pub last_boost_time: Option<DateTime>,

    #[serde(default)]
    pub last_daily_claim: Option<DateTime>,

    /// Quest ids, append-only
    #[serde(default)]
    pub completed_quests: Vec<String>,

    /// `user_id` of the direct referrer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<String>,
}

fn default_compute_power() -> i64 {
    1
}

impl UserDoc {
    /// Create a fresh user with starting progression
    pub fn new(user_id: String, telegram_id: Option<i64>, username: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id,
            telegram_id,
            username,
            compute_power: default_compute_power(),
            ..Default::default()
        }
    }

    /// Level used by `level` quests
    pub fn level(&self) -> i64 {
        self.gpu_level
    }

    pub fn has_completed(&self, quest_id: &str) -> bool {
        self.completed_quests.iter().any(|q| q == quest_id)
    }

    /// Cooldown end as a chrono timestamp
    pub fn cooldown_end(&self) -> Option<chrono::DateTime<Utc>> {
        self.cooldown_end_time.map(|t| t.to_chrono())
    }

    /// Public view returned by tap and boost
    pub fn snapshot(&self) -> UserSnapshot {
        UserSnapshot {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            xp: self.xp,
            compute: self.compute,
            total_taps: self.total_taps,
            compute_power: self.compute_power,
            gpu_level: self.gpu_level,
            cooldown_end_time: self.cooldown_end(),
            boost_count: self.boost_count,
        }
    }
}

/// Progression snapshot handed back to the caller after a tap or boost
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    pub user_id: String,
    pub username: String,
    pub xp: i64,
    pub compute: i64,
    pub total_taps: i64,
    pub compute_power: i64,
    pub gpu_level: i64,
    pub cooldown_end_time: Option<chrono::DateTime<Utc>>,
    pub boost_count: i64,
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_id_unique".to_string())
                        .build(),
                ),
            ),
            // Sparse so users without a Telegram id do not collide on null
            (
                doc! { "telegram_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .sparse(true)
                        .name("telegram_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "referred_by": 1 },
                Some(
                    IndexOptions::builder()
                        .name("referred_by_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
