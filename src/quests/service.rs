//! Quest claiming

use bson::DateTime as BsonDateTime;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::verifier::QuestVerifier;
use crate::db::schemas::{QuestDoc, QuestType};
use crate::progression::UserLocks;
use crate::store::GameStore;
use crate::types::{GameError, Result};

/// Non-error results of a quest claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClaimOutcome {
    /// Reward credited; `xp` is the new total
    Claimed { xp: i64, xp_reward: i64 },
    /// Telegram quest whose chat the user has not joined yet
    NotJoined,
    /// Tap or level quest whose threshold is not reached yet
    RequirementNotMet,
}

pub struct QuestService {
    store: Arc<dyn GameStore>,
    verifier: QuestVerifier,
    locks: Arc<UserLocks>,
}

impl QuestService {
    pub fn new(store: Arc<dyn GameStore>, verifier: QuestVerifier, locks: Arc<UserLocks>) -> Self {
        Self {
            store,
            verifier,
            locks,
        }
    }

    /// Verify and credit a quest for a user, at most once
    pub async fn claim_quest(&self, user_id: &str, quest_id: &str) -> Result<ClaimOutcome> {
        let _guard = self.locks.lock(user_id).await;

        let mut user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("user {}", user_id)))?;
        let quest = self
            .store
            .find_quest_by_id(quest_id)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("quest {}", quest_id)))?;

        if user.has_completed(quest_id) {
            return Err(GameError::AlreadyClaimed(quest_id.to_string()));
        }

        if !self.verifier.verify(&user, &quest).await? {
            debug!(user_id = %user_id, quest_id = %quest_id, "Quest not yet completed");
            return Ok(match quest.quest_type {
                QuestType::Telegram => ClaimOutcome::NotJoined,
                _ => ClaimOutcome::RequirementNotMet,
            });
        }

        user.xp += quest.xp_reward;
        user.completed_quests.push(quest_id.to_string());
        self.store.save_user(&user).await?;

        info!(
            user_id = %user_id,
            quest_id = %quest_id,
            xp_reward = quest.xp_reward,
            "Quest claimed"
        );

        Ok(ClaimOutcome::Claimed {
            xp: user.xp,
            xp_reward: quest.xp_reward,
        })
    }

    /// Unexpired quests the user has not completed
    pub async fn available_quests(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<QuestDoc>> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("user {}", user_id)))?;

        let now = BsonDateTime::from_chrono(now);
        let mut quests: Vec<QuestDoc> = self
            .store
            .list_quests()
            .await?
            .into_iter()
            .filter(|q| !q.is_expired(now) && !user.has_completed(&q.quest_id))
            .collect();
        quests.sort_by(|a, b| a.expires_at.cmp(&b.expires_at));

        Ok(quests)
    }
}
