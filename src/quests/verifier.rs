//! Quest completion policy
//!
//! | type | rule |
//! |---|---|
//! | daily, weekly, twitter, discord, leaderboard, referral, achievement | always passes |
//! | telegram | external membership check on `action`/`target_id` |
//! | tap | `total_taps >= requirement` |
//! | level | `gpu_level >= requirement` |
//! | anything else | `UnknownQuestType` |

use std::sync::Arc;

use crate::db::schemas::{QuestDoc, QuestType, UserDoc};
use crate::membership::MembershipChecker;
use crate::types::{GameError, Result};

pub struct QuestVerifier {
    membership: Arc<dyn MembershipChecker>,
}

impl QuestVerifier {
    pub fn new(membership: Arc<dyn MembershipChecker>) -> Self {
        Self { membership }
    }

    /// Decide whether `user` has earned `quest`'s reward
    pub async fn verify(&self, user: &UserDoc, quest: &QuestDoc) -> Result<bool> {
        match &quest.quest_type {
            // External verification for these is not implemented yet
            QuestType::Daily
            | QuestType::Weekly
            | QuestType::Twitter
            | QuestType::Discord
            | QuestType::Leaderboard
            | QuestType::Referral
            | QuestType::Achievement => Ok(true),
            QuestType::Telegram => self.verify_telegram(user, quest).await,
            QuestType::Tap => Ok(user.total_taps >= requirement(quest)?),
            QuestType::Level => Ok(user.level() >= requirement(quest)?),
            QuestType::Bonus | QuestType::Unknown(_) => {
                Err(GameError::UnknownQuestType(quest.quest_type.to_string()))
            }
        }
    }

    async fn verify_telegram(&self, user: &UserDoc, quest: &QuestDoc) -> Result<bool> {
        let (Some(action), Some(target_id), Some(telegram_id)) =
            (&quest.action, &quest.target_id, user.telegram_id)
        else {
            return Err(GameError::MissingData(format!(
                "telegram quest {} needs action, target and the user's telegram id",
                quest.quest_id
            )));
        };

        self.membership
            .check_membership(action, target_id, telegram_id)
            .await
            .map_err(|e| match e {
                GameError::VerificationFailure(_) | GameError::MissingData(_) => e,
                other => GameError::VerificationFailure(other.to_string()),
            })
    }
}

fn requirement(quest: &QuestDoc) -> Result<i64> {
    quest.requirement.ok_or_else(|| {
        GameError::MissingData(format!(
            "{} quest {} has no requirement",
            quest.quest_type, quest.quest_id
        ))
    })
}
