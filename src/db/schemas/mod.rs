//! Database schemas for tapforge
//!
//! Defines MongoDB document structures for users, quests, referrals and
//! leaderboard entries.

mod leaderboard;
mod metadata;
mod quest;
mod referral;
mod user;

pub use leaderboard::{LeaderboardDoc, LeaderboardWindow, LEADERBOARD_COLLECTION};
pub use metadata::Metadata;
pub use quest::{QuestDoc, QuestType, QUEST_COLLECTION};
pub use referral::{ReferralDoc, REFERRAL_COLLECTION};
pub use user::{UserDoc, UserSnapshot, USER_COLLECTION};
