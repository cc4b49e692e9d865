//! Persistence interface consumed by the progression core
//!
//! `GameStore` is the seam between the engine and storage. `MongoGameStore`
//! backs production; `InMemoryStore` backs tests and local runs.

mod memory;
mod mongo;

pub use memory::InMemoryStore;
pub use mongo::MongoGameStore;

use bson::DateTime;

use crate::db::schemas::{LeaderboardDoc, LeaderboardWindow, QuestDoc, ReferralDoc, UserDoc};
use crate::types::Result;

#[async_trait::async_trait]
pub trait GameStore: Send + Sync {
    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<UserDoc>>;

    async fn find_user_by_telegram_id(&self, telegram_id: i64) -> Result<Option<UserDoc>>;

    /// Persist the full user document, inserting it if new
    async fn save_user(&self, user: &UserDoc) -> Result<()>;

    async fn find_quest_by_id(&self, quest_id: &str) -> Result<Option<QuestDoc>>;

    async fn list_quests(&self) -> Result<Vec<QuestDoc>>;

    /// Atomic upsert keyed by `(window, period_start, user_id)`
    ///
    /// Overwrites `username`; `score` never moves backwards.
    async fn upsert_leaderboard_entry(
        &self,
        window: LeaderboardWindow,
        period_start: DateTime,
        user_id: &str,
        username: &str,
        score: i64,
    ) -> Result<()>;

    /// Entries of one period ordered by descending score
    async fn top_leaderboard(
        &self,
        window: LeaderboardWindow,
        period_start: DateTime,
        limit: usize,
    ) -> Result<Vec<LeaderboardDoc>>;

    /// Record a referral edge; a no-op if it already exists
    async fn create_referral(&self, referrer_id: &str, referred_id: &str) -> Result<()>;

    /// Add `delta` to the edge's distributed rewards, creating the edge if missing
    async fn upsert_referral_counter(
        &self,
        referrer_id: &str,
        referred_id: &str,
        delta: i64,
    ) -> Result<()>;

    async fn find_referral(
        &self,
        referrer_id: &str,
        referred_id: &str,
    ) -> Result<Option<ReferralDoc>>;
}
