//! In-memory `GameStore` implementation

use bson::DateTime;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::GameStore;
use crate::db::schemas::{
    LeaderboardDoc, LeaderboardWindow, Metadata, QuestDoc, ReferralDoc, UserDoc,
};
use crate::types::Result;

type LeaderboardKey = (LeaderboardWindow, i64, String);

/// Map-backed store for tests and local development
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<String, UserDoc>>,
    quests: RwLock<HashMap<String, QuestDoc>>,
    referrals: RwLock<HashMap<(String, String), ReferralDoc>>,
    leaderboard: RwLock<HashMap<LeaderboardKey, LeaderboardDoc>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a quest (quest administration lives outside the core)
    pub async fn insert_quest(&self, quest: QuestDoc) {
        self.quests
            .write()
            .await
            .insert(quest.quest_id.clone(), quest);
    }

    /// Number of leaderboard entries across all windows and periods
    pub async fn leaderboard_len(&self) -> usize {
        self.leaderboard.read().await.len()
    }
}

#[async_trait::async_trait]
impl GameStore for InMemoryStore {
    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<UserDoc>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn find_user_by_telegram_id(&self, telegram_id: i64) -> Result<Option<UserDoc>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.telegram_id == Some(telegram_id))
            .cloned())
    }

    async fn save_user(&self, user: &UserDoc) -> Result<()> {
        let mut stored = user.clone();
        stored.metadata.updated_at = Some(DateTime::now());
        self.users
            .write()
            .await
            .insert(stored.user_id.clone(), stored);
        Ok(())
    }

    async fn find_quest_by_id(&self, quest_id: &str) -> Result<Option<QuestDoc>> {
        Ok(self.quests.read().await.get(quest_id).cloned())
    }

    async fn list_quests(&self) -> Result<Vec<QuestDoc>> {
        Ok(self.quests.read().await.values().cloned().collect())
    }

    async fn upsert_leaderboard_entry(
        &self,
        window: LeaderboardWindow,
        period_start: DateTime,
        user_id: &str,
        username: &str,
        score: i64,
    ) -> Result<()> {
        let key = (window, period_start.timestamp_millis(), user_id.to_string());
        let mut entries = self.leaderboard.write().await;

        let entry = entries.entry(key).or_insert_with(|| LeaderboardDoc {
            _id: None,
            metadata: Metadata::new(),
            window,
            period_start,
            user_id: user_id.to_string(),
            username: String::new(),
            score,
        });
        entry.username = username.to_string();
        entry.score = entry.score.max(score);
        entry.metadata.updated_at = Some(DateTime::now());

        Ok(())
    }

    async fn top_leaderboard(
        &self,
        window: LeaderboardWindow,
        period_start: DateTime,
        limit: usize,
    ) -> Result<Vec<LeaderboardDoc>> {
        let mut entries: Vec<LeaderboardDoc> = self
            .leaderboard
            .read()
            .await
            .values()
            .filter(|e| e.window == window && e.period_start == period_start)
            .cloned()
            .collect();

        entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.user_id.cmp(&b.user_id)));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn create_referral(&self, referrer_id: &str, referred_id: &str) -> Result<()> {
        self.referrals
            .write()
            .await
            .entry((referrer_id.to_string(), referred_id.to_string()))
            .or_insert_with(|| ReferralDoc::new(referrer_id.to_string(), referred_id.to_string()));
        Ok(())
    }

    async fn upsert_referral_counter(
        &self,
        referrer_id: &str,
        referred_id: &str,
        delta: i64,
    ) -> Result<()> {
        let mut referrals = self.referrals.write().await;
        let edge = referrals
            .entry((referrer_id.to_string(), referred_id.to_string()))
            .or_insert_with(|| ReferralDoc::new(referrer_id.to_string(), referred_id.to_string()));
        edge.total_rewards_distributed += delta;
        edge.metadata.updated_at = Some(DateTime::now());
        Ok(())
    }

    async fn find_referral(
        &self,
        referrer_id: &str,
        referred_id: &str,
    ) -> Result<Option<ReferralDoc>> {
        Ok(self
            .referrals
            .read()
            .await
            .get(&(referrer_id.to_string(), referred_id.to_string()))
            .cloned())
    }
}
