//! MongoDB-backed `GameStore`

use bson::{doc, DateTime};
use mongodb::options::FindOptions;
use tracing::info;

use super::GameStore;
use crate::db::schemas::{
    LeaderboardDoc, LeaderboardWindow, QuestDoc, ReferralDoc, UserDoc, LEADERBOARD_COLLECTION,
    QUEST_COLLECTION, REFERRAL_COLLECTION, USER_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::types::Result;

pub struct MongoGameStore {
    users: MongoCollection<UserDoc>,
    quests: MongoCollection<QuestDoc>,
    referrals: MongoCollection<ReferralDoc>,
    leaderboard: MongoCollection<LeaderboardDoc>,
}

impl MongoGameStore {
    /// Open all collections, applying their indexes
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let store = Self {
            users: mongo.collection::<UserDoc>(USER_COLLECTION).await?,
            quests: mongo.collection::<QuestDoc>(QUEST_COLLECTION).await?,
            referrals: mongo.collection::<ReferralDoc>(REFERRAL_COLLECTION).await?,
            leaderboard: mongo.collection::<LeaderboardDoc>(LEADERBOARD_COLLECTION).await?,
        };
        info!("Game store ready on database '{}'", mongo.db_name());
        Ok(store)
    }
}

#[async_trait::async_trait]
impl GameStore for MongoGameStore {
    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "user_id": user_id }).await
    }

    async fn find_user_by_telegram_id(&self, telegram_id: i64) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "telegram_id": telegram_id }).await
    }

    async fn save_user(&self, user: &UserDoc) -> Result<()> {
        self.users
            .replace_or_insert(doc! { "user_id": &user.user_id }, user.clone())
            .await
    }

    async fn find_quest_by_id(&self, quest_id: &str) -> Result<Option<QuestDoc>> {
        self.quests.find_one(doc! { "quest_id": quest_id }).await
    }

    async fn list_quests(&self) -> Result<Vec<QuestDoc>> {
        self.quests.find_many(doc! {}, None).await
    }

    async fn upsert_leaderboard_entry(
        &self,
        window: LeaderboardWindow,
        period_start: DateTime,
        user_id: &str,
        username: &str,
        score: i64,
    ) -> Result<()> {
        self.leaderboard
            .upsert_one(
                doc! {
                    "window": window.as_str(),
                    "period_start": period_start,
                    "user_id": user_id,
                },
                doc! {
                    "$set": {
                        "username": username,
                        "metadata.updated_at": DateTime::now(),
                    },
                    "$max": { "score": score },
                    "$setOnInsert": {
                        "metadata.is_deleted": false,
                        "metadata.created_at": DateTime::now(),
                    },
                },
            )
            .await?;
        Ok(())
    }

    async fn top_leaderboard(
        &self,
        window: LeaderboardWindow,
        period_start: DateTime,
        limit: usize,
    ) -> Result<Vec<LeaderboardDoc>> {
        // Mongo reads a zero limit as "no limit"
        if limit == 0 {
            return Ok(Vec::new());
        }

        let options = FindOptions::builder()
            .sort(doc! { "score": -1, "user_id": 1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build();

        self.leaderboard
            .find_many(
                doc! { "window": window.as_str(), "period_start": period_start },
                Some(options),
            )
            .await
    }

    async fn create_referral(&self, referrer_id: &str, referred_id: &str) -> Result<()> {
        self.referrals
            .upsert_one(
                doc! { "referrer_id": referrer_id, "referred_id": referred_id },
                doc! {
                    "$setOnInsert": {
                        "total_rewards_distributed": 0_i64,
                        "metadata.is_deleted": false,
                        "metadata.created_at": DateTime::now(),
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn upsert_referral_counter(
        &self,
        referrer_id: &str,
        referred_id: &str,
        delta: i64,
    ) -> Result<()> {
        self.referrals
            .upsert_one(
                doc! { "referrer_id": referrer_id, "referred_id": referred_id },
                doc! {
                    "$inc": { "total_rewards_distributed": delta },
                    "$set": { "metadata.updated_at": DateTime::now() },
                },
            )
            .await?;
        Ok(())
    }

    async fn find_referral(
        &self,
        referrer_id: &str,
        referred_id: &str,
    ) -> Result<Option<ReferralDoc>> {
        self.referrals
            .find_one(doc! { "referrer_id": referrer_id, "referred_id": referred_id })
            .await
    }
}
