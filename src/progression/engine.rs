//! Progression engine
//!
//! Loads a user under its lock, runs the pure transitions from `rules`,
//! persists the result, then hands side effects to the fan-out queue.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::locks::UserLocks;
use super::rules;
use crate::config::GameRules;
use crate::db::schemas::{UserDoc, UserSnapshot};
use crate::fanout::{FanoutJob, FanoutQueue};
use crate::store::GameStore;
use crate::types::{GameError, Result};

/// Result of a daily XP claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyClaim {
    pub xp_gained: i64,
    pub new_total_xp: i64,
}

pub struct ProgressionEngine {
    store: Arc<dyn GameStore>,
    rules: GameRules,
    locks: Arc<UserLocks>,
    fanout: FanoutQueue,
}

impl ProgressionEngine {
    pub fn new(
        store: Arc<dyn GameStore>,
        rules: GameRules,
        locks: Arc<UserLocks>,
        fanout: FanoutQueue,
    ) -> Self {
        Self {
            store,
            rules,
            locks,
            fanout,
        }
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    async fn load_user(&self, user_id: &str) -> Result<UserDoc> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("user {}", user_id)))
    }

    pub async fn tap(&self, user_id: &str) -> Result<UserSnapshot> {
        self.tap_at(user_id, Utc::now()).await
    }

    /// Apply one tap at `now`
    pub async fn tap_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserSnapshot> {
        let snapshot = {
            let _guard = self.locks.lock(user_id).await;
            let mut user = self.load_user(user_id).await?;

            let outcome = rules::run_tap(&mut user, &self.rules, now)?;
            self.store.save_user(&user).await?;

            if outcome.entered_cooldown {
                info!(
                    user_id = %user_id,
                    total_taps = user.total_taps,
                    "Tap cooldown started"
                );
            }
            if outcome.leveled_up {
                info!(
                    user_id = %user_id,
                    gpu_level = user.gpu_level,
                    compute_power = user.compute_power,
                    "GPU level up"
                );
            }
            if outcome.boost_awarded {
                info!(user_id = %user_id, boost_count = user.boost_count, "Boost awarded");
            }
            debug!(user_id = %user_id, xp = user.xp, xp_gained = outcome.xp_gained, "Tap applied");

            let snapshot = user.snapshot();
            self.fanout.dispatch(FanoutJob::Referral {
                user_id: user_id.to_string(),
                xp_gained: outcome.xp_gained,
            });
            self.fanout.dispatch(FanoutJob::Leaderboard {
                snapshot: snapshot.clone(),
                at: now,
            });
            snapshot
        };

        Ok(snapshot)
    }

    pub async fn boost(&self, user_id: &str) -> Result<UserSnapshot> {
        self.boost_at(user_id, Utc::now()).await
    }

    /// Consume one boost at `now`
    pub async fn boost_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserSnapshot> {
        let _guard = self.locks.lock(user_id).await;
        let mut user = self.load_user(user_id).await?;

        let xp_gained = rules::run_boost(&mut user, &self.rules, now)?;
        self.store.save_user(&user).await?;

        info!(
            user_id = %user_id,
            xp_gained = xp_gained,
            boosts_left = user.boost_count,
            "Boost consumed"
        );

        Ok(user.snapshot())
    }

    pub async fn claim_daily_xp(&self, user_id: &str) -> Result<DailyClaim> {
        self.claim_daily_xp_at(user_id, Utc::now()).await
    }

    /// Credit the daily reward at `now`
    pub async fn claim_daily_xp_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<DailyClaim> {
        let _guard = self.locks.lock(user_id).await;
        let mut user = self.load_user(user_id).await?;

        let xp_gained = rules::run_daily_claim(&mut user, &self.rules, now)?;
        self.store.save_user(&user).await?;

        info!(user_id = %user_id, xp_gained = xp_gained, "Daily XP claimed");

        Ok(DailyClaim {
            xp_gained,
            new_total_xp: user.xp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::LeaderboardWindow;
    use crate::leaderboard::LeaderboardAggregator;
    use crate::referral::ReferralEngine;
    use crate::store::InMemoryStore;
    use bson::DateTime as BsonDateTime;
    use chrono::{Duration, FixedOffset, TimeZone};
    use tokio_test::{assert_err, assert_ok};

    struct Harness {
        store: Arc<InMemoryStore>,
        engine: ProgressionEngine,
        fanout: FanoutQueue,
        leaderboard: Arc<LeaderboardAggregator>,
    }

    fn harness() -> Harness {
        harness_with_capacity(64)
    }

    fn harness_with_capacity(capacity: usize) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let locks = Arc::new(UserLocks::new());
        let referrals = Arc::new(ReferralEngine::new(store.clone(), locks.clone()));
        let leaderboard = Arc::new(
            LeaderboardAggregator::new(store.clone())
                .with_fixed_offset(FixedOffset::east_opt(0).unwrap()),
        );
        let (fanout, _) = FanoutQueue::spawn(referrals, leaderboard.clone(), capacity);
        let engine = ProgressionEngine::new(
            store.clone(),
            GameRules::default(),
            locks,
            fanout.clone(),
        );
        Harness {
            store,
            engine,
            fanout,
            leaderboard,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    async fn seed(store: &InMemoryStore, user: UserDoc) {
        store.save_user(&user).await.unwrap();
    }

    fn user(id: &str) -> UserDoc {
        UserDoc::new(id.to_string(), None, format!("{id}-name"))
    }

    #[tokio::test]
    async fn test_tap_unknown_user_is_not_found() {
        let h = harness();
        let err = h.engine.tap_at("ghost", noon()).await.unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_n_taps_add_n_to_total() {
        let h = harness();
        let mut u = user("u1");
        u.total_taps = 37;
        seed(&h.store, u).await;

        for i in 0..25 {
            assert_ok!(h.engine.tap_at("u1", noon() + Duration::seconds(i)).await);
        }

        let stored = h.store.find_user_by_id("u1").await.unwrap().unwrap();
        assert_eq!(stored.total_taps, 62);
        assert_eq!(stored.xp, 25);
        assert_eq!(stored.compute, 25);
    }

    #[tokio::test]
    async fn test_tap_at_499_enters_cooldown_and_blocks_next_tap() {
        let h = harness();
        let mut u = user("u1");
        u.total_taps = 499;
        seed(&h.store, u).await;

        let snap = h.engine.tap_at("u1", noon()).await.unwrap();
        assert_eq!(snap.total_taps, 500);
        assert_eq!(snap.xp, 1);
        assert_eq!(snap.cooldown_end_time, Some(noon() + Duration::seconds(10)));

        let before = h.store.find_user_by_id("u1").await.unwrap().unwrap();
        let err = assert_err!(h.engine.tap_at("u1", noon() + Duration::seconds(3)).await);
        assert!(matches!(err, GameError::Cooldown { remaining_ms: 7000, .. }));
        let after = h.store.find_user_by_id("u1").await.unwrap().unwrap();
        assert_eq!(before, after);

        // Lazily expires
        assert_ok!(h.engine.tap_at("u1", noon() + Duration::seconds(10)).await);
    }

    #[tokio::test]
    async fn test_tap_levels_up_gpu() {
        let h = harness();
        let mut u = user("u1");
        u.xp = 24_999;
        seed(&h.store, u).await;

        let snap = h.engine.tap_at("u1", noon()).await.unwrap();
        assert_eq!(snap.xp, 25_000);
        assert_eq!(snap.gpu_level, 1);
        assert_eq!(snap.compute_power, 2);
    }

    #[tokio::test]
    async fn test_boost_clears_cooldown_and_consumes() {
        let h = harness();
        let mut u = user("u1");
        u.boost_count = 1;
        u.cooldown_end_time = Some(BsonDateTime::from_chrono(noon() + Duration::seconds(9)));
        seed(&h.store, u).await;

        let snap = h.engine.boost_at("u1", noon()).await.unwrap();
        assert_eq!(snap.cooldown_end_time, None);
        assert_eq!(snap.boost_count, 0);
        assert_eq!(snap.total_taps, 100);
        assert_eq!(snap.xp, 100);

        let err = h.engine.boost_at("u1", noon()).await.unwrap_err();
        assert!(matches!(err, GameError::NoBoostAvailable));
    }

    #[tokio::test]
    async fn test_boost_does_not_fan_out() {
        let h = harness();
        let mut u = user("u1");
        u.boost_count = 1;
        seed(&h.store, u).await;

        h.engine.boost_at("u1", noon()).await.unwrap();
        h.fanout.wait_idle().await;

        assert_eq!(h.store.leaderboard_len().await, 0);
    }

    #[tokio::test]
    async fn test_tap_fans_out_to_referrers() {
        let h = harness();
        seed(&h.store, user("grand")).await;
        let mut parent = user("parent");
        parent.referred_by = Some("grand".into());
        seed(&h.store, parent).await;
        let mut child = user("child");
        child.referred_by = Some("parent".into());
        child.compute_power = 1_000;
        seed(&h.store, child).await;

        h.engine.tap_at("child", noon()).await.unwrap();
        h.fanout.wait_idle().await;

        let parent = h.store.find_user_by_id("parent").await.unwrap().unwrap();
        let grand = h.store.find_user_by_id("grand").await.unwrap().unwrap();
        assert_eq!(parent.xp, 100);
        assert_eq!(grand.xp, 50);
    }

    #[tokio::test]
    async fn test_same_day_taps_share_one_daily_entry() {
        let h = harness();
        seed(&h.store, user("u1")).await;

        h.engine.tap_at("u1", noon()).await.unwrap();
        h.engine
            .tap_at("u1", noon() + Duration::hours(2))
            .await
            .unwrap();
        h.fanout.wait_idle().await;

        let daily = h
            .leaderboard
            .top(LeaderboardWindow::Daily, 10, noon())
            .await
            .unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].score, 2);
        assert_eq!(daily[0].username, "u1-name");

        let all_time = h
            .leaderboard
            .top(LeaderboardWindow::AllTime, 10, noon())
            .await
            .unwrap();
        assert_eq!(all_time[0].score, 1);
    }

    #[tokio::test]
    async fn test_tap_succeeds_when_fan_out_job_is_dropped() {
        let h = harness_with_capacity(1);
        let mut u = user("u1");
        u.referred_by = Some("gone".into());
        seed(&h.store, u).await;

        // Referral job takes the only slot; the leaderboard job is dropped
        let snap = assert_ok!(h.engine.tap_at("u1", noon()).await);
        assert_eq!(snap.total_taps, 1);

        h.fanout.wait_idle().await;
        assert_eq!(h.fanout.pending(), 0);
        assert_eq!(h.store.leaderboard_len().await, 0);

        let stored = h.store.find_user_by_id("u1").await.unwrap().unwrap();
        assert_eq!(stored.total_taps, 1);
        assert_eq!(stored.xp, 1);
    }

    #[tokio::test]
    async fn test_concurrent_taps_are_all_counted() {
        let h = Arc::new(harness());
        seed(&h.store, user("u1")).await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let h = Arc::clone(&h);
            handles.push(tokio::spawn(async move {
                h.engine.tap_at("u1", noon()).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = h.store.find_user_by_id("u1").await.unwrap().unwrap();
        assert_eq!(stored.total_taps, 20);
    }

    #[tokio::test]
    async fn test_daily_claim_once_per_interval() {
        let h = harness();
        let mut u = user("u1");
        u.xp = 10;
        seed(&h.store, u).await;

        let claim = h.engine.claim_daily_xp_at("u1", noon()).await.unwrap();
        assert_eq!(
            claim,
            DailyClaim {
                xp_gained: 1_000,
                new_total_xp: 1_010
            }
        );

        let err = h
            .engine
            .claim_daily_xp_at("u1", noon() + Duration::hours(1))
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::TooSoon { .. }));
    }
}
