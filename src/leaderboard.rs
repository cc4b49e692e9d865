//! Leaderboard aggregator
//!
//! Maintains one entry per `(window, period_start, user)` and refreshes all
//! three windows on every tap. Daily and weekly windows rank by cumulative
//! `compute`; the all-time window ranks by `compute_power`.

use bson::DateTime as BsonDateTime;
use chrono::{DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::schemas::{LeaderboardWindow, UserSnapshot};
use crate::store::GameStore;
use crate::types::Result;

/// Period start shared by every all-time entry (the Unix epoch)
pub fn all_time_period_start() -> DateTime<Utc> {
    DateTime::<Utc>::from(std::time::UNIX_EPOCH)
}

/// Start of the period containing `now`, with day boundaries taken in `tz`
///
/// Weeks start on Sunday.
pub fn period_start<Tz: TimeZone>(
    window: LeaderboardWindow,
    now: DateTime<Utc>,
    tz: &Tz,
) -> DateTime<Utc> {
    let today = now.with_timezone(tz).date_naive();
    match window {
        LeaderboardWindow::Daily => midnight(today, tz).unwrap_or(now),
        LeaderboardWindow::Weekly => {
            let back = i64::from(today.weekday().num_days_from_sunday());
            midnight(today - Duration::days(back), tz).unwrap_or(now)
        }
        LeaderboardWindow::AllTime => all_time_period_start(),
    }
}

fn midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    // Midnight skipped by a DST jump; the day starts once the clock resumes
    let local = tz
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())?;
    Some(local.with_timezone(&Utc))
}

/// Score a window ranks by
pub fn score_for(window: LeaderboardWindow, snapshot: &UserSnapshot) -> i64 {
    match window {
        LeaderboardWindow::Daily | LeaderboardWindow::Weekly => snapshot.compute,
        LeaderboardWindow::AllTime => snapshot.compute_power,
    }
}

/// Leaderboard row with its 1-based rank
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub rank: usize,
    pub user_id: String,
    pub username: String,
    pub score: i64,
}

pub struct LeaderboardAggregator {
    store: Arc<dyn GameStore>,
    /// Fixed zone for period boundaries; `None` uses the host's local time
    offset: Option<FixedOffset>,
}

impl LeaderboardAggregator {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self {
            store,
            offset: None,
        }
    }

    /// Compute period boundaries in a fixed zone instead of local time
    pub fn with_fixed_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn current_period(&self, window: LeaderboardWindow, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.offset {
            Some(offset) => period_start(window, now, &offset),
            None => period_start(window, now, &Local),
        }
    }

    /// Upsert one entry
    pub async fn update_entry(
        &self,
        window: LeaderboardWindow,
        period_start: DateTime<Utc>,
        user_id: &str,
        username: &str,
        score: i64,
    ) -> Result<()> {
        self.store
            .upsert_leaderboard_entry(
                window,
                BsonDateTime::from_chrono(period_start),
                user_id,
                username,
                score,
            )
            .await
    }

    /// Refresh all three windows for a tap made at `at`
    ///
    /// Every window is attempted; the first failure is returned.
    pub async fn record_tap(&self, snapshot: &UserSnapshot, at: DateTime<Utc>) -> Result<()> {
        let mut first_error = None;

        for window in LeaderboardWindow::ALL {
            let period = self.current_period(window, at);
            let score = score_for(window, snapshot);

            if let Err(e) = self
                .update_entry(window, period, &snapshot.user_id, &snapshot.username, score)
                .await
            {
                warn!(
                    user_id = %snapshot.user_id,
                    window = %window,
                    error = %e,
                    "Leaderboard update failed"
                );
                first_error.get_or_insert(e);
            }
        }

        debug!(user_id = %snapshot.user_id, "Leaderboard windows refreshed");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Top entries of the period containing `now`
    pub async fn top(
        &self,
        window: LeaderboardWindow,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<RankedEntry>> {
        let period = self.current_period(window, now);
        let entries = self
            .store
            .top_leaderboard(window, BsonDateTime::from_chrono(period), limit)
            .await?;

        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| RankedEntry {
                rank: i + 1,
                user_id: e.user_id,
                username: e.username,
                score: e.score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 30, 0).unwrap()
    }

    fn snapshot(user_id: &str, compute: i64, compute_power: i64) -> UserSnapshot {
        UserSnapshot {
            user_id: user_id.to_string(),
            username: format!("{user_id}-name"),
            xp: compute,
            compute,
            total_taps: compute,
            compute_power,
            gpu_level: compute_power - 1,
            cooldown_end_time: None,
            boost_count: 0,
        }
    }

    #[test]
    fn test_daily_period_is_midnight() {
        // Wednesday 2024-05-01
        let start = period_start(LeaderboardWindow::Daily, at(2024, 5, 1, 15), &Utc);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_weekly_period_starts_sunday() {
        let start = period_start(LeaderboardWindow::Weekly, at(2024, 5, 1, 15), &Utc);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 4, 28, 0, 0, 0).unwrap());

        // A Sunday is its own week start
        let sunday = period_start(LeaderboardWindow::Weekly, at(2024, 4, 28, 1), &Utc);
        assert_eq!(sunday, Utc.with_ymd_and_hms(2024, 4, 28, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_period_respects_zone() {
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        // 22:30 UTC on May 1 is already May 2 at +03:00
        let start = period_start(LeaderboardWindow::Daily, at(2024, 5, 1, 22), &tz);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 1, 21, 0, 0).unwrap());
    }

    /// Zone at UTC-5 that springs forward to UTC-4 at local midnight of 2024-03-10
    #[derive(Debug, Clone, Copy)]
    struct MidnightGap;

    impl MidnightGap {
        fn switch_local() -> chrono::NaiveDateTime {
            NaiveDate::from_ymd_opt(2024, 3, 10)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        }

        fn before() -> FixedOffset {
            FixedOffset::west_opt(5 * 3600).unwrap()
        }

        fn after() -> FixedOffset {
            FixedOffset::west_opt(4 * 3600).unwrap()
        }
    }

    impl TimeZone for MidnightGap {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            MidnightGap
        }

        fn offset_from_local_date(&self, _: &NaiveDate) -> chrono::LocalResult<FixedOffset> {
            chrono::LocalResult::Single(Self::before())
        }

        fn offset_from_local_datetime(
            &self,
            local: &chrono::NaiveDateTime,
        ) -> chrono::LocalResult<FixedOffset> {
            let switch = Self::switch_local();
            if *local < switch {
                chrono::LocalResult::Single(Self::before())
            } else if *local < switch + Duration::hours(1) {
                chrono::LocalResult::None
            } else {
                chrono::LocalResult::Single(Self::after())
            }
        }

        fn offset_from_utc_date(&self, _: &NaiveDate) -> FixedOffset {
            Self::before()
        }

        fn offset_from_utc_datetime(&self, utc: &chrono::NaiveDateTime) -> FixedOffset {
            if *utc < Self::switch_local() + Duration::hours(5) {
                Self::before()
            } else {
                Self::after()
            }
        }
    }

    #[test]
    fn test_skipped_midnight_starts_day_when_clock_resumes() {
        // 08:00 local on the day whose midnight does not exist
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();

        let start = period_start(LeaderboardWindow::Daily, now, &MidnightGap);

        // 01:00 at UTC-4
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 10, 5, 0, 0).unwrap());

        // 2024-03-10 is a Sunday, so the week starts at the same instant
        let week = period_start(LeaderboardWindow::Weekly, now, &MidnightGap);
        assert_eq!(week, start);
    }

    #[test]
    fn test_all_time_is_fixed_sentinel() {
        let a = period_start(LeaderboardWindow::AllTime, at(2020, 1, 1, 0), &Utc);
        let b = period_start(LeaderboardWindow::AllTime, at(2030, 6, 1, 0), &Utc);
        assert_eq!(a, b);
        assert_eq!(a.timestamp(), 0);
    }

    #[test]
    fn test_all_time_scores_compute_power() {
        let snap = snapshot("u1", 900, 4);
        assert_eq!(score_for(LeaderboardWindow::Daily, &snap), 900);
        assert_eq!(score_for(LeaderboardWindow::Weekly, &snap), 900);
        assert_eq!(score_for(LeaderboardWindow::AllTime, &snap), 4);
    }

    #[tokio::test]
    async fn test_record_tap_writes_three_windows() {
        let store = Arc::new(InMemoryStore::new());
        let aggregator = LeaderboardAggregator::new(store.clone())
            .with_fixed_offset(FixedOffset::east_opt(0).unwrap());

        aggregator
            .record_tap(&snapshot("u1", 10, 1), at(2024, 5, 1, 9))
            .await
            .unwrap();

        assert_eq!(store.leaderboard_len().await, 3);
    }

    #[tokio::test]
    async fn test_top_ranks_by_score() {
        let store = Arc::new(InMemoryStore::new());
        let aggregator = LeaderboardAggregator::new(store.clone())
            .with_fixed_offset(FixedOffset::east_opt(0).unwrap());
        let now = at(2024, 5, 1, 9);

        aggregator.record_tap(&snapshot("low", 5, 1), now).await.unwrap();
        aggregator.record_tap(&snapshot("high", 50, 3), now).await.unwrap();
        aggregator.record_tap(&snapshot("mid", 20, 2), now).await.unwrap();

        let top = aggregator
            .top(LeaderboardWindow::Daily, 2, now)
            .await
            .unwrap();

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].rank, 1);
        assert_eq!(top[0].user_id, "high");
        assert_eq!(top[1].user_id, "mid");
        assert_eq!(top[1].score, 20);
    }

    #[tokio::test]
    async fn test_new_day_starts_new_entry() {
        let store = Arc::new(InMemoryStore::new());
        let aggregator = LeaderboardAggregator::new(store.clone())
            .with_fixed_offset(FixedOffset::east_opt(0).unwrap());

        aggregator
            .record_tap(&snapshot("u1", 10, 1), at(2024, 5, 1, 9))
            .await
            .unwrap();
        aggregator
            .record_tap(&snapshot("u1", 11, 1), at(2024, 5, 2, 9))
            .await
            .unwrap();

        // New daily entry; weekly and all-time entries are reused
        assert_eq!(store.leaderboard_len().await, 4);
    }
}
