//! Pure state transitions of the tap/boost pipeline
//!
//! Each step mutates a `UserDoc` in place and reports whether it fired.
//! `run_tap` composes them in the fixed order:
//!
//! ```text
//! check_cooldown -> apply_tap -> apply_cooldown_trigger
//!                -> apply_gpu_level_up -> apply_boost_reward
//! ```

use bson::DateTime as BsonDateTime;
use chrono::{DateTime, Duration, Utc};

use crate::config::GameRules;
use crate::db::schemas::UserDoc;
use crate::types::{GameError, Result};

/// Cooldown state, evaluated lazily from `cooldown_end_time`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    Active,
    Cooling { until: DateTime<Utc> },
}

/// Side effects fired by a single tap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TapOutcome {
    pub xp_gained: i64,
    pub entered_cooldown: bool,
    pub leveled_up: bool,
    pub boost_awarded: bool,
}

pub fn cooldown_state(user: &UserDoc, now: DateTime<Utc>) -> CooldownState {
    match user.cooldown_end() {
        Some(until) if now < until => CooldownState::Cooling { until },
        _ => CooldownState::Active,
    }
}

/// Reject the tap while cooling down
pub fn check_cooldown(user: &UserDoc, now: DateTime<Utc>) -> Result<()> {
    match cooldown_state(user, now) {
        CooldownState::Active => Ok(()),
        CooldownState::Cooling { until } => Err(GameError::Cooldown {
            until,
            remaining_ms: (until - now).num_milliseconds(),
        }),
    }
}

/// Count the tap and credit `compute_power` XP; returns the XP gained
pub fn apply_tap(user: &mut UserDoc, now: DateTime<Utc>) -> i64 {
    let xp_gained = user.compute_power;
    user.total_taps += 1;
    user.xp += xp_gained;
    user.compute += xp_gained;
    user.last_tap_time = Some(BsonDateTime::from_chrono(now));
    xp_gained
}

/// Enter cooldown when the tap count lands on a multiple of `taps_per_cooldown`
pub fn apply_cooldown_trigger(user: &mut UserDoc, rules: &GameRules, now: DateTime<Utc>) -> bool {
    if user.total_taps > 0 && user.total_taps % rules.taps_per_cooldown == 0 {
        let until = now + Duration::seconds(rules.cooldown_secs);
        user.cooldown_end_time = Some(BsonDateTime::from_chrono(until));
        true
    } else {
        false
    }
}

/// Raise GPU level and compute power by one; checked once per tap
pub fn apply_gpu_level_up(user: &mut UserDoc, rules: &GameRules) -> bool {
    if user.xp >= (user.gpu_level + 1) * rules.gpu_level_xp_step {
        user.gpu_level += 1;
        user.compute_power += 1;
        true
    } else {
        false
    }
}

/// Award a boost when XP lands exactly on a multiple of `boost_reward_xp_step`
///
/// Crossing the boundary without landing on it awards nothing.
pub fn apply_boost_reward(user: &mut UserDoc, rules: &GameRules) -> bool {
    if user.xp % rules.boost_reward_xp_step == 0 {
        user.boost_count += 1;
        true
    } else {
        false
    }
}

/// Full tap pipeline; on error the user is left untouched
pub fn run_tap(user: &mut UserDoc, rules: &GameRules, now: DateTime<Utc>) -> Result<TapOutcome> {
    check_cooldown(user, now)?;

    let xp_gained = apply_tap(user, now);
    let entered_cooldown = apply_cooldown_trigger(user, rules, now);
    let leveled_up = apply_gpu_level_up(user, rules);
    let boost_awarded = apply_boost_reward(user, rules);

    Ok(TapOutcome {
        xp_gained,
        entered_cooldown,
        leveled_up,
        boost_awarded,
    })
}

/// Consume a boost: a burst of simulated taps that also clears any cooldown
///
/// Unlike `run_tap`, no level-up or boost reward is evaluated.
/// Returns the XP gained.
pub fn run_boost(user: &mut UserDoc, rules: &GameRules, now: DateTime<Utc>) -> Result<i64> {
    if user.boost_count < 1 {
        return Err(GameError::NoBoostAvailable);
    }

    let taps = rules.boost_taps();
    let xp_gained = taps * user.compute_power;

    user.boost_count -= 1;
    user.total_taps += taps;
    user.xp += xp_gained;
    user.compute += xp_gained;
    user.cooldown_end_time = None;
    user.last_boost_time = Some(BsonDateTime::from_chrono(now));

    Ok(xp_gained)
}

/// Credit the daily reward if the claim interval has elapsed
pub fn run_daily_claim(user: &mut UserDoc, rules: &GameRules, now: DateTime<Utc>) -> Result<i64> {
    if let Some(last) = user.last_daily_claim {
        let next_claim_at = last.to_chrono() + Duration::hours(rules.daily_claim_interval_hours);
        if now < next_claim_at {
            return Err(GameError::TooSoon { next_claim_at });
        }
    }

    user.xp += rules.daily_xp_reward;
    user.last_daily_claim = Some(BsonDateTime::from_chrono(now));

    Ok(rules.daily_xp_reward)
}
