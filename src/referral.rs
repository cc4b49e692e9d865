//! Referral propagation engine
//!
//! Credits a decaying share of a user's XP gain to up to three ancestors in
//! the `referred_by` chain. The walk is iterative, bounded, and stops on a
//! cycle instead of looping over malformed data.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::progression::UserLocks;
use crate::store::GameStore;
use crate::types::{GameError, Result};

/// Share per tier in basis points: 10%, 5%, 2.5%
pub const TIER_BASIS_POINTS: [i64; 3] = [1_000, 500, 250];

const BASIS_POINT_SCALE: i64 = 10_000;

/// Reward owed to a tier for `xp_gained`, rounded down
pub fn tier_reward(xp_gained: i64, basis_points: i64) -> i64 {
    xp_gained * basis_points / BASIS_POINT_SCALE
}

/// One ancestor credited during a walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralCredit {
    /// 1 = direct referrer
    pub tier: usize,
    pub referrer_id: String,
    pub reward: i64,
}

pub struct ReferralEngine {
    store: Arc<dyn GameStore>,
    locks: Arc<UserLocks>,
}

impl ReferralEngine {
    pub fn new(store: Arc<dyn GameStore>, locks: Arc<UserLocks>) -> Self {
        Self { store, locks }
    }

    /// Walk the referral chain above `user_id`, crediting each tier
    ///
    /// An error aborts the rest of the walk; credits already applied stay.
    pub async fn distribute(&self, user_id: &str, xp_gained: i64) -> Result<Vec<ReferralCredit>> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("user {}", user_id)))?;

        let mut credits = Vec::new();
        let mut visited: HashSet<String> = HashSet::from([user.user_id.clone()]);
        let mut child_id = user.user_id;
        let mut next_ancestor = user.referred_by;

        for (index, basis_points) in TIER_BASIS_POINTS.iter().enumerate() {
            let tier = index + 1;
            let Some(ancestor_id) = next_ancestor.take() else {
                break;
            };

            if !visited.insert(ancestor_id.clone()) {
                warn!(
                    user_id = %user_id,
                    ancestor_id = %ancestor_id,
                    tier = tier,
                    "Referral cycle detected, stopping propagation"
                );
                break;
            }

            let reward = tier_reward(xp_gained, *basis_points);

            let ancestor = {
                let _guard = self.locks.lock(&ancestor_id).await;
                let Some(mut ancestor) = self.store.find_user_by_id(&ancestor_id).await? else {
                    warn!(
                        user_id = %user_id,
                        ancestor_id = %ancestor_id,
                        "Referrer missing, stopping propagation"
                    );
                    break;
                };

                if reward > 0 {
                    ancestor.xp += reward;
                    self.store.save_user(&ancestor).await?;
                }
                ancestor
            };

            if reward > 0 {
                self.store
                    .upsert_referral_counter(&ancestor.user_id, &child_id, reward)
                    .await?;

                debug!(
                    tier = tier,
                    referrer_id = %ancestor.user_id,
                    reward = reward,
                    "Credited referral XP"
                );
                credits.push(ReferralCredit {
                    tier,
                    referrer_id: ancestor.user_id.clone(),
                    reward,
                });
            }

            child_id = ancestor.user_id;
            next_ancestor = ancestor.referred_by;
        }

        Ok(credits)
    }
}
