//! Application state wiring the core services together

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::accounts::AccountService;
use crate::config::{Args, GameRules};
use crate::db::MongoClient;
use crate::fanout::FanoutQueue;
use crate::leaderboard::LeaderboardAggregator;
use crate::membership::{DevMembershipChecker, MembershipChecker, TelegramMembershipChecker};
use crate::progression::{ProgressionEngine, UserLocks};
use crate::quests::{QuestService, QuestVerifier};
use crate::referral::ReferralEngine;
use crate::store::{GameStore, MongoGameStore};
use crate::types::{GameError, Result};

/// Shared services handed to whatever transport drives the core
pub struct AppState {
    pub store: Arc<dyn GameStore>,
    pub locks: Arc<UserLocks>,
    pub accounts: AccountService,
    pub progression: ProgressionEngine,
    pub quests: QuestService,
    pub leaderboard: Arc<LeaderboardAggregator>,
    pub fanout: FanoutQueue,
}

impl AppState {
    /// Build the services over an existing store; must run inside a tokio runtime
    pub fn new(
        store: Arc<dyn GameStore>,
        membership: Arc<dyn MembershipChecker>,
        rules: GameRules,
        fanout_capacity: usize,
    ) -> Self {
        let locks = Arc::new(UserLocks::new());
        let referrals = Arc::new(ReferralEngine::new(Arc::clone(&store), Arc::clone(&locks)));
        let leaderboard = Arc::new(LeaderboardAggregator::new(Arc::clone(&store)));
        let (fanout, _worker) =
            FanoutQueue::spawn(referrals, Arc::clone(&leaderboard), fanout_capacity);

        Self {
            accounts: AccountService::new(Arc::clone(&store), Arc::clone(&locks)),
            progression: ProgressionEngine::new(
                Arc::clone(&store),
                rules,
                Arc::clone(&locks),
                fanout.clone(),
            ),
            quests: QuestService::new(
                Arc::clone(&store),
                QuestVerifier::new(membership),
                Arc::clone(&locks),
            ),
            store,
            locks,
            leaderboard,
            fanout,
        }
    }

    /// Connect to MongoDB and pick the membership checker from configuration
    pub async fn from_args(args: &Args) -> Result<Self> {
        let mongo = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;
        let store: Arc<dyn GameStore> = Arc::new(MongoGameStore::new(&mongo).await?);

        let membership: Arc<dyn MembershipChecker> = match &args.telegram_bot_token {
            Some(token) => Arc::new(TelegramMembershipChecker::new(
                &args.telegram_api_url,
                token,
                Duration::from_millis(args.request_timeout_ms),
            )?),
            None if args.dev_mode => {
                warn!("No TELEGRAM_BOT_TOKEN set, membership checks always pass (dev mode)");
                Arc::new(DevMembershipChecker)
            }
            None => {
                return Err(GameError::Config(
                    "TELEGRAM_BOT_TOKEN is required in production mode".to_string(),
                ))
            }
        };

        info!("Services initialized");
        Ok(Self::new(
            store,
            membership,
            args.rules.clone(),
            args.fanout_queue_size,
        ))
    }

    /// Let queued referral and leaderboard jobs finish
    pub async fn drain(&self, timeout: Duration) {
        if tokio::time::timeout(timeout, self.fanout.wait_idle())
            .await
            .is_err()
        {
            warn!(
                pending = self.fanout.pending(),
                "Fan-out queue not drained before timeout"
            );
        }
    }
}
