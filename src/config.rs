//! Configuration for tapforge
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, Subcommand};

/// Tapforge - tap-to-earn progression engine
#[derive(Parser, Debug, Clone)]
#[command(name = "tapforge")]
#[command(about = "Operator CLI for the tap-to-earn progression engine")]
pub struct Args {
    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "tapforge")]
    pub mongodb_db: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Enable development mode (membership checks always pass)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Telegram bot token used for channel membership checks
    #[arg(long, env = "TELEGRAM_BOT_TOKEN")]
    pub telegram_bot_token: Option<String>,

    /// Telegram Bot API base URL
    #[arg(long, env = "TELEGRAM_API_URL", default_value = "https://api.telegram.org")]
    pub telegram_api_url: String,

    /// Request timeout in milliseconds for outbound calls
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "10000")]
    pub request_timeout_ms: u64,

    /// Maximum queued referral/leaderboard jobs before new ones are dropped
    #[arg(long, env = "FANOUT_QUEUE_SIZE", default_value = "1024")]
    pub fanout_queue_size: usize,

    /// Progression tunables
    #[command(flatten)]
    pub rules: GameRules,

    #[command(subcommand)]
    pub command: Command,
}

/// Tunable constants of the tap/boost state machine
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct GameRules {
    /// Cooldown length after every `taps_per_cooldown` taps
    #[arg(long, env = "COOLDOWN_SECS", default_value = "10")]
    pub cooldown_secs: i64,

    /// Tap count multiple that triggers a cooldown
    #[arg(long, env = "TAPS_PER_COOLDOWN", default_value = "500")]
    pub taps_per_cooldown: i64,

    /// XP needed per GPU level
    #[arg(long, env = "GPU_LEVEL_XP_STEP", default_value = "25000")]
    pub gpu_level_xp_step: i64,

    /// XP multiple that awards a boost
    #[arg(long, env = "BOOST_REWARD_XP_STEP", default_value = "2000")]
    pub boost_reward_xp_step: i64,

    /// Simulated taps per second during a boost
    #[arg(long, env = "BOOST_TAPS_PER_SECOND", default_value = "10")]
    pub boost_taps_per_second: i64,

    /// Simulated boost duration
    #[arg(long, env = "BOOST_DURATION_SECS", default_value = "10")]
    pub boost_duration_secs: i64,

    /// XP granted by the daily claim
    #[arg(long, env = "DAILY_XP_REWARD", default_value = "1000")]
    pub daily_xp_reward: i64,

    /// Minimum hours between daily claims
    #[arg(long, env = "DAILY_CLAIM_INTERVAL_HOURS", default_value = "24")]
    pub daily_claim_interval_hours: i64,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            cooldown_secs: 10,
            taps_per_cooldown: 500,
            gpu_level_xp_step: 25_000,
            boost_reward_xp_step: 2_000,
            boost_taps_per_second: 10,
            boost_duration_secs: 10,
            daily_xp_reward: 1_000,
            daily_claim_interval_hours: 24,
        }
    }
}

impl GameRules {
    /// Number of taps a single boost is worth
    pub fn boost_taps(&self) -> i64 {
        self.boost_taps_per_second * self.boost_duration_secs
    }

    /// Validate the tunables
    pub fn validate(&self) -> Result<(), String> {
        if self.taps_per_cooldown <= 0 {
            return Err("TAPS_PER_COOLDOWN must be positive".to_string());
        }
        if self.gpu_level_xp_step <= 0 {
            return Err("GPU_LEVEL_XP_STEP must be positive".to_string());
        }
        if self.boost_reward_xp_step <= 0 {
            return Err("BOOST_REWARD_XP_STEP must be positive".to_string());
        }
        if self.cooldown_secs < 0 || self.boost_taps() < 0 || self.daily_xp_reward < 0 {
            return Err("durations and rewards must not be negative".to_string());
        }
        Ok(())
    }
}

/// Operations exposed by the operator CLI
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Find or create a user for a Telegram identity
    Register {
        /// Telegram user id
        #[arg(long)]
        telegram_id: i64,
        /// Display name used on leaderboards
        #[arg(long)]
        username: String,
        /// User id of the referrer, if any
        #[arg(long)]
        referrer: Option<String>,
    },
    /// Tap once
    Tap {
        #[arg(long)]
        user_id: String,
    },
    /// Consume a boost
    Boost {
        #[arg(long)]
        user_id: String,
    },
    /// Claim a quest reward
    ClaimQuest {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        quest_id: String,
    },
    /// Claim the daily XP reward
    ClaimDaily {
        #[arg(long)]
        user_id: String,
    },
    /// List quests still available to a user
    Quests {
        #[arg(long)]
        user_id: String,
    },
    /// Show the current leaderboard for a window (daily, weekly, all_time)
    Leaderboard {
        #[arg(long, default_value = "daily")]
        window: String,
        /// Number of entries to show (at least 1)
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.telegram_bot_token.is_none() {
            return Err("TELEGRAM_BOT_TOKEN is required in production mode".to_string());
        }

        if self.fanout_queue_size == 0 {
            return Err("FANOUT_QUEUE_SIZE must be greater than zero".to_string());
        }

        if let Command::Leaderboard { limit: 0, .. } = self.command {
            return Err("--limit must be at least 1".to_string());
        }

        self.rules.validate()
    }
}
