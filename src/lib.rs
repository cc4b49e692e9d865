//! Tapforge - tap-to-earn progression engine
//!
//! Users tap to earn XP and compute, hit cooldowns, level up their GPU and
//! earn boosts. Referrers receive a share of every tap three tiers deep,
//! quests pay out once verified, and daily, weekly and all-time leaderboards
//! are refreshed in the background after each tap.

pub mod accounts;
pub mod config;
pub mod db;
pub mod fanout;
pub mod leaderboard;
pub mod membership;
pub mod progression;
pub mod quests;
pub mod referral;
pub mod state;
pub mod store;
pub mod types;

pub use config::Args;
pub use state::AppState;
pub use types::{GameError, Result};
