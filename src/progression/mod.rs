//! Tap/boost state machine
//!
//! `rules` holds the pure transitions over a `UserDoc`; `engine` loads,
//! runs, persists and fans out; `locks` serializes work per user.

pub mod engine;
pub mod locks;
pub mod rules;

pub use engine::{DailyClaim, ProgressionEngine};
pub use locks::{spawn_lock_prune_task, UserLocks};
pub use rules::{CooldownState, TapOutcome};
