//! Quest completion verification and claiming

pub mod service;
pub mod verifier;

pub use service::{ClaimOutcome, QuestService};
pub use verifier::QuestVerifier;
