//! Error types for tapforge
//!
//! Every core operation returns a structured `GameError` so the boundary
//! layer can map failures to responses without inspecting messages.

use chrono::{DateTime, Utc};

/// Main error type for progression, quest and persistence operations
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Tap on cooldown until {until} ({remaining_ms} ms remaining)")]
    Cooldown {
        until: DateTime<Utc>,
        remaining_ms: i64,
    },

    #[error("No boost available")]
    NoBoostAvailable,

    #[error("Quest already claimed: {0}")]
    AlreadyClaimed(String),

    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Unknown quest type: {0}")]
    UnknownQuestType(String),

    #[error("Membership verification failed: {0}")]
    VerificationFailure(String),

    #[error("Daily reward already claimed, next claim at {next_claim_at}")]
    TooSoon { next_claim_at: DateTime<Utc> },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GameError {
    /// HTTP status code the boundary layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Cooldown { .. } => 429,
            Self::NoBoostAvailable => 400,
            Self::AlreadyClaimed(_) => 409,
            Self::MissingData(_) => 400,
            Self::UnknownQuestType(_) => 400,
            Self::VerificationFailure(_) => 502,
            Self::TooSoon { .. } => 429,
            Self::Database(_) => 503,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Cooldown { .. } => "cooldown",
            Self::NoBoostAvailable => "no_boost_available",
            Self::AlreadyClaimed(_) => "already_claimed",
            Self::MissingData(_) => "missing_data",
            Self::UnknownQuestType(_) => "unknown_quest_type",
            Self::VerificationFailure(_) => "verification_failure",
            Self::TooSoon { .. } => "too_soon",
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }

    /// Convert to status code and body tuple for an HTTP response
    pub fn into_status_code_and_body(self) -> (u16, serde_json::Value) {
        let status = self.status_code();
        let mut body = serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        });

        match &self {
            Self::Cooldown {
                until,
                remaining_ms,
            } => {
                body["cooldownEndTime"] = serde_json::json!(until);
                body["remainingMs"] = serde_json::json!(remaining_ms);
            }
            Self::TooSoon { next_claim_at } => {
                body["nextClaimAt"] = serde_json::json!(next_claim_at);
            }
            _ => {}
        }

        (status, body)
    }
}

impl From<mongodb::error::Error> for GameError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for GameError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Database(format!("BSON serialization error: {}", err))
    }
}

impl From<reqwest::Error> for GameError {
    fn from(err: reqwest::Error) -> Self {
        Self::VerificationFailure(err.to_string())
    }
}

/// Result type alias for tapforge operations
pub type Result<T> = std::result::Result<T, GameError>;
