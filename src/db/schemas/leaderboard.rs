//! Leaderboard entry schema

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for leaderboard entries
pub const LEADERBOARD_COLLECTION: &str = "leaderboards";

/// Scoring period tracked independently on the leaderboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardWindow {
    #[default]
    Daily,
    Weekly,
    AllTime,
}

impl LeaderboardWindow {
    pub const ALL: [LeaderboardWindow; 3] = [Self::Daily, Self::Weekly, Self::AllTime];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::AllTime => "all_time",
        }
    }
}

impl FromStr for LeaderboardWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "all_time" | "alltime" | "all-time" => Ok(Self::AllTime),
            other => Err(format!("unknown leaderboard window: {}", other)),
        }
    }
}

impl std::fmt::Display for LeaderboardWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user's standing within a window period
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LeaderboardDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub window: LeaderboardWindow,

    pub period_start: DateTime,

    pub user_id: String,

    /// Overwritten on every update
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub score: i64,
}

impl IntoIndexes for LeaderboardDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "window": 1, "period_start": 1, "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("leaderboard_entry_unique".to_string())
                        .build(),
                ),
            ),
            // Ranking reads
            (
                doc! { "window": 1, "period_start": 1, "score": -1 },
                Some(
                    IndexOptions::builder()
                        .name("leaderboard_rank_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for LeaderboardDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_parsing() {
        assert_eq!("daily".parse::<LeaderboardWindow>(), Ok(LeaderboardWindow::Daily));
        assert_eq!("all-time".parse::<LeaderboardWindow>(), Ok(LeaderboardWindow::AllTime));
        assert!("monthly".parse::<LeaderboardWindow>().is_err());
    }

    #[test]
    fn test_window_serializes_snake_case() {
        let json = serde_json::to_string(&LeaderboardWindow::AllTime).unwrap();
        assert_eq!(json, "\"all_time\"");
    }
}
