//! Referral edge schema
//!
//! One document per `(referrer, referred)` pair, created at sign-up and
//! afterwards only touched by incrementing its reward counter.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for referral edges
pub const REFERRAL_COLLECTION: &str = "referrals";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ReferralDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub referrer_id: String,

    pub referred_id: String,

    /// Cumulative XP credited to the referrer through this edge
    #[serde(default)]
    pub total_rewards_distributed: i64,
}

impl ReferralDoc {
    pub fn new(referrer_id: String, referred_id: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            referrer_id,
            referred_id,
            total_rewards_distributed: 0,
        }
    }
}

impl IntoIndexes for ReferralDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "referrer_id": 1, "referred_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("referral_edge_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for ReferralDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
