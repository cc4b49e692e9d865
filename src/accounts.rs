//! User registration from a trusted Telegram identity

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::schemas::UserDoc;
use crate::progression::UserLocks;
use crate::store::GameStore;
use crate::types::Result;

/// Identity supplied by the auth provider, already verified upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramIdentity {
    pub telegram_id: i64,
    pub username: String,
}

pub struct AccountService {
    store: Arc<dyn GameStore>,
    locks: Arc<UserLocks>,
}

/// Lock key for a Telegram identity; cannot collide with UUID user ids
fn identity_lock_key(telegram_id: i64) -> String {
    format!("telegram:{}", telegram_id)
}

impl AccountService {
    pub fn new(store: Arc<dyn GameStore>, locks: Arc<UserLocks>) -> Self {
        Self { store, locks }
    }

    /// Find the user for `identity`, creating it on first sight
    ///
    /// A referrer is only linked when the user is created; later calls never
    /// change `referred_by`.
    pub async fn register(
        &self,
        identity: &TelegramIdentity,
        referrer_id: Option<&str>,
    ) -> Result<UserDoc> {
        let _guard = self
            .locks
            .lock(&identity_lock_key(identity.telegram_id))
            .await;

        if let Some(mut existing) = self
            .store
            .find_user_by_telegram_id(identity.telegram_id)
            .await?
        {
            if existing.username != identity.username {
                existing.username = identity.username.clone();
                self.store.save_user(&existing).await?;
            }
            return Ok(existing);
        }

        let mut user = UserDoc::new(
            Uuid::new_v4().to_string(),
            Some(identity.telegram_id),
            identity.username.clone(),
        );

        let referrer = match referrer_id {
            Some(id) => {
                let found = self.store.find_user_by_id(id).await?;
                if found.is_none() {
                    warn!(referrer_id = %id, "Unknown referrer ignored at registration");
                }
                found
            }
            None => None,
        };

        if let Some(referrer) = &referrer {
            user.referred_by = Some(referrer.user_id.clone());
        }

        self.store.save_user(&user).await?;

        if let Some(referrer) = referrer {
            self.store
                .create_referral(&referrer.user_id, &user.user_id)
                .await?;
        }

        info!(
            user_id = %user.user_id,
            telegram_id = identity.telegram_id,
            referred_by = ?user.referred_by,
            "Registered new user"
        );

        Ok(user)
    }
}
