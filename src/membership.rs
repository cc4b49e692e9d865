//! External membership verification for telegram quests
//!
//! `TelegramMembershipChecker` asks the Bot API whether a user belongs to a
//! chat. `DevMembershipChecker` accepts everyone and is only wired in dev mode.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{GameError, Result};

/// Actions a telegram quest may ask for; all are verified through chat membership
pub const SUPPORTED_ACTIONS: [&str; 3] = ["join_channel", "join_group", "join_chat"];

#[async_trait::async_trait]
pub trait MembershipChecker: Send + Sync {
    /// Whether `telegram_id` has completed `action` on `target_id`
    async fn check_membership(
        &self,
        action: &str,
        target_id: &str,
        telegram_id: i64,
    ) -> Result<bool>;
}

/// Bot API `getChatMember` response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<ChatMember>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMember {
    status: String,
    #[serde(default)]
    is_member: Option<bool>,
}

impl ChatMember {
    fn is_member(&self) -> bool {
        match self.status.as_str() {
            "creator" | "administrator" | "member" => true,
            "restricted" => self.is_member.unwrap_or(false),
            _ => false,
        }
    }
}

pub struct TelegramMembershipChecker {
    client: reqwest::Client,
    api_url: String,
    bot_token: String,
}

impl TelegramMembershipChecker {
    pub fn new(api_url: &str, bot_token: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GameError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/getChatMember", self.api_url, self.bot_token)
    }
}

#[async_trait::async_trait]
impl MembershipChecker for TelegramMembershipChecker {
    async fn check_membership(
        &self,
        action: &str,
        target_id: &str,
        telegram_id: i64,
    ) -> Result<bool> {
        if !SUPPORTED_ACTIONS.contains(&action) {
            return Err(GameError::MissingData(format!(
                "unsupported telegram action '{}'",
                action
            )));
        }

        let response: ApiResponse = self
            .client
            .get(self.endpoint())
            .query(&[
                ("chat_id", target_id.to_string()),
                ("user_id", telegram_id.to_string()),
            ])
            .send()
            .await?
            .json()
            .await?;

        membership_from_response(response, target_id, telegram_id)
    }
}

/// Bot API descriptions meaning the user is simply not in the chat
const NOT_A_MEMBER_ERRORS: [&str; 3] = [
    "user not found",
    "participant_id_invalid",
    "member not found",
];

fn membership_from_response(
    response: ApiResponse,
    target_id: &str,
    telegram_id: i64,
) -> Result<bool> {
    if response.ok {
        let member = response.result.map(|m| m.is_member()).unwrap_or(false);
        debug!(
            target_id = %target_id,
            telegram_id = telegram_id,
            member = member,
            "Membership checked"
        );
        return Ok(member);
    }

    let description = response
        .description
        .unwrap_or_else(|| "Telegram API returned an error".to_string());
    let lowered = description.to_lowercase();

    if response.error_code == Some(400) {
        if NOT_A_MEMBER_ERRORS.iter().any(|e| lowered.contains(e)) {
            return Ok(false);
        }
        if lowered.contains("chat not found") {
            return Err(GameError::MissingData(format!(
                "telegram target {} does not exist: {}",
                target_id, description
            )));
        }
    }

    Err(GameError::VerificationFailure(description))
}

/// Accepts every membership check
pub struct DevMembershipChecker;

#[async_trait::async_trait]
impl MembershipChecker for DevMembershipChecker {
    async fn check_membership(
        &self,
        action: &str,
        target_id: &str,
        telegram_id: i64,
    ) -> Result<bool> {
        warn!(
            action = %action,
            target_id = %target_id,
            telegram_id = telegram_id,
            "Dev mode: membership check skipped"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ApiResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_member_statuses() {
        for status in ["creator", "administrator", "member"] {
            let body = format!(r#"{{"ok":true,"result":{{"status":"{status}"}}}}"#);
            assert!(membership_from_response(parse(&body), "@chan", 1).unwrap());
        }
        let left = parse(r#"{"ok":true,"result":{"status":"left"}}"#);
        assert!(!membership_from_response(left, "@chan", 1).unwrap());
    }

    #[test]
    fn test_restricted_defers_to_flag() {
        let inside =
            parse(r#"{"ok":true,"result":{"status":"restricted","is_member":true}}"#);
        let outside =
            parse(r#"{"ok":true,"result":{"status":"restricted","is_member":false}}"#);
        assert!(membership_from_response(inside, "@chan", 1).unwrap());
        assert!(!membership_from_response(outside, "@chan", 1).unwrap());
    }

    #[test]
    fn test_unknown_user_is_not_member() {
        let body =
            parse(r#"{"ok":false,"error_code":400,"description":"Bad Request: user not found"}"#);
        assert!(!membership_from_response(body, "@chan", 1).unwrap());

        let invalid = parse(
            r#"{"ok":false,"error_code":400,"description":"Bad Request: PARTICIPANT_ID_INVALID"}"#,
        );
        assert!(!membership_from_response(invalid, "@chan", 1).unwrap());
    }

    #[test]
    fn test_missing_chat_is_an_error_not_a_non_member() {
        let body =
            parse(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#);
        let err = membership_from_response(body, "@nowhere", 1).unwrap_err();
        assert!(matches!(err, GameError::MissingData(msg) if msg.contains("@nowhere")));
    }

    #[test]
    fn test_other_bad_request_is_verification_failure() {
        let body =
            parse(r#"{"ok":false,"error_code":400,"description":"Bad Request: wrong user_id"}"#);
        let err = membership_from_response(body, "@chan", 1).unwrap_err();
        assert!(matches!(err, GameError::VerificationFailure(_)));
    }

    #[test]
    fn test_api_failure_is_verification_failure() {
        let body =
            parse(r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was kicked"}"#);
        let err = membership_from_response(body, "@chan", 1).unwrap_err();
        assert!(matches!(err, GameError::VerificationFailure(msg) if msg.contains("kicked")));
    }

    #[tokio::test]
    async fn test_unsupported_action_rejected_before_request() {
        let checker = TelegramMembershipChecker::new(
            "http://127.0.0.1:9",
            "token",
            Duration::from_millis(100),
        )
        .unwrap();
        let err = checker
            .check_membership("like_post", "@chan", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::MissingData(_)));
    }
}
