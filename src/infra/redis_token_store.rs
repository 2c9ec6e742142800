use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Script, aio::ConnectionManager};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::InfraError;
use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::tokens::{
        RedeemOutcome, ResetCodeOutcome, TokenStore, VerificationRecord, generate_reset_code,
        generate_token, hash_token, reset_code_ttl, verification_token_ttl,
    },
};

/// Atomic compare-and-delete for reset codes.
/// Returns {0, nil} when absent, {1, account_id} on match (key deleted),
/// {2, nil} on mismatch (key kept). Lua `false` becomes a nil reply.
const VERIFY_RESET_CODE_SCRIPT: &str = r#"
local value = redis.call('GET', KEYS[1])
if not value then
    return {0, false}
end
local data = cjson.decode(value)
if data.code ~= ARGV[1] then
    return {2, false}
end
redis.call('DEL', KEYS[1])
return {1, data.account_id}
"#;

#[derive(Serialize, Deserialize)]
struct StoredVerification {
    account_id: Uuid,
    email: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct StoredResetCode<'a> {
    code: &'a str,
    account_id: String,
}

/// Redis-backed token store for multi-instance deployments.
///
/// Expiry is delegated to key TTLs, so an expired token reads as absent and
/// `sweep_expired` has nothing to do.
#[derive(Clone)]
pub struct RedisTokenStore {
    manager: ConnectionManager,
    verify_script: Script,
}

impl RedisTokenStore {
    pub async fn new(redis_url: &str) -> Result<Self, InfraError> {
        let client = redis::Client::open(redis_url).map_err(InfraError::RedisConnection)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(InfraError::RedisConnection)?;
        Ok(Self::from_manager(manager))
    }

    pub fn from_manager(manager: ConnectionManager) -> Self {
        Self {
            manager,
            verify_script: Script::new(VERIFY_RESET_CODE_SCRIPT),
        }
    }

    fn verification_key(token_hash: &str) -> String {
        format!("verify:{token_hash}")
    }

    fn reset_key(phone: &str) -> String {
        format!("reset:{phone}")
    }

    fn revoked_key(jti: &str) -> String {
        format!("revoked:{jti}")
    }
}

fn store_error(e: redis::RedisError) -> AppError {
    AppError::Internal(format!("token store: {e}"))
}

/// Maps the GETDEL reply. The key TTL normally hides expired entries; the
/// stored deadline covers a read that races the TTL.
fn decode_verification(raw: Option<String>, now: DateTime<Utc>) -> AppResult<RedeemOutcome> {
    let Some(raw) = raw else {
        return Ok(RedeemOutcome::NotFound);
    };
    let stored: StoredVerification =
        serde_json::from_str(&raw).map_err(|e| AppError::Internal(e.to_string()))?;
    if stored.expires_at <= now {
        return Ok(RedeemOutcome::Expired);
    }
    Ok(RedeemOutcome::Redeemed(VerificationRecord {
        account_id: stored.account_id,
        email: stored.email,
        issued_at: stored.issued_at,
        expires_at: stored.expires_at,
    }))
}

/// Maps the `{status, account_id}` reply of `VERIFY_RESET_CODE_SCRIPT`.
fn decode_reset_reply(status: i32, account_id: Option<String>) -> AppResult<ResetCodeOutcome> {
    match (status, account_id) {
        (1, Some(id)) => Uuid::parse_str(&id)
            .map(ResetCodeOutcome::Verified)
            .map_err(|e| AppError::Internal(e.to_string())),
        (1, None) => Err(AppError::Internal(
            "reset code matched without an account id".into(),
        )),
        (2, _) => Ok(ResetCodeOutcome::Mismatch),
        _ => Ok(ResetCodeOutcome::NotFound),
    }
}

/// Seconds a revocation marker must live, or `None` when the session has
/// already expired on its own.
fn revocation_ttl_secs(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<u64> {
    u64::try_from((expires_at - now).num_seconds())
        .ok()
        .filter(|secs| *secs > 0)
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn issue_verification_token(&self, account_id: Uuid, email: &str) -> AppResult<String> {
        let mut conn = self.manager.clone();
        let token = generate_token();
        let ttl = verification_token_ttl();
        let now = Utc::now();
        let value = serde_json::to_string(&StoredVerification {
            account_id,
            email: email.to_string(),
            issued_at: now,
            expires_at: now + ttl,
        })
        .map_err(|e| AppError::Internal(e.to_string()))?;

        let _: () = conn
            .set_ex(
                Self::verification_key(&hash_token(&token)),
                value,
                ttl.num_seconds().max(1) as u64,
            )
            .await
            .map_err(store_error)?;
        Ok(token)
    }

    async fn redeem_verification_token(&self, token: &str) -> AppResult<RedeemOutcome> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = redis::cmd("GETDEL")
            .arg(Self::verification_key(&hash_token(token)))
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        decode_verification(raw, Utc::now())
    }

    async fn issue_reset_code(&self, phone: &str, account_id: Uuid) -> AppResult<String> {
        let mut conn = self.manager.clone();
        let code = generate_reset_code();
        let value = serde_json::to_string(&StoredResetCode {
            code: &code,
            account_id: account_id.to_string(),
        })
        .map_err(|e| AppError::Internal(e.to_string()))?;

        // SET replaces any outstanding code for this phone.
        let _: () = conn
            .set_ex(
                Self::reset_key(phone),
                value,
                reset_code_ttl().num_seconds().max(1) as u64,
            )
            .await
            .map_err(store_error)?;
        Ok(code)
    }

    async fn verify_reset_code(&self, phone: &str, code: &str) -> AppResult<ResetCodeOutcome> {
        let mut conn = self.manager.clone();
        let (status, account_id): (i32, Option<String>) = self
            .verify_script
            .key(Self::reset_key(phone))
            .arg(code)
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;
        decode_reset_reply(status, account_id)
    }

    async fn revoke_session(&self, jti: &str, expires_at: DateTime<Utc>) -> AppResult<()> {
        let Some(remaining) = revocation_ttl_secs(expires_at, Utc::now()) else {
            return Ok(());
        };
        let mut conn = self.manager.clone();
        let _: () = conn
            .set_ex(Self::revoked_key(jti), 1, remaining)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn is_session_revoked(&self, jti: &str) -> AppResult<bool> {
        let mut conn = self.manager.clone();
        conn.exists(Self::revoked_key(jti)).await.map_err(store_error)
    }

    async fn sweep_expired(&self) -> AppResult<usize> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn stored(expires_in: Duration) -> (Uuid, DateTime<Utc>, String) {
        let account_id = Uuid::new_v4();
        let now = Utc::now();
        let raw = serde_json::to_string(&StoredVerification {
            account_id,
            email: "ivy@example.com".into(),
            issued_at: now,
            expires_at: now + expires_in,
        })
        .unwrap();
        (account_id, now, raw)
    }

    #[test]
    fn test_missing_verification_key_is_not_found() {
        assert!(matches!(
            decode_verification(None, Utc::now()).unwrap(),
            RedeemOutcome::NotFound
        ));
    }

    #[test]
    fn test_live_verification_is_redeemed() {
        let (account_id, now, raw) = stored(Duration::hours(1));
        match decode_verification(Some(raw), now).unwrap() {
            RedeemOutcome::Redeemed(record) => {
                assert_eq!(record.account_id, account_id);
                assert_eq!(record.email, "ivy@example.com");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_verification_past_deadline_is_expired() {
        let (_, now, raw) = stored(Duration::seconds(5));
        assert!(matches!(
            decode_verification(Some(raw), now + Duration::seconds(5)).unwrap(),
            RedeemOutcome::Expired
        ));
    }

    #[test]
    fn test_corrupt_verification_value_is_an_error() {
        assert!(matches!(
            decode_verification(Some("not json".into()), Utc::now()),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn test_reset_reply_statuses() {
        let id = Uuid::new_v4();
        assert_eq!(
            decode_reset_reply(1, Some(id.to_string())).unwrap(),
            ResetCodeOutcome::Verified(id)
        );
        assert_eq!(decode_reset_reply(2, None).unwrap(), ResetCodeOutcome::Mismatch);
        assert_eq!(decode_reset_reply(0, None).unwrap(), ResetCodeOutcome::NotFound);
        assert!(decode_reset_reply(1, None).is_err());
        assert!(decode_reset_reply(1, Some("garbage".into())).is_err());
    }

    #[test]
    fn test_stored_reset_code_uses_script_field_names() {
        let value = serde_json::to_value(StoredResetCode {
            code: "123456",
            account_id: "abc".into(),
        })
        .unwrap();
        assert_eq!(value["code"], "123456");
        assert_eq!(value["account_id"], "abc");
        assert!(VERIFY_RESET_CODE_SCRIPT.contains("data.code"));
        assert!(VERIFY_RESET_CODE_SCRIPT.contains("data.account_id"));
    }

    #[test]
    fn test_revocation_ttl() {
        let now = Utc::now();
        assert_eq!(revocation_ttl_secs(now + Duration::seconds(90), now), Some(90));
        assert_eq!(revocation_ttl_secs(now, now), None);
        assert_eq!(revocation_ttl_secs(now - Duration::minutes(1), now), None);
    }
}
