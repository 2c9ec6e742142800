use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::use_cases::tokens::{
        RedeemOutcome, ResetCodeOutcome, ResetCodeRecord, TokenStore, VerificationRecord,
        generate_reset_code, generate_token, hash_token, reset_code_ttl, verification_token_ttl,
    },
};

/// Process-local token store.
///
/// Each map operation holds the shard lock for its key, so `remove` and the
/// entry API give the single-step read-and-delete the redemption paths need.
pub struct InMemoryTokenStore {
    verification: DashMap<String, VerificationRecord>,
    reset_codes: DashMap<String, ResetCodeRecord>,
    revoked_sessions: DashMap<String, DateTime<Utc>>,
    verification_ttl: Duration,
    reset_ttl: Duration,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::with_ttls(verification_token_ttl(), reset_code_ttl())
    }

    pub fn with_ttls(verification_ttl: Duration, reset_ttl: Duration) -> Self {
        Self {
            verification: DashMap::new(),
            reset_codes: DashMap::new(),
            revoked_sessions: DashMap::new(),
            verification_ttl,
            reset_ttl,
        }
    }
}

impl Default for InMemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn issue_verification_token(&self, account_id: Uuid, email: &str) -> AppResult<String> {
        let token = generate_token();
        let now = Utc::now();
        self.verification.insert(
            hash_token(&token),
            VerificationRecord {
                account_id,
                email: email.to_string(),
                issued_at: now,
                expires_at: now + self.verification_ttl,
            },
        );
        Ok(token)
    }

    async fn redeem_verification_token(&self, token: &str) -> AppResult<RedeemOutcome> {
        let Some((_, record)) = self.verification.remove(&hash_token(token)) else {
            return Ok(RedeemOutcome::NotFound);
        };
        if record.expires_at <= Utc::now() {
            return Ok(RedeemOutcome::Expired);
        }
        Ok(RedeemOutcome::Redeemed(record))
    }

    async fn issue_reset_code(&self, phone: &str, account_id: Uuid) -> AppResult<String> {
        let code = generate_reset_code();
        self.reset_codes.insert(
            phone.to_string(),
            ResetCodeRecord {
                code: code.clone(),
                account_id,
                expires_at: Utc::now() + self.reset_ttl,
            },
        );
        Ok(code)
    }

    async fn verify_reset_code(&self, phone: &str, code: &str) -> AppResult<ResetCodeOutcome> {
        let outcome = match self.reset_codes.entry(phone.to_string()) {
            Entry::Vacant(_) => ResetCodeOutcome::NotFound,
            Entry::Occupied(entry) if entry.get().expires_at <= Utc::now() => {
                entry.remove();
                ResetCodeOutcome::Expired
            }
            Entry::Occupied(entry) if entry.get().code != code => ResetCodeOutcome::Mismatch,
            Entry::Occupied(entry) => ResetCodeOutcome::Verified(entry.remove().account_id),
        };
        Ok(outcome)
    }

    async fn revoke_session(&self, jti: &str, expires_at: DateTime<Utc>) -> AppResult<()> {
        self.revoked_sessions.insert(jti.to_string(), expires_at);
        Ok(())
    }

    async fn is_session_revoked(&self, jti: &str) -> AppResult<bool> {
        Ok(self
            .revoked_sessions
            .get(jti)
            .is_some_and(|until| *until > Utc::now()))
    }

    async fn sweep_expired(&self) -> AppResult<usize> {
        let now = Utc::now();
        let before =
            self.verification.len() + self.reset_codes.len() + self.revoked_sessions.len();
        self.verification.retain(|_, r| r.expires_at > now);
        self.reset_codes.retain(|_, r| r.expires_at > now);
        self.revoked_sessions.retain(|_, until| *until > now);
        let after = self.verification.len() + self.reset_codes.len() + self.revoked_sessions.len();
        Ok(before.saturating_sub(after))
    }
}
