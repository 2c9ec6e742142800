//! Short-lived credential storage.
//!
//! Three token families share one store: email-verification tokens (keyed by
//! the SHA-256 of the raw token), phone-bound reset codes (keyed by phone
//! number, last write wins) and revoked session ids. Expiry is checked when a
//! token is read; `sweep_expired` only bounds memory.

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::app_error::AppResult;

pub fn verification_token_ttl() -> Duration {
    Duration::hours(24)
}

pub fn reset_code_ttl() -> Duration {
    Duration::minutes(10)
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationRecord {
    pub account_id: Uuid,
    pub email: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResetCodeRecord {
    pub code: String,
    pub account_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedeemOutcome {
    Redeemed(VerificationRecord),
    NotFound,
    Expired,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResetCodeOutcome {
    Verified(Uuid),
    NotFound,
    Expired,
    Mismatch,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Stores a fresh verification token and returns the raw value.
    async fn issue_verification_token(&self, account_id: Uuid, email: &str) -> AppResult<String>;

    /// Reads and deletes in one step: of two concurrent callers with the same
    /// token, exactly one observes `Redeemed`.
    async fn redeem_verification_token(&self, token: &str) -> AppResult<RedeemOutcome>;

    /// Replaces any outstanding code for `phone`.
    async fn issue_reset_code(&self, phone: &str, account_id: Uuid) -> AppResult<String>;

    /// Deletes the code on `Verified` and `Expired`; keeps it on `Mismatch`.
    async fn verify_reset_code(&self, phone: &str, code: &str) -> AppResult<ResetCodeOutcome>;

    async fn revoke_session(&self, jti: &str, expires_at: DateTime<Utc>) -> AppResult<()>;

    async fn is_session_revoked(&self, jti: &str) -> AppResult<bool>;

    /// Drops expired entries; returns how many were removed.
    async fn sweep_expired(&self) -> AppResult<usize>;
}

/// 32 random bytes from the OS RNG, URL-safe base64.
pub fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Six decimal digits, leading zeros kept.
pub fn generate_reset_code() -> String {
    let n: u32 = rand::rngs::OsRng.gen_range(0..1_000_000);
    format!("{n:06}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let h = hash_token("abc");
        assert_eq!(h, hash_token("abc"));
        assert_eq!(h.len(), 64);
        assert_ne!(h, hash_token("abd"));
    }

    #[test]
    fn test_reset_code_shape() {
        for _ in 0..50 {
            let code = generate_reset_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
