use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::domain::entities::account::Account;
use secrecy::ExposeSecret;

pub const PASSWORD_RESET_TYPE: &str = "password_reset";
pub const OAUTH_STATE_TYPE: &str = "oauth_state";

/// Reset tokens minted after a verified SMS code.
pub fn reset_token_ttl() -> Duration {
    Duration::minutes(15)
}

/// Reset tokens mailed as a link.
pub fn email_reset_token_ttl() -> Duration {
    Duration::minutes(10)
}

pub fn oauth_state_ttl() -> Duration {
    Duration::minutes(10)
}

// ============================================================================
// Session Claims
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub workspace_id: String,
    /// Token id, used for logout revocation.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn account_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

pub fn issue_session(
    account: &Account,
    secret: &secrecy::SecretString,
    ttl: Duration,
) -> AppResult<(String, SessionClaims)> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let claims = SessionClaims {
        sub: account.id.to_string(),
        email: account.email.clone(),
        workspace_id: account.workspace_id.clone(),
        jti: Uuid::new_v4().to_string(),
        iat: now,
        exp: now + ttl.whole_seconds(),
    };
    let token = sign(&claims, secret)?;
    Ok((token, claims))
}

pub fn verify_session(token: &str, secret: &secrecy::SecretString) -> AppResult<SessionClaims> {
    verify::<SessionClaims>(token, secret).map_err(|_| AppError::Unauthorized)
}

// ============================================================================
// Password Reset Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetClaims {
    pub sub: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_reset(
    account_id: Uuid,
    secret: &secrecy::SecretString,
    ttl: Duration,
) -> AppResult<String> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let claims = ResetClaims {
        sub: account_id.to_string(),
        token_type: PASSWORD_RESET_TYPE.to_string(),
        iat: now,
        exp: now + ttl.whole_seconds(),
    };
    sign(&claims, secret)
}

/// Returns the account id a reset token was minted for. Tokens of any other
/// type are rejected even when the signature is valid.
pub fn verify_reset(token: &str, secret: &secrecy::SecretString) -> AppResult<Uuid> {
    let claims =
        verify::<ResetClaims>(token, secret).map_err(|_| AppError::TokenInvalidOrExpired)?;
    if claims.token_type != PASSWORD_RESET_TYPE {
        return Err(AppError::TokenInvalidOrExpired);
    }
    Uuid::parse_str(&claims.sub).map_err(|_| AppError::TokenInvalidOrExpired)
}

// ============================================================================
// OAuth State Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthStateClaims {
    pub nonce: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_oauth_state(secret: &secrecy::SecretString) -> AppResult<String> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let claims = OAuthStateClaims {
        nonce: Uuid::new_v4().to_string(),
        token_type: OAUTH_STATE_TYPE.to_string(),
        iat: now,
        exp: now + oauth_state_ttl().whole_seconds(),
    };
    sign(&claims, secret)
}

pub fn verify_oauth_state(state: &str, secret: &secrecy::SecretString) -> AppResult<()> {
    let claims = verify::<OAuthStateClaims>(state, secret)
        .map_err(|_| AppError::InvalidInput("Invalid or expired OAuth state".into()))?;
    if claims.token_type != OAUTH_STATE_TYPE {
        return Err(AppError::InvalidInput("Invalid or expired OAuth state".into()));
    }
    Ok(())
}

// ============================================================================
// Signing primitives
// ============================================================================

fn sign<T: Serialize>(claims: &T, secret: &secrecy::SecretString) -> AppResult<String> {
    let header = Header::new(Algorithm::HS256);
    encode(
        &header,
        claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

fn verify<T: DeserializeOwned>(token: &str, secret: &secrecy::SecretString) -> AppResult<T> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    decode::<T>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Internal(e.to_string()))
}
