//! Authenticator-app codes (RFC 6238: SHA-1, six digits, 30 second step)
//! and single-use backup codes.

use chrono::{DateTime, Utc};
use totp_rs::{Algorithm, Secret, TOTP};

use crate::app_error::{AppError, AppResult};

pub const ISSUER: &str = "Remodely";
pub const BACKUP_CODE_COUNT: usize = 10;

const DIGITS: usize = 6;
const STEP_SECS: u64 = 30;
/// Codes from one step either side of now are accepted.
const SKEW_STEPS: u8 = 1;

#[derive(Debug, Clone)]
pub struct Enrollment {
    /// Base32 shared secret, for manual entry.
    pub secret: String,
    pub otpauth_url: String,
}

fn authenticator(secret_b32: &str, account_name: &str) -> AppResult<TOTP> {
    let bytes = Secret::Encoded(secret_b32.to_string())
        .to_bytes()
        .map_err(|e| AppError::Internal(format!("stored two-factor secret is unreadable: {e:?}")))?;
    TOTP::new(
        Algorithm::SHA1,
        DIGITS,
        SKEW_STEPS,
        STEP_SECS,
        bytes,
        Some(ISSUER.to_string()),
        account_name.to_string(),
    )
    .map_err(|e| AppError::Internal(format!("two-factor setup failed: {e:?}")))
}

/// Fresh 160-bit secret plus the `otpauth://` URL authenticator apps scan.
pub fn enroll(account_name: &str) -> AppResult<Enrollment> {
    let secret = Secret::generate_secret().to_encoded().to_string();
    let totp = authenticator(&secret, account_name)?;
    Ok(Enrollment {
        secret,
        otpauth_url: totp.get_url(),
    })
}

pub fn code_matches(
    secret_b32: &str,
    account_name: &str,
    code: &str,
    at: DateTime<Utc>,
) -> AppResult<bool> {
    let code = code.trim();
    if code.len() != DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
        return Ok(false);
    }
    let Ok(at) = u64::try_from(at.timestamp()) else {
        return Ok(false);
    };
    Ok(authenticator(secret_b32, account_name)?.check(code, at))
}

/// Eight uppercase hex characters each.
pub fn backup_codes() -> Vec<String> {
    (0..BACKUP_CODE_COUNT)
        .map(|_| hex::encode_upper(rand::random::<[u8; 4]>()))
        .collect()
}

/// Removes `code` from `codes` if present. Matching ignores case and
/// surrounding whitespace.
pub fn redeem_backup_code(codes: &[String], code: &str) -> Option<Vec<String>> {
    let wanted = code.trim().to_ascii_uppercase();
    let position = codes.iter().position(|c| *c == wanted)?;
    let mut remaining = codes.to_vec();
    remaining.remove(position);
    Some(remaining)
}

#[cfg(test)]
pub(crate) fn code_at(secret_b32: &str, account_name: &str, at: DateTime<Utc>) -> String {
    authenticator(secret_b32, account_name)
        .unwrap()
        .generate(at.timestamp() as u64)
}
