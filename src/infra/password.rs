use argon2::{
    Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier, password_hash::SaltString,
};
use rand::RngCore;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::password::PasswordHasher,
};

/// Argon2id with default parameters, PHC string output.
#[derive(Default)]
pub struct Argon2PasswordHasher;

fn salt() -> AppResult<SaltString> {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    SaltString::encode_b64(&bytes).map_err(|e| AppError::Internal(format!("salt: {e}")))
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, plain: &str) -> AppResult<String> {
        Argon2::default()
            .hash_password(plain.as_bytes(), &salt()?)
            .map(|h| h.to_string())
            .map_err(|e| AppError::Internal(format!("password hash: {e}")))
    }

    fn compare(&self, plain: &str, digest: &str) -> bool {
        PasswordHash::new(digest)
            .ok()
            .is_some_and(|hash| {
                Argon2::default()
                    .verify_password(plain.as_bytes(), &hash)
                    .is_ok()
            })
    }
}
