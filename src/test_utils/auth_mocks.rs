//! Doubles for password hashing and the OAuth provider.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::{
        oauth_provider::{AssertedIdentity, OAuthProvider},
        password::PasswordHasher,
    },
};

/// Stores `plain:<password>` so fixtures can set hashes by hand.
#[derive(Default)]
pub struct PlainTextHasher;

impl PasswordHasher for PlainTextHasher {
    fn hash(&self, plain: &str) -> AppResult<String> {
        Ok(format!("plain:{plain}"))
    }

    fn compare(&self, plain: &str, digest: &str) -> bool {
        digest.strip_prefix("plain:") == Some(plain)
    }
}

/// Returns whatever identity was last configured, for any code.
#[derive(Default)]
pub struct StubOAuthProvider {
    identity: Mutex<Option<AssertedIdentity>>,
}

impl StubOAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_identity(&self, identity: AssertedIdentity) {
        *self.identity.lock().unwrap() = Some(identity);
    }
}

#[async_trait]
impl OAuthProvider for StubOAuthProvider {
    fn authorization_url(&self, state: &str) -> String {
        format!("https://accounts.example.test/auth?state={state}")
    }

    async fn exchange_code(&self, _code: &str) -> AppResult<AssertedIdentity> {
        self.identity
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::Upstream("no identity configured".into()))
    }
}
