use async_trait::async_trait;

use crate::app_error::AppResult;

/// Identity asserted by an external OAuth provider after a successful
/// code exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertedIdentity {
    pub provider_id: String,
    pub email: String,
    pub email_verified: bool,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// URL the browser is sent to, carrying the signed `state`.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchanges an authorization code and validates the returned id token.
    async fn exchange_code(&self, code: &str) -> AppResult<AssertedIdentity>;
}
