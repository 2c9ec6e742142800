//! Google OpenID Connect client: authorization URL, code exchange and
//! RS256 id_token validation against Google's published keys.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::error;
use url::Url;

use super::{InfraError, config::GoogleOAuthConfig, http_client::build_client};
use crate::{
    app_error::{AppError, AppResult},
    application::ports::oauth_provider::{AssertedIdentity, OAuthProvider},
};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const JWKS_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v3/certs";
const ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

pub struct GoogleOAuthClient {
    client: Client,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
}

impl GoogleOAuthClient {
    pub fn new(config: &GoogleOAuthConfig) -> Result<Self, InfraError> {
        Ok(Self {
            client: build_client()?,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    async fn exchange(&self, code: &str) -> AppResult<GoogleTokenResponse> {
        let response = self
            .client
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Google token exchange failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Google token exchange rejected");
            return if status.is_server_error() {
                Err(AppError::Upstream(format!("Google token endpoint: {status}")))
            } else {
                Err(AppError::InvalidInput(
                    "Authorization code was rejected".into(),
                ))
            };
        }

        response
            .json::<GoogleTokenResponse>()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse token response: {e}")))
    }

    async fn fetch_jwks(&self) -> AppResult<GoogleJwks> {
        let response = self
            .client
            .get(JWKS_ENDPOINT)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to fetch Google JWKs: {e}")))?;
        if !response.status().is_success() {
            return Err(AppError::Upstream("Failed to fetch Google JWKs".into()));
        }
        response
            .json::<GoogleJwks>()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Google JWKs: {e}")))
    }

    async fn validate_id_token(&self, id_token: &str) -> AppResult<GoogleIdTokenClaims> {
        let header = decode_header(id_token)
            .map_err(|e| AppError::InvalidInput(format!("Invalid id_token header: {e}")))?;
        let kid = header
            .kid
            .ok_or_else(|| AppError::InvalidInput("Missing kid in id_token header".into()))?;

        let jwks = self.fetch_jwks().await?;
        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.kid == kid)
            .ok_or_else(|| AppError::InvalidInput("No matching key found in Google JWKs".into()))?;
        let decoding_key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| AppError::Internal(format!("Failed to create decoding key: {e}")))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_issuer(&ISSUERS);

        let claims = decode::<GoogleIdTokenClaims>(id_token, &decoding_key, &validation)
            .map_err(|e| AppError::InvalidInput(format!("Invalid id_token: {e}")))?
            .claims;

        if claims.azp.as_deref().is_some_and(|azp| azp != self.client_id) {
            return Err(AppError::InvalidInput("Invalid id_token azp claim".into()));
        }
        Ok(claims)
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthClient {
    fn authorization_url(&self, state: &str) -> String {
        let mut url = match Url::parse(AUTH_ENDPOINT) {
            Ok(url) => url,
            Err(_) => return AUTH_ENDPOINT.to_string(),
        };
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", "openid email profile")
            .append_pair("state", state)
            .append_pair("prompt", "select_account");
        url.to_string()
    }

    async fn exchange_code(&self, code: &str) -> AppResult<AssertedIdentity> {
        let tokens = self.exchange(code).await?;
        let claims = self.validate_id_token(&tokens.id_token).await?;
        Ok(claims.into_identity())
    }
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleIdTokenClaims {
    /// Stable Google account id.
    sub: String,
    email: String,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
    /// Authorized party; must match the client id when present.
    #[serde(default)]
    azp: Option<String>,
}

impl GoogleIdTokenClaims {
    fn into_identity(self) -> AssertedIdentity {
        // Fall back to splitting the display name when given/family are absent.
        let (first_name, last_name) = match (self.given_name, self.family_name) {
            (Some(first), last) => (first, last.unwrap_or_default()),
            (None, _) => {
                let name = self.name.unwrap_or_default();
                match name.split_once(' ') {
                    Some((first, last)) => (first.to_string(), last.to_string()),
                    None => (name, String::new()),
                }
            }
        };
        AssertedIdentity {
            provider_id: self.sub,
            email: self.email,
            email_verified: self.email_verified,
            first_name,
            last_name,
            avatar: self.picture,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleJwks {
    keys: Vec<GoogleJwk>,
}

#[derive(Debug, Deserialize)]
struct GoogleJwk {
    kid: String,
    n: String,
    e: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GoogleOAuthClient {
        GoogleOAuthClient::new(&GoogleOAuthConfig {
            client_id: "client-123.apps.googleusercontent.com".into(),
            client_secret: SecretString::from("shh"),
            redirect_uri: "http://localhost:3005/auth/google/callback".into(),
        })
        .unwrap()
    }

    #[test]
    fn test_authorization_url_carries_state_and_scope() {
        let url = Url::parse(&client().authorization_url("signed.state.value")).unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["state"], "signed.state.value");
        assert_eq!(pairs["scope"], "openid email profile");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "client-123.apps.googleusercontent.com");
    }

    #[test]
    fn test_claims_map_to_identity() {
        let claims: GoogleIdTokenClaims = serde_json::from_value(serde_json::json!({
            "sub": "1234",
            "email": "gina@example.com",
            "email_verified": true,
            "name": "Gina Maria Lopez",
            "picture": "https://lh3.example/p.png"
        }))
        .unwrap();
        let identity = claims.into_identity();
        assert_eq!(identity.provider_id, "1234");
        assert_eq!(identity.first_name, "Gina");
        assert_eq!(identity.last_name, "Maria Lopez");
        assert!(identity.email_verified);
    }

    #[tokio::test]
    async fn test_garbage_id_token_is_invalid_input() {
        let result = client().validate_id_token("not-a-jwt").await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
