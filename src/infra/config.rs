use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use time::Duration;
use url::Url;

use super::InfraError;
use crate::application::use_cases::billing::PlanPrices;

pub struct StripeConfig {
    pub secret_key: SecretString,
    pub webhook_secret: SecretString,
}

pub struct ResendConfig {
    pub api_key: SecretString,
    pub email_from: String,
}

pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub from_number: String,
}

pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
}

pub struct AppConfig {
    pub jwt_secret: SecretString,
    pub session_ttl: Duration,
    pub frontend_url: Url,
    /// Production hides verification links from responses and logs.
    pub is_production: bool,
    pub bind_addr: SocketAddr,
    pub cors_origin: HeaderValue,
    pub database_url: String,
    /// When unset, tokens and rate limits stay in process memory.
    pub redis_url: Option<String>,
    pub demo_accounts_enabled: bool,
    pub super_admin_email: String,
    pub stripe: Option<StripeConfig>,
    pub prices: PlanPrices,
    pub resend: Option<ResendConfig>,
    pub twilio: Option<TwilioConfig>,
    pub google: Option<GoogleOAuthConfig>,
    pub rate_limit_window_secs: u64,
    pub rate_limit_per_ip: u64,
    /// Whether to trust X-Forwarded-For headers. Set to true when behind a reverse proxy.
    /// SECURITY: Only enable this when the API is not directly exposed to the internet.
    pub trust_proxy: bool,
    pub token_sweep_interval_secs: u64,
}

/// Unset and empty variables both count as absent.
fn optional_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> Result<Self, InfraError> {
        let jwt_secret = SecretString::from(get_env::<String>("JWT_SECRET"));
        let session_ttl_secs: i64 = get_env_default("SESSION_TOKEN_TTL_SECS", 604_800);

        let frontend_url: Url = optional_env("FRONTEND_URL")
            .unwrap_or_else(|| "http://localhost:3005".to_string())
            .parse()
            .map_err(|_| InfraError::ConfigInvalid { var: "FRONTEND_URL" })?;
        let app_env: String = get_env_default("APP_ENV", "development".to_string());
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3005"))
                .parse()
                .map_err(|_| InfraError::ConfigInvalid { var: "CORS_ORIGIN" })?;
        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".to_string())
            .parse()
            .map_err(|_| InfraError::ConfigInvalid { var: "BIND_ADDR" })?;

        let stripe = optional_env("STRIPE_SECRET_KEY").map(|secret_key| StripeConfig {
            secret_key: SecretString::from(secret_key),
            webhook_secret: SecretString::from(
                optional_env("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            ),
        });
        let resend = optional_env("RESEND_API_KEY").map(|api_key| ResendConfig {
            api_key: SecretString::from(api_key),
            email_from: optional_env("EMAIL_FROM")
                .unwrap_or_else(|| "Remodely <noreply@remodely.ai>".to_string()),
        });
        let twilio = match (
            optional_env("TWILIO_ACCOUNT_SID"),
            optional_env("TWILIO_AUTH_TOKEN"),
            optional_env("TWILIO_FROM_NUMBER"),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(TwilioConfig {
                account_sid,
                auth_token: SecretString::from(auth_token),
                from_number,
            }),
            _ => None,
        };
        let google = match (
            optional_env("GOOGLE_CLIENT_ID"),
            optional_env("GOOGLE_CLIENT_SECRET"),
        ) {
            (Some(client_id), Some(client_secret)) => Some(GoogleOAuthConfig {
                client_id,
                client_secret: SecretString::from(client_secret),
                redirect_uri: optional_env("GOOGLE_REDIRECT_URI")
                    .unwrap_or_else(|| format!("{}auth/google/callback", frontend_url)),
            }),
            _ => None,
        };

        Ok(Self {
            jwt_secret,
            session_ttl: Duration::seconds(session_ttl_secs),
            frontend_url,
            is_production: app_env.eq_ignore_ascii_case("production"),
            bind_addr,
            cors_origin,
            database_url: get_env("DATABASE_URL"),
            redis_url: optional_env("REDIS_URL"),
            demo_accounts_enabled: get_env_default("DEMO_ACCOUNTS_ENABLED", true),
            super_admin_email: get_env_default(
                "SUPER_ADMIN_EMAIL",
                "help.remodely@gmail.com".to_string(),
            ),
            stripe,
            prices: PlanPrices {
                starter: get_env_default("STRIPE_PRICE_STARTER", "price_starter".to_string()),
                professional: get_env_default(
                    "STRIPE_PRICE_PROFESSIONAL",
                    "price_professional".to_string(),
                ),
                enterprise: get_env_default(
                    "STRIPE_PRICE_ENTERPRISE",
                    "price_enterprise".to_string(),
                ),
            },
            resend,
            twilio,
            google,
            rate_limit_window_secs: get_env_default("RATE_LIMIT_WINDOW_SECS", 60),
            rate_limit_per_ip: get_env_default("RATE_LIMIT_PER_IP", 120),
            // Default to false - must explicitly enable when behind a trusted proxy
            trust_proxy: get_env_default("TRUST_PROXY", false),
            token_sweep_interval_secs: get_env_default("TOKEN_SWEEP_INTERVAL_SECS", 300),
        })
    }
}
