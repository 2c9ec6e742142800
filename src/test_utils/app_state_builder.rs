//! `AppState` wired from a `UseCaseHarness`, for router-level tests.

use std::sync::Arc;

use axum::http::HeaderValue;
use secrecy::SecretString;
use time::Duration;
use url::Url;

use crate::{
    adapters::http::app_state::AppState,
    infra::{RateLimiterTrait, config::AppConfig, rate_limit::InMemoryRateLimiter},
    test_utils::{SUPER_ADMIN_EMAIL, TEST_FRONTEND_URL, TEST_JWT_SECRET, UseCaseHarness, test_prices},
};

pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: SecretString::from(TEST_JWT_SECRET),
        session_ttl: Duration::hours(1),
        frontend_url: Url::parse(TEST_FRONTEND_URL).unwrap(),
        is_production: false,
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        cors_origin: HeaderValue::from_static(TEST_FRONTEND_URL),
        database_url: "postgres://unused".to_string(),
        redis_url: None,
        demo_accounts_enabled: false,
        super_admin_email: SUPER_ADMIN_EMAIL.to_string(),
        stripe: None,
        prices: test_prices(),
        resend: None,
        twilio: None,
        google: None,
        rate_limit_window_secs: 60,
        rate_limit_per_ip: 1_000,
        trust_proxy: false,
        token_sweep_interval_secs: 300,
    }
}

/// Builder for an `AppState` that shares the harness' use cases, so tests
/// can seed and inspect the doubles behind the router.
///
/// ```ignore
/// let h = UseCaseHarness::new();
/// h.durable.insert_account(create_test_account(|_| {}));
/// let app_state = TestAppStateBuilder::new(&h).build();
/// ```
pub struct TestAppStateBuilder<'a> {
    harness: &'a UseCaseHarness,
    config: AppConfig,
    rate_limiter: Arc<dyn RateLimiterTrait>,
}

impl<'a> TestAppStateBuilder<'a> {
    pub fn new(harness: &'a UseCaseHarness) -> Self {
        Self {
            harness,
            config: test_config(),
            rate_limiter: Arc::new(InMemoryRateLimiter::permissive()),
        }
    }

    pub fn with_config(mut self, f: impl FnOnce(&mut AppConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiterTrait>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn build(self) -> AppState {
        AppState {
            config: Arc::new(self.config),
            auth_use_cases: self.harness.auth.clone(),
            verification_use_cases: self.harness.verification.clone(),
            billing_use_cases: self.harness.billing.clone(),
            account_use_cases: self.harness.accounts.clone(),
            rate_limiter: self.rate_limiter,
            token_store: self.harness.tokens.clone(),
        }
    }
}
