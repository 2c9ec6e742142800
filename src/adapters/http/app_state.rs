use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    infra::{RateLimiterTrait, config::AppConfig},
    use_cases::{
        accounts::AccountUseCases, auth::AuthUseCases, billing::BillingUseCases,
        tokens::TokenStore, verification::VerificationUseCases,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth_use_cases: Arc<AuthUseCases>,
    pub verification_use_cases: Arc<VerificationUseCases>,
    pub billing_use_cases: Arc<BillingUseCases>,
    pub account_use_cases: Arc<AccountUseCases>,
    pub rate_limiter: Arc<dyn RateLimiterTrait>,
    pub token_store: Arc<dyn TokenStore>,
}

impl FromRef<AppState> for Arc<AuthUseCases> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_use_cases.clone()
    }
}
