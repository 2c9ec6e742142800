use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{
        email::resend::ResendEmailSender, http::app_state::AppState, sms::twilio::TwilioSmsSender,
    },
    application::ports::{
        notifier::Notifier, oauth_provider::OAuthProvider, password::PasswordHasher,
        payment_provider::PaymentProvider,
    },
    infra::{
        InfraError, RateLimiterTrait,
        account_mirror::AccountMirror,
        config::AppConfig,
        google_oauth::GoogleOAuthClient,
        notifier::NotificationDispatcher,
        password::Argon2PasswordHasher,
        postgres_persistence,
        rate_limit::{InMemoryRateLimiter, RedisRateLimiter},
        redis_token_store::RedisTokenStore,
        stripe_client::StripeClient,
        token_store::InMemoryTokenStore,
    },
    use_cases::{
        accounts::AccountUseCases,
        auth::AuthUseCases,
        billing::BillingUseCases,
        identity::{AccountRepo, IdentityResolver},
        tokens::TokenStore,
        verification::VerificationUseCases,
    },
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env()?;

    let durable = Arc::new(postgres_persistence(&config.database_url).await?);
    let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2PasswordHasher);

    let mirror = Arc::new(AccountMirror::new());
    if config.demo_accounts_enabled {
        mirror
            .seed_demo_account(hasher.as_ref())
            .map_err(InfraError::Seed)?;
    }

    let (token_store, rate_limiter): (Arc<dyn TokenStore>, Arc<dyn RateLimiterTrait>) =
        match &config.redis_url {
            Some(redis_url) => (
                Arc::new(RedisTokenStore::new(redis_url).await?),
                Arc::new(
                    RedisRateLimiter::new(
                        redis_url,
                        config.rate_limit_window_secs,
                        config.rate_limit_per_ip,
                    )
                    .await?,
                ),
            ),
            None => {
                warn!("REDIS_URL not set, tokens and rate limits are process-local");
                (
                    Arc::new(InMemoryTokenStore::new()),
                    Arc::new(InMemoryRateLimiter::new(
                        config.rate_limit_window_secs,
                        config.rate_limit_per_ip,
                    )),
                )
            }
        };

    let email = config
        .resend
        .as_ref()
        .map(|c| ResendEmailSender::new(c.api_key.clone(), c.email_from.clone()))
        .transpose()?;
    let sms = config
        .twilio
        .as_ref()
        .map(|c| {
            TwilioSmsSender::new(
                c.account_sid.clone(),
                c.auth_token.clone(),
                c.from_number.clone(),
            )
        })
        .transpose()?;
    let notifier: Arc<dyn Notifier> = Arc::new(NotificationDispatcher::new(email, sms));

    let payments: Option<Arc<dyn PaymentProvider>> = match &config.stripe {
        Some(stripe) => Some(Arc::new(StripeClient::new(
            stripe.secret_key.clone(),
            stripe.webhook_secret.clone(),
        )?)),
        None => {
            warn!("STRIPE_SECRET_KEY not set, billing endpoints will report a configuration error");
            None
        }
    };
    let oauth: Option<Arc<dyn OAuthProvider>> = match &config.google {
        Some(google) => Some(Arc::new(GoogleOAuthClient::new(google)?)),
        None => {
            warn!("Google OAuth credentials not set, OAuth endpoints will report a configuration error");
            None
        }
    };

    let resolver = Arc::new(IdentityResolver::new(
        mirror.clone() as Arc<dyn AccountRepo>,
        durable as Arc<dyn AccountRepo>,
        &config.super_admin_email,
    ));

    let verification_use_cases = Arc::new(VerificationUseCases::new(
        resolver.clone(),
        token_store.clone(),
        notifier,
        hasher.clone(),
        config.frontend_url.clone(),
        !config.is_production,
        config.jwt_secret.clone(),
    ));
    let auth_use_cases = Arc::new(AuthUseCases::new(
        resolver.clone(),
        token_store.clone(),
        hasher.clone(),
        verification_use_cases.clone(),
        oauth,
        config.jwt_secret.clone(),
        config.session_ttl,
    ));
    let billing_use_cases = Arc::new(BillingUseCases::new(
        resolver.clone(),
        payments,
        config.prices.clone(),
        config.frontend_url.clone(),
    ));
    let account_use_cases = Arc::new(AccountUseCases::new(resolver, hasher));

    info!(
        mirror_accounts = mirror.len(),
        redis = config.redis_url.is_some(),
        production = config.is_production,
        "Application state initialized"
    );

    Ok(AppState {
        config: Arc::new(config),
        auth_use_cases,
        verification_use_cases,
        billing_use_cases,
        account_use_cases,
        rate_limiter,
        token_store,
    })
}

/// Pretty console output, or JSON lines when `LOG_JSON=true`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "remodely_identity=debug,tower_http=debug".into());

    let json = std::env::var("LOG_JSON").is_ok_and(|v| v.eq_ignore_ascii_case("true"));
    let fmt_layer = if json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false) // don’t show target (module path)
            .with_level(true)
            .pretty()
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .ok();
}
