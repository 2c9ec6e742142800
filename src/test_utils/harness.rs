//! Every use case wired against in-memory doubles.

use std::sync::Arc;

use secrecy::SecretString;
use url::Url;

use crate::{
    application::{
        ports::{oauth_provider::OAuthProvider, payment_provider::PaymentProvider},
        use_cases::{
            accounts::AccountUseCases,
            auth::AuthUseCases,
            billing::{BillingUseCases, PlanPrices},
            identity::IdentityResolver,
            verification::VerificationUseCases,
        },
    },
    infra::token_store::InMemoryTokenStore,
    test_utils::{
        InMemoryAccountRepo, PlainTextHasher, RecordingNotifier, StubOAuthProvider,
        StubPaymentProvider,
    },
};

pub const SUPER_ADMIN_EMAIL: &str = "root@remodely.test";
pub const TEST_JWT_SECRET: &str = "test-jwt-secret-with-enough-entropy-0123456789";
pub const TEST_FRONTEND_URL: &str = "http://localhost:3005";

pub fn test_prices() -> PlanPrices {
    PlanPrices {
        starter: "price_starter".to_string(),
        professional: "price_professional".to_string(),
        enterprise: "price_enterprise".to_string(),
    }
}

#[derive(Clone, Copy)]
struct HarnessOptions {
    oauth: bool,
    payments: bool,
    production: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            oauth: true,
            payments: true,
            production: false,
        }
    }
}

/// The doubles are kept as concrete `Arc`s so tests can seed and inspect
/// them after the use cases have been built.
pub struct UseCaseHarness {
    pub mirror: Arc<InMemoryAccountRepo>,
    pub durable: Arc<InMemoryAccountRepo>,
    pub tokens: Arc<InMemoryTokenStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub hasher: Arc<PlainTextHasher>,
    pub oauth: Arc<StubOAuthProvider>,
    pub payments: Arc<StubPaymentProvider>,
    pub jwt_secret: SecretString,
    pub resolver: Arc<IdentityResolver>,
    pub auth: Arc<AuthUseCases>,
    pub verification: Arc<VerificationUseCases>,
    pub billing: Arc<BillingUseCases>,
    pub accounts: Arc<AccountUseCases>,
}

impl UseCaseHarness {
    /// Development settings: debug links exposed, all providers configured.
    pub fn new() -> Self {
        Self::build(HarnessOptions::default())
    }

    pub fn production() -> Self {
        Self::build(HarnessOptions {
            production: true,
            ..Default::default()
        })
    }

    pub fn without_oauth() -> Self {
        Self::build(HarnessOptions {
            oauth: false,
            ..Default::default()
        })
    }

    pub fn without_payments() -> Self {
        Self::build(HarnessOptions {
            payments: false,
            ..Default::default()
        })
    }

    fn build(options: HarnessOptions) -> Self {
        let mirror = Arc::new(InMemoryAccountRepo::new());
        let durable = Arc::new(InMemoryAccountRepo::new());
        let tokens = Arc::new(InMemoryTokenStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let hasher = Arc::new(PlainTextHasher);
        let oauth = Arc::new(StubOAuthProvider::new());
        let payments = Arc::new(StubPaymentProvider::new());
        let jwt_secret = SecretString::from(TEST_JWT_SECRET);
        let frontend_url = Url::parse(TEST_FRONTEND_URL).unwrap();

        let resolver = Arc::new(IdentityResolver::new(
            mirror.clone(),
            durable.clone(),
            SUPER_ADMIN_EMAIL,
        ));
        let verification = Arc::new(VerificationUseCases::new(
            resolver.clone(),
            tokens.clone(),
            notifier.clone(),
            hasher.clone(),
            frontend_url.clone(),
            !options.production,
            jwt_secret.clone(),
        ));
        let auth = Arc::new(AuthUseCases::new(
            resolver.clone(),
            tokens.clone(),
            hasher.clone(),
            verification.clone(),
            options
                .oauth
                .then(|| oauth.clone() as Arc<dyn OAuthProvider>),
            jwt_secret.clone(),
            time::Duration::hours(1),
        ));
        let billing = Arc::new(BillingUseCases::new(
            resolver.clone(),
            options
                .payments
                .then(|| payments.clone() as Arc<dyn PaymentProvider>),
            test_prices(),
            frontend_url,
        ));
        let accounts = Arc::new(AccountUseCases::new(resolver.clone(), hasher.clone()));

        Self {
            mirror,
            durable,
            tokens,
            notifier,
            hasher,
            oauth,
            payments,
            jwt_secret,
            resolver,
            auth,
            verification,
            billing,
            accounts,
        }
    }
}

impl Default for UseCaseHarness {
    fn default() -> Self {
        Self::new()
    }
}
