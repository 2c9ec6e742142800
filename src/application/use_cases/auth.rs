use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use secrecy::SecretString;
use serde::Serialize;
use time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        jwt::{self, SessionClaims},
        ports::{oauth_provider::OAuthProvider, password::PasswordHasher},
        use_cases::{
            identity::{
                AccountSource, IdentityResolver, ResolvedAccount, new_workspace_id,
                normalize_email,
            },
            tokens::TokenStore,
            verification::VerificationUseCases,
        },
        validators::{MIN_PASSWORD_LEN, is_valid_email, is_valid_password, is_valid_phone},
    },
    domain::entities::{
        account::{Account, AccountView, SubscriptionState},
        plan::FREE_PLAN,
        role::Role,
    },
};

/// Checks run after the principal is resolved, in this order. The first
/// failing gate decides the error, so an inactive account never reports
/// an unverified email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginGate {
    PasswordMatches,
    AccountActive,
    /// Durable accounts only; mirror accounts are exempt.
    EmailVerified,
}

pub const PASSWORD_LOGIN_GATES: [LoginGate; 3] = [
    LoginGate::PasswordMatches,
    LoginGate::AccountActive,
    LoginGate::EmailVerified,
];

/// The provider already vouched for the email address.
pub const OAUTH_LOGIN_GATES: [LoginGate; 1] = [LoginGate::AccountActive];

struct GateInput<'a> {
    resolved: &'a ResolvedAccount,
    password: Option<&'a str>,
    hasher: &'a dyn PasswordHasher,
}

impl LoginGate {
    fn check(&self, input: &GateInput<'_>) -> AppResult<()> {
        let account = &input.resolved.account;
        match self {
            LoginGate::PasswordMatches => match (input.password, account.password_hash.as_deref()) {
                (Some(plain), Some(digest)) if input.hasher.compare(plain, digest) => Ok(()),
                _ => Err(AppError::InvalidCredentials),
            },
            LoginGate::AccountActive if !account.is_active => Err(AppError::AccountInactive),
            LoginGate::EmailVerified
                if input.resolved.source == AccountSource::Durable && !account.email_verified =>
            {
                Err(AppError::EmailUnverified)
            }
            _ => Ok(()),
        }
    }
}

fn run_gates(gates: &[LoginGate], input: &GateInput<'_>) -> AppResult<()> {
    gates.iter().try_for_each(|gate| gate.check(input))
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResult {
    pub account: AccountView,
    pub verification_sent: bool,
    /// Only populated outside production.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub token: String,
    pub account: AccountView,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthStart {
    pub auth_url: String,
    pub state: String,
}

#[derive(Debug, Clone)]
pub struct AuthenticatedAccount {
    pub resolved: ResolvedAccount,
    pub claims: SessionClaims,
}

impl AuthenticatedAccount {
    pub fn account(&self) -> &Account {
        &self.resolved.account
    }
}

pub struct AuthUseCases {
    resolver: Arc<IdentityResolver>,
    tokens: Arc<dyn TokenStore>,
    hasher: Arc<dyn PasswordHasher>,
    verification: Arc<VerificationUseCases>,
    oauth: Option<Arc<dyn OAuthProvider>>,
    jwt_secret: SecretString,
    session_ttl: Duration,
    dummy_hash: OnceCell<String>,
}

impl AuthUseCases {
    pub fn new(
        resolver: Arc<IdentityResolver>,
        tokens: Arc<dyn TokenStore>,
        hasher: Arc<dyn PasswordHasher>,
        verification: Arc<VerificationUseCases>,
        oauth: Option<Arc<dyn OAuthProvider>>,
        jwt_secret: SecretString,
        session_ttl: Duration,
    ) -> Self {
        Self {
            resolver,
            tokens,
            hasher,
            verification,
            oauth,
            jwt_secret,
            session_ttl,
            dummy_hash: OnceCell::new(),
        }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> AppResult<RegisterResult> {
        let email = normalize_email(&input.email);
        if !is_valid_email(&email) {
            return Err(AppError::InvalidInput("Invalid email address".into()));
        }
        if !is_valid_password(&input.password) {
            return Err(AppError::InvalidInput(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let phone = input
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        if let Some(phone) = &phone
            && !is_valid_phone(phone)
        {
            return Err(AppError::InvalidInput("Invalid phone number".into()));
        }
        if self.resolver.find_by_email(&email).await?.is_some() {
            return Err(AppError::InvalidInput(
                "An account with this email already exists".into(),
            ));
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email,
            password_hash: Some(self.hasher.hash(&input.password)?),
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            role: Role::Owner,
            workspace_id: new_workspace_id(),
            phone,
            avatar: None,
            is_active: true,
            email_verified: false,
            email_verified_at: None,
            phone_verified: false,
            two_factor_enabled: false,
            two_factor_secret: None,
            two_factor_backup_codes: Vec::new(),
            google_id: None,
            subscription: SubscriptionState {
                plan: Some(FREE_PLAN.to_string()),
                ..Default::default()
            },
            last_login_at: None,
            created_at: now,
        };
        self.resolver.create_durable(&account).await?;
        info!(account_id = %account.id, "Account registered");

        let dispatch = self.verification.send_verification(&account).await?;
        Ok(RegisterResult {
            account: AccountView::from(&account),
            verification_sent: dispatch.sent,
            verification_url: dispatch.verification_url,
        })
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginResult> {
        let email = normalize_email(email);
        let Some(mut resolved) = self.resolver.find_by_email(&email).await? else {
            // Same hashing cost as a real comparison.
            self.hasher.compare(password, self.dummy_hash());
            return Err(AppError::InvalidCredentials);
        };
        if resolved.account.password_hash.is_none() {
            self.hasher.compare(password, self.dummy_hash());
        }

        run_gates(
            &PASSWORD_LOGIN_GATES,
            &GateInput {
                resolved: &resolved,
                password: Some(password),
                hasher: self.hasher.as_ref(),
            },
        )?;

        self.resolver.touch_last_login(&mut resolved).await;
        self.issue_login(&resolved)
    }

    /// Resolves a bearer token to its account. Falls back to the email
    /// claim when the subject no longer resolves.
    pub async fn verify_session(&self, token: &str) -> AppResult<AuthenticatedAccount> {
        let claims = jwt::verify_session(token, &self.jwt_secret)?;
        match self.tokens.is_session_revoked(&claims.jti).await {
            Ok(false) => {}
            Ok(true) => return Err(AppError::Unauthorized),
            Err(e) => {
                warn!(error = %e, "Revocation check failed, rejecting session");
                return Err(AppError::Unauthorized);
            }
        }

        let by_id = match claims.account_id() {
            Some(id) => self.resolver.find_by_id(id).await?,
            None => None,
        };
        let resolved = match by_id {
            Some(resolved) => resolved,
            None => self
                .resolver
                .find_by_email(&claims.email)
                .await?
                .ok_or(AppError::Unauthorized)?,
        };
        if !resolved.account.is_active {
            return Err(AppError::AccountInactive);
        }
        Ok(AuthenticatedAccount { resolved, claims })
    }

    /// Revokes the token's id until it would have expired anyway.
    pub async fn logout(&self, token: &str) -> AppResult<()> {
        let claims = jwt::verify_session(token, &self.jwt_secret)?;
        let expires_at =
            DateTime::<Utc>::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
        self.tokens.revoke_session(&claims.jti, expires_at).await
    }

    pub fn start_oauth(&self) -> AppResult<OAuthStart> {
        let provider = self.oauth_provider()?;
        let state = jwt::issue_oauth_state(&self.jwt_secret)?;
        Ok(OAuthStart {
            auth_url: provider.authorization_url(&state),
            state,
        })
    }

    #[instrument(skip(self, code, state))]
    pub async fn complete_oauth(&self, code: &str, state: &str) -> AppResult<LoginResult> {
        let provider = self.oauth_provider()?;
        jwt::verify_oauth_state(state, &self.jwt_secret)?;

        let identity = provider.exchange_code(code).await?;
        if !identity.email_verified {
            return Err(AppError::InvalidInput(
                "Google account email is not verified".into(),
            ));
        }

        let mut resolved = self.resolver.find_or_create_from_oauth(&identity).await?;
        run_gates(
            &OAUTH_LOGIN_GATES,
            &GateInput {
                resolved: &resolved,
                password: None,
                hasher: self.hasher.as_ref(),
            },
        )?;

        self.resolver.touch_last_login(&mut resolved).await;
        self.issue_login(&resolved)
    }

    fn oauth_provider(&self) -> AppResult<&Arc<dyn OAuthProvider>> {
        self.oauth
            .as_ref()
            .ok_or(AppError::Configuration("Google OAuth"))
    }

    fn issue_login(&self, resolved: &ResolvedAccount) -> AppResult<LoginResult> {
        let (token, _) = jwt::issue_session(&resolved.account, &self.jwt_secret, self.session_ttl)?;
        info!(account_id = %resolved.account.id, source = resolved.source.as_str(), "Login succeeded");
        Ok(LoginResult {
            token,
            account: AccountView::from(&resolved.account),
        })
    }

    fn dummy_hash(&self) -> &str {
        self.dummy_hash.get_or_init(|| {
            self.hasher
                .hash("timing-equalization-password")
                .unwrap_or_default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::oauth_provider::AssertedIdentity;
    use crate::test_utils::{UseCaseHarness, create_test_account, google_identity};

    fn register_input(email: &str, password: &str) -> RegisterInput {
        RegisterInput {
            email: email.into(),
            password: password.into(),
            first_name: "Alice".into(),
            last_name: "Smith".into(),
            phone: None,
        }
    }

    #[tokio::test]
    async fn test_register_creates_unverified_owner_on_free_plan() {
        let h = UseCaseHarness::new();
        let result = h
            .auth
            .register(register_input("  alice@example.com ", "pass123"))
            .await
            .unwrap();

        assert_eq!(result.account.email, "alice@example.com");
        assert_eq!(result.account.role, Role::Owner);
        assert!(!result.account.is_email_verified);
        assert_eq!(result.account.subscription_plan.as_deref(), Some(FREE_PLAN));
        assert_eq!(result.account.subscription_status, None);
        assert!(result.verification_sent);
        assert!(result.verification_url.is_some());
        assert_eq!(h.notifier.emails_to("alice@example.com").len(), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_short_passwords() {
        let h = UseCaseHarness::new();
        h.auth
            .register(register_input("alice@example.com", "pass123"))
            .await
            .unwrap();

        let dup = h.auth.register(register_input("alice@example.com", "pass123")).await;
        assert!(matches!(dup, Err(AppError::InvalidInput(_))));

        let short = h.auth.register(register_input("bob@example.com", "12345")).await;
        assert!(matches!(short, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_email_matches_exactly_as_stored() {
        let h = UseCaseHarness::new();
        h.durable.insert_account(create_test_account(|a| {
            a.email = "Alice@Example.com".into();
            a.password_hash = Some("plain:secret1".into());
        }));

        assert!(h.auth.login("Alice@Example.com", "secret1").await.is_ok());
        assert!(matches!(
            h.auth.login("alice@example.com", "secret1").await,
            Err(AppError::InvalidCredentials)
        ));

        let other = h
            .auth
            .register(register_input("alice@example.com", "pass123"))
            .await
            .unwrap();
        assert_eq!(other.account.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_inactive_and_unverified_reports_inactive() {
        let h = UseCaseHarness::new();
        h.durable.insert_account(create_test_account(|a| {
            a.email = "both@example.com".into();
            a.password_hash = Some("plain:secret1".into());
            a.is_active = false;
            a.email_verified = false;
        }));

        let result = h.auth.login("both@example.com", "secret1").await;
        assert!(matches!(result, Err(AppError::AccountInactive)));
    }

    #[tokio::test]
    async fn test_gate_order_is_fixed() {
        assert_eq!(
            PASSWORD_LOGIN_GATES,
            [
                LoginGate::PasswordMatches,
                LoginGate::AccountActive,
                LoginGate::EmailVerified
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_are_indistinguishable() {
        let h = UseCaseHarness::new();
        h.durable.insert_account(create_test_account(|a| {
            a.email = "known@example.com".into();
            a.password_hash = Some("plain:right".into());
        }));

        let unknown = h.auth.login("ghost@example.com", "whatever").await.unwrap_err();
        let wrong = h.auth.login("known@example.com", "wrong").await.unwrap_err();

        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(unknown.code(), wrong.code());
    }

    #[tokio::test]
    async fn test_oauth_only_account_cannot_password_login() {
        let h = UseCaseHarness::new();
        h.durable.insert_account(create_test_account(|a| {
            a.email = "oauth@example.com".into();
            a.password_hash = None;
            a.google_id = Some("g-1".into());
        }));
        let result = h.auth.login("oauth@example.com", "anything").await;
        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_mirror_account_skips_email_verification_gate() {
        let h = UseCaseHarness::new();
        h.mirror.insert_account(create_test_account(|a| {
            a.email = "demo@test.com".into();
            a.password_hash = Some("plain:demo123".into());
            a.email_verified = false;
        }));
        let result = h.auth.login("demo@test.com", "demo123").await.unwrap();
        assert_eq!(result.account.email, "demo@test.com");
    }

    #[tokio::test]
    async fn test_login_records_last_login() {
        let h = UseCaseHarness::new();
        let account = create_test_account(|a| {
            a.password_hash = Some("plain:pw1234".into());
            a.last_login_at = None;
        });
        h.durable.insert_account(account.clone());

        h.auth.login(&account.email, "pw1234").await.unwrap();
        assert!(h.durable.get(account.id).unwrap().last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_scenario_register_verify_then_login() {
        let h = UseCaseHarness::new();
        h.auth
            .register(register_input("alice@example.com", "pass123"))
            .await
            .unwrap();

        let blocked = h.auth.login("alice@example.com", "pass123").await;
        assert!(matches!(blocked, Err(AppError::EmailUnverified)));

        let token = h.notifier.last_verification_token("alice@example.com").unwrap();
        h.verification.redeem_verification(&token).await.unwrap();

        let login = h.auth.login("alice@example.com", "pass123").await.unwrap();
        let session = h.auth.verify_session(&login.token).await.unwrap();
        assert_eq!(session.account().email, "alice@example.com");
        assert_eq!(session.account().id, login.account.id);
    }

    #[tokio::test]
    async fn test_session_falls_back_to_email_claim() {
        let h = UseCaseHarness::new();
        let stale = create_test_account(|a| a.email = "legacy@example.com".into());
        let (token, _) =
            jwt::issue_session(&stale, &h.jwt_secret, Duration::hours(1)).unwrap();

        let current = create_test_account(|a| a.email = "legacy@example.com".into());
        h.durable.insert_account(current.clone());

        let session = h.auth.verify_session(&token).await.unwrap();
        assert_eq!(session.account().id, current.id);
    }

    #[tokio::test]
    async fn test_session_for_unknown_account_is_unauthorized() {
        let h = UseCaseHarness::new();
        let ghost = create_test_account(|_| {});
        let (token, _) =
            jwt::issue_session(&ghost, &h.jwt_secret, Duration::hours(1)).unwrap();
        assert!(matches!(
            h.auth.verify_session(&token).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let h = UseCaseHarness::new();
        let account = create_test_account(|a| a.password_hash = Some("plain:pw1234".into()));
        h.durable.insert_account(account.clone());

        let login = h.auth.login(&account.email, "pw1234").await.unwrap();
        h.auth.verify_session(&login.token).await.unwrap();
        h.auth.logout(&login.token).await.unwrap();
        assert!(matches!(
            h.auth.verify_session(&login.token).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_oauth_login_issues_session() {
        let h = UseCaseHarness::new();
        h.oauth.set_identity(google_identity("gina@example.com"));

        let start = h.auth.start_oauth().unwrap();
        let login = h.auth.complete_oauth("code-1", &start.state).await.unwrap();
        let session = h.auth.verify_session(&login.token).await.unwrap();
        assert_eq!(session.account().email, "gina@example.com");
        assert!(session.account().email_verified);
    }

    #[tokio::test]
    async fn test_oauth_rejects_unverified_provider_email() {
        let h = UseCaseHarness::new();
        h.oauth.set_identity(AssertedIdentity {
            email_verified: false,
            ..google_identity("gina@example.com")
        });
        let start = h.auth.start_oauth().unwrap();
        let result = h.auth.complete_oauth("code-1", &start.state).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_oauth_rejects_forged_state() {
        let h = UseCaseHarness::new();
        h.oauth.set_identity(google_identity("gina@example.com"));
        let result = h.auth.complete_oauth("code-1", "not-a-state").await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_oauth_without_provider_is_configuration_error() {
        let h = UseCaseHarness::without_oauth();
        assert!(matches!(
            h.auth.start_oauth(),
            Err(AppError::Configuration(_))
        ));
    }
}
