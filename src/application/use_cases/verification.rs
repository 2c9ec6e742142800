use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use tracing::{info, instrument, warn};
use url::Url;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        email_templates::{password_reset_email, reset_code_sms, verification_email},
        jwt,
        ports::{notifier::Notifier, password::PasswordHasher},
        use_cases::{
            identity::{AccountSource, IdentityResolver, normalize_email},
            tokens::{RedeemOutcome, ResetCodeOutcome, TokenStore},
        },
        validators::{
            MIN_PASSWORD_LEN, is_valid_email, is_valid_password, is_valid_phone,
            is_valid_reset_code,
        },
    },
    domain::entities::account::{Account, AccountPatch, AccountView},
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationDispatch {
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_url: Option<String>,
}

/// Same shape whether or not the address belongs to an account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetEmailDispatch {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_url: Option<String>,
}

#[derive(Debug, Clone)]
pub enum VerificationOutcome {
    Verified(AccountView),
    Invalid,
    Expired,
    AccountNotFound,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatus {
    pub email: String,
    pub is_email_verified: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
}

pub struct VerificationUseCases {
    resolver: Arc<IdentityResolver>,
    tokens: Arc<dyn TokenStore>,
    notifier: Arc<dyn Notifier>,
    hasher: Arc<dyn PasswordHasher>,
    frontend_url: Url,
    expose_debug_links: bool,
    jwt_secret: SecretString,
}

impl VerificationUseCases {
    pub fn new(
        resolver: Arc<IdentityResolver>,
        tokens: Arc<dyn TokenStore>,
        notifier: Arc<dyn Notifier>,
        hasher: Arc<dyn PasswordHasher>,
        frontend_url: Url,
        expose_debug_links: bool,
        jwt_secret: SecretString,
    ) -> Self {
        Self {
            resolver,
            tokens,
            notifier,
            hasher,
            frontend_url,
            expose_debug_links,
            jwt_secret,
        }
    }

    fn frontend_link(&self, path: &str, token: &str) -> String {
        let mut url = self.frontend_url.clone();
        url.set_path(path);
        url.query_pairs_mut().append_pair("token", token);
        url.to_string()
    }

    // ========================================================================
    // Email verification
    // ========================================================================

    #[instrument(skip(self, account), fields(account_id = %account.id))]
    pub async fn send_verification(&self, account: &Account) -> AppResult<VerificationDispatch> {
        let token = self
            .tokens
            .issue_verification_token(account.id, &account.email)
            .await?;
        let url = self.frontend_link("/verify-email", &token);
        let (subject, html) =
            verification_email(self.frontend_url.as_str(), &account.first_name, &url);

        let sent = self.notifier.send_email(&account.email, &subject, &html).await;
        if !sent {
            warn!("Verification email was not delivered");
        }
        if self.expose_debug_links {
            info!(verification_url = %url, "Verification link issued");
        }

        Ok(VerificationDispatch {
            sent,
            verification_url: self.expose_debug_links.then_some(url),
        })
    }

    #[instrument(skip(self, token))]
    pub async fn redeem_verification(&self, token: &str) -> AppResult<VerificationOutcome> {
        let record = match self.tokens.redeem_verification_token(token).await {
            Ok(RedeemOutcome::Redeemed(record)) => record,
            Ok(RedeemOutcome::NotFound) => return Ok(VerificationOutcome::Invalid),
            Ok(RedeemOutcome::Expired) => return Ok(VerificationOutcome::Expired),
            Err(e) => {
                warn!(error = %e, "Verification token lookup failed");
                return Ok(VerificationOutcome::Invalid);
            }
        };

        let Some(resolved) = self.resolver.find_by_id(record.account_id).await? else {
            warn!(account_id = %record.account_id, "Verified token for missing account");
            return Ok(VerificationOutcome::AccountNotFound);
        };
        let patch = AccountPatch {
            email_verified: Some(true),
            email_verified_at: Some(Some(Utc::now())),
            ..Default::default()
        };
        let account = self.resolver.update(&resolved, &patch).await?;
        info!(account_id = %account.id, "Email verified");
        Ok(VerificationOutcome::Verified(AccountView::from(&account)))
    }

    /// Same response whether or not the address is registered or already
    /// verified. Only durable, unverified accounts get a new email.
    #[instrument(skip(self))]
    pub async fn resend_verification(&self, email: &str) -> AppResult<VerificationDispatch> {
        let email = normalize_email(email);
        let generic = VerificationDispatch {
            sent: true,
            verification_url: None,
        };
        match self.resolver.find_by_email(&email).await {
            Ok(Some(resolved))
                if resolved.source == AccountSource::Durable && !resolved.account.email_verified =>
            {
                let dispatch = self.send_verification(&resolved.account).await?;
                Ok(VerificationDispatch {
                    sent: true,
                    verification_url: dispatch.verification_url,
                })
            }
            Ok(_) => Ok(generic),
            Err(e) => {
                warn!(error = %e, "Lookup failed during verification resend");
                Ok(generic)
            }
        }
    }

    pub fn verification_status(&self, account: &Account) -> VerificationStatus {
        VerificationStatus {
            email: account.email.clone(),
            is_email_verified: account.email_verified,
            email_verified_at: account.email_verified_at,
        }
    }

    // ========================================================================
    // Phone-based password reset
    // ========================================================================

    /// Unknown phones, lookup failures and undelivered SMS all produce the
    /// same `ResetRequestFailed`.
    #[instrument(skip(self, phone))]
    pub async fn request_reset(&self, phone: &str) -> AppResult<()> {
        let phone = phone.trim();
        if !is_valid_phone(phone) {
            return Err(AppError::ResetRequestFailed);
        }
        let resolved = match self.resolver.find_by_phone(phone).await {
            Ok(Some(resolved)) => resolved,
            Ok(None) => return Err(AppError::ResetRequestFailed),
            Err(e) => {
                warn!(error = %e, "Lookup failed during reset request");
                return Err(AppError::ResetRequestFailed);
            }
        };

        let code = self
            .tokens
            .issue_reset_code(phone, resolved.account.id)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to store reset code");
                AppError::ResetRequestFailed
            })?;

        if !self.notifier.send_sms(phone, &reset_code_sms(&code)).await {
            warn!(account_id = %resolved.account.id, "Reset code SMS was not delivered");
            return Err(AppError::ResetRequestFailed);
        }
        info!(account_id = %resolved.account.id, "Reset code sent");
        Ok(())
    }

    /// Exchanges a correct code for a 15-minute reset token.
    #[instrument(skip(self, phone, code))]
    pub async fn verify_reset_code(&self, phone: &str, code: &str) -> AppResult<String> {
        let phone = phone.trim();
        let code = code.trim();
        if !is_valid_reset_code(code) {
            return Err(AppError::TokenInvalidOrExpired);
        }
        match self.tokens.verify_reset_code(phone, code).await {
            Ok(ResetCodeOutcome::Verified(account_id)) => {
                jwt::issue_reset(account_id, &self.jwt_secret, jwt::reset_token_ttl())
            }
            Ok(_) => Err(AppError::TokenInvalidOrExpired),
            Err(e) => {
                warn!(error = %e, "Reset code lookup failed");
                Err(AppError::TokenInvalidOrExpired)
            }
        }
    }

    // ========================================================================
    // Email-link password reset
    // ========================================================================

    /// Mails a 10-minute reset link. Unknown addresses, lookup failures and
    /// undelivered mail all get the same accepted response.
    #[instrument(skip(self))]
    pub async fn request_email_reset(&self, email: &str) -> AppResult<ResetEmailDispatch> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AppError::InvalidInput("Invalid email address".into()));
        }
        let generic = ResetEmailDispatch {
            accepted: true,
            reset_url: None,
        };
        let account = match self.resolver.find_by_email(&email).await {
            Ok(Some(resolved)) => resolved.account,
            Ok(None) => return Ok(generic),
            Err(e) => {
                warn!(error = %e, "Lookup failed during email reset request");
                return Ok(generic);
            }
        };

        let token = jwt::issue_reset(account.id, &self.jwt_secret, jwt::email_reset_token_ttl())?;
        let url = self.frontend_link("/auth/reset-password", &token);
        let (subject, html) =
            password_reset_email(self.frontend_url.as_str(), &account.first_name, &url);
        if self.notifier.send_email(&account.email, &subject, &html).await {
            info!(account_id = %account.id, "Reset link sent");
        } else {
            warn!(account_id = %account.id, "Reset link email was not delivered");
        }

        Ok(ResetEmailDispatch {
            accepted: true,
            reset_url: self.expose_debug_links.then_some(url),
        })
    }

    /// Updates every store holding the account, since either may answer
    /// the next login.
    #[instrument(skip(self, reset_token, new_password))]
    pub async fn apply_reset(&self, reset_token: &str, new_password: &str) -> AppResult<()> {
        let account_id = jwt::verify_reset(reset_token, &self.jwt_secret)?;
        if !is_valid_password(new_password) {
            return Err(AppError::InvalidInput(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let patch = AccountPatch {
            password_hash: Some(self.hasher.hash(new_password)?),
            ..Default::default()
        };
        let updated = self.resolver.update_everywhere(account_id, &patch).await?;
        if updated == 0 {
            return Err(AppError::TokenInvalidOrExpired);
        }
        info!(account_id = %account_id, stores = updated, "Password reset applied");
        Ok(())
    }
}
