use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::password::PasswordHasher,
        two_factor,
        use_cases::identity::{IdentityResolver, ResolvedAccount},
        validators::{MIN_PASSWORD_LEN, is_valid_password, is_valid_phone},
    },
    domain::entities::{
        account::{Account, AccountPatch, AccountView},
        role::Role,
    },
};

/// Self-service profile fields. `None` leaves a field as it is; an empty
/// phone or avatar clears it.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorSetup {
    pub secret: String,
    pub otpauth_url: String,
}

pub struct AccountUseCases {
    resolver: Arc<IdentityResolver>,
    hasher: Arc<dyn PasswordHasher>,
}

impl AccountUseCases {
    pub fn new(resolver: Arc<IdentityResolver>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { resolver, hasher }
    }

    #[instrument(skip_all, fields(account_id = %resolved.account.id))]
    pub async fn change_password(
        &self,
        resolved: &ResolvedAccount,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        if !is_valid_password(new_password) {
            return Err(AppError::InvalidInput(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        self.check_password(resolved, current_password, false)?;

        let patch = AccountPatch {
            password_hash: Some(self.hasher.hash(new_password)?),
            ..Default::default()
        };
        self.resolver.update(resolved, &patch).await?;
        info!("Password changed");
        Ok(())
    }

    #[instrument(skip_all, fields(account_id = %resolved.account.id))]
    pub async fn update_profile(
        &self,
        resolved: &ResolvedAccount,
        update: ProfileUpdate,
    ) -> AppResult<AccountView> {
        let phone = match update.phone.map(|p| p.trim().to_string()) {
            Some(p) if p.is_empty() => Some(None),
            Some(p) if !is_valid_phone(&p) => {
                return Err(AppError::InvalidInput("Invalid phone number".into()));
            }
            Some(p) => Some(Some(p)),
            None => None,
        };
        let avatar = update
            .avatar
            .map(|a| Some(a.trim().to_string()).filter(|a| !a.is_empty()));
        let patch = AccountPatch {
            first_name: update.first_name.map(|n| n.trim().to_string()),
            last_name: update.last_name.map(|n| n.trim().to_string()),
            phone,
            avatar,
            ..Default::default()
        };
        if patch.is_empty() {
            return Ok(AccountView::from(&resolved.account));
        }

        let updated = self.resolver.update(resolved, &patch).await?;
        info!("Profile updated");
        Ok(AccountView::from(&updated))
    }

    // ========================================================================
    // Two-factor authentication
    // ========================================================================

    /// Stores a pending secret. Two-factor stays off until a code from the
    /// authenticator app is confirmed.
    #[instrument(skip_all, fields(account_id = %resolved.account.id))]
    pub async fn setup_two_factor(&self, resolved: &ResolvedAccount) -> AppResult<TwoFactorSetup> {
        if resolved.account.two_factor_enabled {
            return Err(AppError::InvalidInput(
                "Two-factor authentication is already enabled".into(),
            ));
        }
        let enrollment = two_factor::enroll(&resolved.account.email)?;
        let patch = AccountPatch {
            two_factor_secret: Some(Some(enrollment.secret.clone())),
            ..Default::default()
        };
        self.resolver.update(resolved, &patch).await?;
        Ok(TwoFactorSetup {
            secret: enrollment.secret,
            otpauth_url: enrollment.otpauth_url,
        })
    }

    /// Enables two-factor and returns the first set of backup codes.
    #[instrument(skip_all, fields(account_id = %resolved.account.id))]
    pub async fn confirm_two_factor(
        &self,
        resolved: &ResolvedAccount,
        code: &str,
    ) -> AppResult<Vec<String>> {
        let account = &resolved.account;
        if account.two_factor_enabled {
            return Err(AppError::InvalidInput(
                "Two-factor authentication is already enabled".into(),
            ));
        }
        let secret = account.two_factor_secret.as_deref().ok_or_else(|| {
            AppError::InvalidInput("Start two-factor setup before confirming it".into())
        })?;
        if !two_factor::code_matches(secret, &account.email, code, Utc::now())? {
            return Err(invalid_code());
        }

        let codes = two_factor::backup_codes();
        let patch = AccountPatch {
            two_factor_enabled: Some(true),
            two_factor_backup_codes: Some(codes.clone()),
            ..Default::default()
        };
        self.resolver.update(resolved, &patch).await?;
        info!("Two-factor enabled");
        Ok(codes)
    }

    /// Needs the password (when the account has one) and a current code.
    #[instrument(skip_all, fields(account_id = %resolved.account.id))]
    pub async fn disable_two_factor(
        &self,
        resolved: &ResolvedAccount,
        password: &str,
        code: &str,
    ) -> AppResult<()> {
        self.require_enabled(resolved)?;
        self.check_password(resolved, password, true)?;
        if self.match_second_factor(resolved, code)?.is_none() {
            return Err(invalid_code());
        }

        let patch = AccountPatch {
            two_factor_enabled: Some(false),
            two_factor_secret: Some(None),
            two_factor_backup_codes: Some(Vec::new()),
            ..Default::default()
        };
        self.resolver.update(resolved, &patch).await?;
        info!("Two-factor disabled");
        Ok(())
    }

    /// Accepts an authenticator code or an unused backup code. A backup code
    /// is consumed by a successful check.
    #[instrument(skip_all, fields(account_id = %resolved.account.id))]
    pub async fn verify_two_factor(&self, resolved: &ResolvedAccount, code: &str) -> AppResult<()> {
        self.require_enabled(resolved)?;
        match self.match_second_factor(resolved, code)? {
            None => Err(invalid_code()),
            Some(SecondFactor::Authenticator) => Ok(()),
            Some(SecondFactor::Backup(remaining)) => {
                let left = remaining.len();
                let patch = AccountPatch {
                    two_factor_backup_codes: Some(remaining),
                    ..Default::default()
                };
                self.resolver.update(resolved, &patch).await?;
                info!(backup_codes_left = left, "Backup code redeemed");
                Ok(())
            }
        }
    }

    pub fn backup_codes(&self, resolved: &ResolvedAccount) -> AppResult<Vec<String>> {
        self.require_enabled(resolved)?;
        Ok(resolved.account.two_factor_backup_codes.clone())
    }

    /// Replaces every backup code, used or not.
    #[instrument(skip_all, fields(account_id = %resolved.account.id))]
    pub async fn regenerate_backup_codes(
        &self,
        resolved: &ResolvedAccount,
        password: &str,
    ) -> AppResult<Vec<String>> {
        self.require_enabled(resolved)?;
        self.check_password(resolved, password, true)?;

        let codes = two_factor::backup_codes();
        let patch = AccountPatch {
            two_factor_backup_codes: Some(codes.clone()),
            ..Default::default()
        };
        self.resolver.update(resolved, &patch).await?;
        info!("Backup codes regenerated");
        Ok(codes)
    }

    fn require_enabled(&self, resolved: &ResolvedAccount) -> AppResult<()> {
        if resolved.account.two_factor_enabled {
            Ok(())
        } else {
            Err(AppError::InvalidInput(
                "Two-factor authentication is not enabled".into(),
            ))
        }
    }

    /// Passwordless accounts pass when `allow_passwordless` is set; they
    /// have nothing else to prove.
    fn check_password(
        &self,
        resolved: &ResolvedAccount,
        password: &str,
        allow_passwordless: bool,
    ) -> AppResult<()> {
        match resolved.account.password_hash.as_deref() {
            Some(digest) if self.hasher.compare(password, digest) => Ok(()),
            None if allow_passwordless => Ok(()),
            _ => Err(AppError::InvalidCredentials),
        }
    }

    fn match_second_factor(
        &self,
        resolved: &ResolvedAccount,
        code: &str,
    ) -> AppResult<Option<SecondFactor>> {
        let account = &resolved.account;
        if let Some(secret) = account.two_factor_secret.as_deref() {
            if two_factor::code_matches(secret, &account.email, code, Utc::now())? {
                return Ok(Some(SecondFactor::Authenticator));
            }
        }
        Ok(two_factor::redeem_backup_code(&account.two_factor_backup_codes, code)
            .map(SecondFactor::Backup))
    }

    /// Suspends or reactivates `target_id`. Suspended accounts fail every
    /// login and session check with `AccountInactive`.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn set_active(
        &self,
        actor: &Account,
        target_id: Uuid,
        active: bool,
    ) -> AppResult<AccountView> {
        let target = self.load_managed(actor, target_id).await?;
        if !active && target.account.id == actor.id {
            return Err(AppError::Forbidden);
        }

        let patch = AccountPatch {
            is_active: Some(active),
            ..Default::default()
        };
        let updated = self.resolver.update(&target, &patch).await?;
        info!(target_id = %updated.id, active, "Account activation changed");
        Ok(AccountView::from(&updated))
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn delete_account(&self, actor: &Account, target_id: Uuid) -> AppResult<()> {
        let target = self.load_managed(actor, target_id).await?;
        if target.account.role == Role::Owner || self.resolver.is_super_admin(&target.account.email)
        {
            return Err(AppError::Forbidden);
        }

        if !self.resolver.delete_everywhere(target_id).await? {
            return Err(AppError::NotFound);
        }
        info!(target_id = %target_id, "Account deleted");
        Ok(())
    }

    /// Loads the target and checks that `actor` may manage it.
    async fn load_managed(&self, actor: &Account, target_id: Uuid) -> AppResult<ResolvedAccount> {
        let actor_is_root = self.resolver.is_super_admin(&actor.email);
        if !actor_is_root && !actor.role.can_administer() {
            return Err(AppError::Forbidden);
        }

        let target = self
            .resolver
            .find_by_id(target_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !actor_is_root && target.account.workspace_id != actor.workspace_id {
            // Other workspaces are invisible to the actor.
            return Err(AppError::NotFound);
        }
        Ok(target)
    }
}

enum SecondFactor {
    Authenticator,
    /// Carries the codes left after redemption.
    Backup(Vec<String>),
}

fn invalid_code() -> AppError {
    AppError::InvalidInput("Invalid verification code".into())
}
