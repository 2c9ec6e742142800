//! Identity resolution across the account mirror and the durable store.
//!
//! Lookups walk an ordered chain of repositories (mirror first, then
//! durable) and report which store answered, so callers can apply
//! source-specific rules and write updates back to the owning store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::oauth_provider::AssertedIdentity,
    domain::entities::{
        account::{Account, AccountPatch, SubscriptionState},
        plan::{ELEVATED_PLAN, FREE_PLAN},
        role::Role,
    },
};

/// Workspace assigned to the reserved super-admin address.
pub const SUPER_ADMIN_WORKSPACE: &str = "super_admin_workspace";

#[async_trait]
pub trait AccountRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>>;
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>>;
    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<Account>>;
    async fn insert(&self, account: &Account) -> AppResult<()>;
    /// Applies only the fields named in `patch`. Returns the updated record,
    /// or `None` if no record has this id.
    async fn update_fields(&self, id: Uuid, patch: &AccountPatch) -> AppResult<Option<Account>>;
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountSource {
    Mirror,
    Durable,
}

impl AccountSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountSource::Mirror => "mirror",
            AccountSource::Durable => "durable",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAccount {
    pub account: Account,
    pub source: AccountSource,
}

#[derive(Clone, Copy)]
enum Lookup<'a> {
    Email(&'a str),
    Id(Uuid),
    Phone(&'a str),
}

impl Lookup<'_> {
    async fn run(&self, repo: &dyn AccountRepo) -> AppResult<Option<Account>> {
        match *self {
            Lookup::Email(email) => repo.find_by_email(email).await,
            Lookup::Id(id) => repo.find_by_id(id).await,
            Lookup::Phone(phone) => repo.find_by_phone(phone).await,
        }
    }
}

/// Emails match exactly as stored; only surrounding whitespace is dropped.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_string()
}

pub fn new_workspace_id() -> String {
    format!("ws_{}", Uuid::new_v4().simple())
}

pub struct IdentityResolver {
    chain: Vec<(AccountSource, Arc<dyn AccountRepo>)>,
    super_admin_email: String,
}

impl IdentityResolver {
    pub fn new(
        mirror: Arc<dyn AccountRepo>,
        durable: Arc<dyn AccountRepo>,
        super_admin_email: &str,
    ) -> Self {
        Self {
            chain: vec![
                (AccountSource::Mirror, mirror),
                (AccountSource::Durable, durable),
            ],
            super_admin_email: normalize_email(super_admin_email),
        }
    }

    pub fn is_super_admin(&self, email: &str) -> bool {
        normalize_email(email) == self.super_admin_email
    }

    fn repo(&self, source: AccountSource) -> AppResult<&Arc<dyn AccountRepo>> {
        self.chain
            .iter()
            .find(|(s, _)| *s == source)
            .map(|(_, repo)| repo)
            .ok_or_else(|| AppError::Internal(format!("no {} store", source.as_str())))
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<ResolvedAccount>> {
        self.resolve(Lookup::Email(email)).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<ResolvedAccount>> {
        self.resolve(Lookup::Id(id)).await
    }

    pub async fn find_by_phone(&self, phone: &str) -> AppResult<Option<ResolvedAccount>> {
        self.resolve(Lookup::Phone(phone)).await
    }

    /// First hit along the chain wins. A store failure only becomes an error
    /// when no later store answers, since a miss there could be wrong.
    async fn resolve(&self, key: Lookup<'_>) -> AppResult<Option<ResolvedAccount>> {
        let mut failure: Option<AppError> = None;
        for (source, repo) in &self.chain {
            match key.run(repo.as_ref()).await {
                Ok(Some(account)) => {
                    return Ok(Some(ResolvedAccount {
                        account,
                        source: *source,
                    }));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(source = source.as_str(), error = %e, "Account lookup failed");
                    failure = Some(e);
                }
            }
        }
        match failure {
            Some(e) => Err(AppError::Upstream(e.to_string())),
            None => Ok(None),
        }
    }

    pub async fn create_durable(&self, account: &Account) -> AppResult<()> {
        if !account.has_credential() {
            return Err(AppError::InvalidInput(
                "Account needs a password or a linked provider".into(),
            ));
        }
        self.repo(AccountSource::Durable)?.insert(account).await
    }

    /// Writes `patch` to the store that owns the record.
    pub async fn update(&self, resolved: &ResolvedAccount, patch: &AccountPatch) -> AppResult<Account> {
        self.repo(resolved.source)?
            .update_fields(resolved.account.id, patch)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Writes `patch` to every store holding this id and returns how many
    /// did. Used where either copy may answer the next login.
    ///
    /// A failing store is skipped once another store has taken the write;
    /// the call only fails when nothing was updated.
    pub async fn update_everywhere(&self, id: Uuid, patch: &AccountPatch) -> AppResult<usize> {
        let mut updated = 0;
        let mut failure = None;
        for (source, repo) in &self.chain {
            match repo.update_fields(id, patch).await {
                Ok(Some(_)) => updated += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!(source = source.as_str(), account_id = %id, error = %e, "Account update failed");
                    failure = Some(e);
                }
            }
        }
        match failure {
            Some(e) if updated == 0 => Err(e),
            _ => Ok(updated),
        }
    }

    /// Same failure rule as `update_everywhere`.
    pub async fn delete_everywhere(&self, id: Uuid) -> AppResult<bool> {
        let mut deleted = false;
        let mut failure = None;
        for (source, repo) in &self.chain {
            match repo.delete(id).await {
                Ok(hit) => deleted |= hit,
                Err(e) => {
                    warn!(source = source.as_str(), account_id = %id, error = %e, "Account delete failed");
                    failure = Some(e);
                }
            }
        }
        match failure {
            Some(e) if !deleted => Err(e),
            _ => Ok(deleted),
        }
    }

    /// Best-effort: a failed write is logged and never fails the login.
    pub async fn touch_last_login(&self, resolved: &mut ResolvedAccount) {
        let patch = AccountPatch {
            last_login_at: Some(Utc::now()),
            ..Default::default()
        };
        match self.update(resolved, &patch).await {
            Ok(account) => resolved.account = account,
            Err(e) => {
                warn!(account_id = %resolved.account.id, error = %e, "Failed to record last login");
                patch.apply_to(&mut resolved.account);
            }
        }
    }

    /// Returns the account for an OAuth-asserted identity, creating it if
    /// needed. The stable id is assigned once; later calls for the same
    /// email find it again in whichever store accepted the record.
    ///
    /// A new account only lands in the mirror when the durable store could
    /// not be shown to hold a record for the email, so a transient lookup
    /// failure never shadows an existing durable account with a second id.
    #[instrument(skip(self, identity), fields(email = %identity.email))]
    pub async fn find_or_create_from_oauth(
        &self,
        identity: &AssertedIdentity,
    ) -> AppResult<ResolvedAccount> {
        let email = normalize_email(&identity.email);
        let elevated = self.is_super_admin(&email);
        let mirror = self.repo(AccountSource::Mirror)?;
        let durable = self.repo(AccountSource::Durable)?;

        if let Some(existing) = mirror.find_by_email(&email).await? {
            let patch = self.oauth_merge_patch(&existing, identity, elevated);
            let account = if patch.is_empty() {
                existing
            } else {
                mirror
                    .update_fields(existing.id, &patch)
                    .await?
                    .unwrap_or(existing)
            };
            return Ok(ResolvedAccount {
                account,
                source: AccountSource::Mirror,
            });
        }

        match durable.find_by_email(&email).await {
            Ok(Some(existing)) => {
                return Ok(self.link_durable(durable, existing, identity, elevated).await);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Durable lookup failed during OAuth login");
            }
        }

        let account = self.new_oauth_account(&email, identity, elevated);
        let Err(insert_error) = durable.insert(&account).await else {
            return Ok(ResolvedAccount {
                account,
                source: AccountSource::Durable,
            });
        };

        // The insert may have failed because the record already exists.
        match durable.find_by_email(&email).await {
            Ok(Some(existing)) => {
                return Ok(self.link_durable(durable, existing, identity, elevated).await);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Durable re-read failed during OAuth login"),
        }
        // A unique violation means a durable record holds this email; a
        // mirror account would shadow it under a second id.
        if matches!(insert_error, AppError::InvalidInput(_)) {
            return Err(AppError::Upstream(
                "durable account exists but could not be read".into(),
            ));
        }

        warn!(account_id = %account.id, error = %insert_error, "Durable insert failed, keeping OAuth account in mirror");
        match mirror.insert(&account).await {
            Ok(()) => Ok(ResolvedAccount {
                account,
                source: AccountSource::Mirror,
            }),
            // Lost a race with a concurrent fallback for the same email.
            Err(AppError::InvalidInput(_)) => mirror
                .find_by_email(&email)
                .await?
                .map(|account| ResolvedAccount {
                    account,
                    source: AccountSource::Mirror,
                })
                .ok_or(AppError::NotFound),
            Err(e) => Err(e),
        }
    }

    async fn link_durable(
        &self,
        durable: &Arc<dyn AccountRepo>,
        mut existing: Account,
        identity: &AssertedIdentity,
        elevated: bool,
    ) -> ResolvedAccount {
        let patch = self.oauth_merge_patch(&existing, identity, elevated);
        if !patch.is_empty() {
            match durable.update_fields(existing.id, &patch).await {
                Ok(Some(updated)) => existing = updated,
                Ok(None) => patch.apply_to(&mut existing),
                Err(e) => {
                    warn!(account_id = %existing.id, error = %e, "Failed to persist OAuth account merge");
                    patch.apply_to(&mut existing);
                }
            }
        }
        ResolvedAccount {
            account: existing,
            source: AccountSource::Durable,
        }
    }

    fn oauth_merge_patch(
        &self,
        existing: &Account,
        identity: &AssertedIdentity,
        elevated: bool,
    ) -> AccountPatch {
        let mut patch = AccountPatch::default();
        if existing.google_id.is_none() {
            patch.google_id = Some(identity.provider_id.clone());
        }
        if !existing.email_verified {
            patch.email_verified = Some(true);
            patch.email_verified_at = Some(Some(Utc::now()));
        }
        if existing.avatar.is_none() && identity.avatar.is_some() {
            patch.avatar = Some(identity.avatar.clone());
        }
        if elevated {
            elevate(existing, &mut patch);
        }
        patch
    }

    fn new_oauth_account(&self, email: &str, identity: &AssertedIdentity, elevated: bool) -> Account {
        let now = Utc::now();
        let (workspace_id, plan) = if elevated {
            (SUPER_ADMIN_WORKSPACE.to_string(), ELEVATED_PLAN)
        } else {
            (new_workspace_id(), FREE_PLAN)
        };
        Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: None,
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            role: Role::Owner,
            workspace_id,
            phone: None,
            avatar: identity.avatar.clone(),
            is_active: true,
            email_verified: true,
            email_verified_at: Some(now),
            phone_verified: false,
            two_factor_enabled: false,
            two_factor_secret: None,
            two_factor_backup_codes: Vec::new(),
            google_id: Some(identity.provider_id.clone()),
            subscription: SubscriptionState {
                plan: Some(plan.to_string()),
                ..Default::default()
            },
            last_login_at: None,
            created_at: now,
        }
    }
}

/// Role, plan and workspace forced onto the super-admin account. The
/// subscription status is left alone.
fn elevate(existing: &Account, patch: &mut AccountPatch) {
    if existing.role != Role::Owner {
        patch.role = Some(Role::Owner);
    }
    if existing.subscription.plan.as_deref() != Some(ELEVATED_PLAN) {
        patch.subscription_plan = Some(ELEVATED_PLAN.to_string());
    }
    if existing.workspace_id != SUPER_ADMIN_WORKSPACE {
        patch.workspace_id = Some(SUPER_ADMIN_WORKSPACE.to_string());
    }
}
