//! Process-local account registry.
//!
//! Holds the always-available demo account and OAuth accounts the durable
//! store could not accept. Contents are lost on restart.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use tracing::info;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{ports::password::PasswordHasher, use_cases::identity::AccountRepo},
    domain::entities::{
        account::{Account, AccountPatch, SubscriptionState},
        plan::FREE_PLAN,
        role::Role,
    },
};

pub const DEMO_EMAIL: &str = "demo@test.com";
pub const DEMO_PASSWORD: &str = "demo123";
pub const DEMO_PHONE: &str = "+1234567890";
pub const DEMO_WORKSPACE: &str = "demo_workspace_1";
/// Stable across restarts so issued sessions keep resolving.
pub const DEMO_ACCOUNT_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0001);

/// Lock order is `emails` then `accounts`.
#[derive(Default)]
pub struct AccountMirror {
    accounts: DashMap<Uuid, Account>,
    /// Claimed before a record is stored, so one email maps to one id.
    emails: DashMap<String, Uuid>,
}

impl AccountMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_demo_account(&self, hasher: &dyn PasswordHasher) -> AppResult<()> {
        if self.accounts.contains_key(&DEMO_ACCOUNT_ID) {
            return Ok(());
        }
        let account = Account {
            id: DEMO_ACCOUNT_ID,
            email: DEMO_EMAIL.to_string(),
            password_hash: Some(hasher.hash(DEMO_PASSWORD)?),
            first_name: "Demo".to_string(),
            last_name: "User".to_string(),
            role: Role::Owner,
            workspace_id: DEMO_WORKSPACE.to_string(),
            phone: Some(DEMO_PHONE.to_string()),
            avatar: None,
            is_active: true,
            email_verified: true,
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
            created_at: Utc::now(),
        };
        self.claim(account)?;
        info!(email = DEMO_EMAIL, "Demo account seeded");
        Ok(())
    }

    fn claim(&self, account: Account) -> AppResult<()> {
        if !account.has_credential() {
            return Err(AppError::InvalidInput(
                "Account needs a password or a linked provider".into(),
            ));
        }
        match self.emails.entry(account.email.clone()) {
            Entry::Occupied(_) => Err(AppError::InvalidInput("Email already registered".into())),
            Entry::Vacant(slot) => {
                slot.insert(account.id);
                self.accounts.insert(account.id, account);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountRepo for AccountMirror {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let Some(id) = self.emails.get(email).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.accounts.get(&id).map(|a| a.value().clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        Ok(self.accounts.get(&id).map(|a| a.value().clone()))
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<Account>> {
        Ok(self
            .accounts
            .iter()
            .find(|a| a.phone.as_deref() == Some(phone))
            .map(|a| a.value().clone()))
    }

    async fn insert(&self, account: &Account) -> AppResult<()> {
        self.claim(account.clone())
    }

    async fn update_fields(&self, id: Uuid, patch: &AccountPatch) -> AppResult<Option<Account>> {
        Ok(self.accounts.get_mut(&id).map(|mut account| {
            patch.apply_to(&mut account);
            account.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let Some((_, account)) = self.accounts.remove(&id) else {
            return Ok(false);
        };
        self.emails.remove_if(&account.email, |_, owner| *owner == id);
        Ok(true)
    }
}
