//! In-memory account stores for testing.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::identity::AccountRepo,
    domain::entities::account::{Account, AccountPatch},
};

// ============================================================================
// InMemoryAccountRepo
// ============================================================================

/// Map-backed `AccountRepo`. Emails match exactly, like the Postgres
/// store's `UNIQUE(email)` constraint.
#[derive(Default)]
pub struct InMemoryAccountRepo {
    pub accounts: Mutex<HashMap<Uuid, Account>>,
}

impl InMemoryAccountRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        let map: HashMap<Uuid, Account> = accounts.into_iter().map(|a| (a.id, a)).collect();
        Self {
            accounts: Mutex::new(map),
        }
    }

    /// Inserts or replaces, bypassing the uniqueness check.
    pub fn insert_account(&self, account: Account) {
        self.accounts.lock().unwrap().insert(account.id, account);
    }

    pub fn get(&self, id: Uuid) -> Option<Account> {
        self.accounts.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }
}

#[async_trait]
impl AccountRepo for InMemoryAccountRepo {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        Ok(self.get(id))
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<Account>> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .values()
            .find(|a| a.phone.as_deref() == Some(phone))
            .cloned())
    }

    async fn insert(&self, account: &Account) -> AppResult<()> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts
            .values()
            .any(|a| a.email == account.email)
        {
            return Err(AppError::InvalidInput("Email already registered".into()));
        }
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn update_fields(&self, id: Uuid, patch: &AccountPatch) -> AppResult<Option<Account>> {
        let mut accounts = self.accounts.lock().unwrap();
        Ok(accounts.get_mut(&id).map(|account| {
            patch.apply_to(account);
            account.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.accounts.lock().unwrap().remove(&id).is_some())
    }
}

// ============================================================================
// FailingAccountRepo
// ============================================================================

/// Every call fails as if the database were unreachable.
pub struct FailingAccountRepo;

fn offline<T>() -> AppResult<T> {
    Err(AppError::Database("connection refused".into()))
}

#[async_trait]
impl AccountRepo for FailingAccountRepo {
    async fn find_by_email(&self, _email: &str) -> AppResult<Option<Account>> {
        offline()
    }

    async fn find_by_id(&self, _id: Uuid) -> AppResult<Option<Account>> {
        offline()
    }

    async fn find_by_phone(&self, _phone: &str) -> AppResult<Option<Account>> {
        offline()
    }

    async fn insert(&self, _account: &Account) -> AppResult<()> {
        offline()
    }

    async fn update_fields(&self, _id: Uuid, _patch: &AccountPatch) -> AppResult<Option<Account>> {
        offline()
    }

    async fn delete(&self, _id: Uuid) -> AppResult<bool> {
        offline()
    }
}

// ============================================================================
// FlakyAccountRepo
// ============================================================================

/// Wraps an `InMemoryAccountRepo`; the first `n` email lookups time out.
pub struct FlakyAccountRepo {
    pub inner: InMemoryAccountRepo,
    email_failures: AtomicUsize,
}

impl FlakyAccountRepo {
    pub fn failing_email_lookups(inner: InMemoryAccountRepo, n: usize) -> Self {
        Self {
            inner,
            email_failures: AtomicUsize::new(n),
        }
    }
}

#[async_trait]
impl AccountRepo for FlakyAccountRepo {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let fail = self
            .email_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(AppError::Database("statement timeout".into()));
        }
        self.inner.find_by_email(email).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<Account>> {
        self.inner.find_by_phone(phone).await
    }

    async fn insert(&self, account: &Account) -> AppResult<()> {
        self.inner.insert(account).await
    }

    async fn update_fields(&self, id: Uuid, patch: &AccountPatch) -> AppResult<Option<Account>> {
        self.inner.update_fields(id, patch).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        self.inner.delete(id).await
    }
}
