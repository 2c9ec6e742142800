use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::identity::AccountRepo,
    domain::entities::{
        account::{Account, AccountPatch, SubscriptionState},
        role::Role,
        subscription_status::SubscriptionStatus,
    },
};

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, \
    workspace_id, phone, avatar, is_active, email_verified, email_verified_at, phone_verified, \
    two_factor_enabled, two_factor_secret, two_factor_backup_codes, google_id, stripe_customer_id, \
    stripe_subscription_id, subscription_plan, subscription_status, trial_ends_at, \
    current_period_end, last_login_at, created_at";

// Account as stored in the db.
#[derive(sqlx::FromRow, Debug)]
struct AccountRow {
    id: Uuid,
    email: String,
    password_hash: Option<String>,
    first_name: String,
    last_name: String,
    role: String,
    workspace_id: String,
    phone: Option<String>,
    avatar: Option<String>,
    is_active: bool,
    email_verified: bool,
    email_verified_at: Option<DateTime<Utc>>,
    phone_verified: bool,
    two_factor_enabled: bool,
    two_factor_secret: Option<String>,
    two_factor_backup_codes: Vec<String>,
    google_id: Option<String>,
    stripe_customer_id: Option<String>,
    stripe_subscription_id: Option<String>,
    subscription_plan: Option<String>,
    subscription_status: Option<String>,
    trial_ends_at: Option<DateTime<Utc>>,
    current_period_end: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            role: Role::from_stored(&row.role),
            workspace_id: row.workspace_id,
            phone: row.phone,
            avatar: row.avatar,
            is_active: row.is_active,
            email_verified: row.email_verified,
            email_verified_at: row.email_verified_at,
            phone_verified: row.phone_verified,
            two_factor_enabled: row.two_factor_enabled,
            two_factor_secret: row.two_factor_secret,
            two_factor_backup_codes: row.two_factor_backup_codes,
            google_id: row.google_id,
            subscription: SubscriptionState {
                stripe_customer_id: row.stripe_customer_id,
                stripe_subscription_id: row.stripe_subscription_id,
                plan: row.subscription_plan,
                status: row
                    .subscription_status
                    .as_deref()
                    .map(SubscriptionStatus::from_stripe),
                trial_ends_at: row.trial_ends_at,
                current_period_end: row.current_period_end,
            },
            last_login_at: row.last_login_at,
            created_at: row.created_at,
        }
    }
}

/// Builds a column-scoped UPDATE: only fields named in the patch appear in
/// the SET list, so concurrent writers touching other columns are not
/// clobbered.
fn build_update(id: Uuid, patch: &AccountPatch) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::<Postgres>::new("UPDATE accounts SET updated_at = NOW()");

    macro_rules! set {
        ($column:literal, $value:expr) => {
            builder.push(concat!(", ", $column, " = ")).push_bind($value);
        };
    }

    if let Some(v) = &patch.password_hash {
        set!("password_hash", v.clone());
    }
    if let Some(v) = &patch.first_name {
        set!("first_name", v.clone());
    }
    if let Some(v) = &patch.last_name {
        set!("last_name", v.clone());
    }
    if let Some(v) = &patch.phone {
        set!("phone", v.clone());
    }
    if let Some(v) = &patch.avatar {
        set!("avatar", v.clone());
    }
    if let Some(v) = patch.role {
        set!("role", v.as_str().to_string());
    }
    if let Some(v) = &patch.workspace_id {
        set!("workspace_id", v.clone());
    }
    if let Some(v) = patch.is_active {
        set!("is_active", v);
    }
    if let Some(v) = patch.email_verified {
        set!("email_verified", v);
    }
    if let Some(v) = patch.email_verified_at {
        set!("email_verified_at", v);
    }
    if let Some(v) = patch.two_factor_enabled {
        set!("two_factor_enabled", v);
    }
    if let Some(v) = &patch.two_factor_secret {
        set!("two_factor_secret", v.clone());
    }
    if let Some(v) = &patch.two_factor_backup_codes {
        set!("two_factor_backup_codes", v.clone());
    }
    if let Some(v) = &patch.google_id {
        set!("google_id", v.clone());
    }
    if let Some(v) = &patch.stripe_customer_id {
        set!("stripe_customer_id", v.clone());
    }
    if let Some(v) = &patch.stripe_subscription_id {
        set!("stripe_subscription_id", v.clone());
    }
    if let Some(v) = &patch.subscription_plan {
        set!("subscription_plan", v.clone());
    }
    if let Some(v) = patch.subscription_status {
        set!("subscription_status", v.as_str());
    }
    if let Some(v) = patch.trial_ends_at {
        set!("trial_ends_at", v);
    }
    if let Some(v) = patch.current_period_end {
        set!("current_period_end", v);
    }
    if let Some(v) = patch.last_login_at {
        set!("last_login_at", v);
    }

    builder.push(" WHERE id = ").push_bind(id);
    builder.push(" RETURNING ").push(ACCOUNT_COLUMNS);
    builder
}

#[async_trait]
impl AccountRepo for PostgresPersistence {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.map(Account::from))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.map(Account::from))
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE phone = $1 ORDER BY created_at LIMIT 1"
        ))
        .bind(phone)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.map(Account::from))
    }

    async fn insert(&self, account: &Account) -> AppResult<()> {
        let sub = &account.subscription;
        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, email, password_hash, first_name, last_name, role, workspace_id, phone,
                avatar, is_active, email_verified, email_verified_at, phone_verified,
                two_factor_enabled, two_factor_secret, two_factor_backup_codes, google_id,
                stripe_customer_id, stripe_subscription_id, subscription_plan,
                subscription_status, trial_ends_at, current_period_end, last_login_at,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23, $24, $25)
            "#,
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.role.as_str())
        .bind(&account.workspace_id)
        .bind(&account.phone)
        .bind(&account.avatar)
        .bind(account.is_active)
        .bind(account.email_verified)
        .bind(account.email_verified_at)
        .bind(account.phone_verified)
        .bind(account.two_factor_enabled)
        .bind(&account.two_factor_secret)
        .bind(&account.two_factor_backup_codes)
        .bind(&account.google_id)
        .bind(&sub.stripe_customer_id)
        .bind(&sub.stripe_subscription_id)
        .bind(&sub.plan)
        .bind(sub.status.map(|s| s.as_str()))
        .bind(sub.trial_ends_at)
        .bind(sub.current_period_end)
        .bind(account.last_login_at)
        .bind(account.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::InvalidInput("Email already registered".into())
            }
            other => AppError::from(other),
        })?;
        Ok(())
    }

    async fn update_fields(&self, id: Uuid, patch: &AccountPatch) -> AppResult<Option<Account>> {
        if patch.is_empty() {
            return self.find_by_id(id).await;
        }
        let mut builder = build_update(id, patch);
        let row = builder
            .build_query_as::<AccountRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(row.map(Account::from))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(result.rows_affected() > 0)
    }
}
