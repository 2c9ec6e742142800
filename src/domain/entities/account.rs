use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{role::Role, subscription_status::SubscriptionStatus};

/// Billing fields carried on the account record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionState {
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub plan: Option<String>,
    pub status: Option<SubscriptionStatus>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
}

/// The durable identity record for one user.
///
/// An account always carries at least one credential: a password hash, an
/// OAuth provider id, or both.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub workspace_id: String,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub is_active: bool,
    pub email_verified: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub phone_verified: bool,
    pub two_factor_enabled: bool,
    pub two_factor_secret: Option<String>,
    /// Unused one-time codes; each is removed when redeemed.
    pub two_factor_backup_codes: Vec<String>,
    pub google_id: Option<String>,
    pub subscription: SubscriptionState,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn has_credential(&self) -> bool {
        self.password_hash.is_some() || self.google_id.is_some()
    }
}

/// Field-scoped partial update.
///
/// `None` leaves a field untouched. Nullable fields use `Option<Option<_>>`
/// so a patch can clear them explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountPatch {
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<Option<String>>,
    pub avatar: Option<Option<String>>,
    pub role: Option<Role>,
    pub workspace_id: Option<String>,
    pub is_active: Option<bool>,
    pub email_verified: Option<bool>,
    pub email_verified_at: Option<Option<DateTime<Utc>>>,
    pub two_factor_enabled: Option<bool>,
    pub two_factor_secret: Option<Option<String>>,
    pub two_factor_backup_codes: Option<Vec<String>>,
    pub google_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub subscription_plan: Option<String>,
    pub subscription_status: Option<SubscriptionStatus>,
    pub trial_ends_at: Option<Option<DateTime<Utc>>>,
    pub current_period_end: Option<Option<DateTime<Utc>>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        *self == AccountPatch::default()
    }

    /// Apply the patch in place. Used by the in-process stores; the Postgres
    /// store translates the same patch into a column-scoped UPDATE.
    pub fn apply_to(&self, account: &mut Account) {
        if let Some(v) = &self.password_hash {
            account.password_hash = Some(v.clone());
        }
        if let Some(v) = &self.first_name {
            account.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            account.last_name = v.clone();
        }
        if let Some(v) = &self.phone {
            account.phone = v.clone();
        }
        if let Some(v) = &self.avatar {
            account.avatar = v.clone();
        }
        if let Some(v) = self.role {
            account.role = v;
        }
        if let Some(v) = &self.workspace_id {
            account.workspace_id = v.clone();
        }
        if let Some(v) = self.is_active {
            account.is_active = v;
        }
        if let Some(v) = self.email_verified {
            account.email_verified = v;
        }
        if let Some(v) = self.email_verified_at {
            account.email_verified_at = v;
        }
        if let Some(v) = self.two_factor_enabled {
            account.two_factor_enabled = v;
        }
        if let Some(v) = &self.two_factor_secret {
            account.two_factor_secret = v.clone();
        }
        if let Some(v) = &self.two_factor_backup_codes {
            account.two_factor_backup_codes = v.clone();
        }
        if let Some(v) = &self.google_id {
            account.google_id = Some(v.clone());
        }
        if let Some(v) = &self.stripe_customer_id {
            account.subscription.stripe_customer_id = Some(v.clone());
        }
        if let Some(v) = &self.stripe_subscription_id {
            account.subscription.stripe_subscription_id = Some(v.clone());
        }
        if let Some(v) = &self.subscription_plan {
            account.subscription.plan = Some(v.clone());
        }
        if let Some(v) = self.subscription_status {
            account.subscription.status = Some(v);
        }
        if let Some(v) = self.trial_ends_at {
            account.subscription.trial_ends_at = v;
        }
        if let Some(v) = self.current_period_end {
            account.subscription.current_period_end = v;
        }
        if let Some(v) = self.last_login_at {
            account.last_login_at = Some(v);
        }
    }
}

/// Account as returned to clients. Never carries the password hash or any
/// two-factor material.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub workspace_id: String,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub is_phone_verified: bool,
    pub two_factor_enabled: bool,
    pub subscription_plan: Option<String>,
    pub subscription_status: Option<SubscriptionStatus>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountView {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id,
            email: a.email.clone(),
            first_name: a.first_name.clone(),
            last_name: a.last_name.clone(),
            role: a.role,
            workspace_id: a.workspace_id.clone(),
            phone: a.phone.clone(),
            avatar: a.avatar.clone(),
            is_active: a.is_active,
            is_email_verified: a.email_verified,
            is_phone_verified: a.phone_verified,
            two_factor_enabled: a.two_factor_enabled,
            subscription_plan: a.subscription.plan.clone(),
            subscription_status: a.subscription.status,
            trial_ends_at: a.subscription.trial_ends_at,
            current_period_end: a.subscription.current_period_end,
            last_login_at: a.last_login_at,
            created_at: a.created_at,
        }
    }
}
