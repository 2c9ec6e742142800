//! Test data factories.
//!
//! Each factory returns a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    application::ports::oauth_provider::AssertedIdentity,
    domain::entities::{
        account::{Account, SubscriptionState},
        plan::FREE_PLAN,
        role::Role,
    },
};

/// Create an active, verified owner with a password and a unique email.
pub fn create_test_account(overrides: impl FnOnce(&mut Account)) -> Account {
    let id = Uuid::new_v4();
    let mut account = Account {
        id,
        email: format!("user-{}@example.com", &id.simple().to_string()[..8]),
        password_hash: Some("plain:secret123".to_string()),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        role: Role::Owner,
        workspace_id: "ws_test".to_string(),
        phone: None,
        avatar: None,
        is_active: true,
        email_verified: true,
        email_verified_at: Some(Utc::now()),
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
    overrides(&mut account);
    account
}

/// A verified Google identity for `email`.
pub fn google_identity(email: &str) -> AssertedIdentity {
    AssertedIdentity {
        provider_id: format!("google-{}", email.to_lowercase()),
        email: email.to_string(),
        email_verified: true,
        first_name: "Gina".to_string(),
        last_name: "Oauth".to_string(),
        avatar: Some("https://lh3.example.test/avatar.png".to_string()),
    }
}
