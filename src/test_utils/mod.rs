//! Test utilities shared by unit and HTTP-level tests.
//!
//! This module provides:
//! - Factories for valid fixtures (`create_test_account`, `google_identity`)
//! - In-memory doubles for every collaborator port
//! - `UseCaseHarness`, all use cases wired against the doubles
//! - `TestAppStateBuilder` for `axum-test` router tests

mod account_mocks;
mod app_state_builder;
mod auth_mocks;
mod billing_mocks;
mod factories;
mod harness;
mod notifier_mocks;

pub use account_mocks::*;
pub use app_state_builder::*;
pub use auth_mocks::*;
pub use billing_mocks::*;
pub use factories::*;
pub use harness::*;
pub use notifier_mocks::*;
