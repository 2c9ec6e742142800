pub mod accounts;
pub mod auth;
pub mod billing;
pub mod identity;
pub mod tokens;
pub mod verification;
