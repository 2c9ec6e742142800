pub mod notifier;
pub mod oauth_provider;
pub mod password;
pub mod payment_provider;
