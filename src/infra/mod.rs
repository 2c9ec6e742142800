use crate::{adapters::persistence::PostgresPersistence, infra::db::init_db};

pub mod account_mirror;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod google_oauth;
pub mod http_client;
pub mod notifier;
pub mod password;
pub mod rate_limit;
pub mod redis_token_store;
pub mod setup;
pub mod stripe_client;
pub mod token_store;
pub mod token_sweeper;

pub use error::InfraError;
pub use rate_limit::RateLimiterTrait;

pub async fn postgres_persistence(database_url: &str) -> Result<PostgresPersistence, InfraError> {
    let pool = init_db(database_url).await?;
    Ok(PostgresPersistence::new(pool))
}
