use std::{sync::Arc, time::Duration};

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use super::RateLimiterTrait;
use crate::application::use_cases::tokens::TokenStore;

/// Periodically drops expired tokens and closed rate-limit windows.
/// Correctness never depends on this running; expiry is checked on every
/// read.
pub fn spawn_token_sweeper(
    store: Arc<dyn TokenStore>,
    rate_limiter: Arc<dyn RateLimiterTrait>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match store.sweep_expired().await {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "Swept expired tokens"),
                Err(e) => warn!(error = %e, "Token sweep failed"),
            }
            let windows = rate_limiter.sweep();
            if windows > 0 {
                debug!(windows, "Swept closed rate-limit windows");
            }
        }
    })
}
