use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::{Script, aio::ConnectionManager};

use super::InfraError;
use crate::app_error::{AppError, AppResult};

/// Trait for rate limiting implementations.
#[async_trait]
pub trait RateLimiterTrait: Send + Sync {
    /// Returns Ok(()) if `ip` is within its window budget,
    /// Err(AppError::RateLimited) otherwise.
    async fn check(&self, ip: &str) -> AppResult<()>;

    /// Drops counters whose window has closed. Returns how many went.
    /// Stores that expire keys on their own have nothing to do.
    fn sweep(&self) -> usize {
        0
    }
}

/// Lua script for atomic increment with TTL.
/// Returns the new count after increment.
/// If the key doesn't exist, it's created with TTL.
/// If the key exists but has no TTL, TTL is set.
const INCR_WITH_TTL_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
elseif redis.call('TTL', KEYS[1]) == -1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return current
"#;

/// Redis-backed fixed-window limiter shared by every instance.
#[derive(Clone)]
pub struct RedisRateLimiter {
    manager: ConnectionManager,
    window_secs: u64,
    max_per_ip: u64,
    script: Script,
}

impl RedisRateLimiter {
    pub async fn new(redis_url: &str, window_secs: u64, max_per_ip: u64) -> Result<Self, InfraError> {
        let client = redis::Client::open(redis_url).map_err(InfraError::RedisConnection)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(InfraError::RedisConnection)?;
        Ok(Self {
            manager,
            window_secs,
            max_per_ip,
            script: Script::new(INCR_WITH_TTL_SCRIPT),
        })
    }
}

#[async_trait]
impl RateLimiterTrait for RedisRateLimiter {
    async fn check(&self, ip: &str) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let current: u64 = self
            .script
            .key(format!("rate:ip:{ip}"))
            .arg(self.window_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        if current > self.max_per_ip {
            return Err(AppError::RateLimited);
        }
        Ok(())
    }
}

/// Per-process fixed-window limiter, used when no Redis is configured.
pub struct InMemoryRateLimiter {
    windows: DashMap<String, (Instant, u64)>,
    window: Duration,
    max_per_ip: u64,
}

impl InMemoryRateLimiter {
    pub fn new(window_secs: u64, max_per_ip: u64) -> Self {
        Self {
            windows: DashMap::new(),
            window: Duration::from_secs(window_secs.max(1)),
            max_per_ip,
        }
    }

    /// Never blocks.
    pub fn permissive() -> Self {
        Self::new(60, u64::MAX)
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, (start, _)| now.duration_since(*start) < self.window);
        before.saturating_sub(self.windows.len())
    }
}

#[async_trait]
impl RateLimiterTrait for InMemoryRateLimiter {
    async fn check(&self, ip: &str) -> AppResult<()> {
        let now = Instant::now();
        let mut slot = self.windows.entry(ip.to_string()).or_insert((now, 0));
        if now.duration_since(slot.0) >= self.window {
            *slot = (now, 0);
        }
        slot.1 = slot.1.saturating_add(1);
        if slot.1 > self.max_per_ip {
            return Err(AppError::RateLimited);
        }
        Ok(())
    }

    fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_limiter_blocks_after_budget() {
        let limiter = InMemoryRateLimiter::new(60, 2);
        limiter.check("10.0.0.1").await.unwrap();
        limiter.check("10.0.0.1").await.unwrap();
        assert!(matches!(
            limiter.check("10.0.0.1").await,
            Err(AppError::RateLimited)
        ));
        limiter.check("10.0.0.2").await.unwrap();
    }

    #[tokio::test]
    async fn test_permissive_never_blocks() {
        let limiter = InMemoryRateLimiter::permissive();
        for _ in 0..1000 {
            limiter.check("10.0.0.1").await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_sweep_drops_closed_windows_only() {
        let limiter = InMemoryRateLimiter::new(60, 5);
        for i in 0..100 {
            limiter.check(&format!("10.0.1.{i}")).await.unwrap();
        }
        assert_eq!(limiter.sweep(), 0);
        assert_eq!(limiter.windows.len(), 100);

        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(limiter.sweep_at(later), 100);
        assert!(limiter.windows.is_empty());
    }

    #[tokio::test]
    async fn test_swept_ip_starts_a_fresh_window() {
        let limiter = InMemoryRateLimiter::new(60, 1);
        limiter.check("10.0.0.9").await.unwrap();
        limiter.sweep_at(Instant::now() + Duration::from_secs(61));
        limiter.check("10.0.0.9").await.unwrap();
    }
}
