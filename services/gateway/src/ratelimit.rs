// Global token bucket keyed by client remote address, backed by Redis for
// atomic increment-and-expire shared across gateway replicas. Same
// fail-soft posture as `gateway_cache`: a Redis outage must not take the
// gateway down, so errors are logged and treated as "allow".

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

const RATE_LIMIT_KEY_PREFIX: &str = "inferno:ratelimit:";

pub struct RateLimiter {
    conn: ConnectionManager,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(conn: ConnectionManager, limit: u32, window: Duration) -> Self {
        Self {
            conn,
            limit,
            window,
        }
    }

    /// Returns `true` if `remote_addr` is still within its budget for the
    /// current window.
    pub async fn check(&self, remote_addr: &str) -> bool {
        let key = format!("{RATE_LIMIT_KEY_PREFIX}{remote_addr}");
        let mut conn = self.conn.clone();
        let count: i64 = match conn.incr(&key, 1).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "rate limiter backend unreachable, allowing request");
                return true;
            }
        };
        if count == 1 {
            let window_secs = i64::try_from(self.window.as_secs()).unwrap_or(i64::MAX);
            if let Err(e) = conn.expire::<_, ()>(&key, window_secs).await {
                tracing::warn!(error = %e, "failed to set rate limiter key expiry");
            }
        }
        u32::try_from(count).is_ok_and(|count| count <= self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_prefix_is_namespaced() {
        assert!(RATE_LIMIT_KEY_PREFIX.starts_with("inferno:"));
    }
}
