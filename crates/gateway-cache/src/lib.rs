// gateway-cache: fingerprinted response cache backed by Redis.
//
// All backend failures (connection down, malformed payload) degrade to a
// miss on lookup and a silent no-op on store -- callers never see a cache
// error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Namespace prefix so the store can be cleared en masse.
pub const CACHE_KEY_PREFIX: &str = "inferno:cache:v1:";
pub const CACHE_TTL_SECS: u64 = 3600;

/// Deterministic fingerprint over the four fields that identify a
/// completion, serialized in a fixed order and hashed with SHA-256.
#[must_use]
pub fn fingerprint(prompt: &str, model: &str, max_tokens: u32, temperature: f32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update([0u8]);
    hasher.update(model.as_bytes());
    hasher.update([0u8]);
    hasher.update(max_tokens.to_le_bytes());
    hasher.update(temperature.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

fn cache_key(fingerprint: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{fingerprint}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub text: String,
    pub request_id: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn lookup(&self, fingerprint: &str) -> Option<CachedResponse>;
    async fn store(&self, fingerprint: &str, text: &str, request_id: &str);
}

pub struct RedisResponseCache {
    conn: ConnectionManager,
}

impl RedisResponseCache {
    pub async fn connect(host: &str, port: u16) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(format!("redis://{host}:{port}"))?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl ResponseCache for RedisResponseCache {
    async fn lookup(&self, fingerprint: &str) -> Option<CachedResponse> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = match conn.get(cache_key(fingerprint)).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "cache lookup failed, treating as miss");
                return None;
            }
        };
        let raw = raw?;
        match serde_json::from_str(&raw) {
            Ok(cached) => Some(cached),
            Err(e) => {
                tracing::warn!(error = %e, "cache entry failed to deserialize, treating as miss");
                None
            }
        }
    }

    async fn store(&self, fingerprint: &str, text: &str, request_id: &str) {
        let entry = CachedResponse {
            text: text.to_owned(),
            request_id: request_id.to_owned(),
            created_at: Utc::now(),
        };
        let json = match serde_json::to_string(&entry) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize cache entry, skipping store");
                return;
            }
        };
        let mut conn = self.conn.clone();
        if let Err(e) = conn
            .set_ex::<_, _, ()>(cache_key(fingerprint), json, CACHE_TTL_SECS)
            .await
        {
            tracing::warn!(error = %e, "cache store failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_for_identical_inputs() {
        let a = fingerprint("hi", "m1", 4, 0.0);
        let b = fingerprint("hi", "m1", 4, 0.0);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_each_field() {
        let base = fingerprint("hi", "m1", 4, 0.0);
        assert_ne!(base, fingerprint("bye", "m1", 4, 0.0));
        assert_ne!(base, fingerprint("hi", "m2", 4, 0.0));
        assert_ne!(base, fingerprint("hi", "m1", 5, 0.0));
        assert_ne!(base, fingerprint("hi", "m1", 4, 0.1));
    }

    #[test]
    fn fingerprint_does_not_confuse_field_boundaries() {
        // "ab" + "c" must not collide with "a" + "bc" once joined naively.
        let a = fingerprint("ab", "c", 1, 0.0);
        let b = fingerprint("a", "bc", 1, 0.0);
        assert_ne!(a, b);
    }

    #[test]
    fn cache_key_is_namespaced() {
        let key = cache_key("abc123");
        assert!(key.starts_with(CACHE_KEY_PREFIX));
        assert!(key.ends_with("abc123"));
    }
}
