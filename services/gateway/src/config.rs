// Plain env-var configuration, no config-file layer -- mirrors main.rs's
// direct `env::var` reads rather than introducing a TOML/figment layer for
// a handful of knobs.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub redis_host: String,
    pub redis_port: u16,
    pub kafka_bootstrap_servers: String,
    pub kafka_topic: String,
    pub kafka_response_topic: String,
    pub kafka_group_id: String,
    pub model_backend_url: String,
    pub websocket_secret_key: String,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
    pub response_timeout: Duration,
    pub backend_call_timeout: Duration,
    pub breaker_fail_max: u32,
    pub breaker_reset_timeout: Duration,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            database_url: env::var("POSTGRES_URL").expect("POSTGRES_URL must be set"),
            redis_host: env_or("REDIS_HOST", "127.0.0.1"),
            redis_port: env_parsed_or("REDIS_PORT", 6379),
            kafka_bootstrap_servers: env_or("KAFKA_BOOTSTRAP_SERVERS", "127.0.0.1:9092"),
            kafka_topic: env_or("KAFKA_TOPIC", "inferno-queue"),
            kafka_response_topic: env_or("KAFKA_RESPONSE_TOPIC", "inferno-response-queue"),
            kafka_group_id: env_or("KAFKA_GROUP_ID", "inferno-workers"),
            model_backend_url: env_or(
                "MODEL_BACKEND_URL",
                "http://127.0.0.1:8000/v1/completions",
            ),
            websocket_secret_key: env::var("WEBSOCKET_SECRET_KEY")
                .expect("WEBSOCKET_SECRET_KEY must be set"),
            rate_limit_requests: env_parsed_or("RATE_LIMIT_REQUESTS", 10_000),
            rate_limit_window: Duration::from_secs(env_parsed_or("RATE_LIMIT_WINDOW_SECS", 1)),
            response_timeout: Duration::from_secs(env_parsed_or("RESPONSE_TIMEOUT_SECS", 30)),
            backend_call_timeout: Duration::from_secs(env_parsed_or(
                "BACKEND_CALL_TIMEOUT_SECS",
                25,
            )),
            breaker_fail_max: env_parsed_or("BREAKER_FAIL_MAX", 5),
            breaker_reset_timeout: Duration::from_secs(env_parsed_or(
                "BREAKER_RESET_TIMEOUT_SECS",
                30,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_when_unset() {
        assert_eq!(env_or("GATEWAY_TEST_UNSET_VAR_XYZ", "fallback"), "fallback");
    }

    #[test]
    fn env_parsed_or_falls_back_on_missing_or_invalid() {
        assert_eq!(env_parsed_or::<u32>("GATEWAY_TEST_UNSET_VAR_XYZ", 7), 7);
        // SAFETY: test-only, single-threaded access to this specific var name.
        unsafe {
            env::set_var("GATEWAY_TEST_BAD_NUMBER", "not-a-number");
        }
        assert_eq!(env_parsed_or::<u32>("GATEWAY_TEST_BAD_NUMBER", 9), 9);
        unsafe {
            env::remove_var("GATEWAY_TEST_BAD_NUMBER");
        }
    }
}
