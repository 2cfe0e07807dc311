// AppState: the handles every HTTP/WebSocket handler needs -- pool, cache,
// rate limiter, waiter registry, and the request bus producer.

use std::sync::Arc;
use std::time::Duration;

use gateway_bus::RequestProducer;
use gateway_cache::ResponseCache;
use sqlx::PgPool;

use crate::ratelimit::RateLimiter;
use crate::waiters::WaiterRegistry;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub cache: Arc<dyn ResponseCache>,
    pub rate_limiter: Arc<RateLimiter>,
    pub waiters: WaiterRegistry,
    pub request_producer: Arc<dyn RequestProducer>,
    pub websocket_secret_key: Arc<str>,
    pub response_timeout: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(
        pool: PgPool,
        cache: Arc<dyn ResponseCache>,
        rate_limiter: Arc<RateLimiter>,
        request_producer: Arc<dyn RequestProducer>,
        websocket_secret_key: impl Into<Arc<str>>,
        response_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            cache,
            rate_limiter,
            waiters: WaiterRegistry::new(),
            request_producer,
            websocket_secret_key: websocket_secret_key.into(),
            response_timeout,
        }
    }
}
