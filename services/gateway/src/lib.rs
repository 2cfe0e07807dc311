pub mod auth;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod http;
pub mod inference_log;
pub mod model_backend;
pub mod ratelimit;
pub mod state;
pub mod stream;
pub mod waiters;
pub mod worker;
pub mod ws;

pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/completions",
            post(http::admission::completions).get(ws::completions_ws),
        )
        .route("/health", get(http::health::health))
        .route("/metrics", get(http::metrics::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
