// GET /health: checks the request bus specifically, mirroring the original
// service's health check which probes Kafka reachability rather than the
// database or cache (both of which fail soft and would never show red here).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Response {
    if state.request_producer.healthy().await {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "error",
                "detail": "request bus unreachable",
            })),
        )
            .into_response()
    }
}
