//! `GET /health` reflects request-bus reachability; the in-memory test bus
//! always reports healthy, mirroring the always-`true` default in
//! `RequestProducer::healthy`.

mod common;

use common::start_gateway;
use gateway_test_utils::mock_backend::BackendScript;

#[tokio::test]
async fn health_reports_ok_when_request_bus_is_reachable() {
    let (gw, _backend) = start_gateway(BackendScript::Chunks(vec!["hi".to_owned()])).await;

    let resp = reqwest::get(format!("http://{}/health", gw.addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn metrics_route_is_mounted() {
    let (gw, _backend) = start_gateway(BackendScript::Chunks(vec!["hi".to_owned()])).await;

    let resp = reqwest::get(format!("http://{}/metrics", gw.addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
}
