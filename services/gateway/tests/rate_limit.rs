//! Rate limiting is off by default (10000/s) but must be enforceable when
//! configured tighter -- the mechanism, not just its default, is in scope.

mod common;

use std::time::Duration;

use common::{insert_api_token, start_gateway_with, ConfigOverrides};
use gateway_test_utils::mock_backend::BackendScript;

#[tokio::test]
async fn requests_beyond_the_configured_budget_are_429d() {
    let overrides = ConfigOverrides {
        rate_limit_requests: 1,
        rate_limit_window: Duration::from_secs(5),
        ..ConfigOverrides::default()
    };
    let (gw, _backend) = start_gateway_with(BackendScript::Chunks(vec!["hi".to_owned()]), overrides).await;
    insert_api_token(&gw.pool, "tok-rl").await;

    let send = || {
        reqwest::Client::new()
            .post(format!("http://{}/v1/completions", gw.addr))
            .bearer_auth("tok-rl")
            .json(&serde_json::json!({
                "model": "m1",
                "prompt": "hi",
                "max_tokens": 4,
                "temperature": 0.0,
                "stream": false,
            }))
            .send()
    };

    let first = send().await.unwrap();
    assert_eq!(first.status(), reqwest::StatusCode::OK);

    let second = send().await.unwrap();
    assert_eq!(second.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);
}
