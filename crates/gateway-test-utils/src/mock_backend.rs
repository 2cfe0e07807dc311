// mock_backend: a minimal stand-in for the model backend's streaming
// completions endpoint, used to drive the inference worker and circuit
// breaker in tests without a real vLLM deployment.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;

/// What the mock backend does for every request it receives.
#[derive(Debug, Clone)]
pub enum BackendScript {
    /// Stream each string as one chunk's `choices[0].text`, then `[DONE]`.
    Chunks(Vec<String>),
    /// Fail the request outright with the given status, as a backend 5xx.
    Status(u16),
    /// Accept the connection but never write a byte (used to drive the
    /// per-call timeout path).
    Hang,
}

pub struct MockModelBackend {
    addr: SocketAddr,
    _task: tokio::task::JoinHandle<()>,
}

impl MockModelBackend {
    pub async fn start(script: BackendScript) -> Result<Self, std::io::Error> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let router = Router::new()
            .route("/v1/completions", post(handle))
            .with_state(Arc::new(script));

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::warn!(error = %e, "mock model backend exited");
            }
        });

        Ok(Self { addr, _task: task })
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}/v1/completions", self.addr)
    }
}

async fn handle(State(script): State<Arc<BackendScript>>) -> Response {
    match script.as_ref() {
        BackendScript::Status(code) => {
            let status = StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, "backend error").into_response()
        }
        BackendScript::Hang => {
            std::future::pending::<()>().await;
            unreachable!("mock backend configured to hang forever")
        }
        BackendScript::Chunks(chunks) => {
            let mut body = String::new();
            for (index, text) in chunks.iter().enumerate() {
                let payload = serde_json::json!({
                    "choices": [{"text": text, "index": index, "finish_reason": null}],
                });
                body.push_str("data: ");
                body.push_str(&payload.to_string());
                body.push_str("\n\n");
            }
            body.push_str("data: [DONE]\n\n");
            (
                StatusCode::OK,
                [("content-type", "text/event-stream")],
                body,
            )
                .into_response()
        }
    }
}
