// The model-backend HTTP client. Mirrors step 2-5 of the inference worker's
// per-item procedure: open a streaming call, read line-delimited SSE,
// publish one response frame per parsed chunk. The hard per-call timeout
// wraps this entire function (not just the connect), so a slow stream times
// out the same as a slow connect -- both count as one breaker failure.

use std::time::Duration;

use futures_util::StreamExt;
use gateway_bus::ResponseProducer;
use gateway_protocol::{Choice, ChunkData, ResponseFrame, WorkItem};

#[derive(Debug)]
pub enum BackendError {
    Request(String),
    Status(u16),
    Timeout,
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Request(msg) => write!(f, "model backend request failed: {msg}"),
            BackendError::Status(code) => write!(f, "model backend returned status {code}"),
            BackendError::Timeout => write!(f, "model backend call timed out"),
        }
    }
}

impl std::error::Error for BackendError {}

pub struct ModelBackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl ModelBackendClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Runs one work item end-to-end: connect, stream chunks, publish a
    /// response frame per chunk. Returns `Ok(())` on a clean backend EOF.
    /// Never publishes the terminal `done` frame itself -- the caller
    /// (worker) owns that, since it differs between success and failure.
    pub async fn run(
        &self,
        item: &WorkItem,
        response_bus: &dyn ResponseProducer,
        call_timeout: Duration,
    ) -> Result<(), BackendError> {
        match tokio::time::timeout(call_timeout, self.run_inner(item, response_bus)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout),
        }
    }

    async fn run_inner(
        &self,
        item: &WorkItem,
        response_bus: &dyn ResponseProducer,
    ) -> Result<(), BackendError> {
        let body = serde_json::json!({
            "model": item.model,
            "prompt": item.prompt,
            "max_tokens": item.max_tokens,
            "temperature": item.temperature,
            "stream": true,
        });

        let resp = self
            .http
            .post(&self.base_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(BackendError::Status(resp.status().as_u16()));
        }

        let mut stream = resp.bytes_stream();
        let mut buf = String::new();

        while let Some(next) = stream.next().await {
            let bytes = next.map_err(|e| BackendError::Request(e.to_string()))?;
            buf.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(pos) = buf.find("\n\n") {
                let event = buf[..pos].to_owned();
                buf.drain(..pos + 2);
                if let Some(done) = handle_event(&event, item, response_bus).await {
                    return done;
                }
            }
        }

        Ok(())
    }
}

/// Handles one `data: ...` event. Returns `Some(Ok(()))` if this event was
/// the `[DONE]` sentinel (caller should stop reading); `None` to keep
/// reading.
async fn handle_event(
    event: &str,
    item: &WorkItem,
    response_bus: &dyn ResponseProducer,
) -> Option<Result<(), BackendError>> {
    let payload = event.strip_prefix("data: ")?;
    if payload == "[DONE]" {
        return Some(Ok(()));
    }

    let chunk: ChunkData = match serde_json::from_str(payload) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(request_id = %item.request_id, error = %e, "skipping malformed backend chunk");
            return None;
        }
    };

    let choices: Vec<Choice> = chunk.choices;
    let frame = ResponseFrame::chunk(item.request_id.clone(), ChunkData { choices });
    if let Err(e) = response_bus.publish(&frame).await {
        tracing::warn!(request_id = %item.request_id, error = %e, "failed to publish response frame");
    }
    None
}
