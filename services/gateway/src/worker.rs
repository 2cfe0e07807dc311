// worker: the inference worker loop. Pulls one work item at a time off the
// request bus, runs it through the circuit breaker wrapping the model
// backend call, and publishes the terminal frame the backend call itself
// never publishes (success or failure, exactly once per item).

use std::sync::Arc;
use std::time::Duration;

use gateway_breaker::{BreakerError, CircuitBreaker};
use gateway_bus::{RequestConsumer, ResponseProducer};
use gateway_protocol::ResponseFrame;

use crate::model_backend::ModelBackendClient;

/// Matches the original worker's fast-fail log message and client-facing
/// payload when the breaker is open.
const BREAKER_OPEN_MESSAGE: &str = "vLLM service is unavailable.";
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

pub async fn run(
    mut consumer: Box<dyn RequestConsumer>,
    response_bus: Arc<dyn ResponseProducer>,
    backend: Arc<ModelBackendClient>,
    breaker: Arc<CircuitBreaker>,
    call_timeout: Duration,
) {
    loop {
        let item = match consumer.recv().await {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(error = %e, "worker failed to read work item, retrying");
                tokio::time::sleep(RETRY_BACKOFF).await;
                continue;
            }
        };

        let request_id = item.request_id.clone();
        let result = breaker
            .call(|| backend.run(&item, response_bus.as_ref(), call_timeout))
            .await;

        let terminal = match result {
            Ok(()) => ResponseFrame::ok_done(request_id.clone()),
            Err(BreakerError::Open) => {
                tracing::warn!(
                    request_id = %request_id,
                    "circuit is open, fast-failing request"
                );
                ResponseFrame::error_done(request_id.clone(), BREAKER_OPEN_MESSAGE)
            }
            Err(BreakerError::Inner(backend_err)) => {
                tracing::warn!(
                    request_id = %request_id,
                    error = %backend_err,
                    "model backend call failed"
                );
                ResponseFrame::error_done(request_id.clone(), backend_err.to_string())
            }
        };

        if let Err(e) = response_bus.publish(&terminal).await {
            tracing::warn!(
                request_id = %request_id,
                error = %e,
                "failed to publish terminal response frame"
            );
        }
    }
}
