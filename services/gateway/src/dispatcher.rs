// dispatcher: reads frames off the response bus and delivers each one to the
// waiter registered for its request_id. A long-running background loop that
// logs and retries on a transient bus failure rather than exiting the task.

use std::time::Duration;

use gateway_bus::ResponseConsumer;

use crate::waiters::WaiterRegistry;

const RETRY_BACKOFF: Duration = Duration::from_secs(1);

pub async fn run(mut consumer: Box<dyn ResponseConsumer>, waiters: WaiterRegistry) {
    loop {
        match consumer.recv().await {
            Ok(frame) => {
                let request_id = frame.request_id.clone();
                waiters.deliver(&request_id, frame).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "dispatcher failed to read response frame, retrying");
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }
    }
}
