// Waiter Registry: a process-wide map from request_id to a bounded channel,
// generalizing `AppState::forwarder_command_senders` from "one entry per
// connected device" to "one entry per in-flight request".

use std::collections::HashMap;
use std::sync::Arc;

use gateway_protocol::ResponseFrame;
use tokio::sync::{mpsc, RwLock};

const WAITER_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, PartialEq, Eq)]
pub struct AlreadyRegistered;

#[derive(Clone)]
pub struct WaiterRegistry {
    inner: Arc<RwLock<HashMap<String, mpsc::Sender<ResponseFrame>>>>,
}

impl WaiterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a new waiter for `request_id`. Fails if one is already
    /// registered -- at most one handler waits on a given id at a time, and
    /// a collision is an internal invariant violation.
    pub async fn register(
        &self,
        request_id: &str,
    ) -> Result<mpsc::Receiver<ResponseFrame>, AlreadyRegistered> {
        let mut map = self.inner.write().await;
        if map.contains_key(request_id) {
            return Err(AlreadyRegistered);
        }
        let (tx, rx) = mpsc::channel(WAITER_CHANNEL_CAPACITY);
        map.insert(request_id.to_owned(), tx);
        Ok(rx)
    }

    /// Best-effort, non-blocking delivery. If the waiter is unknown (late
    /// frame after unregister, or frame for another replica) or its channel
    /// is full (slow handler), the frame is dropped with a warning -- the
    /// dispatcher must never block.
    pub async fn deliver(&self, request_id: &str, frame: ResponseFrame) {
        let map = self.inner.read().await;
        match map.get(request_id) {
            Some(tx) => {
                if let Err(err) = tx.try_send(frame) {
                    match err {
                        mpsc::error::TrySendError::Full(_) => {
                            tracing::warn!(
                                request_id,
                                "waiter channel full, dropping response frame"
                            );
                        }
                        mpsc::error::TrySendError::Closed(_) => {
                            tracing::warn!(
                                request_id,
                                "waiter channel closed, dropping response frame"
                            );
                        }
                    }
                }
            }
            None => {
                tracing::warn!(request_id, "no waiter registered, dropping response frame");
            }
        }
    }

    /// Idempotent: removing an id that is not present is a no-op.
    pub async fn unregister(&self, request_id: &str) {
        self.inner.write().await.remove(request_id);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

impl Default for WaiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII cleanup for a registered waiter. `unregister` is async, so `Drop`
/// spawns it rather than running it inline -- this is what keeps a waiter
/// from outliving its handler on every exit path, including a client
/// disconnecting mid-stream and dropping the SSE/WebSocket future before it
/// reaches its own cleanup code.
pub struct WaiterGuard {
    waiters: WaiterRegistry,
    request_id: String,
}

impl WaiterGuard {
    #[must_use]
    pub fn new(waiters: WaiterRegistry, request_id: String) -> Self {
        Self {
            waiters,
            request_id,
        }
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        let waiters = self.waiters.clone();
        let request_id = std::mem::take(&mut self.request_id);
        tokio::spawn(async move {
            waiters.unregister(&request_id).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_deliver_reaches_the_right_waiter() {
        let registry = WaiterRegistry::new();
        let mut rx = registry.register("req-1").await.unwrap();

        registry
            .deliver("req-1", ResponseFrame::ok_done("req-1"))
            .await;

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.request_id, "req-1");
    }

    #[tokio::test]
    async fn duplicate_register_for_the_same_id_fails() {
        let registry = WaiterRegistry::new();
        let _rx = registry.register("req-1").await.unwrap();
        assert_eq!(registry.register("req-1").await, Err(AlreadyRegistered));
    }

    #[tokio::test]
    async fn deliver_to_unknown_id_is_dropped_without_panicking() {
        let registry = WaiterRegistry::new();
        registry
            .deliver("ghost", ResponseFrame::ok_done("ghost"))
            .await;
    }

    #[tokio::test]
    async fn unregister_is_idempotent_and_frees_the_id_for_reuse() {
        let registry = WaiterRegistry::new();
        let _rx = registry.register("req-1").await.unwrap();
        registry.unregister("req-1").await;
        registry.unregister("req-1").await;
        assert_eq!(registry.len().await, 0);

        // The id is free again.
        assert!(registry.register("req-1").await.is_ok());
    }

    #[tokio::test]
    async fn deliver_to_a_full_channel_drops_the_frame_instead_of_blocking() {
        let registry = WaiterRegistry::new();
        let _rx = registry.register("req-1").await.unwrap();
        for i in 0..WAITER_CHANNEL_CAPACITY {
            registry
                .deliver("req-1", ResponseFrame::chunk("req-1", Default::default()))
                .await;
            let _ = i;
        }
        // One more delivery must not block or panic even though the
        // channel is now full (receiver never drained).
        registry.deliver("req-1", ResponseFrame::ok_done("req-1")).await;
    }

    #[tokio::test]
    async fn guard_unregisters_on_drop_even_without_explicit_unregister_call() {
        let registry = WaiterRegistry::new();
        let _rx = registry.register("req-1").await.unwrap();
        {
            let _guard = WaiterGuard::new(registry.clone(), "req-1".to_owned());
        }
        // Drop spawns the unregister task; give it a chance to run.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(registry.len().await, 0);
    }
}
