// mock_bus: a same-process stand-in for the Kafka request/response topics,
// backed by `tokio::sync::mpsc`/`broadcast` rather than a real broker.
//
// The request side uses a single shared receiver (mirroring "one consumer
// group shared by all workers"); the response side uses a broadcast channel
// so every subscribed dispatcher sees every frame, mirroring "unique
// consumer group per gateway replica".

use std::sync::Arc;

use async_trait::async_trait;
use gateway_bus::{BusError, RequestConsumer, RequestProducer, ResponseConsumer, ResponseProducer};
use gateway_protocol::{ResponseFrame, WorkItem};
use tokio::sync::{broadcast, mpsc, Mutex};

pub struct InMemoryBus {
    request_tx: mpsc::Sender<WorkItem>,
    request_rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    response_tx: broadcast::Sender<ResponseFrame>,
}

impl InMemoryBus {
    #[must_use]
    pub fn new() -> Self {
        let (request_tx, request_rx) = mpsc::channel(256);
        let (response_tx, _) = broadcast::channel(256);
        Self {
            request_tx,
            request_rx: Arc::new(Mutex::new(request_rx)),
            response_tx,
        }
    }

    #[must_use]
    pub fn request_producer(&self) -> InMemoryRequestProducer {
        InMemoryRequestProducer {
            tx: self.request_tx.clone(),
        }
    }

    #[must_use]
    pub fn request_consumer(&self) -> InMemoryRequestConsumer {
        InMemoryRequestConsumer {
            rx: self.request_rx.clone(),
        }
    }

    #[must_use]
    pub fn response_producer(&self) -> InMemoryResponseProducer {
        InMemoryResponseProducer {
            tx: self.response_tx.clone(),
        }
    }

    #[must_use]
    pub fn response_consumer(&self) -> InMemoryResponseConsumer {
        InMemoryResponseConsumer {
            rx: self.response_tx.subscribe(),
        }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct InMemoryRequestProducer {
    tx: mpsc::Sender<WorkItem>,
}

#[async_trait]
impl RequestProducer for InMemoryRequestProducer {
    async fn publish(&self, item: &WorkItem) -> Result<(), BusError> {
        self.tx
            .send(item.clone())
            .await
            .map_err(|e| BusError::Publish(e.to_string()))
    }
}

pub struct InMemoryRequestConsumer {
    rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
}

#[async_trait]
impl RequestConsumer for InMemoryRequestConsumer {
    async fn recv(&mut self) -> Result<WorkItem, BusError> {
        let mut rx = self.rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| BusError::Consume("request channel closed".to_owned()))
    }
}

pub struct InMemoryResponseProducer {
    tx: broadcast::Sender<ResponseFrame>,
}

#[async_trait]
impl ResponseProducer for InMemoryResponseProducer {
    async fn publish(&self, frame: &ResponseFrame) -> Result<(), BusError> {
        // No subscribers is not an error on a real broker either -- the
        // frame is simply unread.
        let _ = self.tx.send(frame.clone());
        Ok(())
    }
}

pub struct InMemoryResponseConsumer {
    rx: broadcast::Receiver<ResponseFrame>,
}

#[async_trait]
impl ResponseConsumer for InMemoryResponseConsumer {
    async fn recv(&mut self) -> Result<ResponseFrame, BusError> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => return Ok(frame),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "mock response consumer lagged, frames dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(BusError::Consume("response channel closed".to_owned()));
                }
            }
        }
    }
}
