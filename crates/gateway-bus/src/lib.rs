// gateway-bus: transport-agnostic request/response bus traits, plus a Kafka
// backend. Business logic (dispatcher, worker, admission) depends only on
// the traits in this module, never on `rdkafka` directly -- the same
// separation `services/server/src/state.rs` draws between its handlers and
// the concrete WebSocket forwarder.

pub mod kafka;

use async_trait::async_trait;
use gateway_protocol::{ResponseFrame, WorkItem};

#[derive(Debug)]
pub enum BusError {
    Publish(String),
    Consume(String),
    Connect(String),
}

impl std::fmt::Display for BusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusError::Publish(msg) => write!(f, "bus publish failed: {msg}"),
            BusError::Consume(msg) => write!(f, "bus consume failed: {msg}"),
            BusError::Connect(msg) => write!(f, "bus connection failed: {msg}"),
        }
    }
}

impl std::error::Error for BusError {}

/// Publishes work items to the request topic, partitioned by `request_id`
/// so redeliveries for the same id stay ordered.
#[async_trait]
pub trait RequestProducer: Send + Sync {
    async fn publish(&self, item: &WorkItem) -> Result<(), BusError>;

    /// Used by `GET /health`: true if the request bus answers within a short
    /// deadline. Default `true` for backends (like the in-memory test bus)
    /// that have no meaningful notion of "unreachable".
    async fn healthy(&self) -> bool {
        true
    }
}

/// Publishes response frames to the response topic.
#[async_trait]
pub trait ResponseProducer: Send + Sync {
    async fn publish(&self, frame: &ResponseFrame) -> Result<(), BusError>;
}

/// Consumes work items from the request topic. All workers share one
/// consumer group so the topic's partitions are divided among them.
#[async_trait]
pub trait RequestConsumer: Send {
    async fn recv(&mut self) -> Result<WorkItem, BusError>;
}

/// Consumes response frames from the response topic. Each gateway replica
/// uses its own consumer group (see `kafka::random_group_suffix`) so every
/// replica's dispatcher observes every frame, regardless of which replica
/// the originating waiter lives on.
#[async_trait]
pub trait ResponseConsumer: Send {
    async fn recv(&mut self) -> Result<ResponseFrame, BusError>;
}
