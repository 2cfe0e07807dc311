use std::time::Duration;

use async_trait::async_trait;
use gateway_protocol::{ResponseFrame, WorkItem};
use rand::Rng;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};

use crate::{BusError, RequestConsumer, RequestProducer, ResponseConsumer, ResponseProducer};

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub request_topic: String,
    pub response_topic: String,
    pub worker_group_id: String,
}

/// Suffix appended to the dispatcher's consumer group on every process
/// start, so each replica gets its own group and observes the full response
/// topic rather than sharing partitions with other replicas. This commits to
/// a single-replica correlation model: each process only ever delivers
/// frames to waiters registered on itself.
#[must_use]
pub fn random_group_suffix() -> String {
    let mut rng = rand::thread_rng();
    let suffix: u64 = rng.gen();
    format!("{suffix:016x}")
}

fn client_config(bootstrap_servers: &str) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", bootstrap_servers)
        .set("enable.auto.commit", "true")
        .set("auto.offset.reset", "earliest");
    config
}

pub struct KafkaRequestProducer {
    producer: FutureProducer,
    topic: String,
}

impl KafkaRequestProducer {
    pub fn new(config: &KafkaConfig) -> Result<Self, BusError> {
        let producer = client_config(&config.bootstrap_servers)
            .create()
            .map_err(|e| BusError::Connect(e.to_string()))?;
        Ok(Self {
            producer,
            topic: config.request_topic.clone(),
        })
    }
}

#[async_trait]
impl RequestProducer for KafkaRequestProducer {
    async fn publish(&self, item: &WorkItem) -> Result<(), BusError> {
        let payload = serde_json::to_string(item).map_err(|e| BusError::Publish(e.to_string()))?;
        let record = FutureRecord::to(&self.topic)
            .key(&item.request_id)
            .payload(&payload);
        self.producer
            .send(record, PUBLISH_TIMEOUT)
            .await
            .map_err(|(e, _)| BusError::Publish(e.to_string()))?;
        Ok(())
    }

    async fn healthy(&self) -> bool {
        is_reachable(&self.producer, Duration::from_secs(2)).await
    }
}

pub struct KafkaResponseProducer {
    producer: FutureProducer,
    topic: String,
}

impl KafkaResponseProducer {
    pub fn new(config: &KafkaConfig) -> Result<Self, BusError> {
        let producer = client_config(&config.bootstrap_servers)
            .create()
            .map_err(|e| BusError::Connect(e.to_string()))?;
        Ok(Self {
            producer,
            topic: config.response_topic.clone(),
        })
    }
}

#[async_trait]
impl ResponseProducer for KafkaResponseProducer {
    async fn publish(&self, frame: &ResponseFrame) -> Result<(), BusError> {
        let payload =
            serde_json::to_string(frame).map_err(|e| BusError::Publish(e.to_string()))?;
        let record = FutureRecord::to(&self.topic)
            .key(&frame.request_id)
            .payload(&payload);
        self.producer
            .send(record, PUBLISH_TIMEOUT)
            .await
            .map_err(|(e, _)| BusError::Publish(e.to_string()))?;
        Ok(())
    }
}

pub struct KafkaRequestConsumer {
    consumer: StreamConsumer,
}

impl KafkaRequestConsumer {
    pub fn new(config: &KafkaConfig) -> Result<Self, BusError> {
        let consumer: StreamConsumer = client_config(&config.bootstrap_servers)
            .set("group.id", &config.worker_group_id)
            .create()
            .map_err(|e| BusError::Connect(e.to_string()))?;
        consumer
            .subscribe(&[&config.request_topic])
            .map_err(|e| BusError::Connect(e.to_string()))?;
        Ok(Self { consumer })
    }
}

#[async_trait]
impl RequestConsumer for KafkaRequestConsumer {
    async fn recv(&mut self) -> Result<WorkItem, BusError> {
        let msg = self
            .consumer
            .recv()
            .await
            .map_err(|e| BusError::Consume(e.to_string()))?;
        let payload = msg
            .payload()
            .ok_or_else(|| BusError::Consume("empty payload".to_owned()))?;
        serde_json::from_slice(payload).map_err(|e| BusError::Consume(e.to_string()))
    }
}

pub struct KafkaResponseConsumer {
    consumer: StreamConsumer,
}

impl KafkaResponseConsumer {
    /// `config.worker_group_id` is ignored here; the dispatcher's group id
    /// is derived fresh on every start via [`random_group_suffix`].
    pub fn new(config: &KafkaConfig, group_id: &str) -> Result<Self, BusError> {
        let consumer: StreamConsumer = client_config(&config.bootstrap_servers)
            .set("group.id", group_id)
            .create()
            .map_err(|e| BusError::Connect(e.to_string()))?;
        consumer
            .subscribe(&[&config.response_topic])
            .map_err(|e| BusError::Connect(e.to_string()))?;
        Ok(Self { consumer })
    }
}

#[async_trait]
impl ResponseConsumer for KafkaResponseConsumer {
    async fn recv(&mut self) -> Result<ResponseFrame, BusError> {
        let msg = self
            .consumer
            .recv()
            .await
            .map_err(|e| BusError::Consume(e.to_string()))?;
        let payload = msg
            .payload()
            .ok_or_else(|| BusError::Consume("empty payload".to_owned()))?;
        serde_json::from_slice(payload).map_err(|e| BusError::Consume(e.to_string()))
    }
}

/// Used by `GET /health`: true if the broker answers a metadata request
/// within `timeout`.
pub async fn is_reachable(producer: &FutureProducer, timeout: Duration) -> bool {
    let client = producer.client().clone();
    tokio::task::spawn_blocking(move || client.fetch_metadata(None, timeout).is_ok())
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_group_suffix_is_not_constant() {
        let a = random_group_suffix();
        let b = random_group_suffix();
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
    }
}
