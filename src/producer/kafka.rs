//! Kafka-backed sink.

use async_trait::async_trait;
use parking_lot::RwLock;
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{debug, info};

use super::sink::{Delivery, MessageSink, SinkError};
use crate::config::KafkaConfig;

pub struct KafkaSink {
    config: KafkaConfig,
    producer: RwLock<Option<FutureProducer>>,
}

impl KafkaSink {
    pub fn new(config: KafkaConfig) -> Self {
        Self {
            config,
            producer: RwLock::new(None),
        }
    }

    fn client_config(&self) -> ClientConfig {
        let mut client = ClientConfig::new();
        client
            .set("bootstrap.servers", &self.config.bootstrap_servers)
            .set("client.id", &self.config.client_id)
            .set("acks", &self.config.acks)
            .set(
                "enable.idempotence",
                self.config.enable_idempotence.to_string(),
            )
            .set("compression.type", &self.config.compression_type)
            .set(
                "request.timeout.ms",
                self.config.request_timeout_ms.to_string(),
            )
            .set("retry.backoff.ms", self.config.retry_backoff_ms.to_string())
            .set("linger.ms", self.config.linger_ms.to_string())
            .set(
                "message.timeout.ms",
                self.config.request_timeout_ms.to_string(),
            );
        client
    }

    fn current(&self) -> Result<FutureProducer, SinkError> {
        self.producer.read().clone().ok_or(SinkError::NotRunning)
    }
}

fn classify(error: KafkaError) -> SinkError {
    match error {
        KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut)
        | KafkaError::MessageProduction(RDKafkaErrorCode::RequestTimedOut)
        | KafkaError::Flush(RDKafkaErrorCode::OperationTimedOut) => {
            SinkError::Timeout(error.to_string())
        }
        KafkaError::ClientCreation(msg) => SinkError::Other(msg),
        other => SinkError::Broker(other.to_string()),
    }
}

#[async_trait]
impl MessageSink for KafkaSink {
    async fn connect(&self) -> Result<(), SinkError> {
        if self.producer.read().is_some() {
            return Ok(());
        }

        info!(
            bootstrap_servers = %self.config.bootstrap_servers,
            default_topic = %self.config.default_topic,
            "Connecting Kafka producer"
        );
        let producer: FutureProducer = self.client_config().create().map_err(classify)?;

        // Metadata fetch is blocking; it proves the brokers are reachable
        let metadata_producer = producer.clone();
        let timeout = self.config.request_timeout();
        tokio::task::spawn_blocking(move || {
            metadata_producer
                .client()
                .fetch_metadata(None, Timeout::After(timeout))
                .map(|_| ())
        })
        .await
        .map_err(|e| SinkError::Other(format!("metadata request panicked: {e}")))?
        .map_err(classify)?;

        *self.producer.write() = Some(producer);
        Ok(())
    }

    async fn send(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: &[u8],
    ) -> Result<Delivery, SinkError> {
        let producer = self.current()?;
        let timestamp = chrono::Utc::now().timestamp_millis();

        let mut record = FutureRecord::<str, [u8]>::to(topic)
            .payload(payload)
            .timestamp(timestamp);
        if let Some(key) = key {
            record = record.key(key);
        }

        let (partition, offset) = producer
            .send(record, Timeout::After(self.config.request_timeout()))
            .await
            .map_err(|(err, _message)| classify(err))?;

        debug!(topic = %topic, partition, offset, "Kafka delivery confirmed");
        Ok(Delivery {
            topic: topic.to_string(),
            partition,
            offset,
            timestamp: Some(timestamp),
        })
    }

    async fn flush(&self, timeout: Duration) -> Result<(), SinkError> {
        let Some(producer) = self.producer.write().take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| SinkError::Other(format!("flush panicked: {e}")))?
            .map_err(classify)
    }

    fn name(&self) -> &'static str {
        "kafka"
    }
}
