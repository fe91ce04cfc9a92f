//! # Message Producer
//!
//! Publishes outbox events to the broker.
//!
//! - [`message`] - message envelope and priorities
//! - [`sink`] - the [`MessageSink`] seam plus log and in-memory sinks
//! - [`kafka`] - Kafka sink (feature `kafka`)
//! - [`service`] - [`ProducerService`] with retries and statistics

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod message;
pub mod service;
pub mod sink;

use std::sync::Arc;

use crate::config::KafkaConfig;

#[cfg(feature = "kafka")]
pub use kafka::KafkaSink;
pub use message::{Message, MessagePriority};
pub use service::{ProducerHealth, ProducerService, ProducerStats, SendOutcome};
pub use sink::{Delivery, InMemorySink, LogSink, MessageSink, RecordedMessage, SinkError};

/// Pick the sink for this configuration: Kafka when enabled, the log otherwise
pub fn sink_from_config(config: &KafkaConfig) -> Arc<dyn MessageSink> {
    if !config.enabled {
        return Arc::new(LogSink::new());
    }

    #[cfg(feature = "kafka")]
    {
        Arc::new(KafkaSink::new(config.clone()))
    }

    #[cfg(not(feature = "kafka"))]
    {
        tracing::warn!("Kafka is enabled in configuration but the `kafka` feature is not compiled in; using the log sink");
        Arc::new(LogSink::new())
    }
}
