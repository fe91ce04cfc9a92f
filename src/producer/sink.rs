//! Message sinks: where serialized producer messages end up.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Broker error: {0}")]
    Broker(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Producer service not started")]
    NotRunning,
    #[error("{0}")]
    Other(String),
}

impl SinkError {
    /// Timeouts and broker errors may succeed on another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Broker(_))
    }
}

/// Where a message landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Milliseconds since the epoch
    pub timestamp: Option<i64>,
}

#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Establish the connection; called by `ProducerService::start`
    async fn connect(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn send(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: &[u8],
    ) -> Result<Delivery, SinkError>;

    /// Wait for in-flight messages
    async fn flush(&self, _timeout: Duration) -> Result<(), SinkError> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}

/// Writes messages to the log; used when no broker is configured
#[derive(Debug, Default)]
pub struct LogSink {
    next_offset: AtomicI64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageSink for LogSink {
    async fn send(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: &[u8],
    ) -> Result<Delivery, SinkError> {
        let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
        info!(
            topic = %topic,
            key = key,
            offset = offset,
            payload = %String::from_utf8_lossy(payload),
            "📨 LOG_SINK: message produced"
        );
        Ok(Delivery {
            topic: topic.to_string(),
            partition: 0,
            offset,
            timestamp: Some(Utc::now().timestamp_millis()),
        })
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// A message captured by [`InMemorySink`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMessage {
    pub topic: String,
    pub key: Option<String>,
    pub payload: serde_json::Value,
}

/// Keeps messages in memory; failures can be scripted ahead of time
#[derive(Debug, Default)]
pub struct InMemorySink {
    records: Mutex<Vec<RecordedMessage>>,
    send_failures: Mutex<VecDeque<SinkError>>,
    connect_failures: Mutex<VecDeque<SinkError>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `send` with `error`; queued failures are used in order
    pub fn fail_next_send(&self, error: SinkError) {
        self.send_failures.lock().push_back(error);
    }

    pub fn fail_next_sends(&self, error: SinkError, times: usize) {
        let mut failures = self.send_failures.lock();
        for _ in 0..times {
            failures.push_back(error.clone());
        }
    }

    pub fn fail_next_connect(&self, error: SinkError) {
        self.connect_failures.lock().push_back(error);
    }

    pub fn records(&self) -> Vec<RecordedMessage> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl MessageSink for InMemorySink {
    async fn connect(&self) -> Result<(), SinkError> {
        match self.connect_failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn send(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: &[u8],
    ) -> Result<Delivery, SinkError> {
        if let Some(err) = self.send_failures.lock().pop_front() {
            return Err(err);
        }
        let payload = serde_json::from_slice(payload)
            .map_err(|e| SinkError::Serialization(e.to_string()))?;
        let mut records = self.records.lock();
        records.push(RecordedMessage {
            topic: topic.to_string(),
            key: key.map(str::to_string),
            payload,
        });
        Ok(Delivery {
            topic: topic.to_string(),
            partition: 0,
            offset: (records.len() - 1) as i64,
            timestamp: Some(Utc::now().timestamp_millis()),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
