//! # Producer Service
//!
//! Wraps a [`MessageSink`] with lifecycle management, retries and
//! delivery statistics. One instance is shared by the whole process.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::message::{Message, MessagePriority};
use super::sink::{MessageSink, SinkError};
use crate::config::KafkaConfig;
use crate::error::{ListenerError, Result};

/// Result of a single send
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendOutcome {
    pub success: bool,
    pub message_id: String,
    pub topic: Option<String>,
    pub partition: Option<i32>,
    pub offset: Option<i64>,
    pub timestamp: Option<i64>,
    pub attempts: u32,
    pub error: Option<String>,
}

impl SendOutcome {
    fn failed(message_id: &str, attempts: u32, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: message_id.to_string(),
            topic: None,
            partition: None,
            offset: None,
            timestamp: None,
            attempts,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    messages_sent: u64,
    messages_failed: u64,
    total_bytes_sent: u64,
    start_time: Option<DateTime<Utc>>,
}

/// Snapshot of producer statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProducerStats {
    pub messages_sent: u64,
    pub messages_failed: u64,
    pub total_bytes_sent: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub is_running: bool,
    pub uptime_seconds: Option<f64>,
    pub success_rate: f64,
    pub sink: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProducerHealth {
    /// "up", "down" or "degraded"
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serialization_test: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ProducerStats>,
}

impl ProducerHealth {
    pub fn is_up(&self) -> bool {
        self.status == "up"
    }
}

pub struct ProducerService {
    config: KafkaConfig,
    sink: Arc<dyn MessageSink>,
    running: AtomicBool,
    counters: Mutex<Counters>,
    start_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for ProducerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerService")
            .field("sink", &self.sink.name())
            .field("default_topic", &self.config.default_topic)
            .field("running", &self.is_running())
            .finish()
    }
}

impl ProducerService {
    pub fn new(config: KafkaConfig, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            config,
            sink,
            running: AtomicBool::new(false),
            counters: Mutex::new(Counters::default()),
            start_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn default_topic(&self) -> &str {
        &self.config.default_topic
    }

    /// Connect the sink. Repeated calls on a running service are no-ops.
    ///
    /// Connection failures are retried `startup_attempts` times, sleeping
    /// `2^attempt` seconds in between.
    pub async fn start(&self) -> Result<()> {
        let _guard = self.start_lock.lock().await;
        if self.is_running() {
            return Ok(());
        }

        info!(
            sink = self.sink.name(),
            default_topic = %self.config.default_topic,
            "Starting producer service..."
        );

        let attempts = self.config.startup_attempts.max(1);
        let mut last_error = None;
        for attempt in 0..attempts {
            match self.sink.connect().await {
                Ok(()) => {
                    self.running.store(true, Ordering::SeqCst);
                    self.counters.lock().start_time = Some(Utc::now());
                    info!(sink = self.sink.name(), "✅ Producer service started successfully!");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        error = %e,
                        "Producer connection failed"
                    );
                    last_error = Some(e);
                    if attempt + 1 < attempts {
                        tokio::time::sleep(Duration::from_secs(1u64 << attempt.min(6))).await;
                    }
                }
            }
        }

        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        error!(error = %reason, "❌ Failed to start producer service");
        Err(ListenerError::Startup(format!(
            "producer failed to connect after {attempts} attempts: {reason}"
        )))
    }

    /// Flush in-flight messages and stop accepting new ones
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Stopping producer service...");
        match self.sink.flush(self.config.request_timeout()).await {
            Ok(()) => info!("✅ Producer service stopped successfully!"),
            Err(e) => error!(error = %e, "❌ Error stopping producer"),
        }
    }

    /// Send `message` to `topic` (default topic when `None`)
    ///
    /// Retryable sink errors are retried up to `max_retries` attempts with a
    /// linear `retry_delay * attempt` pause; any other error ends the send.
    pub async fn send_message(
        &self,
        message: &Message,
        topic: Option<&str>,
        partition_key: Option<&str>,
    ) -> std::result::Result<SendOutcome, SinkError> {
        if !self.is_running() {
            return Err(SinkError::NotRunning);
        }

        let target_topic = topic.unwrap_or(&self.config.default_topic);
        let key = message.partition_key(partition_key);
        let payload = serde_json::to_vec(&message.envelope(target_topic))
            .map_err(|e| SinkError::Serialization(e.to_string()))?;

        let max_attempts = self.config.max_retries.max(1);
        let mut attempts = 0;
        let mut last_error = String::new();

        while attempts < max_attempts {
            attempts += 1;
            debug!(
                message_id = %message.message_id,
                attempt = attempts,
                "Sending message"
            );

            match self.sink.send(target_topic, key, &payload).await {
                Ok(delivery) => {
                    {
                        let mut counters = self.counters.lock();
                        counters.messages_sent += 1;
                        counters.total_bytes_sent += payload.len() as u64;
                    }
                    debug!(
                        message_id = %message.message_id,
                        "✅ Message sent to {}[{}]@{}",
                        delivery.topic,
                        delivery.partition,
                        delivery.offset
                    );
                    return Ok(SendOutcome {
                        success: true,
                        message_id: message.message_id.clone(),
                        topic: Some(delivery.topic),
                        partition: Some(delivery.partition),
                        offset: Some(delivery.offset),
                        timestamp: delivery.timestamp,
                        attempts,
                        error: None,
                    });
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        message_id = %message.message_id,
                        attempt = attempts,
                        error = %e,
                        "Retryable error sending message"
                    );
                    last_error = e.to_string();
                    if attempts < max_attempts {
                        tokio::time::sleep(self.config.retry_delay() * attempts).await;
                    }
                }
                Err(e) => {
                    error!(
                        message_id = %message.message_id,
                        error = %e,
                        "Unexpected error sending message"
                    );
                    last_error = e.to_string();
                    break;
                }
            }
        }

        self.counters.lock().messages_failed += 1;
        Ok(SendOutcome::failed(
            &message.message_id,
            attempts,
            format!("Failed after {attempts} attempt(s): {last_error}"),
        ))
    }

    /// Send messages concurrently; results keep input order
    pub async fn send_batch(&self, messages: &[Message], topic: Option<&str>) -> Vec<SendOutcome> {
        if messages.is_empty() {
            return Vec::new();
        }
        info!("Sending batch of {} messages...", messages.len());

        let results = join_all(
            messages
                .iter()
                .map(|message| self.send_message(message, topic, None)),
        )
        .await;

        let outcomes: Vec<SendOutcome> = results
            .into_iter()
            .zip(messages)
            .map(|(result, message)| {
                result.unwrap_or_else(|e| SendOutcome::failed(&message.message_id, 0, e.to_string()))
            })
            .collect();

        let successful = outcomes.iter().filter(|o| o.success).count();
        info!(
            "Batch complete: {} sent, {} failed",
            successful,
            outcomes.len() - successful
        );
        outcomes
    }

    /// Build a [`Message`] and send it to the default topic
    pub async fn send_event(
        &self,
        event_type: &str,
        data: Value,
        source: &str,
        priority: MessagePriority,
        correlation_id: Option<String>,
    ) -> std::result::Result<SendOutcome, SinkError> {
        let mut message = Message::new(event_type, data, source).with_priority(priority);
        message.correlation_id = correlation_id;
        self.send_message(&message, None, None).await
    }

    pub fn stats(&self) -> ProducerStats {
        let counters = self.counters.lock();
        let total = counters.messages_sent + counters.messages_failed;
        ProducerStats {
            messages_sent: counters.messages_sent,
            messages_failed: counters.messages_failed,
            total_bytes_sent: counters.total_bytes_sent,
            start_time: counters.start_time,
            is_running: self.is_running(),
            uptime_seconds: counters
                .start_time
                .map(|t| (Utc::now() - t).num_milliseconds() as f64 / 1000.0),
            success_rate: if total > 0 {
                counters.messages_sent as f64 / total as f64
            } else {
                0.0
            },
            sink: self.sink.name().to_string(),
        }
    }

    pub fn health_check(&self) -> ProducerHealth {
        if !self.is_running() {
            return ProducerHealth {
                status: "down".to_string(),
                message: "Producer not running".to_string(),
                serialization_test: None,
                stats: None,
            };
        }

        let health_message = Message::new(
            "health_check",
            serde_json::json!({"health_check": true}),
            "health",
        );
        match serde_json::to_vec(&health_message.envelope(&self.config.default_topic)) {
            Ok(bytes) => ProducerHealth {
                status: "up".to_string(),
                message: "Producer healthy".to_string(),
                serialization_test: Some(!bytes.is_empty()),
                stats: Some(self.stats()),
            },
            Err(e) => ProducerHealth {
                status: "degraded".to_string(),
                message: format!("Health check failed: {e}"),
                serialization_test: Some(false),
                stats: Some(self.stats()),
            },
        }
    }
}
