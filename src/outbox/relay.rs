//! Relay steps shared by the dispatcher and the periodic processor.

use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::models::{OutboxEvent, OutboxStore};
use crate::error::{ListenerError, Result};
use crate::logging::log_outbox_operation;
use crate::producer::{MessagePriority, ProducerService, SendOutcome, SinkError};

/// Counts from one sweep over the outbox
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub fetched: usize,
    pub processed: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.fetched == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    Published { event_id: i64, outcome: SendOutcome },
    /// Missing, or already processed by another path
    NotFound { event_id: i64 },
}

async fn publish(
    producer: &ProducerService,
    source: &str,
    event: &OutboxEvent,
    priority: MessagePriority,
) -> std::result::Result<SendOutcome, SinkError> {
    producer
        .send_event(
            &event.event_type,
            event.payload.clone(),
            source,
            priority,
            Some(event.id.to_string()),
        )
        .await
}

/// Publish up to `batch_size` unprocessed events, oldest first, and mark the
/// successful ones processed. Individual failures are counted, not returned.
pub async fn process_outbox_batch(
    store: &dyn OutboxStore,
    producer: &ProducerService,
    source: &str,
    batch_size: usize,
    min_age: Duration,
) -> Result<BatchReport> {
    let events = store
        .fetch_unprocessed(batch_size as i64, min_age)
        .await?;

    if events.is_empty() {
        debug!("No outbox events to process");
        return Ok(BatchReport::default());
    }

    info!("Processing {} outbox events", events.len());

    let mut report = BatchReport {
        fetched: events.len(),
        ..BatchReport::default()
    };
    let mut published = Vec::with_capacity(events.len());

    for event in &events {
        match publish(producer, source, event, MessagePriority::Normal).await {
            Ok(outcome) if outcome.success => {
                published.push(event.id);
                debug!("Published outbox event {} to broker", event.id);
            }
            Ok(outcome) => {
                report.failed += 1;
                warn!(
                    outbox_id = event.id,
                    error = outcome.error.as_deref(),
                    "Failed to publish outbox event"
                );
            }
            Err(e) => {
                report.failed += 1;
                error!(outbox_id = event.id, error = %e, "Error processing outbox event");
            }
        }
    }

    // Delivered events that fail to be marked get published again later
    store.mark_processed(&published, Utc::now()).await?;
    report.processed = published.len();

    if report.processed > 0 || report.failed > 0 {
        info!(
            "Outbox batch complete: {} processed, {} failed",
            report.processed, report.failed
        );
    }
    Ok(report)
}

/// Publish a single outbox event right away with high priority
pub async fn publish_event_by_id(
    store: &dyn OutboxStore,
    producer: &ProducerService,
    source: &str,
    event_id: i64,
) -> Result<PublishOutcome> {
    let Some(event) = store.find_unprocessed(event_id).await? else {
        warn!("Outbox event {} not found or already processed", event_id);
        return Ok(PublishOutcome::NotFound { event_id });
    };

    let outcome = publish(producer, source, &event, MessagePriority::High)
        .await
        .map_err(|e| ListenerError::Publish(format!("event {event_id}: {e}")))?;

    if !outcome.success {
        let reason = outcome.error.unwrap_or_default();
        log_outbox_operation(
            "publish",
            Some(event_id),
            Some(&event.event_type),
            "failed",
            Some(&reason),
        );
        return Err(ListenerError::Publish(format!(
            "Failed to publish event {event_id}: {reason}"
        )));
    }

    store.mark_processed(&[event.id], Utc::now()).await?;
    log_outbox_operation(
        "publish",
        Some(event_id),
        Some(&event.event_type),
        "published",
        None,
    );
    Ok(PublishOutcome::Published { event_id, outcome })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KafkaConfig;
    use crate::outbox::models::OutboxStore;
    use crate::producer::InMemorySink;
    use crate::test_helpers::InMemoryOutboxStore;
    use serde_json::json;
    use std::sync::Arc;

    async fn producer(sink: Arc<InMemorySink>) -> ProducerService {
        let config = KafkaConfig {
            max_retries: 1,
            retry_delay_ms: 1,
            ..KafkaConfig::default()
        };
        let producer = ProducerService::new(config, sink);
        producer.start().await.unwrap();
        producer
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let store = InMemoryOutboxStore::new();
        let producer = producer(Arc::new(InMemorySink::new())).await;
        let report = process_outbox_batch(&store, &producer, "src", 100, Duration::ZERO)
            .await
            .unwrap();
        assert!(report.is_empty());
        assert_eq!(report, BatchReport::default());
    }

    #[tokio::test]
    async fn test_batch_marks_only_successes() {
        let store = InMemoryOutboxStore::new();
        let first = store.insert("1", "Event", "access_control.event_created", json!({"n": 1}));
        let second = store.insert("2", "Event", "access_control.event_created", json!({"n": 2}));
        let sink = Arc::new(InMemorySink::new());
        sink.fail_next_send(SinkError::Broker("down".into()));
        let producer = producer(sink.clone()).await;

        let report = process_outbox_batch(&store, &producer, "src", 100, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(
            report,
            BatchReport {
                fetched: 2,
                processed: 1,
                failed: 1
            }
        );
        assert!(!store.get(first).unwrap().processed);
        assert!(store.get(second).unwrap().processed);

        let records = sink.records();
        assert_eq!(records[0].payload["correlation_id"], second.to_string());
        assert_eq!(records[0].payload["priority"], "normal");
        assert_eq!(records[0].payload["source"], "src");
    }

    #[tokio::test]
    async fn test_batch_respects_size() {
        let store = InMemoryOutboxStore::new();
        for i in 0..5 {
            store.insert(i.to_string(), "Event", "e", json!({}));
        }
        let producer = producer(Arc::new(InMemorySink::new())).await;
        let report = process_outbox_batch(&store, &producer, "src", 3, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(store.unprocessed_count(), 2);
    }

    #[tokio::test]
    async fn test_publish_by_id() {
        let store = InMemoryOutboxStore::new();
        let id = store.insert("9", "Event", "access_control.event_created", json!({}));
        let sink = Arc::new(InMemorySink::new());
        let producer = producer(sink.clone()).await;

        let outcome = publish_event_by_id(&store, &producer, "src", id).await.unwrap();
        assert!(matches!(outcome, PublishOutcome::Published { .. }));
        assert!(store.get(id).unwrap().processed);
        assert_eq!(sink.records()[0].payload["priority"], "high");

        // second call sees it processed
        let outcome = publish_event_by_id(&store, &producer, "src", id).await.unwrap();
        assert_eq!(outcome, PublishOutcome::NotFound { event_id: id });
    }

    #[tokio::test]
    async fn test_publish_by_id_failure_is_error() {
        let store = InMemoryOutboxStore::new();
        let id = store.insert("9", "Event", "e", json!({}));
        let sink = Arc::new(InMemorySink::new());
        sink.fail_next_send(SinkError::Timeout("slow".into()));
        let producer = producer(sink).await;

        let err = publish_event_by_id(&store, &producer, "src", id).await.unwrap_err();
        assert!(matches!(err, ListenerError::Publish(_)));
        assert_eq!(store.ping().await.ok(), Some(()));
        assert!(!store.get(id).unwrap().processed);
    }
}
