//! # Transactional Outbox
//!
//! Attendance events are written to `outbox_events` in the same transaction
//! as the event row, then relayed to the broker by two paths:
//!
//! - [`dispatcher`] - immediate publish right after the ingest commits
//! - [`processor`] - periodic sweep that picks up anything still unprocessed
//!
//! Both paths mark rows with `WHERE processed = false`, so a row published
//! by both is marked once but may be delivered twice (at-least-once).

pub mod dispatcher;
pub mod models;
pub mod processor;
pub mod relay;

pub use dispatcher::{DispatchHandle, DispatcherStats, OutboxDispatcher};
pub use models::{NewOutboxEvent, OutboxDraft, OutboxEvent, OutboxStore, PgOutboxStore};
pub use processor::{OutboxProcessor, ProcessorHealth, ProcessorMonitor, ProcessorStatus};
pub use relay::{process_outbox_batch, publish_event_by_id, BatchReport, PublishOutcome};
