//! # Web Application State
//!
//! Shared handles for request handlers. Everything is behind `Arc` or a
//! cloneable handle so the state is cheap to clone per request.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::ListenerConfig;
use crate::events::EventIngestService;
use crate::outbox::{DispatchHandle, ProcessorMonitor};
use crate::producer::ProducerService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ListenerConfig>,
    pub ingest: Arc<EventIngestService>,
    pub producer: Arc<ProducerService>,
    /// Present when the periodic sweep is enabled
    pub outbox: Option<ProcessorMonitor>,
    /// Present when immediate publishing is enabled
    pub dispatcher: Option<DispatchHandle>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: Arc<ListenerConfig>,
        ingest: Arc<EventIngestService>,
        producer: Arc<ProducerService>,
    ) -> Self {
        Self {
            config,
            ingest,
            producer,
            outbox: None,
            dispatcher: None,
            started_at: Utc::now(),
        }
    }

    pub fn with_outbox(mut self, monitor: ProcessorMonitor) -> Self {
        self.outbox = Some(monitor);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: DispatchHandle) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn environment(&self) -> &str {
        &self.config.environment
    }
}
