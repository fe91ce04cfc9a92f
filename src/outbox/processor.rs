//! # Outbox Processor
//!
//! Periodic sweep that publishes whatever the immediate path missed. Runs on
//! its own tokio task; the server keeps serving while a sweep is in flight.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::models::OutboxStore;
use super::relay::{process_outbox_batch, BatchReport};
use crate::config::OutboxConfig;
use crate::constants::services;
use crate::producer::ProducerService;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessorStatus {
    pub running: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub last_report: Option<BatchReport>,
    pub last_error: Option<String>,
    pub total_processed: u64,
    pub total_failed: u64,
    pub sweeps: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessorHealth {
    /// "healthy" or "unhealthy"
    pub status: String,
    pub timestamp: String,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessorHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

struct SweepContext {
    config: OutboxConfig,
    store: Arc<dyn OutboxStore>,
    producer: Arc<ProducerService>,
    source: String,
    status: Arc<RwLock<ProcessorStatus>>,
}

impl SweepContext {
    async fn sweep(&self) -> crate::error::Result<BatchReport> {
        let result = process_outbox_batch(
            self.store.as_ref(),
            &self.producer,
            &self.source,
            self.config.batch_size,
            self.config.min_age(),
        )
        .await;

        let mut status = self.status.write();
        status.last_run = Some(Utc::now());
        status.sweeps += 1;
        match &result {
            Ok(report) => {
                status.last_report = Some(*report);
                status.last_error = None;
                status.total_processed += report.processed as u64;
                status.total_failed += report.failed as u64;
            }
            Err(e) => status.last_error = Some(e.to_string()),
        }
        result
    }
}

pub struct OutboxProcessor {
    context: Arc<SweepContext>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl OutboxProcessor {
    pub fn new(
        config: OutboxConfig,
        store: Arc<dyn OutboxStore>,
        producer: Arc<ProducerService>,
        source: impl Into<String>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            context: Arc::new(SweepContext {
                config,
                store,
                producer,
                source: source.into(),
                status: Arc::new(RwLock::new(ProcessorStatus::default())),
            }),
            shutdown,
            task: None,
        }
    }

    /// Spawn the sweep loop; calling it on a running processor does nothing
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }
        self.shutdown.send_replace(false);
        self.context.status.write().running = true;

        let context = self.context.clone();
        let mut shutdown = self.shutdown.subscribe();
        self.task = Some(tokio::spawn(async move {
            info!("Outbox processor started");
            let mut sweep_retries = 0u32;
            loop {
                let pause = match context.sweep().await {
                    Ok(_) => {
                        sweep_retries = 0;
                        context.config.poll_interval()
                    }
                    Err(e) if sweep_retries < context.config.sweep_max_retries => {
                        let delay = context
                            .config
                            .sweep_retry_delay(sweep_retries)
                            .max(context.config.error_backoff());
                        sweep_retries += 1;
                        error!(
                            error = %e,
                            retry = sweep_retries,
                            delay_seconds = delay.as_secs(),
                            "Error in outbox processor; retrying sweep"
                        );
                        delay
                    }
                    Err(e) => {
                        sweep_retries = 0;
                        error!(error = %e, "Error in outbox processor; resuming normal cadence");
                        context
                            .config
                            .poll_interval()
                            .max(context.config.error_backoff())
                    }
                };

                debug!(pause_ms = pause.as_millis() as u64, "Outbox sweep finished");
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = shutdown.wait_for(|stopped| *stopped) => break,
                }
            }
            context.status.write().running = false;
            info!("Outbox processor stopped");
        }));
    }

    /// Signal the loop and wait for the current sweep to finish
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        self.shutdown.send_replace(true);
        if let Err(e) = task.await {
            warn!(error = %e, "Outbox processor task ended abnormally");
        }
        self.context.status.write().running = false;
    }

    pub fn is_running(&self) -> bool {
        self.monitor().is_running()
    }

    pub fn status(&self) -> ProcessorStatus {
        self.monitor().status()
    }

    /// Run one sweep now, outside the loop
    pub async fn run_once(&self) -> crate::error::Result<BatchReport> {
        self.context.sweep().await
    }

    pub async fn health_check(&self) -> ProcessorHealth {
        self.monitor().health_check().await
    }

    /// Read-only view that outlives borrows of the processor
    pub fn monitor(&self) -> ProcessorMonitor {
        ProcessorMonitor {
            context: self.context.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ProcessorMonitor {
    context: Arc<SweepContext>,
}

impl ProcessorMonitor {
    pub fn is_running(&self) -> bool {
        self.context.status.read().running
    }

    pub fn status(&self) -> ProcessorStatus {
        self.context.status.read().clone()
    }

    pub async fn health_check(&self) -> ProcessorHealth {
        let timestamp = Utc::now().to_rfc3339();
        let service = services::OUTBOX_PROCESSOR.to_string();
        match self.context.store.ping().await {
            Ok(()) => ProcessorHealth {
                status: "healthy".to_string(),
                timestamp,
                service,
                error: None,
            },
            Err(e) => ProcessorHealth {
                status: "unhealthy".to_string(),
                timestamp,
                service,
                error: Some(e.to_string()),
            },
        }
    }
}
