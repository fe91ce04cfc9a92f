//! # Outbox Dispatcher
//!
//! Immediate publish path: right after an ingest commits, its outbox id is
//! queued here and a worker publishes it. Failed publishes are retried with
//! exponential backoff; anything still unpublished is left for the periodic
//! sweep in [`super::processor`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::models::OutboxStore;
use super::relay::{publish_event_by_id, PublishOutcome};
use crate::config::OutboxConfig;
use crate::producer::ProducerService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DispatchJob {
    outbox_id: i64,
    retries: u32,
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    published: AtomicU64,
    retried: AtomicU64,
    dropped: AtomicU64,
    abandoned: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub enqueued: u64,
    pub published: u64,
    pub retried: u64,
    /// Rejected because the queue was full or closed
    pub dropped: u64,
    /// Retries exhausted; left for the sweep
    pub abandoned: u64,
}

/// Cheap handle for queueing outbox ids
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    sender: mpsc::Sender<DispatchJob>,
    counters: Arc<Counters>,
    shutdown: watch::Receiver<bool>,
}

impl DispatchHandle {
    /// Queue `outbox_id` for publishing without waiting
    pub fn trigger(&self, outbox_id: i64) -> bool {
        self.enqueue(DispatchJob {
            outbox_id,
            retries: 0,
        })
    }

    /// Queue `outbox_id` after `delay`
    pub fn trigger_after(&self, outbox_id: i64, delay: Duration) {
        if delay.is_zero() {
            self.trigger(outbox_id);
            return;
        }
        self.enqueue_after(
            DispatchJob {
                outbox_id,
                retries: 0,
            },
            delay,
        );
    }

    fn enqueue(&self, job: DispatchJob) -> bool {
        match self.sender.try_send(job) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                debug!(outbox_id = job.outbox_id, retries = job.retries, "Outbox event queued");
                true
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    outbox_id = job.outbox_id,
                    "Dispatch queue full; leaving event for the periodic sweep"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    outbox_id = job.outbox_id,
                    "Dispatcher stopped; leaving event for the periodic sweep"
                );
                false
            }
        }
    }

    fn enqueue_after(&self, job: DispatchJob, delay: Duration) {
        let handle = self.clone();
        let mut shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    handle.enqueue(job);
                }
                _ = shutdown.wait_for(|stopped| *stopped) => {
                    debug!(outbox_id = job.outbox_id, "Delayed dispatch cancelled by shutdown");
                }
            }
        });
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            published: self.counters.published.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            abandoned: self.counters.abandoned.load(Ordering::Relaxed),
        }
    }
}

struct WorkerContext {
    store: Arc<dyn OutboxStore>,
    producer: Arc<ProducerService>,
    source: String,
    config: OutboxConfig,
    handle: DispatchHandle,
}

impl WorkerContext {
    async fn run(&self, job: DispatchJob) {
        match publish_event_by_id(
            self.store.as_ref(),
            &self.producer,
            &self.source,
            job.outbox_id,
        )
        .await
        {
            Ok(PublishOutcome::Published { .. }) => {
                self.handle.counters.published.fetch_add(1, Ordering::Relaxed);
                info!("Successfully published single event {} to broker", job.outbox_id);
            }
            Ok(PublishOutcome::NotFound { .. }) => {}
            Err(e) if job.retries < self.config.dispatch_max_retries => {
                let delay = self.config.dispatch_retry_delay(job.retries);
                self.handle.counters.retried.fetch_add(1, Ordering::Relaxed);
                warn!(
                    outbox_id = job.outbox_id,
                    retry = job.retries + 1,
                    delay_seconds = delay.as_secs(),
                    error = %e,
                    "Error publishing event; retry scheduled"
                );
                self.handle.enqueue_after(
                    DispatchJob {
                        outbox_id: job.outbox_id,
                        retries: job.retries + 1,
                    },
                    delay,
                );
            }
            Err(e) => {
                self.handle.counters.abandoned.fetch_add(1, Ordering::Relaxed);
                error!(
                    outbox_id = job.outbox_id,
                    retries = job.retries,
                    error = %e,
                    "Giving up on immediate publish; the periodic sweep will retry"
                );
            }
        }
    }
}

pub struct OutboxDispatcher {
    handle: DispatchHandle,
    receiver: Arc<Mutex<mpsc::Receiver<DispatchJob>>>,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl OutboxDispatcher {
    /// Spawn `dispatch_workers` workers over a queue of `dispatch_queue_size`
    pub fn start(
        config: OutboxConfig,
        store: Arc<dyn OutboxStore>,
        producer: Arc<ProducerService>,
        source: impl Into<String>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.dispatch_queue_size.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = DispatchHandle {
            sender,
            counters: Arc::new(Counters::default()),
            shutdown: shutdown_rx,
        };
        let receiver = Arc::new(Mutex::new(receiver));
        let worker_count = config.dispatch_workers.max(1);

        let context = Arc::new(WorkerContext {
            store,
            producer,
            source: source.into(),
            config,
            handle: handle.clone(),
        });

        let workers = (0..worker_count)
            .map(|worker_id| {
                let context = context.clone();
                let receiver = receiver.clone();
                let mut shutdown = handle.shutdown.clone();
                tokio::spawn(async move {
                    debug!(worker_id, "Dispatch worker started");
                    loop {
                        let job = {
                            let mut receiver = receiver.lock().await;
                            tokio::select! {
                                job = receiver.recv() => job,
                                _ = shutdown.wait_for(|stopped| *stopped) => None,
                            }
                        };
                        match job {
                            Some(job) => context.run(job).await,
                            None => break,
                        }
                    }
                    debug!(worker_id, "Dispatch worker stopped");
                })
            })
            .collect();

        info!(workers = worker_count, "Outbox dispatcher started");
        Self {
            handle,
            receiver,
            shutdown,
            workers,
        }
    }

    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    pub fn trigger(&self, outbox_id: i64) -> bool {
        self.handle.trigger(outbox_id)
    }

    pub fn trigger_after(&self, outbox_id: i64, delay: Duration) {
        self.handle.trigger_after(outbox_id, delay)
    }

    pub fn stats(&self) -> DispatcherStats {
        self.handle.stats()
    }

    /// Close the queue and wait for in-flight publishes to finish
    pub async fn stop(self) {
        self.shutdown.send_replace(true);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Dispatch worker panicked");
            }
        }
        let mut receiver = self.receiver.lock().await;
        receiver.close();
        let mut leftover = 0;
        while receiver.try_recv().is_ok() {
            leftover += 1;
        }
        info!(
            leftover,
            "Outbox dispatcher stopped; queued events remain for the sweep"
        );
    }
}
