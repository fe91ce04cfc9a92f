//! In-memory stores for tests and local runs without PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ListenerError, Result};
use crate::events::models::{
    Event, EventRepository, Heartbeat, NewEvent, NewHeartbeat, SavedAccessEvent,
};
use crate::outbox::models::{NewOutboxEvent, OutboxDraft, OutboxEvent, OutboxStore};

#[derive(Debug, Default)]
pub struct InMemoryOutboxStore {
    events: Mutex<Vec<OutboxEvent>>,
    unhealthy: AtomicBool,
    fetch_failures: AtomicUsize,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, new_event: NewOutboxEvent) -> OutboxEvent {
        let mut events = self.events.lock();
        let event = OutboxEvent {
            id: events.len() as i64 + 1,
            aggregate_id: new_event.aggregate_id,
            aggregate_type: new_event.aggregate_type,
            event_type: new_event.event_type,
            payload: new_event.payload,
            created_at: Utc::now(),
            processed: false,
            processed_at: None,
        };
        events.push(event.clone());
        event
    }

    /// Insert an unprocessed event and return its id
    pub fn insert(
        &self,
        aggregate_id: impl Into<String>,
        aggregate_type: &str,
        event_type: &str,
        payload: Value,
    ) -> i64 {
        self.add(OutboxDraft::new(aggregate_type, event_type, payload).for_aggregate(aggregate_id))
            .id
    }

    pub fn get(&self, id: i64) -> Option<OutboxEvent> {
        self.events.lock().iter().find(|e| e.id == id).cloned()
    }

    pub fn all(&self) -> Vec<OutboxEvent> {
        self.events.lock().clone()
    }

    pub fn unprocessed_count(&self) -> usize {
        self.events.lock().iter().filter(|e| !e.processed).count()
    }

    /// Shift an event's creation time into the past
    pub fn backdate(&self, id: i64, by: Duration) {
        if let Some(event) = self.events.lock().iter_mut().find(|e| e.id == id) {
            event.created_at -= chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    /// Make the next `times` fetches fail
    pub fn fail_next_fetches(&self, times: usize) {
        self.fetch_failures.store(times, Ordering::SeqCst);
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn fetch_unprocessed(&self, limit: i64, min_age: Duration) -> Result<Vec<OutboxEvent>> {
        let remaining_failures = self.fetch_failures.load(Ordering::SeqCst);
        if remaining_failures > 0 {
            self.fetch_failures
                .store(remaining_failures - 1, Ordering::SeqCst);
            return Err(ListenerError::Database("simulated fetch failure".to_string()));
        }

        let cutoff = Utc::now() - chrono::Duration::from_std(min_age).unwrap_or(chrono::Duration::zero());
        let mut events: Vec<OutboxEvent> = self
            .events
            .lock()
            .iter()
            .filter(|e| !e.processed && e.created_at <= cutoff)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.created_at, e.id));
        events.truncate(limit.max(0) as usize);
        Ok(events)
    }

    async fn find_unprocessed(&self, id: i64) -> Result<Option<OutboxEvent>> {
        Ok(self.get(id).filter(|e| !e.processed))
    }

    async fn mark_processed(&self, ids: &[i64], at: DateTime<Utc>) -> Result<u64> {
        let mut changed = 0;
        for event in self.events.lock().iter_mut() {
            if !event.processed && ids.contains(&event.id) {
                event.processed = true;
                event.processed_at = Some(at);
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn ping(&self) -> Result<()> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(ListenerError::Database("store unavailable".to_string()));
        }
        Ok(())
    }
}

/// Event repository that writes outbox rows into a shared [`InMemoryOutboxStore`]
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    outbox: Arc<InMemoryOutboxStore>,
    events: Mutex<Vec<Event>>,
    heartbeats: Mutex<Vec<Heartbeat>>,
    fail_saves: AtomicBool,
}

impl InMemoryEventRepository {
    pub fn new(outbox: Arc<InMemoryOutboxStore>) -> Self {
        Self {
            outbox,
            ..Self::default()
        }
    }

    pub fn outbox(&self) -> &Arc<InMemoryOutboxStore> {
        &self.outbox
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn heartbeats(&self) -> Vec<Heartbeat> {
        self.heartbeats.lock().clone()
    }

    /// Make every save fail until reset
    pub fn set_failing(&self, failing: bool) {
        self.fail_saves.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ListenerError::Database("simulated write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn save_access_event(
        &self,
        event: NewEvent,
        outbox: Option<OutboxDraft>,
    ) -> Result<SavedAccessEvent> {
        self.check_available()?;

        let saved = {
            let mut events = self.events.lock();
            let saved = event.into_event(events.len() as i64 + 1, Utc::now());
            events.push(saved.clone());
            saved
        };
        let outbox_event = outbox.map(|draft| self.outbox.add(draft.for_aggregate(saved.id.to_string())));

        Ok(SavedAccessEvent {
            event: saved,
            outbox_event,
        })
    }

    async fn save_heartbeat(&self, heartbeat: NewHeartbeat) -> Result<Heartbeat> {
        self.check_available()?;
        let mut heartbeats = self.heartbeats.lock();
        let saved = heartbeat.into_heartbeat(heartbeats.len() as i64 + 1, Utc::now());
        heartbeats.push(saved.clone());
        Ok(saved)
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}
