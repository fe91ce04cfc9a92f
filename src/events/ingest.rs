//! # Event Ingest
//!
//! Turns a validated [`DeviceEvent`] into stored rows and, for attendance
//! events, an outbox entry that is handed to the dispatcher after commit.

use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::extract::EventPicture;
use super::models::{EventRepository, NewEvent, NewHeartbeat, PersonPurpose};
use super::schemas::{DeviceEvent, EventNotificationAlert, HeartbeatInfo};
use crate::config::EventsConfig;
use crate::constants::{aggregates, outbox_events, tables};
use crate::error::{ListenerError, Result};
use crate::logging::{log_database_operation, log_event_operation, log_pretty_event, log_pretty_heartbeat};
use crate::outbox::{DispatchHandle, OutboxDraft};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestKind {
    Heartbeat,
    AccessEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub kind: IngestKind,
    /// Stored row id; `None` for heartbeats that were not persisted
    pub record_id: Option<i64>,
    pub purpose: Option<PersonPurpose>,
    pub outbox_id: Option<i64>,
    /// Whether the outbox id was handed to the dispatcher
    pub dispatched: bool,
    pub picture_url: Option<String>,
}

pub struct EventIngestService {
    repository: Arc<dyn EventRepository>,
    dispatcher: Option<DispatchHandle>,
    config: EventsConfig,
}

impl EventIngestService {
    pub fn new(
        repository: Arc<dyn EventRepository>,
        dispatcher: Option<DispatchHandle>,
        config: EventsConfig,
    ) -> Self {
        Self {
            repository,
            dispatcher,
            config,
        }
    }

    pub fn repository(&self) -> &Arc<dyn EventRepository> {
        &self.repository
    }

    pub async fn ingest(
        &self,
        event: DeviceEvent,
        picture: Option<EventPicture>,
    ) -> Result<IngestOutcome> {
        match event {
            DeviceEvent::Heartbeat(heartbeat) => self.ingest_heartbeat(&heartbeat).await,
            DeviceEvent::AccessController(alert) => self.ingest_access_event(&alert, picture).await,
        }
    }

    async fn ingest_heartbeat(&self, heartbeat: &HeartbeatInfo) -> Result<IngestOutcome> {
        log_pretty_heartbeat(heartbeat);

        let record_id = if self.config.persist_heartbeats {
            let saved = self
                .repository
                .save_heartbeat(NewHeartbeat::from(heartbeat))
                .await?;
            log_database_operation(
                "insert",
                Some(tables::HEARTBEATS),
                Some(saved.id),
                "success",
                None,
                None,
            );
            Some(saved.id)
        } else {
            None
        };

        Ok(IngestOutcome {
            kind: IngestKind::Heartbeat,
            record_id,
            purpose: None,
            outbox_id: None,
            dispatched: false,
            picture_url: None,
        })
    }

    async fn ingest_access_event(
        &self,
        alert: &EventNotificationAlert,
        picture: Option<EventPicture>,
    ) -> Result<IngestOutcome> {
        log_pretty_event(alert);

        let picture_url = match picture {
            Some(picture) => self.store_picture(alert, &picture).await,
            None => None,
        };

        let new_event = NewEvent::from_alert(alert, picture_url.clone());
        let purpose = new_event.purpose;
        let draft = if new_event.is_attendance() {
            let payload = serde_json::to_value(alert)
                .map_err(|e| ListenerError::Event(format!("cannot serialize event payload: {e}")))?;
            Some(OutboxDraft::new(
                aggregates::EVENT,
                outbox_events::ACCESS_EVENT_CREATED,
                payload,
            ))
        } else {
            None
        };

        let saved = self.repository.save_access_event(new_event, draft).await?;
        let outbox_id = saved.outbox_event.as_ref().map(|e| e.id);
        log_database_operation(
            "insert",
            Some(tables::EVENTS),
            Some(saved.event.id),
            "success",
            None,
            Some(purpose.as_str()),
        );
        if let Some(id) = outbox_id {
            log_database_operation(
                "insert",
                Some(tables::OUTBOX_EVENTS),
                Some(id),
                "success",
                None,
                Some(outbox_events::ACCESS_EVENT_CREATED),
            );
        }

        let dispatched = match (outbox_id, &self.dispatcher) {
            (Some(id), Some(dispatcher)) => dispatcher.trigger(id),
            _ => false,
        };

        log_event_operation(
            "ingest",
            &alert.event_type,
            Some(&alert.device_id),
            Some(saved.event.id),
            "stored",
            outbox_id.map(|id| format!("outbox_id={id}")).as_deref(),
        );

        Ok(IngestOutcome {
            kind: IngestKind::AccessEvent,
            record_id: Some(saved.event.id),
            purpose: Some(purpose),
            outbox_id,
            dispatched,
            picture_url,
        })
    }

    /// Write the picture under `picture_dir`; failures are logged and the
    /// event is stored without a picture
    async fn store_picture(
        &self,
        alert: &EventNotificationAlert,
        picture: &EventPicture,
    ) -> Option<String> {
        let Some(dir) = self.config.picture_dir.as_deref() else {
            debug!(
                bytes = picture.bytes.len(),
                "Picture received but no picture_dir configured; discarding"
            );
            return None;
        };

        let path = picture_path(dir, alert, picture);
        let result = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, &picture.bytes).await
        }
        .await;

        match result {
            Ok(()) => Some(path.to_string_lossy().into_owned()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to store event picture");
                None
            }
        }
    }
}

/// `<dir>/<device>_<serial|timestamp>.<ext>`, with the device id reduced to
/// filename-safe characters
pub fn picture_path(dir: &Path, alert: &EventNotificationAlert, picture: &EventPicture) -> PathBuf {
    let device: String = alert
        .device_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let suffix = alert
        .access_controller_event
        .serial_no
        .map(|serial| serial.to_string())
        .unwrap_or_else(|| Utc::now().format("%Y%m%d%H%M%S%3f").to_string());
    dir.join(format!("{device}_{suffix}.{}", picture.extension()))
}
