use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::fmt;

use super::schemas::{EventNotificationAlert, HeartbeatInfo};
use crate::error::Result;
use crate::outbox::models::{OutboxDraft, OutboxEvent};

/// Why a person showed up in an access event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "person_purpose_enum")]
pub enum PersonPurpose {
    #[sqlx(rename = "att")]
    #[serde(rename = "att")]
    Attendance,
    #[sqlx(rename = "info")]
    #[serde(rename = "info")]
    Information,
}

impl PersonPurpose {
    /// Events naming a person count towards attendance; an empty name
    /// names nobody
    pub fn classify(person_name: Option<&str>) -> Self {
        if person_name.is_some_and(|name| !name.is_empty()) {
            Self::Attendance
        } else {
            Self::Information
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attendance => "att",
            Self::Information => "info",
        }
    }
}

impl fmt::Display for PersonPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event is a persisted access controller event
/// Maps to `events` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub date_time: DateTime<Utc>,
    pub active_post_count: i32,
    pub event_type: String,
    pub event_state: String,
    pub event_description: String,
    pub device_id: String,
    pub major_event: i32,
    pub minor_event: i32,
    pub serial_no: Option<i64>,
    pub verify_no: Option<i64>,
    pub person_id: Option<String>,
    pub person_name: Option<String>,
    pub purpose: Option<PersonPurpose>,
    pub zone_type: Option<i32>,
    pub swipe_card_type: Option<i32>,
    pub card_no: Option<String>,
    pub card_type: Option<i32>,
    pub user_type: Option<String>,
    pub current_verify_mode: Option<String>,
    pub current_event: Option<bool>,
    pub front_serial_no: Option<i64>,
    pub attendance_status: Option<String>,
    pub pictures_number: Option<i32>,
    pub mask: Option<String>,
    pub picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn is_attendance_event(&self) -> bool {
        self.attendance_status.is_some() && self.purpose == Some(PersonPurpose::Attendance)
    }
}

/// New Event for creation (without generated fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub date_time: DateTime<Utc>,
    pub active_post_count: i32,
    pub event_type: String,
    pub event_state: String,
    pub event_description: String,
    pub device_id: String,
    pub major_event: i32,
    pub minor_event: i32,
    pub serial_no: Option<i64>,
    pub verify_no: Option<i64>,
    pub person_id: Option<String>,
    pub person_name: Option<String>,
    pub purpose: PersonPurpose,
    pub zone_type: Option<i32>,
    pub swipe_card_type: Option<i32>,
    pub card_no: Option<String>,
    pub card_type: Option<i32>,
    pub user_type: Option<String>,
    pub current_verify_mode: Option<String>,
    pub current_event: Option<bool>,
    pub front_serial_no: Option<i64>,
    pub attendance_status: Option<String>,
    pub pictures_number: Option<i32>,
    pub mask: Option<String>,
    pub picture_url: Option<String>,
}

impl NewEvent {
    pub fn from_alert(alert: &EventNotificationAlert, picture_url: Option<String>) -> Self {
        let ace = &alert.access_controller_event;
        Self {
            date_time: alert.date_time.with_timezone(&Utc),
            active_post_count: alert.active_post_count,
            event_type: alert.event_type.clone(),
            event_state: alert.event_state.clone(),
            event_description: alert.event_description.clone(),
            device_id: alert.device_id.clone(),
            major_event: ace.major_event,
            minor_event: ace.minor_event,
            serial_no: ace.serial_no,
            verify_no: ace.verify_no,
            person_id: ace.person_id.clone(),
            person_name: ace.person_name.clone(),
            purpose: PersonPurpose::classify(ace.person_name.as_deref()),
            zone_type: ace.zone_type,
            swipe_card_type: ace.swipe_card_type,
            card_no: ace.card_no.clone(),
            card_type: ace.card_type,
            user_type: ace.user_type.clone(),
            current_verify_mode: ace.current_verify_mode.as_ref().map(|m| m.to_string()),
            current_event: ace.current_event,
            front_serial_no: ace.front_serial_no,
            attendance_status: ace.attendance_status.clone(),
            pictures_number: ace.pictures_number,
            mask: ace.mask.clone(),
            picture_url,
        }
    }

    pub fn is_attendance(&self) -> bool {
        self.purpose == PersonPurpose::Attendance
    }

    /// Materialize as a stored row; used by stores that assign ids themselves
    pub fn into_event(self, id: i64, created_at: DateTime<Utc>) -> Event {
        Event {
            id,
            date_time: self.date_time,
            active_post_count: self.active_post_count,
            event_type: self.event_type,
            event_state: self.event_state,
            event_description: self.event_description,
            device_id: self.device_id,
            major_event: self.major_event,
            minor_event: self.minor_event,
            serial_no: self.serial_no,
            verify_no: self.verify_no,
            person_id: self.person_id,
            person_name: self.person_name,
            purpose: Some(self.purpose),
            zone_type: self.zone_type,
            swipe_card_type: self.swipe_card_type,
            card_no: self.card_no,
            card_type: self.card_type,
            user_type: self.user_type,
            current_verify_mode: self.current_verify_mode,
            current_event: self.current_event,
            front_serial_no: self.front_serial_no,
            attendance_status: self.attendance_status,
            pictures_number: self.pictures_number,
            mask: self.mask,
            picture_url: self.picture_url,
            created_at,
        }
    }
}

/// Heartbeat is a persisted device heartbeat
/// Maps to `heartbeats` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Heartbeat {
    pub id: i64,
    pub date_time: DateTime<Utc>,
    pub active_post_count: i32,
    pub event_type: String,
    pub event_state: String,
    pub event_description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHeartbeat {
    pub date_time: DateTime<Utc>,
    pub active_post_count: i32,
    pub event_type: String,
    pub event_state: String,
    pub event_description: String,
}

impl From<&HeartbeatInfo> for NewHeartbeat {
    fn from(info: &HeartbeatInfo) -> Self {
        Self {
            date_time: info.date_time.with_timezone(&Utc),
            active_post_count: info.active_post_count,
            event_type: info.event_type.clone(),
            event_state: info.event_state.clone(),
            event_description: info.event_description.clone(),
        }
    }
}

impl NewHeartbeat {
    pub fn into_heartbeat(self, id: i64, created_at: DateTime<Utc>) -> Heartbeat {
        Heartbeat {
            id,
            date_time: self.date_time,
            active_post_count: self.active_post_count,
            event_type: self.event_type,
            event_state: self.event_state,
            event_description: self.event_description,
            created_at,
        }
    }
}

/// Result of persisting an access event
#[derive(Debug, Clone, PartialEq)]
pub struct SavedAccessEvent {
    pub event: Event,
    pub outbox_event: Option<OutboxEvent>,
}

/// Persistence seam for device events
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Save the event and, when given, its outbox entry atomically. The
    /// outbox entry's aggregate id is the saved event's id.
    async fn save_access_event(
        &self,
        event: NewEvent,
        outbox: Option<OutboxDraft>,
    ) -> Result<SavedAccessEvent>;

    async fn save_heartbeat(&self, heartbeat: NewHeartbeat) -> Result<Heartbeat>;

    async fn ping(&self) -> Result<()>;
}

const EVENT_COLUMNS: &str = "id, date_time, active_post_count, event_type, event_state, \
    event_description, device_id, major_event, minor_event, serial_no, verify_no, person_id, \
    person_name, purpose, zone_type, swipe_card_type, card_no, card_type, user_type, \
    current_verify_mode, current_event, front_serial_no, attendance_status, pictures_number, \
    mask, picture_url, created_at";

#[derive(Debug, Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an event by ID
    pub async fn find_event(&self, id: i64) -> Result<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn save_access_event(
        &self,
        event: NewEvent,
        outbox: Option<OutboxDraft>,
    ) -> Result<SavedAccessEvent> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO events (
                date_time, active_post_count, event_type, event_state, event_description,
                device_id, major_event, minor_event, serial_no, verify_no, person_id,
                person_name, purpose, zone_type, swipe_card_type, card_no, card_type,
                user_type, current_verify_mode, current_event, front_serial_no,
                attendance_status, pictures_number, mask, picture_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23, $24, $25)
            RETURNING {EVENT_COLUMNS}
            "#
        );
        let saved = sqlx::query_as::<_, Event>(&sql)
            .bind(event.date_time)
            .bind(event.active_post_count)
            .bind(&event.event_type)
            .bind(&event.event_state)
            .bind(&event.event_description)
            .bind(&event.device_id)
            .bind(event.major_event)
            .bind(event.minor_event)
            .bind(event.serial_no)
            .bind(event.verify_no)
            .bind(&event.person_id)
            .bind(&event.person_name)
            .bind(event.purpose)
            .bind(event.zone_type)
            .bind(event.swipe_card_type)
            .bind(&event.card_no)
            .bind(event.card_type)
            .bind(&event.user_type)
            .bind(&event.current_verify_mode)
            .bind(event.current_event)
            .bind(event.front_serial_no)
            .bind(&event.attendance_status)
            .bind(event.pictures_number)
            .bind(&event.mask)
            .bind(&event.picture_url)
            .fetch_one(&mut *tx)
            .await?;

        let outbox_event = match outbox {
            Some(draft) => {
                let new_outbox = draft.for_aggregate(saved.id.to_string());
                Some(OutboxEvent::create(&mut *tx, &new_outbox).await?)
            }
            None => None,
        };

        tx.commit().await?;

        Ok(SavedAccessEvent {
            event: saved,
            outbox_event,
        })
    }

    async fn save_heartbeat(&self, heartbeat: NewHeartbeat) -> Result<Heartbeat> {
        let saved = sqlx::query_as::<_, Heartbeat>(
            r#"
            INSERT INTO heartbeats (date_time, active_post_count, event_type, event_state, event_description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, date_time, active_post_count, event_type, event_state, event_description, created_at
            "#,
        )
        .bind(heartbeat.date_time)
        .bind(heartbeat.active_post_count)
        .bind(&heartbeat.event_type)
        .bind(&heartbeat.event_state)
        .bind(&heartbeat.event_description)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
