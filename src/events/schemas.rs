//! # Device Event Schemas
//!
//! Payloads posted by Hikvision access controllers. Incoming JSON uses the
//! device's camelCase keys; serialization (outbox payloads) uses the Rust
//! field names so downstream consumers see a stable snake_case shape.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::verify_mode::VerifyMode;
use crate::constants::device_events;
use crate::error::{ListenerError, Result};

/// Periodic liveness message (`eventType = "heartBeat"`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatInfo {
    /// Alarm triggered time
    #[serde(
        rename(deserialize = "dateTime"),
        deserialize_with = "deserialize_device_datetime"
    )]
    pub date_time: DateTime<FixedOffset>,
    /// Number of times the same alarm has been triggered
    #[serde(rename(deserialize = "activePostCount"))]
    pub active_post_count: i32,
    #[serde(rename(deserialize = "eventType"))]
    pub event_type: String,
    /// "active" or "inactive"
    #[serde(rename(deserialize = "eventState"))]
    pub event_state: String,
    #[serde(rename(deserialize = "eventDescription"))]
    pub event_description: String,
}

/// Access controller notification (`eventType = "AccessControllerEvent"`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventNotificationAlert {
    #[serde(
        rename(deserialize = "dateTime"),
        deserialize_with = "deserialize_device_datetime"
    )]
    pub date_time: DateTime<FixedOffset>,
    #[serde(rename(deserialize = "activePostCount"))]
    pub active_post_count: i32,
    #[serde(rename(deserialize = "eventType"))]
    pub event_type: String,
    #[serde(rename(deserialize = "eventState"))]
    pub event_state: String,
    #[serde(rename(deserialize = "eventDescription"))]
    pub event_description: String,
    #[serde(rename(deserialize = "deviceID"))]
    pub device_id: String,
    #[serde(rename(deserialize = "AccessControllerEvent"))]
    pub access_controller_event: AccessControllerEvent,
}

/// Details of an access controller event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessControllerEvent {
    #[serde(rename(deserialize = "majorEventType"))]
    pub major_event: i32,
    #[serde(rename(deserialize = "subEventType"))]
    pub minor_event: i32,
    /// Used to detect event loss
    #[serde(rename(deserialize = "serialNo"), default)]
    pub serial_no: Option<i64>,
    /// Multiple authentication number
    #[serde(rename(deserialize = "verifyNo"), default)]
    pub verify_no: Option<i64>,
    /// Employee number (person ID)
    #[serde(rename(deserialize = "employeeNoString"), default)]
    pub person_id: Option<String>,
    /// Zone type: 0 instant .. 11 emergency door closed, 255 none
    #[serde(rename(deserialize = "type"), default)]
    pub zone_type: Option<i32>,
    #[serde(rename(deserialize = "swipeCardType"), default)]
    pub swipe_card_type: Option<i32>,
    #[serde(rename(deserialize = "cardNo"), default)]
    pub card_no: Option<String>,
    #[serde(rename(deserialize = "cardType"), default)]
    pub card_type: Option<i32>,
    /// "normal", "visitor", "blacklist" or "administrators"
    #[serde(rename(deserialize = "userType"), default)]
    pub user_type: Option<String>,
    #[serde(rename(deserialize = "currentVerifyMode"), default)]
    pub current_verify_mode: Option<VerifyMode>,
    /// Whether this is a real-time event
    #[serde(rename(deserialize = "currentEvent"), default)]
    pub current_event: Option<bool>,
    /// Previous event's serial number
    #[serde(rename(deserialize = "frontSerialNo"), default)]
    pub front_serial_no: Option<i64>,
    /// "undefined", "checkIn", "checkOut", "breakOut", "breakIn",
    /// "overtimeIn" or "overTimeOut"
    #[serde(rename(deserialize = "attendanceStatus"), default)]
    pub attendance_status: Option<String>,
    #[serde(rename(deserialize = "picturesNumber"), default)]
    pub pictures_number: Option<i32>,
    #[serde(default)]
    pub mask: Option<String>,
    #[serde(rename(deserialize = "name"), default)]
    pub person_name: Option<String>,
}

/// A device event, discriminated on `eventType`
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Heartbeat(HeartbeatInfo),
    AccessController(EventNotificationAlert),
}

impl DeviceEvent {
    /// Validate raw device JSON into a typed event
    pub fn parse(value: Value) -> Result<DeviceEvent> {
        let event_type = value
            .get("eventType")
            .and_then(Value::as_str)
            .ok_or_else(|| ListenerError::validation("Missing eventType"))?
            .to_string();

        match event_type.as_str() {
            device_events::HEARTBEAT => serde_json::from_value(value)
                .map(DeviceEvent::Heartbeat)
                .map_err(|e| ListenerError::validation(format!("Invalid heartbeat: {e}"))),
            device_events::ACCESS_CONTROLLER => serde_json::from_value(value)
                .map(DeviceEvent::AccessController)
                .map_err(|e| {
                    ListenerError::validation(format!("Invalid access controller event: {e}"))
                }),
            other => Err(ListenerError::validation(format!(
                "Unknown event type: {other}"
            ))),
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            DeviceEvent::Heartbeat(h) => &h.event_type,
            DeviceEvent::AccessController(e) => &e.event_type,
        }
    }

    pub fn date_time(&self) -> DateTime<FixedOffset> {
        match self {
            DeviceEvent::Heartbeat(h) => h.date_time,
            DeviceEvent::AccessController(e) => e.date_time,
        }
    }
}

/// Accept RFC 3339 timestamps and offset-less device clocks (read as UTC)
fn deserialize_device_datetime<'de, D>(deserializer: D) -> std::result::Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed);
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|e| D::Error::custom(format!("invalid dateTime '{raw}': {e}")))
}
