//! # Device Events
//!
//! Everything between the HTTP body and the database: form extraction,
//! schema validation, the ISAPI status vocabulary, persistence models and
//! the ingest service that ties them together.

pub mod extract;
pub mod ingest;
pub mod models;
pub mod schemas;
pub mod status_codes;
pub mod verify_mode;

pub use extract::{extract_event_data, extract_picture, parse_event_json, EventPicture, FormPart};
pub use ingest::{EventIngestService, IngestKind, IngestOutcome};
pub use models::{
    Event, EventRepository, Heartbeat, NewEvent, NewHeartbeat, PersonPurpose, PgEventRepository,
    SavedAccessEvent,
};
pub use schemas::{AccessControllerEvent, DeviceEvent, EventNotificationAlert, HeartbeatInfo};
pub use status_codes::{ResponseStatus, StatusCode, SubStatus};
pub use verify_mode::VerifyMode;
