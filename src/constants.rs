//! # System Constants
//!
//! Names shared between the ingest path, the outbox and the producer. Values
//! here end up on the wire or in the database, so changing one is a data
//! migration.

/// Device event type discriminators (`eventType` field).
pub mod device_events {
    pub const HEARTBEAT: &str = "heartBeat";
    pub const ACCESS_CONTROLLER: &str = "AccessControllerEvent";
}

/// Outbox aggregate types.
pub mod aggregates {
    pub const EVENT: &str = "Event";
}

/// Outbox event types published to the broker.
pub mod outbox_events {
    pub const ACCESS_EVENT_CREATED: &str = "access_control.event_created";
}

/// Producer defaults.
pub mod producer {
    pub const DEFAULT_SOURCE: &str = "event-listener";
    pub const DEFAULT_TOPIC: &str = "raw_events";
    pub const DEFAULT_CLIENT_ID: &str = "time-pay-producer";
}

/// Database table names.
pub mod tables {
    pub const EVENTS: &str = "events";
    pub const HEARTBEATS: &str = "heartbeats";
    pub const OUTBOX_EVENTS: &str = "outbox_events";
}

/// Service names reported by health checks.
pub mod services {
    pub const OUTBOX_PROCESSOR: &str = "outbox_processor";
}
