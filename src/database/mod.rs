//! # Database
//!
//! PostgreSQL pool construction and the embedded migrations for the
//! `events`, `heartbeats` and `outbox_events` tables.

pub mod connection;

pub use connection::{DatabaseConnection, MIGRATOR};
