#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, ISAPI in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Hik Event Listener
//!
//! HTTP service that receives Hikvision access controller notifications,
//! stores them in PostgreSQL and relays attendance events to Kafka through a
//! transactional outbox.
//!
//! ## Flow
//!
//! 1. A device posts `multipart/form-data` to `POST /hik/events`
//! 2. [`events::extract`] finds the event JSON and any picture
//! 3. [`events::schemas`] validates it, discriminated on `eventType`
//! 4. [`events::ingest`] stores the event and, for attendance events, an
//!    outbox row in the same transaction
//! 5. [`outbox::dispatcher`] publishes the row right away; the periodic
//!    [`outbox::processor`] sweep publishes anything the dispatcher missed
//!
//! ## Module Organization
//!
//! - [`config`] - YAML + environment configuration
//! - [`database`] - pool and migrations
//! - [`events`] - schemas, extraction, persistence and ingest
//! - [`outbox`] - outbox storage and both relay paths
//! - [`producer`] - message envelope, sinks and the producer service
//! - [`web`] - axum router, handlers and middleware
//! - [`bootstrap`] - system wiring and ordered shutdown
//! - [`logging`] - structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use event_listener::bootstrap::ListenerSystem;
//! use event_listener::config::ConfigManager;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config_manager = Arc::new(ConfigManager::load()?);
//! let handle = ListenerSystem::bootstrap(config_manager).await?;
//! println!("listening on {}", handle.local_addr());
//! handle.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod events;
pub mod logging;
pub mod outbox;
pub mod producer;
pub mod test_helpers;
pub mod web;

pub use bootstrap::{ListenerHandle, ListenerSystem};
pub use config::{ConfigManager, ListenerConfig};
pub use error::{ListenerError, Result};
