//! # Route Definitions

use axum::routing::{get, post};
use axum::Router;

use crate::web::handlers;
use crate::web::state::AppState;

/// Device-facing routes
pub fn event_routes() -> Router<AppState> {
    Router::new().route(handlers::hik::EVENTS_PATH, post(handlers::hik::receive_event))
}

/// Health routes:
/// - `/health` - basic health check
/// - `/health/outbox` - outbox processor health
/// - `/health/detailed` - all component checks
/// - `/ready` - readiness (503 when a check fails)
/// - `/live` - liveness
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::basic_health))
        .route("/health/outbox", get(handlers::health::outbox_health))
        .route("/health/detailed", get(handlers::health::detailed_health))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/live", get(handlers::health::liveness_check))
}
