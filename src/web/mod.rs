//! # Web Module
//!
//! Axum HTTP surface: the device event endpoint and health checks.
//!
//! - [`routes`] - route definitions
//! - [`handlers`] - request handlers
//! - [`middleware`] - request id tagging
//! - [`state`] - shared application state
//! - [`errors`] - API error responses

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::Router;

pub use errors::{ApiError, ApiResult};
pub use state::AppState;

/// Build the router with all routes and the middleware stack
pub fn create_app(app_state: AppState) -> Router {
    let request_timeout = app_state.config.server.request_timeout();
    let body_limit = app_state.config.server.max_request_size_bytes();

    Router::new()
        .merge(routes::health_routes())
        .merge(routes::event_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(
            middleware::request_id::add_request_id,
        ))
        .layer(tower_http::timeout::TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state)
}
