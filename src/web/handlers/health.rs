//! # Health Check Handlers
//!
//! Liveness, readiness and per-component health for orchestrators and monitoring.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, error};

use crate::web::errors::ApiError;
use crate::web::state::AppState;

/// Basic health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// Detailed health check response
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub timestamp: String,
    pub checks: HashMap<String, HealthCheck>,
    pub info: HealthInfo,
}

/// Individual health check result
#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub status: String,
    pub message: Option<String>,
    pub duration_ms: u64,
}

impl HealthCheck {
    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Debug, Serialize)]
pub struct HealthInfo {
    pub version: String,
    pub environment: String,
    pub uptime_seconds: i64,
    pub producer_sink: String,
    pub outbox_processor_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatcher: Option<crate::outbox::DispatcherStats>,
}

/// GET /health
pub async fn basic_health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// GET /health/outbox
///
/// Always 200; the body carries the outcome.
pub async fn outbox_health(State(state): State<AppState>) -> Json<Value> {
    let Some(monitor) = &state.outbox else {
        return Json(json!({
            "outbox_status": "error",
            "error": "outbox processor is disabled",
        }));
    };

    let health = monitor.health_check().await;
    if health.is_healthy() {
        Json(json!({
            "outbox_status": "ok",
            "details": {
                "health": health,
                "processor": monitor.status(),
            },
        }))
    } else {
        Json(json!({
            "outbox_status": "error",
            "error": health.error.unwrap_or_else(|| "outbox processor unhealthy".to_string()),
        }))
    }
}

/// GET /ready
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<DetailedHealthResponse>, ApiError> {
    debug!("Performing readiness check");

    let checks = run_checks(&state).await;
    let ready = checks.values().all(HealthCheck::is_healthy);
    if !ready {
        error!(?checks, "Readiness check failed");
        return Err(ApiError::ServiceUnavailable);
    }

    Ok(Json(DetailedHealthResponse {
        status: "ready".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        checks,
        info: create_health_info(&state),
    }))
}

/// GET /live
pub async fn liveness_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "alive".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /health/detailed
pub async fn detailed_health(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    debug!("Performing detailed health check");

    let checks = run_checks(&state).await;
    let overall_healthy = checks.values().all(HealthCheck::is_healthy);

    Json(DetailedHealthResponse {
        status: if overall_healthy {
            "healthy"
        } else {
            "degraded"
        }
        .to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        checks,
        info: create_health_info(&state),
    })
}

async fn run_checks(state: &AppState) -> HashMap<String, HealthCheck> {
    let mut checks = HashMap::new();
    checks.insert("database".to_string(), check_database_health(state).await);
    checks.insert("producer".to_string(), check_producer_health(state));
    if let Some(monitor) = &state.outbox {
        let start = Instant::now();
        let health = monitor.health_check().await;
        checks.insert(
            "outbox_processor".to_string(),
            HealthCheck {
                status: health.status.clone(),
                message: health.error,
                duration_ms: start.elapsed().as_millis() as u64,
            },
        );
    }
    checks
}

async fn check_database_health(state: &AppState) -> HealthCheck {
    let start = Instant::now();
    match state.ingest.repository().ping().await {
        Ok(()) => HealthCheck {
            status: "healthy".to_string(),
            message: Some("Database connection successful".to_string()),
            duration_ms: start.elapsed().as_millis() as u64,
        },
        Err(e) => {
            error!(error = %e, "Database health check failed");
            HealthCheck {
                status: "unhealthy".to_string(),
                message: Some(format!("Database connection failed: {e}")),
                duration_ms: start.elapsed().as_millis() as u64,
            }
        }
    }
}

fn check_producer_health(state: &AppState) -> HealthCheck {
    let start = Instant::now();
    let health = state.producer.health_check();
    HealthCheck {
        status: if health.is_up() { "healthy" } else { "unhealthy" }.to_string(),
        message: Some(health.message),
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

fn create_health_info(state: &AppState) -> HealthInfo {
    HealthInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.environment().to_string(),
        uptime_seconds: (chrono::Utc::now() - state.started_at).num_seconds(),
        producer_sink: state.producer.stats().sink,
        outbox_processor_running: state.outbox.as_ref().is_some_and(|m| m.is_running()),
        dispatcher: state.dispatcher.as_ref().map(|d| d.stats()),
    }
}
