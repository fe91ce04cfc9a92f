//! # Structured Logging Module
//!
//! Environment-aware structured logging that outputs to both console and a
//! JSON log file, plus helpers for the operations this service performs.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::events::schemas::{EventNotificationAlert, HeartbeatInfo};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// `level_override` comes from `--log-level` and wins over `RUST_LOG` and the
/// environment default.
pub fn init_structured_logging(environment: &str, level_override: Option<&str>) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let log_level = resolve_log_level(
            environment,
            level_override,
            std::env::var("RUST_LOG").ok().as_deref(),
        );

        let log_dir = PathBuf::from("log");
        let file_layer = match fs::create_dir_all(&log_dir) {
            Ok(()) => {
                let pid = process::id();
                let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
                let file_name = format!("{environment}.{pid}.{timestamp}.log");
                let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
                let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
                // Keep the writer alive for the lifetime of the process
                std::mem::forget(guard);
                Some(
                    fmt::layer()
                        .with_writer(file_writer)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true)
                        .with_ansi(false)
                        .json()
                        .with_filter(EnvFilter::new(log_level.clone())),
                )
            }
            Err(e) => {
                eprintln!("Could not create log directory {}: {e}", log_dir.display());
                None
            }
        };

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(true)
                    .with_filter(EnvFilter::new(log_level.clone())),
            )
            .with(file_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            log_level = %log_level,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Pick the filter directive: explicit override, then RUST_LOG, then environment
pub fn resolve_log_level(
    environment: &str,
    level_override: Option<&str>,
    rust_log: Option<&str>,
) -> String {
    if let Some(level) = level_override.and_then(normalize_level) {
        return level;
    }
    if let Some(directive) = rust_log.filter(|v| !v.trim().is_empty()) {
        return directive.to_string();
    }
    get_log_level(environment)
}

/// Map CLI spellings (`DEBUG`, `warning`, ...) to tracing levels
pub fn normalize_level(level: &str) -> Option<String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace".to_string()),
        "debug" => Some("debug".to_string()),
        "info" => Some("info".to_string()),
        "warn" | "warning" => Some("warn".to_string()),
        "error" | "critical" => Some("error".to_string()),
        _ => None,
    }
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for device event handling
pub fn log_event_operation(
    operation: &str,
    event_type: &str,
    device_id: Option<&str>,
    record_id: Option<i64>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        event_type = %event_type,
        device_id = device_id,
        record_id = record_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📡 EVENT_OPERATION"
    );
}

/// Log structured data for outbox relay operations
pub fn log_outbox_operation(
    operation: &str,
    outbox_id: Option<i64>,
    event_type: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        outbox_id = outbox_id,
        event_type = event_type,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📤 OUTBOX_OPERATION"
    );
}

/// Log structured data for database operations
pub fn log_database_operation(
    operation: &str,
    table: Option<&str>,
    record_id: Option<i64>,
    status: &str,
    duration_ms: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        table = table,
        record_id = record_id,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "💾 DATABASE_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}

/// Render an access controller event as a boxed block and log it
pub fn log_pretty_event(event: &EventNotificationAlert) {
    let title = format!(
        "📡 Event Type: {} | 📅 Time: {}",
        event.event_type,
        event.date_time.to_rfc3339()
    );
    let panel = render_panel(&title, &event_rows(event));
    tracing::info!("\n{panel}");
    tracing::info!(
        "[Event] {} from {} at {}",
        event.event_type,
        event.device_id,
        event.date_time.to_rfc3339()
    );
}

/// Render a heartbeat as a boxed block and log it
pub fn log_pretty_heartbeat(heartbeat: &HeartbeatInfo) {
    let title = format!(
        "💓 Heartbeat Event | 📅 Time: {}",
        heartbeat.date_time.to_rfc3339()
    );
    let rows = vec![
        (
            "Active Post Count".to_string(),
            heartbeat.active_post_count.to_string(),
        ),
        ("Event State".to_string(), heartbeat.event_state.clone()),
        (
            "Description".to_string(),
            heartbeat.event_description.clone(),
        ),
        ("Date Time".to_string(), heartbeat.date_time.to_rfc3339()),
    ];
    let panel = render_panel(&title, &rows);
    tracing::info!("\n{panel}");
    tracing::info!("[Heartbeat] at {}", heartbeat.date_time.to_rfc3339());
}

/// Display rows for an access event: core fields first, then the
/// access-controller fields that are present
pub fn event_rows(event: &EventNotificationAlert) -> Vec<(String, String)> {
    let ace = &event.access_controller_event;
    let mut rows = vec![
        ("Device ID".to_string(), event.device_id.clone()),
        ("Event State".to_string(), event.event_state.clone()),
        ("Description".to_string(), event.event_description.clone()),
        ("Post Count".to_string(), event.active_post_count.to_string()),
        ("Date Time".to_string(), event.date_time.to_rfc3339()),
        ("Major Event".to_string(), ace.major_event.to_string()),
        ("Minor Event".to_string(), ace.minor_event.to_string()),
    ];

    let optional: [(&str, Option<String>); 9] = [
        ("Employee No", ace.person_id.clone()),
        ("Employee Name", ace.person_name.clone()),
        (
            "Verify Mode",
            ace.current_verify_mode.as_ref().map(|m| m.to_string()),
        ),
        ("Attendance Status", ace.attendance_status.clone()),
        ("User Type", ace.user_type.clone()),
        ("Card No", ace.card_no.clone()),
        ("Swipe Type", ace.swipe_card_type.map(|v| v.to_string())),
        ("Mask", ace.mask.clone()),
        ("Pictures", ace.pictures_number.map(|v| v.to_string())),
    ];
    rows.extend(
        optional
            .into_iter()
            .filter_map(|(label, value)| value.map(|v| (format!("[AC] {label}"), v))),
    );
    rows
}

fn render_panel(title: &str, rows: &[(String, String)]) -> String {
    let label_width = rows.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    let lines: Vec<String> = rows
        .iter()
        .map(|(k, v)| format!("{k:<label_width$} : {v}"))
        .collect();
    let inner_width = lines
        .iter()
        .map(|l| l.chars().count())
        .chain(std::iter::once(title.chars().count() + 1))
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    out.push_str(&format!(
        "╭─ {title} {}╮\n",
        "─".repeat(inner_width - title.chars().count() - 1)
    ));
    for line in &lines {
        let pad = inner_width - line.chars().count();
        out.push_str(&format!("│ {line}{} │\n", " ".repeat(pad)));
    }
    out.push_str(&format!("╰{}╯", "─".repeat(inner_width + 2)));
    out
}
