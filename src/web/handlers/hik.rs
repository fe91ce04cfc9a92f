//! # Device Event Handler
//!
//! `POST /hik/events`: devices post `multipart/form-data`; a plain JSON body
//! is accepted as well for tooling and replay.

use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::Json;
use tracing::{debug, error, warn};

use crate::events::{
    extract_event_data, extract_picture, parse_event_json, DeviceEvent, FormPart, ResponseStatus,
};
use crate::logging::log_error;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::middleware::request_id::RequestId;
use crate::web::state::AppState;

pub const EVENTS_PATH: &str = "/hik/events";

pub async fn receive_event(
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<Json<ResponseStatus>> {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.as_str().to_string());

    let (event_data, picture) = if is_multipart(&request) {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        let parts = read_parts(multipart).await?;
        (extract_event_data(&parts)?, extract_picture(&parts))
    } else {
        let body = Bytes::from_request(request, &state)
            .await
            .map_err(|e| match e.status() {
                StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge,
                _ => ApiError::bad_request(e.body_text()),
            })?;
        (parse_event_json(&body)?, None)
    };

    let event = DeviceEvent::parse(event_data).map_err(|e| {
        warn!(error = %e, "Rejected device event");
        ApiError::from(e)
    })?;

    let outcome = state.ingest.ingest(event, picture).await.map_err(|e| {
        log_error(
            "web",
            "receive_event",
            &e.to_string(),
            request_id.as_deref(),
        );
        ApiError::from(e)
    })?;

    debug!(?outcome, "Event processed successfully");
    Ok(Json(ResponseStatus::ok(EVENTS_PATH)))
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"))
}

async fn read_parts(mut multipart: Multipart) -> ApiResult<Vec<FormPart>> {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        parts.push(FormPart::from_raw(name, file_name, content_type, bytes.to_vec()));
    }
    Ok(parts)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::PayloadTooLarge;
    }
    error!(error = %err, "Malformed multipart body");
    ApiError::bad_request(err.body_text())
}
