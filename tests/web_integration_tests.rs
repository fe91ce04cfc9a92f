//! # Web Integration Tests
//!
//! Drive the router with `oneshot` over in-memory storage and sink.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use common::*;
use event_listener::events::PersonPurpose;

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app(test_config(), false).await;
    let response = app.router.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_multipart_attendance_event_is_stored_with_outbox_row() {
    let app = test_app(test_config(), false).await;
    let body = multipart_body(&access_event(Some("Aziz Karimov")), Some(&[0xff, 0xd8, 0xff]));

    let response = app
        .router
        .clone()
        .oneshot(multipart_request(body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status = body_json(response).await;
    assert_eq!(status["requestURL"], "/hik/events");
    assert_eq!(status["statusCode"], 1);
    assert_eq!(status["statusString"], "OK");
    assert_eq!(status["subStatusCode"], "ok");

    let events = app.repository.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].person_name.as_deref(), Some("Aziz Karimov"));
    assert_eq!(events[0].current_verify_mode.as_deref(), Some("cardOrFace"));

    let outbox = app.store.all();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].aggregate_id, events[0].id.to_string());
    assert_eq!(outbox[0].event_type, "access_control.event_created");
    assert_eq!(outbox[0].payload["date_time"], "2024-05-01T08:30:00+05:00");
    assert!(!outbox[0].processed);
}

#[tokio::test]
async fn test_event_without_person_is_stored_without_outbox_row() {
    let app = test_app(test_config(), false).await;
    let body = multipart_body(&access_event(None), None);

    let response = app.router.oneshot(multipart_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.repository.events().len(), 1);
    assert!(app.store.all().is_empty());
}

#[tokio::test]
async fn test_event_with_empty_name_is_not_published() {
    let app = test_app(test_config(), true).await;
    let body = multipart_body(&access_event(Some("")), None);

    let response = app
        .router
        .clone()
        .oneshot(multipart_request(body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let events = app.repository.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].purpose, Some(PersonPurpose::Information));
    assert!(app.store.all().is_empty());
    assert!(app.sink.is_empty());
    if let Some(dispatcher) = app.dispatcher {
        assert_eq!(dispatcher.stats().enqueued, 0);
        dispatcher.stop().await;
    }
}

#[tokio::test]
async fn test_heartbeat_is_acknowledged_and_not_stored() {
    let app = test_app(test_config(), false).await;
    let body = multipart_body(&heartbeat(), None);

    let response = app.router.oneshot(multipart_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.repository.heartbeats().is_empty());
    assert!(app.repository.events().is_empty());
    assert!(app.store.all().is_empty());
}

#[tokio::test]
async fn test_json_body_is_accepted() {
    let app = test_app(test_config(), false).await;
    let response = app
        .router
        .oneshot(json_request(&access_event(Some("Aziz"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.store.all().len(), 1);
}

#[tokio::test]
async fn test_form_without_event_field_is_bad_request() {
    let app = test_app(test_config(), false).await;
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{BOUNDARY}--\r\n"
    );

    let response = app
        .router
        .oneshot(multipart_request(body.into_bytes()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(body["error"]["message"], "Invalid event data");
}

#[tokio::test]
async fn test_unknown_event_type_is_bad_request() {
    let app = test_app(test_config(), false).await;
    let event = json!({"eventType": "videoloss", "dateTime": "2024-05-01T08:30:00+05:00"});

    let response = app
        .router
        .oneshot(multipart_request(multipart_body(&event, None)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.repository.events().is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = test_app(test_config(), false).await;
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/hik/events")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_storage_failure_is_server_error() {
    let app = test_app(test_config(), false).await;
    app.repository.set_failing(true);

    let response = app
        .router
        .oneshot(multipart_request(multipart_body(
            &access_event(Some("Aziz")),
            None,
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"]["code"], "DATABASE_ERROR");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = test_config();
    config.server.max_request_size_mb = 1;
    let app = test_app(config, false).await;
    let picture = vec![0u8; 2 * 1024 * 1024];

    let response = app
        .router
        .oneshot(multipart_request(multipart_body(
            &access_event(Some("Aziz")),
            Some(&picture),
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.repository.events().is_empty());
}

#[tokio::test]
async fn test_outbox_health_reports_store_state() {
    let app = test_app(test_config(), false).await;

    let response = app.router.clone().oneshot(get("/health/outbox")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["outbox_status"], "ok");
    assert_eq!(body["details"]["health"]["service"], "outbox_processor");

    app.store.set_healthy(false);
    let response = app.router.oneshot(get("/health/outbox")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["outbox_status"], "error");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_readiness_follows_component_health() {
    let app = test_app(test_config(), false).await;

    let response = app.router.clone().oneshot(get("/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["database"]["status"], "healthy");
    assert_eq!(body["checks"]["producer"]["status"], "healthy");

    app.producer.stop().await;
    let response = app.router.clone().oneshot(get("/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = app.router.oneshot(get("/health/detailed")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["info"]["environment"], "test");
}

#[tokio::test]
async fn test_liveness_endpoint() {
    let app = test_app(test_config(), false).await;
    let response = app.router.oneshot(get("/live")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "alive");
}
