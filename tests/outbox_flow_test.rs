//! # Outbox Flow Tests
//!
//! End-to-end relay behavior: ingest over HTTP, immediate dispatch, the
//! periodic sweep as fallback, and a full system started over in-memory
//! storage.

mod common;

use axum::http::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

use common::*;
use event_listener::bootstrap::ListenerSystem;
use event_listener::config::ConfigManager;
use event_listener::producer::{InMemorySink, SinkError};
use event_listener::test_helpers::{InMemoryEventRepository, InMemoryOutboxStore};

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_attendance_event_is_published_immediately() {
    let app = test_app(test_config(), true).await;

    let response = app
        .router
        .clone()
        .oneshot(multipart_request(multipart_body(
            &access_event(Some("Aziz Karimov")),
            None,
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let store = app.store.clone();
    wait_until(move || store.unprocessed_count() == 0 && !store.all().is_empty()).await;

    let records = app.sink.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.topic, "raw_events");
    assert_eq!(record.payload["event_type"], "access_control.event_created");
    assert_eq!(record.payload["source"], "event-listener");
    assert_eq!(record.payload["priority"], "high");
    assert_eq!(record.payload["topic"], "raw_events");
    assert_eq!(
        record.payload["data"]["access_controller_event"]["person_name"],
        "Aziz Karimov"
    );
    let outbox_id = app.store.all()[0].id;
    assert_eq!(record.payload["correlation_id"], outbox_id.to_string());

    if let Some(dispatcher) = app.dispatcher {
        assert_eq!(dispatcher.stats().published, 1);
        dispatcher.stop().await;
    }
}

#[tokio::test]
async fn test_sweep_publishes_what_dispatch_missed() {
    let app = test_app(test_config(), false).await;

    for name in ["Aziz", "Dilnoza", "Bekzod"] {
        let response = app
            .router
            .clone()
            .oneshot(multipart_request(multipart_body(
                &access_event(Some(name)),
                None,
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(app.store.unprocessed_count(), 3);
    assert!(app.sink.is_empty());

    let report = app.processor.run_once().await.unwrap();
    assert_eq!(report.fetched, 3);
    assert_eq!(report.processed, 3);
    assert_eq!(app.store.unprocessed_count(), 0);

    let records = app.sink.records();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.payload["priority"] == "normal"));

    // A second sweep finds nothing
    let report = app.processor.run_once().await.unwrap();
    assert!(report.is_empty());
}

#[tokio::test]
async fn test_broker_outage_leaves_rows_for_the_sweep() {
    let app = test_app(test_config(), false).await;
    app.sink.fail_next_sends(SinkError::Broker("broker down".into()), 2);

    for name in ["Aziz", "Dilnoza"] {
        app.router
            .clone()
            .oneshot(multipart_request(multipart_body(
                &access_event(Some(name)),
                None,
            )))
            .await
            .unwrap();
    }

    let report = app.processor.run_once().await.unwrap();
    assert_eq!(report.failed, 2);
    assert_eq!(app.store.unprocessed_count(), 2);

    let report = app.processor.run_once().await.unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(app.store.unprocessed_count(), 0);
}

#[tokio::test]
async fn test_system_serves_over_tcp_and_stops_cleanly() {
    let mut config = test_config();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.outbox.poll_interval_seconds = 1;
    let config_manager = Arc::new(ConfigManager::from_config(config, "test"));

    let store = Arc::new(InMemoryOutboxStore::new());
    let repository = Arc::new(InMemoryEventRepository::new(store.clone()));
    let sink = Arc::new(InMemorySink::new());

    let handle = ListenerSystem::start_with(config_manager, repository, store.clone(), sink.clone())
        .await
        .unwrap();
    let status = handle.status();
    assert!(status.running);
    assert!(status.producer_running);
    assert!(status.dispatcher_enabled);
    assert_eq!(status.environment, "test");

    let body = multipart_body(&access_event(Some("Aziz")), None);
    let mut request = format!(
        "POST /hik/events HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Type: multipart/form-data; boundary={BOUNDARY}\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    request.extend_from_slice(&body);

    let mut stream = tokio::net::TcpStream::connect(handle.local_addr()).await.unwrap();
    stream.write_all(&request).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("\"statusString\":\"OK\""));

    let published = store.clone();
    wait_until(move || published.unprocessed_count() == 0 && !published.all().is_empty()).await;
    assert_eq!(sink.len(), 1);

    let producer = handle.producer().clone();
    handle.stop().await.unwrap();
    assert!(!producer.is_running());
}
