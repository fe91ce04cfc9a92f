//! Shared fixtures for integration tests: an in-memory wired router and
//! device payload builders.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;

use event_listener::config::{KafkaConfig, ListenerConfig};
use event_listener::events::EventIngestService;
use event_listener::outbox::{OutboxDispatcher, OutboxProcessor};
use event_listener::producer::{InMemorySink, ProducerService};
use event_listener::test_helpers::{InMemoryEventRepository, InMemoryOutboxStore};
use event_listener::web::{create_app, AppState};

pub const BOUNDARY: &str = "----hikboundary7MA4YWxkTrZu0gW";

pub struct TestApp {
    pub router: Router,
    pub repository: Arc<InMemoryEventRepository>,
    pub store: Arc<InMemoryOutboxStore>,
    pub sink: Arc<InMemorySink>,
    pub producer: Arc<ProducerService>,
    pub dispatcher: Option<OutboxDispatcher>,
    pub processor: OutboxProcessor,
}

pub fn test_config() -> ListenerConfig {
    let mut config = ListenerConfig::default();
    config.environment = "test".to_string();
    config.kafka = KafkaConfig {
        max_retries: 1,
        retry_delay_ms: 1,
        ..KafkaConfig::default()
    };
    config
}

/// Router over in-memory storage; `immediate` starts a dispatcher
pub async fn test_app(mut config: ListenerConfig, immediate: bool) -> TestApp {
    config.outbox.immediate_publish = immediate;
    let config = Arc::new(config);

    let store = Arc::new(InMemoryOutboxStore::new());
    let repository = Arc::new(InMemoryEventRepository::new(store.clone()));
    let sink = Arc::new(InMemorySink::new());
    let producer = Arc::new(ProducerService::new(config.kafka.clone(), sink.clone()));
    producer.start().await.expect("producer starts over in-memory sink");

    let dispatcher = immediate.then(|| {
        OutboxDispatcher::start(
            config.outbox.clone(),
            store.clone(),
            producer.clone(),
            "event-listener",
        )
    });
    let processor = OutboxProcessor::new(
        config.outbox.clone(),
        store.clone(),
        producer.clone(),
        "event-listener",
    );

    let ingest = Arc::new(EventIngestService::new(
        repository.clone(),
        dispatcher.as_ref().map(OutboxDispatcher::handle),
        config.events.clone(),
    ));
    let mut state = AppState::new(config, ingest, producer.clone()).with_outbox(processor.monitor());
    if let Some(dispatcher) = &dispatcher {
        state = state.with_dispatcher(dispatcher.handle());
    }

    TestApp {
        router: create_app(state),
        repository,
        store,
        sink,
        producer,
        dispatcher,
        processor,
    }
}

pub fn access_event(person_name: Option<&str>) -> Value {
    let mut ace = json!({
        "deviceName": "Main Gate",
        "majorEventType": 5,
        "subEventType": 75,
        "cardReaderNo": 1,
        "employeeNoString": "1042",
        "serialNo": 310,
        "userType": "normal",
        "currentVerifyMode": "cardOrFace",
        "attendanceStatus": "checkIn",
        "mask": "no",
        "picturesNumber": 1
    });
    if let Some(name) = person_name {
        ace["name"] = json!(name);
    }
    json!({
        "ipAddress": "192.168.1.64",
        "portNo": 80,
        "protocol": "HTTP",
        "dateTime": "2024-05-01T08:30:00+05:00",
        "activePostCount": 1,
        "eventType": "AccessControllerEvent",
        "eventState": "active",
        "eventDescription": "Access Controller Event",
        "deviceID": "gate-1",
        "AccessControllerEvent": ace
    })
}

pub fn heartbeat() -> Value {
    json!({
        "ipAddress": "192.168.1.64",
        "dateTime": "2024-05-01T08:30:00+05:00",
        "activePostCount": 0,
        "eventType": "heartBeat",
        "eventState": "active",
        "eventDescription": "Heartbeat"
    })
}

/// Build a multipart body the way devices send it: the event as a text
/// field, optionally followed by a JPEG picture part
pub fn multipart_body(event: &Value, picture: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"AccessControllerEvent\"\r\n\r\n{event}\r\n"
        )
        .as_bytes(),
    );
    if let Some(bytes) = picture {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"Picture\"; filename=\"Picture.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/hik/events")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("valid request")
}

pub fn json_request(event: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/hik/events")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(event.to_string()))
        .expect("valid request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

pub async fn body_json(response: axum::response::Response) -> Value {
    use http_body_util::BodyExt;
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}
