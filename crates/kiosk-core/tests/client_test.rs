//! Recognition client against an in-process service on an ephemeral port.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use kiosk_core::{FaceDetection, RecognitionClient, RecognitionService, ServiceError};
use kiosk_voice::{CollectedData, FieldType};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct Received {
    bodies: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Received {
    fn record(&self, path: &str, body: Value) {
        self.bodies.lock().unwrap().push((path.to_string(), body));
    }

    fn last(&self, path: &str) -> Value {
        self.bodies
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, b)| b.clone())
            .expect("request was recorded")
    }
}

async fn status() -> Json<Value> {
    Json(json!({"status": "online", "users_count": 4, "model": "Facenet512"}))
}

async fn template() -> Json<Value> {
    Json(json!({"fields": [
        {"name": "name", "prompt": "What is your name?", "type": "string"},
        {"name": "age", "prompt": "How old are you?", "type": "integer"},
        {"name": "dob", "type": "date"}
    ]}))
}

async fn detect(State(rx): State<Received>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    rx.record("/api/face/detect", body.clone());
    if body.get("image").and_then(Value::as_str).unwrap_or("").is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "No image provided"})));
    }
    (
        StatusCode::OK,
        Json(json!({"success": true, "count": 1, "faces": [
            {"x": 12, "y": 30, "w": 140, "h": 160, "confidence": 0.92, "gender": "Woman"}
        ]})),
    )
}

async fn recognize(State(rx): State<Received>, Json(body): Json<Value>) -> Json<Value> {
    rx.record("/api/face/recognize", body);
    Json(json!({"success": true, "recognized": false, "user": null}))
}

async fn register(State(rx): State<Received>, Json(body): Json<Value>) -> Json<Value> {
    rx.record("/api/face/register", body);
    Json(json!({"success": true, "user_id": "user_20240301_101530", "message": "User registered successfully"}))
}

async fn users() -> Json<Value> {
    Json(json!({"success": true, "users": [
        {"id": "user_1", "data": {"name": "Alice"}, "timestamp": "2024-03-01T10:15:30", "model": "Facenet512"}
    ]}))
}

async fn count() -> Json<Value> {
    Json(json!({"success": true, "count": 1}))
}

async fn broken() -> &'static str {
    "this is not json"
}

async fn spawn_service() -> (String, Received) {
    let received = Received::default();
    let app = Router::new()
        .route("/api/status", get(status))
        .route("/api/template", get(template))
        .route("/api/face/detect", post(detect))
        .route("/api/face/recognize", post(recognize))
        .route("/api/face/register", post(register))
        .route("/api/user/list", get(users))
        .route("/api/user/count", get(count))
        .route("/broken/api/status", get(broken))
        .with_state(received.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), received)
}

fn face() -> FaceDetection {
    FaceDetection {
        x: 12,
        y: 30,
        w: 140,
        h: 160,
        confidence: 0.92,
        gender: Some("Woman".into()),
    }
}

#[tokio::test]
async fn status_and_template() {
    let (base, _) = spawn_service().await;
    let client = RecognitionClient::new(base).unwrap();

    let status = client.get_status().await.unwrap();
    assert_eq!(status.users_count, 4);
    assert_eq!(status.model, "Facenet512");

    let template = client.get_template().await.unwrap();
    assert_eq!(template.fields.len(), 3);
    assert_eq!(template.fields[1].field_type, FieldType::Integer);
    assert_eq!(template.fields[2].field_type, FieldType::Other("date".into()));
    assert!(template.fields[2].prompt.is_none());
}

#[tokio::test]
async fn detect_recognize_register_payloads() {
    let (base, received) = spawn_service().await;
    let client = RecognitionClient::new(base).unwrap();
    let image = "data:image/jpeg;base64,/9j/AA==";

    let detected = client.detect(image).await.unwrap();
    let first = detected.primary_face().unwrap().clone();
    assert_eq!(first.gender.as_deref(), Some("Woman"));
    assert_eq!(received.last("/api/face/detect")["image"], image);

    let result = client.recognize(image, &first).await.unwrap();
    assert!(result.matched_user().is_none());
    let echoed = received.last("/api/face/recognize");
    assert!(echoed["face"]["x"].is_i64());
    assert_eq!(echoed["face"]["w"], 140);

    let mut data = CollectedData::new();
    data.insert("name".into(), "Priya".into());
    data.insert("age".into(), "Not provided".into());
    let registered = client.register(image, &face(), &data).await.unwrap();
    assert!(registered.success);
    assert_eq!(registered.user_id.as_deref(), Some("user_20240301_101530"));

    let body = received.last("/api/face/register");
    assert_eq!(body["userData"]["age"], "Not provided");
    assert_eq!(body["face"]["gender"], "Woman");
    assert!(body["face"]["x"].is_i64());
    assert_eq!(body["face"]["h"], 160);
}

#[tokio::test]
async fn user_listing_and_count() {
    let (base, _) = spawn_service().await;
    let client = RecognitionClient::new(base).unwrap();

    let users = client.list_users().await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, "user_1");
    assert!(users[0].registered_at().is_some());
    assert_eq!(client.user_count().await.unwrap(), 1);
}

#[tokio::test]
async fn error_status_carries_service_message() {
    let (base, _) = spawn_service().await;
    let client = RecognitionClient::new(base).unwrap();

    match client.detect("").await {
        Err(ServiceError::Status { status, body, .. }) => {
            assert_eq!(status, 400);
            assert_eq!(body, "No image provided");
        }
        other => panic!("expected status error, got {:?}", other),
    }

    let nowhere = RecognitionClient::new(format!("{}/nowhere", client.base_url())).unwrap();
    match nowhere.user_count().await {
        Err(ServiceError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected 404, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let (base, _) = spawn_service().await;
    let client = RecognitionClient::new(format!("{}/broken", base)).unwrap();
    assert!(matches!(
        client.get_status().await,
        Err(ServiceError::Decode { .. })
    ));
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        RecognitionClient::with_timeout(format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    assert!(matches!(
        client.get_status().await,
        Err(ServiceError::Transport { .. })
    ));
}
