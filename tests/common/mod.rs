#![allow(dead_code)]

use advisory_backend::{
    config::{Config, ConsultationConfig, EmailConfig},
    database::{memory::MemoryStore, UserStore},
    error::{Error, Result},
    models::user::{UpsertUser, User, UserStatus},
    routes,
    services::{
        email_service::{EmailKind, EmailOutcome, EmailSender, OutboundEmail},
        storage_service::{BlobStorage, MemoryBlobStorage},
    },
    utils::token::{issue_token, Claims},
    AppState,
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test_secret_key";
const BOUNDARY: &str = "----advisory-test-boundary";

/// Records every email; kinds listed in `failing` report a delivery failure.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutboundEmail>>,
    pub failing: Mutex<Vec<EmailKind>>,
}

impl RecordingMailer {
    pub fn fail(&self, kind: EmailKind) {
        self.failing.lock().unwrap().push(kind);
    }

    pub fn recover(&self, kind: EmailKind) {
        self.failing.lock().unwrap().retain(|k| *k != kind);
    }

    pub fn sent_of(&self, kind: EmailKind) -> Vec<OutboundEmail> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, email: OutboundEmail) -> EmailOutcome {
        let fails = self.failing.lock().unwrap().contains(&email.kind);
        self.sent.lock().unwrap().push(email);
        if fails {
            EmailOutcome::failed("provider unavailable")
        } else {
            EmailOutcome::sent()
        }
    }
}

pub struct RejectingBlobStorage;

#[async_trait]
impl BlobStorage for RejectingBlobStorage {
    async fn put_object(&self, _key: &str, _body: Bytes, _content_type: &str) -> Result<String> {
        Err(Error::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied)))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStorage>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn test_config() -> Config {
    Config {
        server_address: "127.0.0.1:0".into(),
        database_url: None,
        jwt_secret: JWT_SECRET.into(),
        public_rps: 1_000,
        api_rps: 1_000,
        uploads_dir: PathBuf::from("./uploads"),
        public_base_url: "http://localhost:8080".into(),
        scroll_delay: Duration::from_millis(1),
        email: EmailConfig {
            api_url: "http://localhost/email".into(),
            api_key: "test".into(),
            from: "Advisory <no-reply@example.com>".into(),
            timeout: Duration::from_secs(1),
        },
        consultation: ConsultationConfig::default(),
    }
}

pub async fn setup_app() -> TestApp {
    let blobs = Arc::new(MemoryBlobStorage::new());
    setup_app_with_blobs(blobs.clone(), blobs).await
}

pub async fn setup_app_with_blobs(blobs: Arc<MemoryBlobStorage>, backend: Arc<dyn BlobStorage>) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState::new(test_config(), store.clone(), backend, mailer.clone())
        .await
        .expect("app state");
    TestApp {
        router: routes::router(state.clone()),
        state,
        store,
        blobs,
        mailer,
    }
}

pub fn token_for(uid: &str, name: &str, email: &str) -> String {
    let claims = Claims {
        sub: uid.into(),
        email: Some(email.into()),
        name: Some(name.into()),
        picture: None,
        exp: (chrono::Utc::now().timestamp() + 3_600) as usize,
    };
    issue_token(&claims, JWT_SECRET).expect("token")
}

/// Creates a stored user with the given statuses and returns a token for it.
pub async fn seed_user(app: &TestApp, uid: &str, statuses: &[UserStatus]) -> (User, String) {
    let email = format!("{}@example.com", uid);
    app.store
        .upsert_user(UpsertUser {
            id: uid.into(),
            display_name: uid.into(),
            email: email.clone(),
            photo_url: None,
        })
        .await
        .expect("seed user");
    let user = app.store.set_user_statuses(uid, statuses).await.expect("statuses");
    (user, token_for(uid, uid, &email))
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        body: &'a [u8],
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes());
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                body: bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn with_token(builder: axum::http::request::Builder, token: Option<&str>) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
        None => builder,
    }
}

pub async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, JsonValue) {
    let res = app.router.clone().oneshot(request).await.expect("response");
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.expect("body");
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };
    (status, json)
}

pub async fn get(app: &TestApp, uri: &str, token: Option<&str>) -> (StatusCode, JsonValue) {
    let req = with_token(Request::builder().method("GET").uri(uri), token)
        .body(Body::empty())
        .unwrap();
    send(app, req).await
}

pub async fn json_request(
    app: &TestApp,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: JsonValue,
) -> (StatusCode, JsonValue) {
    let req = with_token(Request::builder().method(method).uri(uri), token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

pub async fn multipart_request(
    app: &TestApp,
    uri: &str,
    token: Option<&str>,
    parts: &[Part<'_>],
) -> (StatusCode, JsonValue) {
    let req = with_token(Request::builder().method("POST").uri(uri), token)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    send(app, req).await
}

/// Waits for the inbox's unread flag of `user_id` to reach `expected`.
pub async fn wait_for_unread(app: &TestApp, user_id: &str, expected: bool) {
    let mut rx = app.state.inbox.subscribe();
    tokio::time::timeout(Duration::from_secs(2), async {
        while rx.borrow_and_update().is_unread(user_id) != expected {
            rx.changed().await.expect("inbox closed");
        }
    })
    .await
    .expect("unread flag did not settle");
}
