#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use kickfund_api::credentials::CredentialService;
use kickfund_api::payment::PaymentLinks;
use kickfund_api::routes::router;
use kickfund_api::state::{AppState, AppStateInner};
use kickfund_api::storage::ImageStorage;
use kickfund_db::Database;
use kickfund_types::models::StatsPolicy;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const BOUNDARY: &str = "kickfund-test-boundary";

/// Router over an in-memory database and a throwaway image directory.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _storage_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_policy(StatsPolicy::All).await
    }

    pub async fn with_policy(stats_policy: StatsPolicy) -> Self {
        let storage_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let storage = ImageStorage::new(storage_dir.path().join("images"))
            .await
            .expect("Failed to create image storage");

        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().expect("Failed to open test DB"),
            credentials: CredentialService::new(JWT_SECRET, chrono::Duration::hours(72)),
            storage,
            payments: PaymentLinks::new(Some("https://pay.example/checkout".into())),
            stats_policy,
            max_upload_bytes: 2 * 1024 * 1024,
        });

        Self {
            router: router(state.clone()),
            state,
            _storage_dir: storage_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.json(Method::GET, uri, token, None).await
    }

    pub async fn multipart(&self, uri: &str, token: &str, body: Vec<u8>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Registers a user and returns `(id, token)`.
    pub async fn register(&self, name: &str, email: &str) -> (i64, String) {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/v1/register",
                None,
                Some(json!({
                    "name": name,
                    "occupation": "Tester",
                    "email": email,
                    "password": "password123",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        let id = body["data"]["id"].as_i64().unwrap();
        let token = body["data"]["token"].as_str().unwrap().to_string();
        (id, token)
    }

    /// Creates a campaign and returns its id.
    pub async fn create_campaign(&self, token: &str, name: &str, goal_amount: i64) -> i64 {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/v1/campaigns",
                Some(token),
                Some(json!({
                    "name": name,
                    "highlight": "Short pitch",
                    "description": "Long description",
                    "perks": "sticker, t-shirt",
                    "goal_amount": goal_amount,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create campaign failed: {}", body);
        body["data"]["id"].as_i64().unwrap()
    }
}

/// Hand-built multipart body. `files` are `(field, file_name, contents)`.
pub fn multipart_body(files: &[(&str, &str, &str)], fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for (name, file_name, contents) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(contents.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
