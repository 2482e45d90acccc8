#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use authgate::client::IdentityClient;
use authgate::config::{extract_config, ConfigV1, SessionConfig};
use authgate::routes::create_router;
use authgate::session::{QueryCache, Session};
use authgate::state::AppState;
use authgate::store::{MemoryStore, Medium, StorageBus, TokenStore};
use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::Router;
use figment::providers::{Format, Yaml};
use figment::Figment;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;

pub const USER_ID: &str = "user-123";
pub const USER_EMAIL: &str = "jane@example.com";
pub const USER_NAME: &str = "Jane Doe";

#[derive(Debug, Serialize)]
struct TestClaims<'a> {
    sub: &'a str,
    email: &'a str,
    name: &'a str,
    iat: i64,
    exp: i64,
}

/// Signs a token for the test user expiring `exp_offset` seconds from now.
/// The secret is irrelevant: nothing here verifies signatures.
pub fn mint_token(exp_offset: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = TestClaims {
        sub: USER_ID,
        email: USER_EMAIL,
        name: USER_NAME,
        iat: now - 60,
        exp: now + exp_offset,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test-secret"),
    )
    .expect("failed to sign test token")
}

#[derive(Debug, Serialize)]
struct SubjectOnlyClaims<'a> {
    sub: &'a str,
    exp: i64,
}

/// A token whose claims cannot stand in for an identity (no email).
pub fn mint_subject_only_token(exp_offset: i64) -> String {
    let claims = SubjectOnlyClaims {
        sub: USER_ID,
        exp: chrono::Utc::now().timestamp() + exp_offset,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test-secret"),
    )
    .expect("failed to sign test token")
}

pub fn user_json() -> String {
    format!(
        r#"{{"id":"{}","email":"{}","name":"{}","provider":"email","avatar":null,"isVerified":true,"createdAt":"2024-03-01T10:00:00Z","updatedAt":"2024-03-02T10:00:00Z"}}"#,
        USER_ID, USER_EMAIL, USER_NAME
    )
}

pub fn auth_response_json(token: &str) -> String {
    format!(r#"{{"token":"{}","user":{}}}"#, token, user_json())
}

pub fn test_config(identity_url: &str) -> ConfigV1 {
    let yaml = format!(
        r#"
version: "1.0.0"
bind_address: "127.0.0.1:0"
identity:
  base_url: "{}"
  timeout_in_ms: 2000
session:
  max_retries: 2
  retry_base_delay_ms: 5
logging:
  level: "debug"
  format: "console"
"#,
        identity_url
    );
    extract_config(Figment::new().merge(Yaml::string(&yaml))).expect("invalid test config")
}

pub fn build_app(config: ConfigV1) -> Router {
    let config = Arc::new(config);
    let identity = IdentityClient::new(&config.identity).expect("identity client");
    create_router(AppState::new(config, identity))
}

pub fn session_config() -> SessionConfig {
    SessionConfig {
        max_retries: 2,
        retry_base_delay_ms: 5,
        ..SessionConfig::default()
    }
}

/// Mediums shared between sessions that should see each other's writes.
#[derive(Clone)]
pub struct SharedStorage {
    pub primary: Arc<MemoryStore>,
    pub secondary: Arc<MemoryStore>,
    pub bus: StorageBus,
}

impl SharedStorage {
    pub fn new() -> Self {
        SharedStorage {
            primary: Arc::new(MemoryStore::new()),
            secondary: Arc::new(MemoryStore::new()),
            bus: StorageBus::new(),
        }
    }

    pub async fn seed(&self, key: &str, token: &str) {
        self.primary
            .set(key, token, Duration::from_secs(3600))
            .await
            .expect("seed token");
    }
}

pub fn build_session(identity_url: &str, storage: &SharedStorage, config: &SessionConfig) -> Session {
    let test = test_config(identity_url);
    let client = IdentityClient::new(&test.identity).expect("identity client");
    let tokens = TokenStore::new(
        storage.primary.clone(),
        storage.secondary.clone(),
        config.storage_key.clone(),
        config.retention(),
        storage.bus.clone(),
    );
    let cache = Arc::new(QueryCache::new(config.stale_after()));
    Session::new(client, tokens, cache, config)
}

pub fn get(path: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(Body::empty())
        .expect("failed to build request")
}

pub fn get_with_cookie(path: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(path)
        .header(header::COOKIE, format!("auth_token={}", token))
        .body(Body::empty())
        .expect("failed to build request")
}

pub fn post_form(path: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    String::from_utf8(bytes.to_vec()).expect("body is not utf-8")
}
