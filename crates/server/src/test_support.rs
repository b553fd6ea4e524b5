//! In-process harness for router tests: in-memory database, one provisioned
//! user and a valid bearer token.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use db::DBService;
use sea_orm::ConnectionTrait;
use serde_json::Value;
use services::services::{auth::AuthService, config::ServerConfig};
use tower::ServiceExt;
use utils_jwt::JwtManager;

use crate::{AppState, http};

pub const TEST_EMAIL: &str = "ana@vibeweb.dev";
pub const TEST_PASSWORD: &str = "correct-horse";

#[derive(Clone)]
pub struct TestApp {
    pub state: AppState,
    pub token: String,
    pub user_id: i64,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(ServerConfig::for_tests()).await
    }

    pub async fn with_config(config: ServerConfig) -> Self {
        let db = DBService::connect("sqlite::memory:").await.unwrap();
        let jwt = JwtManager::new(&config.jwt_secret, config.jwt_ttl).unwrap();
        let auth = AuthService::with_cost(db.pool.clone(), jwt, 4).unwrap();
        let user = auth
            .provision(TEST_EMAIL, Some("ana"), "Ana", TEST_PASSWORD)
            .await
            .unwrap();
        let token = auth.jwt().issue(user.id, &user.email).unwrap();
        Self {
            state: AppState::from_parts(config, db.pool, auth),
            token,
            user_id: user.id,
        }
    }

    pub fn router(&self) -> Router {
        http::router(self.state.clone())
    }

    /// Drops the task table so every task query fails with a database error.
    pub async fn close_database(&self) {
        self.state
            .db()
            .execute_unprepared("DROP TABLE tasks")
            .await
            .unwrap();
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        self.raw(method.as_str(), uri, &body, token).await
    }

    pub async fn raw(
        &self,
        method: &str,
        uri: &str,
        body: &str,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if !body.is_empty() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = self
            .router()
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None, Some(&self.token)).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body), Some(&self.token))
            .await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(body), Some(&self.token))
            .await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(body), Some(&self.token))
            .await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, None, Some(&self.token))
            .await
    }
}

pub fn ws_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::CONNECTION, "upgrade")
        .header(header::UPGRADE, "websocket")
        .header(header::SEC_WEBSOCKET_VERSION, "13")
        .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==")
        .body(Body::empty())
        .unwrap()
}
