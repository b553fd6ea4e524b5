use async_trait::async_trait;
use board_protocol::task::{Hosting, PaymentStatus, Stage, Task};
use reqwest::{Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use utils_core::response::ApiResponse;

use crate::{
    auth::{AuthStore, Session},
    config::ClientConfig,
    error::ClientError,
};

/// Body of a create or full-field update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub client: String,
    pub contact: Option<String>,
    #[serde(rename = "type")]
    pub project_type: Option<String>,
    pub stack: Option<String>,
    pub domain: Option<String>,
    pub description: Option<String>,
    pub price: f64,
    pub payment_status: PaymentStatus,
    pub deadline: Option<String>,
    pub hosting: Hosting,
    pub col_id: Stage,
    pub order_position: i64,
    pub is_recurring: bool,
    pub assets_link: Option<Value>,
    pub public_uuid: Option<String>,
}

impl TaskDraft {
    pub fn new(client: impl Into<String>, price: f64, col_id: Stage) -> Self {
        Self {
            id: None,
            client: client.into(),
            contact: None,
            project_type: None,
            stack: None,
            domain: None,
            description: None,
            price,
            payment_status: PaymentStatus::Pending,
            deadline: None,
            hosting: Hosting::Nao,
            col_id,
            order_position: 0,
            is_recurring: false,
            assets_link: None,
            public_uuid: None,
        }
    }

    /// Every editable field of `task`, for update's replace semantics.
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: None,
            client: task.client.clone(),
            contact: task.contact.clone(),
            project_type: task.project_type.clone(),
            stack: task.stack.clone(),
            domain: task.domain.clone(),
            description: task.description.clone(),
            price: task.price,
            payment_status: task.payment_status,
            deadline: task.deadline.clone(),
            hosting: task.hosting,
            col_id: task.col_id,
            order_position: task.order_position,
            is_recurring: task.is_recurring,
            assets_link: task
                .assets_link
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok()),
            public_uuid: task.public_uuid.clone(),
        }
    }
}

#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<Task>, ClientError>;
    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ClientError>;
    async fn update_task(&self, id: i64, draft: &TaskDraft) -> Result<Task, ClientError>;
    async fn move_task(
        &self,
        id: i64,
        col_id: Stage,
        order_position: i64,
    ) -> Result<Task, ClientError>;
    async fn delete_task(&self, id: i64) -> Result<(), ClientError>;
}

/// `TaskApi` over the REST endpoints. Every request gives up after the
/// configured timeout; a 401 clears the shared session.
#[derive(Clone)]
pub struct HttpTaskApi {
    http: reqwest::Client,
    config: ClientConfig,
    auth: AuthStore,
}

impl HttpTaskApi {
    pub fn new(config: ClientConfig, auth: AuthStore) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config, auth })
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    /// Logs in and stores the session. Bad credentials are an `Api` error,
    /// not `Unauthorized`, because there was no session to lose.
    pub async fn login(&self, login: &str, password: &str) -> Result<Session, ClientError> {
        let body = json!({ "email": login, "password": password });
        let session: Session = self
            .request(Method::POST, "auth/login", Some(&body), false)
            .await?;
        self.auth.set(session.clone());
        tracing::info!(user_id = session.user.id, "logged in");
        Ok(session)
    }

    pub fn logout(&self) {
        self.auth.clear();
    }

    async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        authenticated: bool,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.config.api_url(path)?;
        let mut request = self.http.request(method.clone(), url);
        if authenticated {
            let Some(token) = self.auth.token() else {
                return Err(ClientError::Unauthorized);
            };
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            let err = ClientError::from(err);
            tracing::warn!(%method, path, error = %err, "request failed");
            err
        })?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED && authenticated {
            tracing::warn!(%method, path, "session rejected, logging out");
            self.auth.clear();
            return Err(ClientError::Unauthorized);
        }

        let bytes = response.bytes().await?;
        let envelope: Option<ApiResponse<Value>> = serde_json::from_slice(&bytes).ok();

        if !status.is_success() {
            let message = envelope
                .and_then(|e| e.error)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let Some(envelope) = envelope else {
            return Err(ClientError::Decode(format!("{path}: body is not an API envelope")));
        };
        if !envelope.success {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: envelope.error.unwrap_or_default(),
            });
        }
        serde_json::from_value(envelope.data.unwrap_or(Value::Null))
            .map_err(|err| ClientError::Decode(format!("{path}: {err}")))
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn list_tasks(&self) -> Result<Vec<Task>, ClientError> {
        self.request::<_, Value>(Method::GET, "tasks", None, true).await
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ClientError> {
        self.request(Method::POST, "tasks", Some(draft), true).await
    }

    async fn update_task(&self, id: i64, draft: &TaskDraft) -> Result<Task, ClientError> {
        self.request(Method::PUT, &format!("tasks/{id}"), Some(draft), true)
            .await
    }

    async fn move_task(
        &self,
        id: i64,
        col_id: Stage,
        order_position: i64,
    ) -> Result<Task, ClientError> {
        let body = json!({ "col_id": col_id, "order_position": order_position });
        self.request(Method::PATCH, &format!("tasks/{id}/move"), Some(&body), true)
            .await
    }

    async fn delete_task(&self, id: i64) -> Result<(), ClientError> {
        self.request::<(), Value>(Method::DELETE, &format!("tasks/{id}"), None, true)
            .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::auth::tests::session;

    #[test]
    fn draft_from_task_resends_every_editable_field() {
        let now = Utc::now();
        let task = Task {
            id: 9,
            client: "Acme".to_string(),
            contact: Some("@acme".to_string()),
            project_type: Some("Landing".to_string()),
            stack: None,
            domain: Some("acme.com".to_string()),
            description: None,
            price: 1200.0,
            payment_status: PaymentStatus::HalfOnApproval,
            deadline: Some("48h".to_string()),
            deadline_timestamp: Some(1),
            hosting: Hosting::Sim,
            col_id: Stage::Build,
            order_position: 3,
            is_recurring: true,
            assets_link: Some(r#"["https://drive.example.com/a"]"#.to_string()),
            public_uuid: None,
            uptime_status: None,
            user_id: Some(1),
            created_at: now,
            updated_at: now,
        };

        let body = serde_json::to_value(TaskDraft::from_task(&task)).unwrap();
        assert_eq!(body["type"], json!("Landing"));
        assert_eq!(body["payment_status"], json!("50% Após Aprovação"));
        assert_eq!(body["hosting"], json!("sim"));
        assert_eq!(body["col_id"], json!(2));
        assert_eq!(body["assets_link"], json!(["https://drive.example.com/a"]));
        assert!(body.get("id").is_none());
        assert!(body.get("deadline_timestamp").is_none());
    }

    #[tokio::test]
    async fn unreachable_backend_is_distinguished() {
        // Port 9 (discard) on loopback is closed on any sane test machine.
        let config = ClientConfig::new("http://127.0.0.1:9").unwrap();
        let api = HttpTaskApi::new(config, AuthStore::with_session(session(1))).unwrap();
        let err = api.list_tasks().await.unwrap_err();
        assert!(matches!(err, ClientError::BackendUnreachable(_)), "{err:?}");
        assert!(err.is_connectivity());
        // Transport failures never log the user out.
        assert!(api.auth().is_logged_in());
    }

    #[tokio::test]
    async fn missing_session_short_circuits() {
        let config = ClientConfig::new("http://127.0.0.1:9").unwrap();
        let api = HttpTaskApi::new(config, AuthStore::new()).unwrap();
        assert!(matches!(
            api.delete_task(1).await,
            Err(ClientError::Unauthorized)
        ));
    }

    /// Serves `router` on an ephemeral loopback port.
    async fn stub(router: axum::Router) -> ClientConfig {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        ClientConfig::new(&format!("http://{addr}")).unwrap()
    }

    #[tokio::test]
    async fn rejected_session_logs_out() {
        let router = axum::Router::new().route(
            "/api/tasks",
            axum::routing::get(|| async {
                (
                    axum::http::StatusCode::UNAUTHORIZED,
                    axum::Json(json!({ "success": false, "error": "Unauthorized" })),
                )
            }),
        );
        let config = stub(router).await;
        let auth = AuthStore::with_session(session(1));
        let api = HttpTaskApi::new(config, auth.clone()).unwrap();

        let err = api.list_tasks().await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized), "{err:?}");
        assert!(!auth.is_logged_in());
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let router = axum::Router::new().route(
            "/api/tasks",
            axum::routing::get(|| async {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                axum::Json(json!({ "success": true, "data": [] }))
            }),
        );
        let mut config = stub(router).await;
        config.request_timeout = std::time::Duration::from_millis(200);
        let auth = AuthStore::with_session(session(1));
        let api = HttpTaskApi::new(config, auth.clone()).unwrap();

        let err = api.list_tasks().await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout), "{err:?}");
        assert!(err.is_connectivity());
        assert!(auth.is_logged_in());
    }
}
