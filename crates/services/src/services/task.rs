use board_protocol::{
    events::{EventActor, TaskBroadcast, TaskDeletedBroadcast, TaskEvent},
    task::{Hosting, PaymentStatus, PublicTaskView, Stage, Subtask, Task},
    user::{ActivityAction, ActivityEntry},
};
use chrono::Utc;
use db::{
    DbErr, DbPool,
    models::{
        activity::ActivityRepository,
        subtask::{SubtaskRepository, UpdateSubtask},
        task::{TaskFields, TaskRepository},
        user::UserRepository,
    },
};
use events::EventHub;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use utils_core::{
    deadline::{DAY_MS, next_deadline_timestamp, parse_relative_hours, resolve_deadline},
    validation::{
        DESCRIPTION_MAX_LEN, SHORT_TEXT_MAX_LEN, ValidationError, normalize_assets_links,
        normalize_contact, normalize_domain, sanitize_optional, sanitize_text, validate_client,
        validate_order_position, validate_price, validate_stage,
    },
};
use uuid::Uuid;

use super::activity::{
    ActivityLogger, describe_create, describe_delete, describe_lead, describe_move,
    describe_recurring_clone, describe_update, snapshot,
};

/// How far a recurring task's next cycle is pushed out.
pub const RECURRING_CYCLE_MS: i64 = 30 * DAY_MS;
pub const LEAD_SOURCE: &str = "Lead Externo";
const SUBTASK_TITLE_MAX_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum TaskServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Task not found")]
    TaskNotFound,
    #[error("Subtask not found")]
    SubtaskNotFound,
    #[error(transparent)]
    Database(#[from] DbErr),
}

/// Create/update body. Scalars stay loosely typed so a wrong type becomes a
/// field-specific validation error instead of a generic parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPayload {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(rename = "type", default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub deadline_timestamp: Option<Value>,
    #[serde(default)]
    pub hosting: Option<String>,
    #[serde(default)]
    pub col_id: Option<Value>,
    #[serde(default)]
    pub order_position: Option<Value>,
    #[serde(default)]
    pub is_recurring: Option<Value>,
    #[serde(default)]
    pub assets_link: Option<Value>,
    #[serde(default)]
    pub public_uuid: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovePayload {
    #[serde(default)]
    pub col_id: Option<Value>,
    #[serde(default)]
    pub order_position: Option<Value>,
}

/// Public webhook body. Accepts the contact-form field names as well as the
/// task field names.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadPayload {
    #[serde(default, alias = "client")]
    pub name: Option<String>,
    #[serde(default, alias = "contact")]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubtaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub completed: Option<Value>,
    #[serde(default)]
    pub order_position: Option<Value>,
}

fn as_i64(field: &'static str, value: &Value) -> Result<i64, ValidationError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ValidationError::new(field, format!("{field} must be an integer")))
}

fn as_f64(field: &'static str, value: &Value) -> Result<f64, ValidationError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ValidationError::new(field, format!("{field} must be a number")))
}

fn as_bool(field: &'static str, value: &Value) -> Result<bool, ValidationError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_i64().unwrap_or(0) != 0),
        Value::Null => Ok(false),
        _ => Err(ValidationError::new(field, format!("{field} must be a boolean"))),
    }
}

fn parse_payment_status(raw: Option<&str>) -> Result<PaymentStatus, ValidationError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(PaymentStatus::default()),
        Some(raw) => raw.parse().map_err(|_| {
            ValidationError::new(
                "payment_status",
                "payment_status must be Pendente, 50% Após Aprovação or Pago 100%",
            )
        }),
    }
}

fn parse_hosting(raw: Option<&str>) -> Result<Hosting, ValidationError> {
    match raw.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()) {
        None => Ok(Hosting::default()),
        Some(raw) => raw
            .parse()
            .map_err(|_| ValidationError::new("hosting", "hosting must be nao, sim or depois")),
    }
}

fn parse_public_uuid(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => Uuid::parse_str(raw)
            .map(|uuid| Some(uuid.to_string()))
            .map_err(|_| ValidationError::new("public_uuid", "public_uuid must be a UUID")),
    }
}

/// Validates a create/update body into storable fields.
///
/// `existing` is the stored task on update. It supplies the stage when the
/// body omits it and the previous deadline for timestamp preservation.
pub fn validate_payload(
    payload: &TaskPayload,
    existing: Option<&Task>,
    now_ms: i64,
) -> Result<TaskFields, ValidationError> {
    let client = validate_client(payload.client.as_deref().unwrap_or_default())?;

    let price = match payload.price.as_ref().filter(|v| !v.is_null()) {
        Some(value) => validate_price(as_f64("price", value)?)?,
        None => return Err(ValidationError::new("price", "Price is required")),
    };

    let col_id = match (payload.col_id.as_ref().filter(|v| !v.is_null()), existing) {
        (Some(value), _) => validate_stage(as_i64("col_id", value)?)?,
        (None, Some(task)) => task.col_id,
        (None, None) => return Err(ValidationError::new("col_id", "col_id is required")),
    };

    let order_position = match (payload.order_position.as_ref().filter(|v| !v.is_null()), existing)
    {
        (Some(value), _) => validate_order_position(as_i64("order_position", value)?)?,
        (None, Some(task)) => task.order_position,
        (None, None) => 0,
    };

    let deadline = sanitize_optional(payload.deadline.as_deref(), SHORT_TEXT_MAX_LEN);
    let deadline_timestamp = match existing {
        Some(task) => next_deadline_timestamp(
            task.deadline.as_deref(),
            task.deadline_timestamp,
            deadline.as_deref(),
            now_ms,
        ),
        None => match deadline.as_deref() {
            Some(text) if parse_relative_hours(text).is_some() => resolve_deadline(text, now_ms),
            Some(_) => payload
                .deadline_timestamp
                .as_ref()
                .filter(|v| !v.is_null())
                .map(|v| as_i64("deadline_timestamp", v))
                .transpose()?,
            None => None,
        },
    };

    let is_recurring = match payload.is_recurring.as_ref() {
        Some(value) => as_bool("is_recurring", value)?,
        None => existing.is_some_and(|task| task.is_recurring),
    };

    Ok(TaskFields {
        client,
        contact: normalize_contact(payload.contact.as_deref())?,
        project_type: sanitize_optional(payload.project_type.as_deref(), SHORT_TEXT_MAX_LEN),
        stack: sanitize_optional(payload.stack.as_deref(), SHORT_TEXT_MAX_LEN),
        domain: normalize_domain(payload.domain.as_deref())?,
        description: sanitize_optional(payload.description.as_deref(), DESCRIPTION_MAX_LEN),
        price,
        payment_status: parse_payment_status(payload.payment_status.as_deref())?,
        deadline,
        deadline_timestamp,
        hosting: parse_hosting(payload.hosting.as_deref())?,
        col_id,
        order_position,
        is_recurring,
        assets_link: normalize_assets_links(payload.assets_link.as_ref())?,
        public_uuid: parse_public_uuid(payload.public_uuid.as_deref())?,
    })
}

/// Fields of the next cycle of a recurring task: back to Discovery, unpaid,
/// deadline pushed out by [`RECURRING_CYCLE_MS`].
pub fn recurring_clone_fields(task: &Task) -> TaskFields {
    let base = task
        .deadline_timestamp
        .unwrap_or_else(|| task.created_at.timestamp_millis());
    TaskFields {
        col_id: Stage::Discovery,
        order_position: 0,
        payment_status: PaymentStatus::Pending,
        is_recurring: true,
        deadline_timestamp: Some(base + RECURRING_CYCLE_MS),
        public_uuid: None,
        ..TaskFields::from_task(task)
    }
}

pub fn lead_fields(payload: &LeadPayload) -> Result<TaskFields, ValidationError> {
    let client = validate_client(payload.name.as_deref().unwrap_or_default())?;
    let contact = normalize_contact(payload.email.as_deref())?;

    let mut lines = Vec::new();
    if let Some(message) = sanitize_optional(payload.message.as_deref(), DESCRIPTION_MAX_LEN) {
        lines.push(message);
    }
    if let Some(phone) = sanitize_optional(payload.phone.as_deref(), SHORT_TEXT_MAX_LEN) {
        lines.push(format!("Telefone: {phone}"));
    }
    if let Some(kind) = sanitize_optional(payload.project_type.as_deref(), SHORT_TEXT_MAX_LEN) {
        lines.push(format!("Tipo de projeto: {kind}"));
    }
    let description = sanitize_optional(Some(&lines.join("\n")), DESCRIPTION_MAX_LEN);

    Ok(TaskFields {
        client,
        contact,
        project_type: Some(LEAD_SOURCE.to_string()),
        stack: None,
        domain: None,
        description,
        price: 0.0,
        payment_status: PaymentStatus::Pending,
        deadline: None,
        deadline_timestamp: None,
        hosting: Hosting::Nao,
        col_id: Stage::Discovery,
        order_position: 0,
        is_recurring: false,
        assets_link: None,
        public_uuid: None,
    })
}

/// Progress shown on the public status page: share of finished subtasks, or
/// a stage-based estimate when the task has none.
pub fn public_progress(stage: Stage, completed: u64, total: u64) -> u8 {
    if total == 0 {
        return ((stage.index() + 1) * 25) as u8;
    }
    let percent = (completed.min(total) as f64 / total as f64 * 100.0).round();
    percent as u8
}

/// Task mutations with their side effects: every successful write is
/// followed by a detached activity row and a detached broadcast.
#[derive(Clone)]
pub struct TaskService {
    db: DbPool,
    hub: EventHub,
    activity: ActivityLogger,
}

impl TaskService {
    pub fn new(db: DbPool, hub: EventHub) -> Self {
        let activity = ActivityLogger::new(db.clone());
        Self { db, hub, activity }
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    pub async fn list(&self) -> Result<Vec<Task>, TaskServiceError> {
        Ok(TaskRepository::find_all(&self.db).await?)
    }

    pub async fn get(&self, id: i64) -> Result<Task, TaskServiceError> {
        TaskRepository::find_by_id(&self.db, id)
            .await?
            .ok_or(TaskServiceError::TaskNotFound)
    }

    pub async fn create(
        &self,
        user_id: i64,
        payload: &TaskPayload,
    ) -> Result<Task, TaskServiceError> {
        let fields = validate_payload(payload, None, Utc::now().timestamp_millis())?;
        let requested_id = payload
            .id
            .as_ref()
            .filter(|v| !v.is_null())
            .map(|v| as_i64("id", v))
            .transpose()?
            .filter(|id| *id > 0);

        let task = TaskRepository::create(&self.db, requested_id, Some(user_id), &fields).await?;
        let description = describe_create(&task);
        tracing::info!(task_id = task.id, user_id, "task created");

        self.activity.log(
            user_id,
            Some(task.id),
            ActivityAction::Create,
            description.clone(),
            None,
            snapshot(&task),
        );
        let broadcast_task = task.clone();
        self.broadcast(Some(user_id), description, move |actor| {
            TaskEvent::Created(TaskBroadcast {
                task: broadcast_task,
                actor,
            })
        });
        Ok(task)
    }

    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        payload: &TaskPayload,
    ) -> Result<Task, TaskServiceError> {
        let existing = self.get(id).await?;
        let fields = validate_payload(payload, Some(&existing), Utc::now().timestamp_millis())?;

        let task = TaskRepository::update(&self.db, id, &fields)
            .await
            .map_err(not_found_as(TaskServiceError::TaskNotFound))?;
        let description = describe_update(&existing, &task);

        self.activity.log(
            user_id,
            Some(task.id),
            ActivityAction::Update,
            description.clone(),
            snapshot(&existing),
            snapshot(&task),
        );
        let broadcast_task = task.clone();
        self.broadcast(Some(user_id), description, move |actor| {
            TaskEvent::Updated(TaskBroadcast {
                task: broadcast_task,
                actor,
            })
        });
        Ok(task)
    }

    /// Changes stage and position only. Landing a recurring task in Live also
    /// schedules its next cycle; that clone never affects the move itself.
    pub async fn move_task(
        &self,
        user_id: i64,
        id: i64,
        payload: &MovePayload,
    ) -> Result<Task, TaskServiceError> {
        let col_id = match payload.col_id.as_ref().filter(|v| !v.is_null()) {
            Some(value) => validate_stage(as_i64("col_id", value)?)?,
            None => return Err(ValidationError::new("col_id", "col_id is required").into()),
        };
        let order_position = match payload.order_position.as_ref().filter(|v| !v.is_null()) {
            Some(value) => validate_order_position(as_i64("order_position", value)?)?,
            None => {
                return Err(
                    ValidationError::new("order_position", "order_position is required").into(),
                );
            }
        };

        let existing = self.get(id).await?;
        let task = TaskRepository::move_to(&self.db, id, col_id, order_position)
            .await
            .map_err(not_found_as(TaskServiceError::TaskNotFound))?;
        let description = describe_move(&task.client, existing.col_id, task.col_id);

        self.activity.log(
            user_id,
            Some(task.id),
            ActivityAction::Move,
            description.clone(),
            Some(serde_json::json!({
                "col_id": existing.col_id,
                "order_position": existing.order_position,
            })),
            Some(serde_json::json!({
                "col_id": task.col_id,
                "order_position": task.order_position,
            })),
        );
        let broadcast_task = task.clone();
        self.broadcast(Some(user_id), description, move |actor| {
            TaskEvent::Moved(TaskBroadcast {
                task: broadcast_task,
                actor,
            })
        });

        if task.col_id == Stage::Live && task.is_recurring {
            self.spawn_recurring_clone(user_id, task.clone());
        }
        Ok(task)
    }

    pub async fn delete(&self, user_id: i64, id: i64) -> Result<(), TaskServiceError> {
        let existing = self.get(id).await?;
        let removed = TaskRepository::delete(&self.db, id).await?;
        if removed == 0 {
            return Err(TaskServiceError::TaskNotFound);
        }
        let description = describe_delete(&existing.client);
        tracing::info!(task_id = id, user_id, "task deleted");

        self.activity.log(
            user_id,
            Some(id),
            ActivityAction::Delete,
            description.clone(),
            snapshot(&existing),
            None,
        );
        self.broadcast(Some(user_id), description, move |actor| {
            TaskEvent::Deleted(TaskDeletedBroadcast { task_id: id, actor })
        });
        Ok(())
    }

    /// Unauthenticated lead intake; always lands in Discovery.
    pub async fn create_lead(&self, payload: &LeadPayload) -> Result<Task, TaskServiceError> {
        let fields = lead_fields(payload)?;
        let task = TaskRepository::create(&self.db, None, None, &fields).await?;
        tracing::info!(task_id = task.id, "lead received");

        let actor = EventActor {
            user_id: None,
            user_name: Some(LEAD_SOURCE.to_string()),
            user_avatar_url: None,
            action_description: describe_lead(&task),
        };
        self.hub.publish(TaskEvent::Created(TaskBroadcast {
            task: task.clone(),
            actor,
        }));
        Ok(task)
    }

    pub async fn public_view(&self, public_uuid: &str) -> Result<PublicTaskView, TaskServiceError> {
        let task = TaskRepository::find_by_public_uuid(&self.db, public_uuid.trim())
            .await?
            .ok_or(TaskServiceError::TaskNotFound)?;
        let progress = SubtaskRepository::progress(&self.db, task.id).await?;
        Ok(PublicTaskView {
            client: task.client,
            status: task.col_id.label().to_string(),
            progress: public_progress(task.col_id, progress.completed, progress.total),
            updated_at: task.updated_at,
        })
    }

    pub async fn recent_activity(
        &self,
        limit: Option<u64>,
        task_id: Option<i64>,
    ) -> Result<Vec<ActivityEntry>, TaskServiceError> {
        Ok(ActivityRepository::recent(&self.db, limit, task_id).await?)
    }

    pub async fn subtasks(&self, task_id: i64) -> Result<Vec<Subtask>, TaskServiceError> {
        self.get(task_id).await?;
        Ok(SubtaskRepository::find_by_task(&self.db, task_id).await?)
    }

    pub async fn add_subtask(&self, task_id: i64, title: &str) -> Result<Subtask, TaskServiceError> {
        let title = sanitize_text(title, SUBTASK_TITLE_MAX_LEN);
        if title.is_empty() {
            return Err(ValidationError::new("title", "Title is required").into());
        }
        self.get(task_id).await?;
        Ok(SubtaskRepository::create(&self.db, task_id, &title).await?)
    }

    pub async fn update_subtask(
        &self,
        id: i64,
        patch: &SubtaskPatch,
    ) -> Result<Subtask, TaskServiceError> {
        let title = match patch.title.as_deref() {
            Some(raw) => {
                let title = sanitize_text(raw, SUBTASK_TITLE_MAX_LEN);
                if title.is_empty() {
                    return Err(ValidationError::new("title", "Title is required").into());
                }
                Some(title)
            }
            None => None,
        };
        let data = UpdateSubtask {
            title,
            completed: patch
                .completed
                .as_ref()
                .map(|v| as_bool("completed", v))
                .transpose()?,
            order_position: patch
                .order_position
                .as_ref()
                .map(|v| as_i64("order_position", v).and_then(validate_order_position))
                .transpose()?,
        };
        SubtaskRepository::update(&self.db, id, &data)
            .await
            .map_err(not_found_as(TaskServiceError::SubtaskNotFound))
    }

    pub async fn delete_subtask(&self, id: i64) -> Result<(), TaskServiceError> {
        match SubtaskRepository::delete(&self.db, id).await? {
            0 => Err(TaskServiceError::SubtaskNotFound),
            _ => Ok(()),
        }
    }

    /// Resolves the actor's display info and publishes, off the request path.
    fn broadcast<F>(&self, user_id: Option<i64>, description: String, build: F) -> JoinHandle<()>
    where
        F: FnOnce(EventActor) -> TaskEvent + Send + 'static,
    {
        let db = self.db.clone();
        let hub = self.hub.clone();
        events::spawn_detached("task_broadcast", async move {
            let user = match user_id {
                Some(id) => UserRepository::find_by_id(&db, id).await?,
                None => None,
            };
            let actor = EventActor {
                user_id,
                user_name: user.as_ref().map(|u| u.name.clone()),
                user_avatar_url: user.and_then(|u| u.avatar_url),
                action_description: description,
            };
            hub.publish(build(actor));
            Ok::<(), DbErr>(())
        })
    }

    fn spawn_recurring_clone(&self, user_id: i64, original: Task) -> JoinHandle<()> {
        let service = self.clone();
        events::spawn_detached("recurring_clone", async move {
            let fields = recurring_clone_fields(&original);
            let clone = TaskRepository::create(&service.db, None, original.user_id, &fields).await?;
            tracing::info!(
                task_id = original.id,
                clone_id = clone.id,
                "created next cycle of recurring task"
            );

            let description = describe_recurring_clone(&clone);
            service.activity.log(
                user_id,
                Some(clone.id),
                ActivityAction::Create,
                description.clone(),
                None,
                snapshot(&clone),
            );
            service.broadcast(Some(user_id), description, move |actor| {
                TaskEvent::Created(TaskBroadcast { task: clone, actor })
            });
            Ok::<(), DbErr>(())
        })
    }
}

fn not_found_as(mapped: TaskServiceError) -> impl FnOnce(DbErr) -> TaskServiceError {
    move |err| match err {
        DbErr::RecordNotFound(_) => mapped,
        other => TaskServiceError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use db::models::user::UpsertUser;
    use sea_orm::{Database, DatabaseConnection};
    use sea_orm_migration::MigratorTrait;
    use serde_json::json;
    use utils_core::deadline::HOUR_MS;

    use super::*;

    async fn setup() -> (TaskService, DatabaseConnection, i64) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        let user = UserRepository::upsert(
            &db,
            &UpsertUser {
                email: "ana@vibeweb.dev".to_string(),
                username: Some("ana".to_string()),
                name: "Ana".to_string(),
                password_hash: "x".to_string(),
            },
        )
        .await
        .unwrap();
        (TaskService::new(db.clone(), EventHub::default()), db, user.id)
    }

    fn payload(value: Value) -> TaskPayload {
        serde_json::from_value(value).unwrap()
    }

    async fn wait_for<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..100 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[test]
    fn create_requires_client_price_and_stage() {
        let err = validate_payload(&payload(json!({"price": 10, "col_id": 0})), None, 0);
        assert_eq!(err.unwrap_err().field, "client");
        let err = validate_payload(&payload(json!({"client": "A", "col_id": 0})), None, 0);
        assert_eq!(err.unwrap_err().field, "price");
        let err = validate_payload(&payload(json!({"client": "A", "price": 1})), None, 0);
        assert_eq!(err.unwrap_err().field, "col_id");
        let err = validate_payload(
            &payload(json!({"client": "A", "price": "abc", "col_id": 0})),
            None,
            0,
        );
        assert_eq!(err.unwrap_err().field, "price");
        let err = validate_payload(
            &payload(json!({"client": "A", "price": 1, "col_id": 0, "order_position": -1})),
            None,
            0,
        );
        assert_eq!(err.unwrap_err().field, "order_position");
        let err = validate_payload(
            &payload(json!({"client": "A", "price": 1, "col_id": 0, "payment_status": "Pago"})),
            None,
            0,
        );
        assert_eq!(err.unwrap_err().field, "payment_status");
    }

    #[test]
    fn create_resolves_relative_deadline_tokens() {
        let now = 1_760_000_000_000;
        let fields = validate_payload(
            &payload(json!({"client": "A", "price": 1, "col_id": 2, "deadline": "48h"})),
            None,
            now,
        )
        .unwrap();
        assert_eq!(fields.deadline_timestamp, Some(now + 48 * HOUR_MS));

        let fields = validate_payload(
            &payload(json!({
                "client": "A", "price": 1, "col_id": 2,
                "deadline": "sexta", "deadline_timestamp": 123
            })),
            None,
            now,
        )
        .unwrap();
        assert_eq!(fields.deadline_timestamp, Some(123));
    }

    #[tokio::test]
    async fn create_sanitizes_and_round_trips() {
        let (service, _db, user_id) = setup().await;
        let created = service
            .create(
                user_id,
                &payload(json!({
                    "client": "  Acme  ",
                    "price": "1500.5",
                    "col_id": 1,
                    "order_position": 2,
                    "contact": "Ana@Acme.com",
                    "domain": "ACME.com.br/",
                    "hosting": "sim",
                    "is_recurring": 1,
                    "assets_link": ["https://drive.example.com/x"]
                })),
            )
            .await
            .unwrap();

        let fetched = service.get(created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.client, "Acme");
        assert_eq!(fetched.price, 1500.5);
        assert_eq!(fetched.contact.as_deref(), Some("ana@acme.com"));
        assert_eq!(fetched.domain.as_deref(), Some("acme.com.br"));
        assert_eq!(fetched.hosting, Hosting::Sim);
        assert!(fetched.is_recurring);
        assert_eq!(fetched.user_id, Some(user_id));
        assert_eq!(
            fetched.assets_link.as_deref(),
            Some(r#"["https://drive.example.com/x"]"#)
        );
    }

    #[tokio::test]
    async fn create_logs_activity_and_broadcasts_with_actor() {
        let (service, db, user_id) = setup().await;
        let mut events = service.hub().subscribe();

        let task = service
            .create(
                user_id,
                &payload(json!({"client": "Acme", "price": 1000, "col_id": 0})),
            )
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.name(), "task:created");
        assert_eq!(event.task_id(), task.id);
        assert_eq!(event.actor().user_id, Some(user_id));
        assert_eq!(event.actor().user_name.as_deref(), Some("Ana"));
        assert_eq!(event.actor().action_description, "created project Acme");

        wait_for(|| {
            let db = db.clone();
            async move { ActivityRepository::count_for_task(&db, task.id).await.unwrap() == 1 }
        })
        .await;
    }

    #[tokio::test]
    async fn update_preserves_deadline_timestamp_when_text_unchanged() {
        let (service, _db, user_id) = setup().await;
        let created = service
            .create(
                user_id,
                &payload(json!({"client": "Acme", "price": 10, "col_id": 2, "deadline": "48h"})),
            )
            .await
            .unwrap();
        let original_ts = created.deadline_timestamp.unwrap();

        let updated = service
            .update(
                user_id,
                created.id,
                &payload(json!({"client": "Acme 2", "price": 10, "col_id": 2, "deadline": "48h"})),
            )
            .await
            .unwrap();
        assert_eq!(updated.deadline_timestamp, Some(original_ts));

        let changed = service
            .update(
                user_id,
                created.id,
                &payload(json!({"client": "Acme 2", "price": 10, "col_id": 2, "deadline": "24h"})),
            )
            .await
            .unwrap();
        assert_ne!(changed.deadline_timestamp, Some(original_ts));
        assert!(changed.deadline_timestamp.is_some());

        let cleared = service
            .update(
                user_id,
                created.id,
                &payload(json!({"client": "Acme 2", "price": 10, "col_id": 2})),
            )
            .await
            .unwrap();
        assert_eq!(cleared.deadline_timestamp, None);
    }

    #[tokio::test]
    async fn update_and_delete_missing_task_is_not_found() {
        let (service, _db, user_id) = setup().await;
        let body = payload(json!({"client": "A", "price": 1, "col_id": 0}));
        assert!(matches!(
            service.update(user_id, 404, &body).await,
            Err(TaskServiceError::TaskNotFound)
        ));
        assert!(matches!(
            service.delete(user_id, 404).await,
            Err(TaskServiceError::TaskNotFound)
        ));
    }

    #[tokio::test]
    async fn move_is_idempotent_and_logs_each_call() {
        let (service, db, user_id) = setup().await;
        let task = service
            .create(user_id, &payload(json!({"client": "Acme", "price": 1, "col_id": 0})))
            .await
            .unwrap();
        let body = MovePayload {
            col_id: Some(json!(1)),
            order_position: Some(json!(3)),
        };

        let first = service.move_task(user_id, task.id, &body).await.unwrap();
        let second = service.move_task(user_id, task.id, &body).await.unwrap();
        assert_eq!(first.col_id, second.col_id);
        assert_eq!(first.order_position, second.order_position);

        wait_for(|| {
            let db = db.clone();
            async move { ActivityRepository::count_for_task(&db, task.id).await.unwrap() == 3 }
        })
        .await;
        assert_eq!(service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn move_rejects_invalid_stage() {
        let (service, _db, user_id) = setup().await;
        let task = service
            .create(user_id, &payload(json!({"client": "Acme", "price": 1, "col_id": 0})))
            .await
            .unwrap();
        let err = service
            .move_task(
                user_id,
                task.id,
                &MovePayload {
                    col_id: Some(json!(4)),
                    order_position: Some(json!(0)),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TaskServiceError::Validation(ref e) if e.field == "col_id"));
    }

    #[tokio::test]
    async fn recurring_task_clones_on_every_move_into_live() {
        let (service, _db, user_id) = setup().await;
        let task = service
            .create(
                user_id,
                &payload(json!({
                    "client": "Acme", "price": 29, "col_id": 2,
                    "is_recurring": true, "payment_status": "Pago 100%",
                    "deadline": "10h"
                })),
            )
            .await
            .unwrap();
        let to_live = MovePayload {
            col_id: Some(json!(3)),
            order_position: Some(json!(0)),
        };

        service.move_task(user_id, task.id, &to_live).await.unwrap();
        wait_for(|| {
            let service = service.clone();
            async move { service.list().await.unwrap().len() == 2 }
        })
        .await;

        let tasks = service.list().await.unwrap();
        let clone = tasks.iter().find(|t| t.id != task.id).unwrap();
        assert_eq!(clone.col_id, Stage::Discovery);
        assert_eq!(clone.payment_status, PaymentStatus::Pending);
        assert!(clone.is_recurring);
        assert_eq!(
            clone.deadline_timestamp,
            Some(task.deadline_timestamp.unwrap() + RECURRING_CYCLE_MS)
        );

        service.move_task(user_id, task.id, &to_live).await.unwrap();
        wait_for(|| {
            let service = service.clone();
            async move { service.list().await.unwrap().len() == 3 }
        })
        .await;
    }

    #[test]
    fn clone_without_deadline_uses_created_at() {
        let now = Utc::now();
        let task = Task {
            id: 1,
            client: "Acme".to_string(),
            contact: None,
            project_type: None,
            stack: None,
            domain: None,
            description: None,
            price: 29.0,
            payment_status: PaymentStatus::Paid,
            deadline: None,
            deadline_timestamp: None,
            hosting: Hosting::Sim,
            col_id: Stage::Live,
            order_position: 4,
            is_recurring: true,
            assets_link: None,
            public_uuid: Some("x".to_string()),
            uptime_status: None,
            user_id: Some(1),
            created_at: now,
            updated_at: now,
        };
        let fields = recurring_clone_fields(&task);
        assert_eq!(
            fields.deadline_timestamp,
            Some(now.timestamp_millis() + RECURRING_CYCLE_MS)
        );
        assert_eq!(fields.public_uuid, None);
        assert_eq!(fields.hosting, Hosting::Sim);
        assert_eq!(fields.order_position, 0);
    }

    #[tokio::test]
    async fn delete_broadcasts_client_name() {
        let (service, _db, user_id) = setup().await;
        let task = service
            .create(user_id, &payload(json!({"client": "Acme", "price": 1, "col_id": 0})))
            .await
            .unwrap();
        let mut events = service.hub().subscribe();

        service.delete(user_id, task.id).await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.name(), "task:deleted");
        assert_eq!(event.actor().action_description, "deleted project Acme");
        assert!(matches!(
            service.get(task.id).await,
            Err(TaskServiceError::TaskNotFound)
        ));
    }

    #[tokio::test]
    async fn leads_land_in_discovery() {
        let (service, _db, _) = setup().await;
        let mut events = service.hub().subscribe();
        let lead = service
            .create_lead(&LeadPayload {
                name: Some("Padaria Sol".to_string()),
                email: Some("contato@padariasol.com".to_string()),
                phone: Some("+55 11 99999-0000".to_string()),
                project_type: Some("Landing page".to_string()),
                message: Some("Quero um site".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(lead.col_id, Stage::Discovery);
        assert_eq!(lead.price, 0.0);
        assert_eq!(lead.payment_status, PaymentStatus::Pending);
        assert_eq!(lead.project_type.as_deref(), Some(LEAD_SOURCE));
        assert_eq!(
            lead.description.as_deref(),
            Some("Quero um site\nTelefone: +55 11 99999-0000\nTipo de projeto: Landing page")
        );

        let event = events.recv().await.unwrap();
        assert_eq!(event.actor().user_id, None);
        assert_eq!(event.actor().user_name.as_deref(), Some(LEAD_SOURCE));

        assert!(service.create_lead(&LeadPayload::default()).await.is_err());
    }

    #[tokio::test]
    async fn public_view_progress() {
        let (service, _db, user_id) = setup().await;
        let task = service
            .create(
                user_id,
                &payload(json!({
                    "client": "Acme", "price": 1, "col_id": 1,
                    "public_uuid": "8C4D6A51-0D7C-4B8E-9A53-5B6F2F0E1A11"
                })),
            )
            .await
            .unwrap();
        let uuid = task.public_uuid.clone().unwrap();
        assert_eq!(uuid, "8c4d6a51-0d7c-4b8e-9a53-5b6f2f0e1a11");

        let view = service.public_view(&uuid).await.unwrap();
        assert_eq!(view.progress, 50);
        assert_eq!(view.status, "Acordo");

        let first = service.add_subtask(task.id, "Design").await.unwrap();
        service.add_subtask(task.id, "Build").await.unwrap();
        service.add_subtask(task.id, "Launch").await.unwrap();
        service
            .update_subtask(
                first.id,
                &SubtaskPatch {
                    completed: Some(json!(true)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(service.public_view(&uuid).await.unwrap().progress, 33);

        assert!(matches!(
            service.public_view("nope").await,
            Err(TaskServiceError::TaskNotFound)
        ));
    }

    #[tokio::test]
    async fn subtask_validation_and_missing_rows() {
        let (service, _db, user_id) = setup().await;
        let task = service
            .create(user_id, &payload(json!({"client": "Acme", "price": 1, "col_id": 0})))
            .await
            .unwrap();

        assert!(matches!(
            service.add_subtask(task.id, "   ").await,
            Err(TaskServiceError::Validation(_))
        ));
        assert!(matches!(
            service.add_subtask(404, "x").await,
            Err(TaskServiceError::TaskNotFound)
        ));
        assert!(matches!(
            service.delete_subtask(404).await,
            Err(TaskServiceError::SubtaskNotFound)
        ));
        assert!(matches!(
            service
                .update_subtask(404, &SubtaskPatch::default())
                .await,
            Err(TaskServiceError::SubtaskNotFound)
        ));
    }

    #[test]
    fn progress_rounding() {
        assert_eq!(public_progress(Stage::Discovery, 0, 0), 25);
        assert_eq!(public_progress(Stage::Live, 0, 0), 100);
        assert_eq!(public_progress(Stage::Build, 2, 3), 67);
        assert_eq!(public_progress(Stage::Build, 3, 3), 100);
    }
}
