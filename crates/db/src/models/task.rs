use std::str::FromStr;

use board_protocol::task::{Hosting, PaymentStatus, Stage, Task, UptimeStatus};
use chrono::Utc;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionSession, TransactionTrait,
};

use crate::{
    entities::task,
    retry::{is_unique_violation, retry_on_sqlite_busy},
};

/// Attempts (first try included) before a colliding id is reported as an error.
pub const MAX_ID_ATTEMPTS: usize = 5;

/// Every editable column of a task. Updates resend all of them.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFields {
    pub client: String,
    pub contact: Option<String>,
    pub project_type: Option<String>,
    pub stack: Option<String>,
    pub domain: Option<String>,
    pub description: Option<String>,
    pub price: f64,
    pub payment_status: PaymentStatus,
    pub deadline: Option<String>,
    pub deadline_timestamp: Option<i64>,
    pub hosting: Hosting,
    pub col_id: Stage,
    pub order_position: i64,
    pub is_recurring: bool,
    pub assets_link: Option<String>,
    pub public_uuid: Option<String>,
}

impl TaskFields {
    pub fn from_task(task: &Task) -> Self {
        Self {
            client: task.client.clone(),
            contact: task.contact.clone(),
            project_type: task.project_type.clone(),
            stack: task.stack.clone(),
            domain: task.domain.clone(),
            description: task.description.clone(),
            price: task.price,
            payment_status: task.payment_status,
            deadline: task.deadline.clone(),
            deadline_timestamp: task.deadline_timestamp,
            hosting: task.hosting,
            col_id: task.col_id,
            order_position: task.order_position,
            is_recurring: task.is_recurring,
            assets_link: task.assets_link.clone(),
            public_uuid: task.public_uuid.clone(),
        }
    }
}

/// Server-side id: epoch milliseconds scaled by 1000 plus random jitter.
pub fn generate_task_id() -> i64 {
    let jitter: i64 = rand::thread_rng().gen_range(0..1000);
    Utc::now().timestamp_millis() * 1000 + jitter
}

pub struct TaskRepository;

impl TaskRepository {
    fn from_model(model: task::Model) -> Result<Task, DbErr> {
        let col_id = Stage::try_from(model.col_id).map_err(|err| DbErr::Custom(err.to_string()))?;
        let payment_status = PaymentStatus::from_str(&model.payment_status).map_err(|_| {
            DbErr::Custom(format!("unknown payment_status {:?}", model.payment_status))
        })?;
        let hosting = Hosting::from_str(&model.hosting).unwrap_or_default();
        let uptime_status = model
            .uptime_status
            .as_deref()
            .and_then(|value| UptimeStatus::from_str(value).ok());

        Ok(Task {
            id: model.id,
            client: model.client,
            contact: model.contact,
            project_type: model.project_type,
            stack: model.stack,
            domain: model.domain,
            description: model.description,
            price: model.price,
            payment_status,
            deadline: model.deadline,
            deadline_timestamp: model.deadline_timestamp,
            hosting,
            col_id,
            order_position: model.order_position,
            is_recurring: model.is_recurring,
            assets_link: model.assets_link,
            public_uuid: model.public_uuid,
            uptime_status,
            user_id: model.user_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    fn apply_fields(active: &mut task::ActiveModel, fields: &TaskFields) {
        active.client = Set(fields.client.clone());
        active.contact = Set(fields.contact.clone());
        active.project_type = Set(fields.project_type.clone());
        active.stack = Set(fields.stack.clone());
        active.domain = Set(fields.domain.clone());
        active.description = Set(fields.description.clone());
        active.price = Set(fields.price);
        active.payment_status = Set(fields.payment_status.to_string());
        active.deadline = Set(fields.deadline.clone());
        active.deadline_timestamp = Set(fields.deadline_timestamp);
        active.hosting = Set(fields.hosting.to_string());
        active.col_id = Set(fields.col_id.index());
        active.order_position = Set(fields.order_position);
        active.is_recurring = Set(fields.is_recurring);
        active.assets_link = Set(fields.assets_link.clone());
        active.public_uuid = Set(fields.public_uuid.clone());
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Task>, DbErr> {
        let records = task::Entity::find()
            .order_by_asc(task::Column::ColId)
            .order_by_asc(task::Column::OrderPosition)
            .order_by_asc(task::Column::Id)
            .all(db)
            .await?;
        records.into_iter().map(Self::from_model).collect()
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Task>, DbErr> {
        task::Entity::find_by_id(id)
            .one(db)
            .await?
            .map(Self::from_model)
            .transpose()
    }

    pub async fn find_by_public_uuid<C: ConnectionTrait>(
        db: &C,
        public_uuid: &str,
    ) -> Result<Option<Task>, DbErr> {
        task::Entity::find()
            .filter(task::Column::PublicUuid.eq(public_uuid))
            .one(db)
            .await?
            .map(Self::from_model)
            .transpose()
    }

    /// Inserts with exactly the given id. A taken id surfaces as a unique violation.
    pub async fn insert<C: ConnectionTrait>(
        db: &C,
        id: i64,
        user_id: Option<i64>,
        fields: &TaskFields,
    ) -> Result<Task, DbErr> {
        let model = retry_on_sqlite_busy(|| async {
            let now = Utc::now();
            let mut active = task::ActiveModel {
                id: Set(id),
                user_id: Set(user_id),
                uptime_status: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };
            Self::apply_fields(&mut active, fields);
            active.insert(db).await
        })
        .await?;
        Self::from_model(model)
    }

    /// Inserts a task, regenerating the id whenever it collides with an
    /// existing row. Gives up after [`MAX_ID_ATTEMPTS`] attempts.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        requested_id: Option<i64>,
        user_id: Option<i64>,
        fields: &TaskFields,
    ) -> Result<Task, DbErr> {
        let mut id = requested_id.unwrap_or_else(generate_task_id);
        let mut last_err = None;
        for attempt in 1..=MAX_ID_ATTEMPTS {
            match Self::insert(db, id, user_id, fields).await {
                Ok(task) => return Ok(task),
                Err(err) if is_unique_violation(&err) => {
                    tracing::debug!(task_id = id, attempt, "task id collision, regenerating");
                    id = generate_task_id();
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| DbErr::Custom("task id retries exhausted".to_string())))
    }

    /// Full replace of the editable columns.
    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        fields: &TaskFields,
    ) -> Result<Task, DbErr> {
        let record = task::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;

        let updated = retry_on_sqlite_busy(|| {
            let mut active: task::ActiveModel = record.clone().into();
            Self::apply_fields(&mut active, fields);
            active.updated_at = Set(Utc::now());
            async move { active.update(db).await }
        })
        .await?;
        Self::from_model(updated)
    }

    /// Places the task at `order_position` (clamped to the column length) in
    /// `col_id` and renumbers the destination column from zero, then closes
    /// the gap left in the source column. Runs in one transaction so
    /// `(col_id, order_position)` stays a strict order within every stage.
    /// Only the moved row gets a new `updated_at`.
    pub async fn move_to<C: ConnectionTrait + TransactionTrait>(
        db: &C,
        id: i64,
        col_id: Stage,
        order_position: i64,
    ) -> Result<Task, DbErr> {
        let updated = retry_on_sqlite_busy(|| async move {
            let txn = db.begin().await?;
            let record = task::Entity::find_by_id(id)
                .one(&txn)
                .await?
                .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;
            let from = record.col_id;

            let mut target = Self::column_ids(&txn, col_id.index(), Some(id)).await?;
            let index = usize::try_from(order_position.max(0))
                .unwrap_or(usize::MAX)
                .min(target.len());
            target.insert(index, id);

            let mut active: task::ActiveModel = record.into();
            active.col_id = Set(col_id.index());
            active.order_position = Set(index as i64);
            active.updated_at = Set(Utc::now());
            let moved = active.update(&txn).await?;

            Self::renumber(&txn, &target, id).await?;
            if from != col_id.index() {
                let source = Self::column_ids(&txn, from, Some(id)).await?;
                Self::renumber(&txn, &source, id).await?;
            }

            txn.commit().await?;
            Ok::<_, DbErr>(moved)
        })
        .await?;
        Self::from_model(updated)
    }

    /// Ids in `col_id` by `(order_position, id)`, optionally leaving one out.
    async fn column_ids<C: ConnectionTrait>(
        db: &C,
        col_id: i64,
        except: Option<i64>,
    ) -> Result<Vec<i64>, DbErr> {
        let mut query = task::Entity::find()
            .select_only()
            .column(task::Column::Id)
            .filter(task::Column::ColId.eq(col_id));
        if let Some(except) = except {
            query = query.filter(task::Column::Id.ne(except));
        }
        query
            .order_by_asc(task::Column::OrderPosition)
            .order_by_asc(task::Column::Id)
            .into_tuple::<i64>()
            .all(db)
            .await
    }

    /// Rewrites `order_position` to each id's index. `skip` is already placed.
    async fn renumber<C: ConnectionTrait>(db: &C, ordered: &[i64], skip: i64) -> Result<(), DbErr> {
        for (position, sibling) in ordered.iter().enumerate() {
            if *sibling == skip {
                continue;
            }
            task::Entity::update_many()
                .col_expr(
                    task::Column::OrderPosition,
                    sea_orm::sea_query::Expr::value(position as i64),
                )
                .filter(task::Column::Id.eq(*sibling))
                .filter(task::Column::OrderPosition.ne(position as i64))
                .exec(db)
                .await?;
        }
        Ok(())
    }

    /// Hard delete; subtasks go with it through the foreign key cascade.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        let result = retry_on_sqlite_busy(|| {
            task::Entity::delete_many()
                .filter(task::Column::Id.eq(id))
                .exec(db)
        })
        .await?;
        Ok(result.rows_affected)
    }

    /// Tasks with a non-empty domain, oldest id first.
    pub async fn find_with_domain<C: ConnectionTrait>(
        db: &C,
        limit: u64,
    ) -> Result<Vec<Task>, DbErr> {
        let records = task::Entity::find()
            .filter(task::Column::Domain.is_not_null())
            .filter(task::Column::Domain.ne(""))
            .order_by_asc(task::Column::Id)
            .limit(limit)
            .all(db)
            .await?;
        records.into_iter().map(Self::from_model).collect()
    }

    /// Records a probe result without touching `updated_at`, so uptime checks
    /// never look like user edits.
    pub async fn set_uptime_status<C: ConnectionTrait>(
        db: &C,
        id: i64,
        status: UptimeStatus,
    ) -> Result<(), DbErr> {
        retry_on_sqlite_busy(|| {
            task::Entity::update_many()
                .col_expr(
                    task::Column::UptimeStatus,
                    sea_orm::sea_query::Expr::value(status.to_string()),
                )
                .filter(task::Column::Id.eq(id))
                .exec(db)
        })
        .await?;
        Ok(())
    }
}
