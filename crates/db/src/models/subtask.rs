use board_protocol::task::Subtask;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::{entities::subtask, retry::retry_on_sqlite_busy};

#[derive(Debug, Clone, Default)]
pub struct UpdateSubtask {
    pub title: Option<String>,
    pub completed: Option<bool>,
    pub order_position: Option<i64>,
}

/// Completed and total subtask counts for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubtaskProgress {
    pub completed: u64,
    pub total: u64,
}

pub struct SubtaskRepository;

impl SubtaskRepository {
    fn from_model(model: subtask::Model) -> Subtask {
        Subtask {
            id: model.id,
            task_id: model.task_id,
            title: model.title,
            completed: model.completed,
            order_position: model.order_position,
            created_at: model.created_at,
        }
    }

    pub async fn find_by_task<C: ConnectionTrait>(
        db: &C,
        task_id: i64,
    ) -> Result<Vec<Subtask>, DbErr> {
        let records = subtask::Entity::find()
            .filter(subtask::Column::TaskId.eq(task_id))
            .order_by_asc(subtask::Column::OrderPosition)
            .order_by_asc(subtask::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Subtask>, DbErr> {
        let record = subtask::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    /// Appends after the current last sibling.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        task_id: i64,
        title: &str,
    ) -> Result<Subtask, DbErr> {
        let last: Option<i64> = subtask::Entity::find()
            .select_only()
            .column(subtask::Column::OrderPosition)
            .filter(subtask::Column::TaskId.eq(task_id))
            .order_by_desc(subtask::Column::OrderPosition)
            .into_tuple()
            .one(db)
            .await?;
        let order_position = last.map_or(0, |position| position + 1);

        let model = retry_on_sqlite_busy(|| {
            let active = subtask::ActiveModel {
                task_id: Set(task_id),
                title: Set(title.to_string()),
                completed: Set(false),
                order_position: Set(order_position),
                created_at: Set(Utc::now()),
                ..Default::default()
            };
            async move { active.insert(db).await }
        })
        .await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        data: &UpdateSubtask,
    ) -> Result<Subtask, DbErr> {
        let record = subtask::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Subtask not found".to_string()))?;

        let updated = retry_on_sqlite_busy(|| {
            let mut active: subtask::ActiveModel = record.clone().into();
            if let Some(title) = data.title.clone() {
                active.title = Set(title);
            }
            if let Some(completed) = data.completed {
                active.completed = Set(completed);
            }
            if let Some(order_position) = data.order_position {
                active.order_position = Set(order_position);
            }
            async move { active.update(db).await }
        })
        .await?;
        Ok(Self::from_model(updated))
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        let result = retry_on_sqlite_busy(|| {
            subtask::Entity::delete_many()
                .filter(subtask::Column::Id.eq(id))
                .exec(db)
        })
        .await?;
        Ok(result.rows_affected)
    }

    pub async fn progress<C: ConnectionTrait>(db: &C, task_id: i64) -> Result<SubtaskProgress, DbErr> {
        let total = subtask::Entity::find()
            .filter(subtask::Column::TaskId.eq(task_id))
            .count(db)
            .await?;
        let completed = subtask::Entity::find()
            .filter(subtask::Column::TaskId.eq(task_id))
            .filter(subtask::Column::Completed.eq(true))
            .count(db)
            .await?;
        Ok(SubtaskProgress { completed, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{
        TaskRepository,
        tests::{fields, setup_db},
    };

    #[tokio::test]
    async fn subtasks_append_update_and_cascade() {
        let db = setup_db().await;
        TaskRepository::create(&db, Some(1), None, &fields("Acme"))
            .await
            .unwrap();

        let first = SubtaskRepository::create(&db, 1, "Wireframes").await.unwrap();
        let second = SubtaskRepository::create(&db, 1, "Copy").await.unwrap();
        assert_eq!(first.order_position, 0);
        assert_eq!(second.order_position, 1);

        let done = SubtaskRepository::update(
            &db,
            first.id,
            &UpdateSubtask {
                completed: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(done.completed);
        assert_eq!(done.title, "Wireframes");

        assert_eq!(
            SubtaskRepository::progress(&db, 1).await.unwrap(),
            SubtaskProgress {
                completed: 1,
                total: 2
            }
        );

        let titles: Vec<String> = SubtaskRepository::find_by_task(&db, 1)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["Wireframes", "Copy"]);

        TaskRepository::delete(&db, 1).await.unwrap();
        assert!(SubtaskRepository::find_by_task(&db, 1).await.unwrap().is_empty());
        assert!(SubtaskRepository::find_by_id(&db, second.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn subtask_requires_existing_task() {
        let db = setup_db().await;
        assert!(SubtaskRepository::create(&db, 999, "Orphan").await.is_err());
    }
}
