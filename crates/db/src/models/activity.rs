use std::{collections::HashMap, str::FromStr};

use board_protocol::user::{ActivityAction, ActivityEntry};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde_json::Value;

use crate::{
    entities::activity_log, models::user::UserRepository, retry::retry_on_sqlite_busy,
};

pub const DEFAULT_RECENT_LIMIT: u64 = 20;
pub const MAX_RECENT_LIMIT: u64 = 100;

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: i64,
    pub task_id: Option<i64>,
    pub action_type: ActivityAction,
    pub action_description: String,
    pub old_data: Option<Value>,
    pub new_data: Option<Value>,
}

pub struct ActivityRepository;

impl ActivityRepository {
    pub async fn insert<C: ConnectionTrait>(db: &C, entry: &NewActivity) -> Result<i64, DbErr> {
        let old_data = entry.old_data.as_ref().map(Value::to_string);
        let new_data = entry.new_data.as_ref().map(Value::to_string);
        let model = retry_on_sqlite_busy(|| {
            let active = activity_log::ActiveModel {
                user_id: Set(entry.user_id),
                task_id: Set(entry.task_id),
                action_type: Set(entry.action_type.to_string()),
                action_description: Set(entry.action_description.clone()),
                old_data: Set(old_data.clone()),
                new_data: Set(new_data.clone()),
                created_at: Set(Utc::now()),
                ..Default::default()
            };
            async move { active.insert(db).await }
        })
        .await?;
        Ok(model.id)
    }

    /// Newest entries first, joined with the acting user's display info.
    /// `limit` is clamped to `1..=MAX_RECENT_LIMIT`.
    pub async fn recent<C: ConnectionTrait>(
        db: &C,
        limit: Option<u64>,
        task_id: Option<i64>,
    ) -> Result<Vec<ActivityEntry>, DbErr> {
        let limit = limit
            .unwrap_or(DEFAULT_RECENT_LIMIT)
            .clamp(1, MAX_RECENT_LIMIT);
        let mut query = activity_log::Entity::find();
        if let Some(task_id) = task_id {
            query = query.filter(activity_log::Column::TaskId.eq(task_id));
        }
        let records = query
            .order_by_desc(activity_log::Column::CreatedAt)
            .order_by_desc(activity_log::Column::Id)
            .limit(limit)
            .all(db)
            .await?;

        let mut user_ids: Vec<i64> = records.iter().map(|r| r.user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();
        let users: HashMap<i64, _> = UserRepository::find_by_ids(db, user_ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        records
            .into_iter()
            .map(|record| {
                let action_type = ActivityAction::from_str(&record.action_type).map_err(|_| {
                    DbErr::Custom(format!("unknown action_type {:?}", record.action_type))
                })?;
                let user = users.get(&record.user_id);
                Ok(ActivityEntry {
                    id: record.id,
                    user_id: record.user_id,
                    task_id: record.task_id,
                    action_type,
                    action_description: record.action_description,
                    old_data: parse_snapshot(record.old_data.as_deref()),
                    new_data: parse_snapshot(record.new_data.as_deref()),
                    created_at: record.created_at,
                    user_name: user.map(|u| u.name.clone()),
                    user_avatar_url: user.and_then(|u| u.avatar_url.clone()),
                })
            })
            .collect()
    }

    pub async fn count_for_task<C: ConnectionTrait>(db: &C, task_id: i64) -> Result<u64, DbErr> {
        use sea_orm::PaginatorTrait;
        activity_log::Entity::find()
            .filter(activity_log::Column::TaskId.eq(task_id))
            .count(db)
            .await
    }
}

fn parse_snapshot(raw: Option<&str>) -> Option<Value> {
    raw.and_then(|raw| serde_json::from_str(raw).ok())
}
