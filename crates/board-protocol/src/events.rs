use serde::{Deserialize, Serialize};

use crate::task::Task;

pub const EVENT_TASK_CREATED: &str = "task:created";
pub const EVENT_TASK_UPDATED: &str = "task:updated";
pub const EVENT_TASK_DELETED: &str = "task:deleted";
pub const EVENT_TASK_MOVED: &str = "task:moved";

/// Who caused a mutation and how it reads in the activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventActor {
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub user_avatar_url: Option<String>,
    pub action_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskBroadcast {
    pub task: Task,
    #[serde(flatten)]
    pub actor: EventActor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDeletedBroadcast {
    #[serde(rename = "taskId")]
    pub task_id: i64,
    #[serde(flatten)]
    pub actor: EventActor,
}

/// One real-time frame: `{"event": "task:updated", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum TaskEvent {
    #[serde(rename = "task:created")]
    Created(TaskBroadcast),
    #[serde(rename = "task:updated")]
    Updated(TaskBroadcast),
    #[serde(rename = "task:moved")]
    Moved(TaskBroadcast),
    #[serde(rename = "task:deleted")]
    Deleted(TaskDeletedBroadcast),
}

impl TaskEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TaskEvent::Created(_) => EVENT_TASK_CREATED,
            TaskEvent::Updated(_) => EVENT_TASK_UPDATED,
            TaskEvent::Moved(_) => EVENT_TASK_MOVED,
            TaskEvent::Deleted(_) => EVENT_TASK_DELETED,
        }
    }

    pub fn task_id(&self) -> i64 {
        match self {
            TaskEvent::Created(b) | TaskEvent::Updated(b) | TaskEvent::Moved(b) => b.task.id,
            TaskEvent::Deleted(d) => d.task_id,
        }
    }

    pub fn actor(&self) -> &EventActor {
        match self {
            TaskEvent::Created(b) | TaskEvent::Updated(b) | TaskEvent::Moved(b) => &b.actor,
            TaskEvent::Deleted(d) => &d.actor,
        }
    }
}
