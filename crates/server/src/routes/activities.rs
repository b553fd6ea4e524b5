use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use board_protocol::user::ActivityEntry;
use serde::Deserialize;
use utils_core::response::ApiResponse;

use crate::{AppState, error::ApiError, http::extract::ApiQuery};

/// Both parameters are parsed leniently: junk values are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct RecentActivityQuery {
    pub limit: Option<String>,
    pub task_id: Option<String>,
}

pub async fn recent_activities(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RecentActivityQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<ActivityEntry>>>, ApiError> {
    let limit = query.limit.and_then(|raw| raw.trim().parse::<u64>().ok());
    let task_id = query.task_id.and_then(|raw| raw.trim().parse::<i64>().ok());
    let entries = state.tasks().recent_activity(limit, task_id).await?;
    Ok(ResponseJson(ApiResponse::success(entries)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/tasks/activities/recent", get(recent_activities))
}
