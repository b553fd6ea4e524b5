use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, patch},
};
use board_protocol::task::Subtask;
use serde::Deserialize;
use services::services::task::SubtaskPatch;
use utils_core::response::ApiResponse;

use crate::{
    AppState,
    error::ApiError,
    http::extract::{ApiJson, ApiPath},
};

#[derive(Debug, Deserialize)]
pub struct CreateSubtask {
    #[serde(default)]
    pub title: String,
}

pub async fn list_subtasks(
    State(state): State<AppState>,
    ApiPath(task_id): ApiPath<i64>,
) -> Result<ResponseJson<ApiResponse<Vec<Subtask>>>, ApiError> {
    let subtasks = state.tasks().subtasks(task_id).await?;
    Ok(ResponseJson(ApiResponse::success(subtasks)))
}

pub async fn create_subtask(
    State(state): State<AppState>,
    ApiPath(task_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<CreateSubtask>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Subtask>>), ApiError> {
    let subtask = state.tasks().add_subtask(task_id, &payload.title).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(subtask))))
}

pub async fn update_subtask(
    State(state): State<AppState>,
    ApiPath(subtask_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<SubtaskPatch>,
) -> Result<ResponseJson<ApiResponse<Subtask>>, ApiError> {
    let subtask = state.tasks().update_subtask(subtask_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(subtask)))
}

pub async fn delete_subtask(
    State(state): State<AppState>,
    ApiPath(subtask_id): ApiPath<i64>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.tasks().delete_subtask(subtask_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/tasks/{task_id}/subtasks",
            get(list_subtasks).post(create_subtask),
        )
        .route(
            "/tasks/subtasks/{subtask_id}",
            patch(update_subtask).delete(delete_subtask),
        )
}
