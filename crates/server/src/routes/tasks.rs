use axum::{
    Extension, Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, patch},
};
use board_protocol::task::Task;
use services::services::{
    auth::AuthUser,
    task::{MovePayload, TaskPayload},
};
use utils_core::response::ApiResponse;

use crate::{
    AppState,
    error::ApiError,
    http::extract::{ApiJson, ApiPath},
};

pub async fn get_tasks(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = state.tasks().list().await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_task(
    State(state): State<AppState>,
    ApiPath(task_id): ApiPath<i64>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = state.tasks().get(task_id).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<TaskPayload>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Task>>), ApiError> {
    tracing::debug!(user_id = user.id, client = ?payload.client, "Creating task");
    let task = state.tasks().create(user.id, &payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(task))))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(task_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<TaskPayload>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = state.tasks().update(user.id, task_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn move_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(task_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<MovePayload>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = state.tasks().move_task(user.id, task_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(task_id): ApiPath<i64>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.tasks().delete(user.id, task_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(get_tasks).post(create_task))
        .route(
            "/tasks/{task_id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/tasks/{task_id}/move", patch(move_task))
}
