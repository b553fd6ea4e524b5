use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use board_protocol::task::PublicTaskView;
use utils_core::response::ApiResponse;

use crate::{AppState, error::ApiError, http::extract::ApiPath};

/// Read-only status page data; no auth.
pub async fn get_public_view(
    State(state): State<AppState>,
    ApiPath(public_uuid): ApiPath<String>,
) -> Result<ResponseJson<ApiResponse<PublicTaskView>>, ApiError> {
    let view = state.tasks().public_view(&public_uuid).await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/tasks/view/{public_uuid}", get(get_public_view))
}
