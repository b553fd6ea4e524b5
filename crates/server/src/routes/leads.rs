use axum::{
    Router, extract::State, http::StatusCode, response::Json as ResponseJson, routing::post,
};
use board_protocol::task::Task;
use services::services::task::LeadPayload;
use utils_core::response::ApiResponse;

use crate::{
    AppState,
    error::ApiError,
    http::extract::{ApiJson, ClientIp},
};

pub async fn create_lead(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(payload): ApiJson<LeadPayload>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Task>>), ApiError> {
    if let Err(limited) = state.lead_limiter().hit(ip) {
        tracing::warn!(%ip, "lead submission rate limited");
        return Err(limited.into());
    }
    let task = state.tasks().create_lead(&payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(task))))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/leads", post(create_lead))
}
