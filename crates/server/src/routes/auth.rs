use axum::{
    Extension, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use board_protocol::user::User;
use services::services::auth::{
    AuthError, AuthUser, AvatarRequest, LoginRequest, LoginResponse, PasswordRequest,
    ProfileRequest,
};
use utils_core::response::ApiResponse;

use crate::{
    AppState,
    error::ApiError,
    http::extract::{ApiJson, ClientIp},
};

/// Only failed attempts count towards the per-IP limit.
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<ResponseJson<ApiResponse<LoginResponse>>, ApiError> {
    state.login_limiter().check(ip)?;
    match state.auth().login(&payload).await {
        Ok(session) => Ok(ResponseJson(ApiResponse::success(session))),
        Err(AuthError::InvalidCredentials) => {
            state.login_limiter().record(ip);
            tracing::warn!(%ip, "failed login attempt");
            Err(AuthError::InvalidCredentials.into())
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = state.auth().me(user.id).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<ProfileRequest>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = state.auth().update_profile(user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<PasswordRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.auth().change_password(user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn set_avatar(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<AvatarRequest>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = state.auth().set_avatar(user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/auth/login", post(login))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/profile", put(update_profile))
        .route("/auth/password", put(change_password))
        .route("/auth/avatar", post(set_avatar))
}
