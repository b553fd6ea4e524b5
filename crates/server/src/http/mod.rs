use axum::{
    Json, Router,
    extract::{Request, State},
    http::{HeaderValue, Method, header},
    middleware::{Next, from_fn_with_state},
    response::{IntoResponse, Response},
};
use services::services::config::{CorsOrigins, ServerConfig};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utils_core::response::ApiResponse;

use crate::{AppState, error::REDACTED_MESSAGE, routes};

pub mod auth;
pub mod extract;

pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .merge(routes::auth::protected_router())
        .merge(routes::tasks::router())
        .merge(routes::subtasks::router())
        .merge(routes::activities::router())
        .layer(from_fn_with_state(state.clone(), auth::require_auth));

    let api_routes = Router::new()
        .merge(routes::health::router())
        .merge(routes::auth::public_router())
        .merge(routes::leads::router())
        .merge(routes::view::router())
        .merge(routes::socket::router())
        .merge(protected_routes);

    Router::new()
        .nest("/api", api_routes)
        .merge(routes::socket::router())
        .layer(from_fn_with_state(state.clone(), redact_internal_errors))
        .layer(cors_layer(state.config()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// In production a 5xx body never carries the underlying error text.
async fn redact_internal_errors(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    let status = response.status();
    if state.config().production && status.is_server_error() {
        return (status, Json(ApiResponse::<()>::error(REDACTED_MESSAGE))).into_response();
    }
    response
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match &config.cors_origins {
        CorsOrigins::Any => layer.allow_origin(Any),
        CorsOrigins::List(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(origins))
        }
    }
}
