//! Realtime gateway: every authenticated socket receives every task event as
//! a JSON text frame.

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::{HeaderMap, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use board_protocol::events::TaskEvent;
use futures_util::{SinkExt, Stream, StreamExt};
use services::services::auth::AuthUser;

use crate::{AppState, error::ApiError, http::auth::extract_token};

/// Authenticates before looking at the upgrade so a bad token is always a 401.
pub async fn socket_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let user = match extract_token(&headers, uri.query())
        .map(|token| state.auth().authenticate(&token))
    {
        Some(Ok(user)) => user,
        Some(Err(_)) | None => {
            tracing::warn!("realtime handshake rejected");
            return ApiError::Unauthorized.into_response();
        }
    };

    match ws {
        Ok(ws) => {
            // Subscribe before the 101 goes out so no event slips in between.
            let events = state.hub().stream();
            ws.on_upgrade(move |socket| async move {
                if let Err(e) = handle_socket(socket, events, user).await {
                    tracing::warn!("realtime socket closed: {}", e);
                }
            })
            .into_response()
        }
        Err(rejection) => rejection.into_response(),
    }
}

async fn handle_socket<S>(socket: WebSocket, events: S, user: AuthUser) -> anyhow::Result<()>
where
    S: Stream<Item = TaskEvent> + Send + 'static,
{
    let mut events = Box::pin(events);
    let (mut sender, mut receiver) = socket.split();
    tracing::debug!(user_id = user.id, "realtime client connected");

    // Drain (and ignore) client->server frames so pings/pongs work.
    let mut drain = tokio::spawn(async move { while let Some(Ok(_)) = receiver.next().await {} });

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                let frame = match serde_json::to_string(&event) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!(task_id = event.task_id(), "failed to encode event: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(frame.into())).await.is_err() {
                    break; // client disconnected
                }
            }
            _ = &mut drain => break,
        }
    }

    drain.abort();
    let _ = sender.close().await;
    tracing::debug!(user_id = user.id, "realtime client disconnected");
    Ok(())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/socket", get(socket_handler))
}
