//! WebSocket transport for task events. There is no polling fallback: if the
//! handshake is rejected, real-time updates are simply absent.

use board_protocol::events::TaskEvent;
use futures_util::StreamExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message, http::StatusCode},
};

use crate::{auth::AuthStore, config::ClientConfig, error::ClientError};

const EVENT_BUFFER: usize = 256;

/// Decodes one text frame; anything unrecognised is logged and skipped.
pub fn decode_frame(text: &str) -> Option<TaskEvent> {
    match serde_json::from_str::<TaskEvent>(text) {
        Ok(event) => Some(event),
        Err(err) => {
            tracing::warn!(error = %err, "ignoring undecodable realtime frame");
            None
        }
    }
}

pub struct RealtimeConnection {
    events: mpsc::Receiver<TaskEvent>,
    reader: JoinHandle<()>,
}

impl RealtimeConnection {
    pub async fn connect(config: &ClientConfig, auth: &AuthStore) -> Result<Self, ClientError> {
        let token = auth.token().ok_or(ClientError::Unauthorized)?;
        let url = config.socket_url(&token)?;

        let (mut stream, _) = match connect_async(url.as_str()).await {
            Ok(connected) => connected,
            Err(WsError::Http(response)) if response.status() == StatusCode::UNAUTHORIZED => {
                tracing::warn!("realtime handshake rejected, logging out");
                auth.clear();
                return Err(ClientError::Unauthorized);
            }
            Err(WsError::Http(response)) => {
                return Err(ClientError::Api {
                    status: response.status().as_u16(),
                    message: "realtime handshake failed".to_string(),
                });
            }
            Err(WsError::Io(err)) => return Err(ClientError::BackendUnreachable(err.to_string())),
            Err(err) => return Err(ClientError::Network(err.to_string())),
        };
        tracing::info!("realtime connected");

        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if let Some(event) = decode_frame(text.as_str()) {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(error = %err, "realtime connection lost");
                        break;
                    }
                }
            }
            tracing::info!("realtime disconnected");
        });

        Ok(Self { events, reader })
    }

    /// Next event; `None` once the connection is gone.
    pub async fn recv(&mut self) -> Option<TaskEvent> {
        self.events.recv().await
    }

    /// Hands the event stream to a session loop.
    pub fn into_events(self) -> mpsc::Receiver<TaskEvent> {
        self.events
    }

    pub fn close(self) {
        self.reader.abort();
    }
}
