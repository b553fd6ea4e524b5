//! Browser-side half of the board: a task cache with memoised metrics, the
//! real-time reconciler and the HTTP/WebSocket transports feeding it.

pub mod api;
pub mod auth;
pub mod board;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod realtime;
pub mod reconciler;
pub mod session;
pub mod store;
pub mod views;

pub use api::{HttpTaskApi, TaskApi, TaskDraft};
pub use auth::{AuthStore, Session};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ClientConfig;
pub use error::ClientError;
pub use session::{ClientSession, Renderer};
pub use store::StateStore;
