//! In-process fan-out of task mutations to every connected realtime session.

use std::{fmt::Display, future::Future};

use board_protocol::events::TaskEvent;
use futures::{Stream, StreamExt};
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<TaskEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends to every current subscriber and returns how many there were.
    /// Having nobody listening is not an error.
    pub fn publish(&self, event: TaskEvent) -> usize {
        let name = event.name();
        let task_id = event.task_id();
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(event = name, task_id, receivers, "broadcast task event");
                receivers
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }

    /// Subscription as a stream. Slow consumers skip what they missed instead
    /// of ending the stream.
    pub fn stream(&self) -> impl Stream<Item = TaskEvent> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|item| async move {
            match item {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "realtime subscriber lagged");
                    None
                }
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Runs `fut` on its own task. Failures are logged under `label` and never
/// reach whoever spawned it.
pub fn spawn_detached<F, E>(label: &'static str, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = fut.await {
            tracing::warn!(task = label, error = %err, "detached task failed");
        }
    })
}
