use std::{sync::Arc, time::Duration};

use board_protocol::{
    events::TaskEvent,
    task::{Stage, Task},
};
use tokio::{sync::mpsc, time::Instant};

use crate::{
    api::{TaskApi, TaskDraft},
    auth::AuthStore,
    board::{self, CardDrop},
    clock::Clock,
    config::ClientConfig,
    error::ClientError,
    reconciler::{DirtyViews, Reconciled, Reconciler, RenderScheduler},
    store::StateStore,
    views::{BoardColumn, DashboardView, FinancialView, HeaderView, board_columns},
};

/// Roughly one animation frame.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Paints whatever the frame marked dirty. Views are read from the session.
pub trait Renderer {
    fn render(&mut self, dirty: DirtyViews, session: &ClientSession);
}

/// One signed-in browser session: cache, reconciler and render scheduling,
/// wired to an API implementation.
pub struct ClientSession {
    api: Arc<dyn TaskApi>,
    auth: AuthStore,
    store: StateStore,
    reconciler: Reconciler,
    scheduler: RenderScheduler,
}

impl ClientSession {
    pub fn new(
        config: ClientConfig,
        api: Arc<dyn TaskApi>,
        auth: AuthStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            reconciler: Reconciler::new(Arc::new(auth.clone()), clock.clone()),
            auth,
            store: StateStore::new(config, clock),
            scheduler: RenderScheduler::new(),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    fn invalidate(&mut self, views: DirtyViews) {
        self.scheduler.request(views);
    }

    pub async fn load(&mut self) -> Result<(), ClientError> {
        let tasks = self.api.list_tasks().await?;
        tracing::debug!(count = tasks.len(), "task list loaded");
        self.store.replace_all(tasks);
        self.invalidate(DirtyViews::ALL);
        Ok(())
    }

    pub async fn create_task(&mut self, draft: &TaskDraft) -> Result<Task, ClientError> {
        if let Some(id) = draft.id {
            self.reconciler.mark_local(id);
        }
        let task = self.api.create_task(draft).await?;
        self.reconciler.mark_local(task.id);
        self.store.upsert(task.clone());
        self.invalidate(DirtyViews::ALL);
        Ok(task)
    }

    pub async fn update_task(&mut self, id: i64, draft: &TaskDraft) -> Result<Task, ClientError> {
        self.reconciler.mark_local(id);
        let task = self.api.update_task(id, draft).await?;
        self.store.upsert(task.clone());
        self.invalidate(DirtyViews::ALL);
        Ok(task)
    }

    pub async fn delete_task(&mut self, id: i64) -> Result<(), ClientError> {
        self.reconciler.mark_local(id);
        self.api.delete_task(id).await?;
        self.store.remove(id);
        self.invalidate(DirtyViews::ALL);
        Ok(())
    }

    /// Drag and drop: the board shows the drop at once; a rejected move
    /// restores the pre-drag list and repaints everything.
    pub async fn drop_task(
        &mut self,
        task_id: i64,
        to: Stage,
        index: usize,
    ) -> Result<Task, ClientError> {
        let snapshot = self.store.snapshot();
        let card = CardDrop { task_id, to, index };
        let Some(order_position) = board::apply_drop(self.store.tasks_mut(), card) else {
            return Err(ClientError::Api {
                status: 404,
                message: "Task not found".to_string(),
            });
        };
        self.reconciler.mark_local(task_id);
        self.invalidate(DirtyViews::BOARD);

        match self.api.move_task(task_id, to, order_position).await {
            Ok(task) => {
                self.store.upsert(task.clone());
                self.invalidate(DirtyViews::ALL);
                Ok(task)
            }
            Err(err) => {
                tracing::warn!(task_id, error = %err, "move rejected, rolling back");
                self.store.restore(snapshot);
                self.invalidate(DirtyViews::ALL);
                Err(err)
            }
        }
    }

    pub fn handle_event(&mut self, event: &TaskEvent) -> Reconciled {
        let outcome = self.reconciler.apply(&mut self.store, event);
        if let Reconciled::Applied(views) = outcome {
            self.invalidate(views);
        }
        outcome
    }

    pub fn board(&self) -> Vec<BoardColumn> {
        board_columns(self.store.tasks())
    }

    pub fn dashboard(&self) -> DashboardView {
        DashboardView::from_metrics(&self.store.metrics())
    }

    pub fn financial(&self) -> FinancialView {
        FinancialView::from_metrics(&self.store.metrics())
    }

    pub fn header(&self) -> HeaderView {
        let session = self.auth.session();
        HeaderView {
            user_name: session.as_ref().map(|s| s.user.name.clone()),
            user_avatar_url: session.and_then(|s| s.user.avatar_url),
            task_count: self.store.len(),
            urgent_count: self.store.metrics().urgent.len(),
        }
    }

    /// Paints the pending frame now, if any.
    pub fn flush(&mut self, renderer: &mut dyn Renderer) {
        if self.scheduler.frame_requested() {
            let dirty = self.scheduler.take_frame();
            renderer.render(dirty, self);
        }
    }

    /// Applies events as they arrive and paints at most once per frame until
    /// the event stream ends.
    pub async fn run(
        &mut self,
        mut events: mpsc::Receiver<TaskEvent>,
        renderer: &mut dyn Renderer,
        frame: Duration,
    ) {
        let mut frame_at: Option<Instant> = None;
        loop {
            if frame_at.is_none() && self.scheduler.frame_requested() {
                frame_at = Some(Instant::now() + frame);
            }
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_event(&event);
                    }
                    None => break,
                },
                _ = tokio::time::sleep_until(frame_at.unwrap_or_else(Instant::now)), if frame_at.is_some() => {
                    frame_at = None;
                    self.flush(renderer);
                }
            }
        }
        self.flush(renderer);
    }
}
