//! Applies broadcast task events to the local store without double-applying
//! this client's own writes.
//!
//! The acting client already holds the server's answer from the HTTP
//! response. Its own broadcast can race back before that response lands, so
//! every task id this client is about to mutate is remembered for one second;
//! an event from our own user about such a task is dropped as an echo.

use std::{
    collections::HashMap,
    ops::{BitOr, BitOrAssign},
    sync::Arc,
};

use board_protocol::events::TaskEvent;

use crate::{auth::SessionSource, clock::Clock, store::StateStore};

pub const LOCAL_ACTION_WINDOW_MS: i64 = 1_000;
pub const USER_ID_CACHE_MS: i64 = 5_000;

/// Which views need repainting on the next frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyViews {
    pub board: bool,
    pub dashboard: bool,
    pub financial: bool,
    pub header: bool,
}

impl DirtyViews {
    pub const NONE: DirtyViews = DirtyViews {
        board: false,
        dashboard: false,
        financial: false,
        header: false,
    };
    pub const ALL: DirtyViews = DirtyViews {
        board: true,
        dashboard: true,
        financial: true,
        header: true,
    };
    pub const BOARD: DirtyViews = DirtyViews {
        board: true,
        ..DirtyViews::NONE
    };

    pub fn is_empty(&self) -> bool {
        *self == DirtyViews::NONE
    }
}

impl BitOr for DirtyViews {
    type Output = DirtyViews;

    fn bitor(self, rhs: Self) -> Self::Output {
        DirtyViews {
            board: self.board || rhs.board,
            dashboard: self.dashboard || rhs.dashboard,
            financial: self.financial || rhs.financial,
            header: self.header || rhs.header,
        }
    }
}

impl BitOrAssign for DirtyViews {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

/// Task ids this client mutated within the last second.
pub struct LocalActions {
    clock: Arc<dyn Clock>,
    expires_at: HashMap<i64, i64>,
}

impl LocalActions {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            expires_at: HashMap::new(),
        }
    }

    pub fn mark(&mut self, task_id: i64) {
        let expires = self.clock.now_ms() + LOCAL_ACTION_WINDOW_MS;
        self.expires_at.insert(task_id, expires);
    }

    pub fn is_recent(&mut self, task_id: i64) -> bool {
        let now = self.clock.now_ms();
        self.expires_at.retain(|_, expires| *expires > now);
        self.expires_at.contains_key(&task_id)
    }

    pub fn len(&self) -> usize {
        self.expires_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expires_at.is_empty()
    }
}

/// The logged-in user id, re-read from the session at most every 5 seconds.
pub struct UserIdCache {
    source: Arc<dyn SessionSource>,
    clock: Arc<dyn Clock>,
    cached: Option<(Option<i64>, i64)>,
}

impl UserIdCache {
    pub fn new(source: Arc<dyn SessionSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            cached: None,
        }
    }

    pub fn get(&mut self) -> Option<i64> {
        let now = self.clock.now_ms();
        match self.cached {
            Some((user_id, read_at)) if now - read_at < USER_ID_CACHE_MS => user_id,
            _ => {
                let user_id = self.source.current_user_id();
                self.cached = Some((user_id, now));
                user_id
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Echo of our own recent write.
    Suppressed,
    /// Event matched nothing or changed nothing.
    Unchanged,
    Applied(DirtyViews),
}

pub struct Reconciler {
    local: LocalActions,
    user_ids: UserIdCache,
}

impl Reconciler {
    pub fn new(source: Arc<dyn SessionSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            local: LocalActions::new(clock.clone()),
            user_ids: UserIdCache::new(source, clock),
        }
    }

    /// Call right before issuing a mutation for `task_id`.
    pub fn mark_local(&mut self, task_id: i64) {
        self.local.mark(task_id);
    }

    pub fn is_echo(&mut self, event: &TaskEvent) -> bool {
        let Some(actor_id) = event.actor().user_id else {
            return false;
        };
        self.user_ids.get() == Some(actor_id) && self.local.is_recent(event.task_id())
    }

    pub fn apply(&mut self, store: &mut StateStore, event: &TaskEvent) -> Reconciled {
        if self.is_echo(event) {
            tracing::debug!(
                event = event.name(),
                task_id = event.task_id(),
                "suppressed self echo"
            );
            return Reconciled::Suppressed;
        }

        let changed = match event {
            TaskEvent::Created(b) => store.insert_if_absent(b.task.clone()),
            TaskEvent::Updated(b) => store.replace_existing(b.task.clone()),
            TaskEvent::Moved(b) => store.patch_position(
                b.task.id,
                b.task.col_id,
                b.task.order_position,
                b.task.updated_at,
            ),
            TaskEvent::Deleted(d) => store.remove(d.task_id).is_some(),
        };

        if changed {
            Reconciled::Applied(DirtyViews::ALL)
        } else {
            Reconciled::Unchanged
        }
    }
}

/// Collects dirty flags between frames so a burst of events paints once.
#[derive(Debug, Default)]
pub struct RenderScheduler {
    pending: DirtyViews,
    frame_requested: bool,
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when this call is the one that asked for a frame.
    pub fn request(&mut self, views: DirtyViews) -> bool {
        if views.is_empty() {
            return false;
        }
        self.pending |= views;
        if self.frame_requested {
            return false;
        }
        self.frame_requested = true;
        true
    }

    pub fn frame_requested(&self) -> bool {
        self.frame_requested
    }

    pub fn pending(&self) -> DirtyViews {
        self.pending
    }

    /// Called when the frame fires. Hands back everything dirtied since the last one.
    pub fn take_frame(&mut self) -> DirtyViews {
        self.frame_requested = false;
        std::mem::take(&mut self.pending)
    }
}
