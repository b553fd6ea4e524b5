use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::{Arc, Mutex},
};

use board_protocol::task::{Stage, Task};
use chrono::{DateTime, Utc};

use crate::{clock::Clock, config::ClientConfig, metrics::Metrics};

struct Memo {
    key: u64,
    metrics: Arc<Metrics>,
}

/// Read-through cache of the task list plus memoised metrics.
///
/// Metrics are recomputed only when the identity hash (ids and `updated_at`,
/// in list order) differs from the one they were computed for.
pub struct StateStore {
    config: ClientConfig,
    clock: Arc<dyn Clock>,
    tasks: Vec<Task>,
    memo: Mutex<Option<Memo>>,
    computations: Mutex<u64>,
}

impl StateStore {
    pub fn new(config: ClientConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            tasks: Vec::new(),
            memo: Mutex::new(None),
            computations: Mutex::new(0),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.task(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wholesale reload from the server.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    /// Replaces the cached task with the server's copy, or appends it.
    pub fn upsert(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => self.tasks.push(task),
        }
    }

    /// Appends unless a task with the same id is already cached.
    pub fn insert_if_absent(&mut self, task: Task) -> bool {
        if self.contains(task.id) {
            return false;
        }
        self.tasks.push(task);
        true
    }

    /// Replaces only when the task is already cached.
    pub fn replace_existing(&mut self, task: Task) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => {
                *existing = task;
                true
            }
            None => false,
        }
    }

    /// Patches stage and position. Returns false when nothing changed.
    pub fn patch_position(
        &mut self,
        id: i64,
        col_id: Stage,
        order_position: i64,
        updated_at: DateTime<Utc>,
    ) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        if task.col_id == col_id
            && task.order_position == order_position
            && task.updated_at == updated_at
        {
            return false;
        }
        task.col_id = col_id;
        task.order_position = order_position;
        task.updated_at = updated_at;
        true
    }

    pub fn remove(&mut self, id: i64) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(index))
    }

    pub(crate) fn tasks_mut(&mut self) -> &mut Vec<Task> {
        &mut self.tasks
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    pub fn restore(&mut self, snapshot: Vec<Task>) {
        self.tasks = snapshot;
    }

    pub fn identity_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tasks.len().hash(&mut hasher);
        for task in &self.tasks {
            task.id.hash(&mut hasher);
            task.updated_at.timestamp_millis().hash(&mut hasher);
        }
        hasher.finish()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        let key = self.identity_hash();
        let mut memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(memo) = memo.as_ref().filter(|m| m.key == key) {
            return memo.metrics.clone();
        }

        let metrics = Arc::new(Metrics::compute(
            &self.tasks,
            self.config.hosting_price,
            self.config.urgent_hours,
            self.clock.now(),
        ));
        *memo = Some(Memo {
            key,
            metrics: metrics.clone(),
        });
        *self.computations.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        tracing::trace!(tasks = self.tasks.len(), "metrics recomputed");
        metrics
    }

    /// Drops the memo so the next read recomputes, e.g. after time has passed.
    pub fn invalidate_metrics(&self) {
        *self.memo.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn metrics_computations(&self) -> u64 {
        *self.computations.lock().unwrap_or_else(|e| e.into_inner())
    }
}
