use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{AutomationError, AutomationResult};
use crate::task::ScheduledTask;

/// The process-wide catalog, keyed by task id, guarded by a single
/// readers-writer lock (spec §3 "ScheduledTask catalog"). Per §5, this
/// lock must never be held across a channel send or a handler call — the
/// scheduler's dispatch loop snapshots under a read lock and releases it
/// before touching the queue.
#[derive(Default)]
pub struct TaskCatalog {
    tasks: RwLock<HashMap<String, ScheduledTask>>,
}

impl TaskCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, task: ScheduledTask) {
        self.tasks.write().insert(task.id.clone(), task);
    }

    pub fn get(&self, id: &str) -> Option<ScheduledTask> {
        self.tasks.read().get(id).cloned()
    }

    pub fn snapshot(&self) -> Vec<ScheduledTask> {
        self.tasks.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mutate<F, R>(&self, id: &str, f: F) -> AutomationResult<R>
    where
        F: FnOnce(&mut ScheduledTask) -> R,
    {
        let mut tasks = self.tasks.write();
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| AutomationError::TaskNotFound(id.to_string()))?;
        Ok(f(task))
    }
}
