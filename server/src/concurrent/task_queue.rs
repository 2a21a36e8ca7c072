// island_realm/server/src/concurrent/task_queue.rs
use crate::core::types::{Environment, IslandId, Location};
use crate::systems::provisioning::PasteReport;
use crossbeam_queue::SegQueue;
use std::sync::Arc;

/// Work that background threads hand back to the simulation thread.
#[derive(Debug, Clone)]
pub enum SimTask {
    /// A paste finished; finalize the crossings waiting on it.
    ProvisioningComplete {
        island: IslandId,
        env: Environment,
        fallback: Location,
        report: PasteReport,
    },
    /// A background save could not write these islands; mark them dirty again.
    SaveFailed { islands: Vec<IslandId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPriority {
    High,
    Normal,
}

/// Lock-free multi-producer queue drained once per tick by the simulation thread.
#[derive(Debug)]
pub struct SimTaskQueue {
    high_priority: Arc<SegQueue<SimTask>>,
    normal_priority: Arc<SegQueue<SimTask>>,
}

impl SimTaskQueue {
    pub fn new() -> Self {
        SimTaskQueue {
            high_priority: Arc::new(SegQueue::new()),
            normal_priority: Arc::new(SegQueue::new()),
        }
    }

    pub fn push(&self, task: SimTask, priority: TaskPriority) {
        match priority {
            TaskPriority::High => self.high_priority.push(task),
            TaskPriority::Normal => self.normal_priority.push(task),
        }
    }

    pub fn pop(&self) -> Option<SimTask> {
        if let Some(task) = self.high_priority.pop() {
            return Some(task);
        }
        self.normal_priority.pop()
    }

    pub fn pop_batch(&self, max_count: usize) -> Vec<SimTask> {
        let mut batch = Vec::with_capacity(max_count.min(self.len()));
        while batch.len() < max_count {
            match self.pop() {
                Some(task) => batch.push(task),
                None => break,
            }
        }
        batch
    }

    pub fn is_empty(&self) -> bool {
        self.high_priority.is_empty() && self.normal_priority.is_empty()
    }

    pub fn len(&self) -> usize {
        self.high_priority.len() + self.normal_priority.len()
    }
}

impl Default for SimTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
