//! Task-scoped traversal state.
//!
//! A [`TaskState`] is passed by value into every engine invocation for one
//! top-level task. Only its [`PaginationCursor`] crosses into extractors;
//! the task id and depth stay on the engine side of the boundary.

use serde::{Deserialize, Serialize};

/// Ordinal position within a task. Advances by exactly one per emission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaginationCursor {
    item_index: u64,
}

impl PaginationCursor {
    #[must_use]
    pub fn start() -> Self {
        Self::default()
    }

    /// Resumes from an inherited index, e.g. for a continuation task.
    #[must_use]
    pub fn resume(item_index: u64) -> Self {
        Self { item_index }
    }

    #[must_use]
    pub fn item_index(self) -> u64 {
        self.item_index
    }

    /// Advances by one and returns the new index.
    pub(crate) fn advance(&mut self) -> u64 {
        self.item_index += 1;
        self.item_index
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    /// Shared by every step of one task tree; used as a tracing field.
    pub task_id: String,
    /// Site module id the task was started for.
    pub site: String,
    /// Number of continuation hops from the top-level request.
    pub depth: u32,
    pub cursor: PaginationCursor,
}

impl TaskState {
    /// State for a fresh top-level task: new id, depth 0, cursor 0.
    #[must_use]
    pub fn root(site: impl Into<String>) -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            site: site.into(),
            depth: 0,
            cursor: PaginationCursor::start(),
        }
    }

    /// State carried by a follow-up fetch emitted at `item_index`.
    #[must_use]
    pub fn continuation(&self, item_index: u64) -> Self {
        Self {
            task_id: self.task_id.clone(),
            site: self.site.clone(),
            depth: self.depth.saturating_add(1),
            cursor: PaginationCursor::resume(item_index),
        }
    }
}
