// Task model and id generation

use serde::{Deserialize, Serialize};

/// Identifier of a task. Derived from creation time, then bumped to stay unique.
pub type TaskId = i64;

/// A single to-do entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Older stores wrote this field as `task`
    #[serde(alias = "task")]
    pub text: String,
    pub completed: bool,
}

impl Task {
    pub fn new(id: TaskId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            completed: false,
        }
    }
}

/// Hands out task ids that are strictly increasing within one store.
///
/// Each id is the current time in milliseconds, unless that would not exceed
/// the previous id, in which case it is the previous id plus one. Two tasks
/// added within the same clock tick therefore never collide. Returns `None`
/// once the previous id is `TaskId::MAX`.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    last: TaskId,
}

impl IdGenerator {
    /// Start a generator that never returns an id at or below `last`
    pub fn starting_after(last: TaskId) -> Self {
        Self { last }
    }

    pub fn next_id(&mut self) -> Option<TaskId> {
        self.next_at(now_ms())
    }

    fn next_at(&mut self, now: TaskId) -> Option<TaskId> {
        let id = if now > self.last { now } else { self.last.checked_add(1)? };
        self.last = id;
        Some(id)
    }
}

/// Helper function to get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
