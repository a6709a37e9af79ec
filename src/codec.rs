// Conversion between a task list and the string stored in a slot

use crate::task::Task;
use eyre::{Context, Result};
use std::collections::HashSet;
use tracing::warn;

/// Serialize the full list, in order, as a JSON array
pub fn encode_tasks(tasks: &[Task]) -> Result<String> {
    serde_json::to_string(tasks).context("Failed to serialize task list")
}

/// Parse a stored task list
///
/// Fails if the value is not a JSON array of tasks. If two entries share an
/// id, the first one wins and the later ones are dropped with a warning.
pub fn decode_tasks(raw: &str) -> Result<Vec<Task>> {
    let parsed: Vec<Task> = serde_json::from_str(raw).context("Failed to parse task list")?;

    let mut seen = HashSet::with_capacity(parsed.len());
    let mut tasks = Vec::with_capacity(parsed.len());
    for (index, task) in parsed.into_iter().enumerate() {
        if !seen.insert(task.id) {
            warn!(id = task.id, index, "Duplicate task id in stored list, skipping");
            continue;
        }
        tasks.push(task);
    }

    Ok(tasks)
}
