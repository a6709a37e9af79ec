// TaskList - Single-user task list with write-through local persistence

pub mod codec;
pub mod error;
pub mod file;
pub mod filter;
pub mod slot;
pub mod sqlite;
pub mod store;
pub mod task;

// Re-export main types for convenience
pub use error::StoreError;
pub use file::FileSlot;
pub use filter::FilterMode;
pub use slot::{MemorySlot, Slot};
pub use sqlite::SqliteSlot;
pub use store::{DEFAULT_KEY, EditSession, TaskCounts, TaskListStore};
pub use task::{Task, TaskId, now_ms};
