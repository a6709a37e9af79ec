// Task list store: in-memory state plus write-through persistence

use crate::codec::{decode_tasks, encode_tasks};
use crate::error::{Result, StoreError};
use crate::filter::FilterMode;
use crate::slot::Slot;
use crate::task::{IdGenerator, Task, TaskId};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Slot key the task list is stored under unless another is given
pub const DEFAULT_KEY: &str = "todoList";

/// An in-progress text edit of one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub target_id: TaskId,
    pub draft_text: String,
}

/// Task totals for a summary line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

/// Owns the task list, the filter selection and the edit session
///
/// Every operation that changes the list writes the whole list to the slot
/// before returning. A failed write is logged and remembered, but the
/// in-memory change stands: memory is the source of truth for the session.
pub struct TaskListStore<S: Slot> {
    slot: S,
    key: String,
    tasks: Vec<Task>,
    filter: FilterMode,
    edit: Option<EditSession>,
    ids: IdGenerator,
    persist_error: Option<StoreError>,
    load_error: Option<StoreError>,
}

impl<S: Slot> TaskListStore<S> {
    /// Open a store on `slot` using the default key
    pub fn open(slot: S) -> Self {
        Self::open_with_key(slot, DEFAULT_KEY)
    }

    /// Open a store on `slot`, restoring whatever list `key` holds
    ///
    /// Never fails: an unreadable or malformed stored list is discarded and
    /// the store starts empty. The discarded data stays in the slot until
    /// the first mutation overwrites it.
    pub fn open_with_key(slot: S, key: impl Into<String>) -> Self {
        let key = key.into();
        let (tasks, load_error) = match Self::load(&slot, &key) {
            Ok(tasks) => (tasks, None),
            Err(err) => {
                warn!(error = %err, "Starting with an empty task list");
                (Vec::new(), Some(err))
            }
        };

        let last_id = tasks.iter().map(|t| t.id).max().unwrap_or(0);

        Self {
            slot,
            key,
            tasks,
            filter: FilterMode::default(),
            edit: None,
            ids: IdGenerator::starting_after(last_id),
            persist_error: None,
            load_error,
        }
    }

    fn load(slot: &S, key: &str) -> Result<Vec<Task>> {
        let corrupt = |e: eyre::Report| StoreError::PersistenceReadCorrupt {
            key: key.to_string(),
            message: format!("{:#}", e),
        };

        let Some(raw) = slot.get(key).map_err(corrupt)? else {
            info!(key, "No stored task list, starting empty");
            return Ok(Vec::new());
        };

        let tasks = decode_tasks(&raw).map_err(corrupt)?;
        info!(key, count = tasks.len(), "Loaded task list");
        Ok(tasks)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Append a new pending task
    ///
    /// Returns `None` without touching anything if `raw_text` is blank.
    pub fn add_task(&mut self, raw_text: &str) -> Option<TaskId> {
        let text = raw_text.trim();
        if text.is_empty() {
            debug!("Ignoring blank task");
            return None;
        }

        let id = match self.ids.next_id() {
            Some(id) => id,
            None => {
                let id = self.smallest_free_id();
                warn!(id, "Task ids exhausted, reusing smallest free id");
                id
            }
        };
        self.tasks.push(Task::new(id, text));
        debug!(id, "Added task");

        self.persist();
        Some(id)
    }

    fn smallest_free_id(&self) -> TaskId {
        let used: HashSet<TaskId> = self.tasks.iter().map(|t| t.id).collect();
        (1..=TaskId::MAX).find(|id| !used.contains(id)).unwrap_or(0)
    }

    /// Flip the completion flag of task `id`. Returns false if there is no such task.
    pub fn toggle_completion(&mut self, id: TaskId) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(id, "toggle_completion: task not found");
            return false;
        };

        task.completed = !task.completed;
        debug!(id, completed = task.completed, "Toggled task");

        self.persist();
        true
    }

    /// Remove task `id`, cancelling any edit of it. Returns false if there is no such task.
    pub fn delete_task(&mut self, id: TaskId) -> bool {
        let Some(index) = self.tasks.iter().position(|t| t.id == id) else {
            debug!(id, "delete_task: task not found");
            return false;
        };

        self.tasks.remove(index);
        if self.edit.as_ref().is_some_and(|e| e.target_id == id) {
            debug!(id, "Deleted task was being edited, cancelling edit");
            self.edit = None;
        }
        debug!(id, "Deleted task");

        self.persist();
        true
    }

    /// Start editing `task`, replacing any edit already in progress
    pub fn begin_edit(&mut self, task: &Task) {
        self.edit = Some(EditSession {
            target_id: task.id,
            draft_text: task.text.clone(),
        });
    }

    /// Replace the draft text of the current edit. Returns false when not editing.
    pub fn update_draft(&mut self, text: impl Into<String>) -> bool {
        match self.edit.as_mut() {
            Some(edit) => {
                edit.draft_text = text.into();
                true
            }
            None => false,
        }
    }

    /// Apply the current edit
    ///
    /// A blank draft is ignored and the edit stays open. If the target task
    /// has gone away the edit is closed without writing anything. Returns
    /// true only when a task's text was updated.
    pub fn commit_edit(&mut self) -> bool {
        let Some(edit) = self.edit.as_ref() else {
            return false;
        };

        let text = edit.draft_text.trim();
        if text.is_empty() {
            debug!(id = edit.target_id, "Ignoring blank edit");
            return false;
        }

        let target_id = edit.target_id;
        let text = text.to_string();
        self.edit = None;

        let Some(task) = self.tasks.iter_mut().find(|t| t.id == target_id) else {
            debug!(id = target_id, "commit_edit: task not found");
            return false;
        };

        task.text = text;
        debug!(id = target_id, "Updated task text");

        self.persist();
        true
    }

    /// Abandon the current edit, if any
    pub fn cancel_edit(&mut self) {
        self.edit = None;
    }

    /// Select the view filter by name
    ///
    /// Fails with [`StoreError::InvalidFilterMode`] for anything other than
    /// `all`, `completed` or `pending`, leaving the current filter in place.
    pub fn set_filter(&mut self, mode: &str) -> Result<()> {
        let mode = mode.parse::<FilterMode>()?;
        self.set_filter_mode(mode);
        Ok(())
    }

    pub fn set_filter_mode(&mut self, mode: FilterMode) {
        self.filter = mode;
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Tasks matching the current filter, in insertion order
    pub fn visible_tasks(&self) -> Vec<Task> {
        self.tasks.iter().filter(|t| self.filter.matches(t)).cloned().collect()
    }

    /// The whole list, in insertion order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn counts(&self) -> TaskCounts {
        let completed = self.tasks.iter().filter(|t| t.completed).count();
        TaskCounts {
            total: self.tasks.len(),
            completed,
            pending: self.tasks.len() - completed,
        }
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    pub fn edit_session(&self) -> Option<&EditSession> {
        self.edit.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        self.edit.is_some()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Error from the most recent failed write, cleared by the next successful one
    pub fn last_persist_error(&self) -> Option<&StoreError> {
        self.persist_error.as_ref()
    }

    /// Whether the slot holds the current in-memory list
    pub fn is_synced(&self) -> bool {
        self.persist_error.is_none()
    }

    /// Why stored data was discarded when the store was opened, if it was
    pub fn load_error(&self) -> Option<&StoreError> {
        self.load_error.as_ref()
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    pub fn slot_mut(&mut self) -> &mut S {
        &mut self.slot
    }

    pub fn into_slot(self) -> S {
        self.slot
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    fn persist(&mut self) {
        let result = encode_tasks(&self.tasks).and_then(|raw| self.slot.set(&self.key, &raw));

        match result {
            Ok(()) => {
                if self.persist_error.take().is_some() {
                    info!(key = %self.key, "Task list written again after earlier failure");
                }
            }
            Err(e) => {
                let err = StoreError::PersistenceWriteFailure {
                    key: self.key.clone(),
                    message: format!("{:#}", e),
                };
                warn!(error = %err, "Keeping unsaved changes in memory");
                self.persist_error = Some(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::MemorySlot;
    use crate::sqlite::SqliteSlot;
    use tempfile::TempDir;

    fn store() -> TaskListStore<MemorySlot> {
        TaskListStore::open(MemorySlot::new())
    }

    fn stored(store: &TaskListStore<MemorySlot>) -> Vec<Task> {
        let raw = store.slot().get(DEFAULT_KEY).unwrap().unwrap();
        decode_tasks(&raw).unwrap()
    }

    #[test]
    fn test_open_empty_slot() {
        let store = store();
        assert!(store.is_empty());
        assert_eq!(store.filter(), FilterMode::All);
        assert!(store.edit_session().is_none());
        assert!(store.load_error().is_none());
        assert!(store.is_synced());
    }

    #[test]
    fn test_open_restores_list() {
        let raw = r#"[{"id":10,"text":"a","completed":true},{"id":20,"text":"b","completed":false}]"#;
        let store = TaskListStore::open(MemorySlot::with_value(DEFAULT_KEY, raw));

        assert_eq!(store.len(), 2);
        assert_eq!(store.tasks()[0].id, 10);
        assert!(store.tasks()[0].completed);
        assert_eq!(store.tasks()[1].text, "b");
    }

    #[test]
    fn test_open_corrupt_data_starts_empty() {
        let store = TaskListStore::open(MemorySlot::with_value(DEFAULT_KEY, "{not json"));

        assert!(store.is_empty());
        assert!(matches!(
            store.load_error(),
            Some(StoreError::PersistenceReadCorrupt { key, .. }) if key == DEFAULT_KEY
        ));

        // Still usable
        let mut store = store;
        assert!(store.add_task("recovered").is_some());
        assert_eq!(stored(&store).len(), 1);
    }

    #[test]
    fn test_open_unreadable_slot_starts_empty() {
        let raw = r#"[{"id":1,"text":"kept on disk","completed":false}]"#;
        let mut slot = MemorySlot::with_value(DEFAULT_KEY, raw);
        slot.set_fail_reads(true);

        let mut store = TaskListStore::open(slot);
        assert!(store.is_empty());
        assert!(matches!(
            store.load_error(),
            Some(StoreError::PersistenceReadCorrupt { key, .. }) if key == DEFAULT_KEY
        ));

        // Stored value untouched until the first mutation
        store.slot_mut().set_fail_reads(false);
        assert_eq!(store.slot().get(DEFAULT_KEY).unwrap().as_deref(), Some(raw));
        assert_eq!(store.slot().writes(), 0);

        store.add_task("fresh");
        let tasks = stored(&store);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].text, "fresh");
    }

    #[test]
    fn test_open_uses_custom_key() {
        let slot = MemorySlot::with_value("other", r#"[{"id":1,"text":"x","completed":false}]"#);
        let store = TaskListStore::open_with_key(slot, "other");
        assert_eq!(store.key(), "other");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_add_task_trims_and_persists() {
        let mut store = store();
        let id = store.add_task("  buy milk \n").unwrap();

        assert_eq!(store.tasks(), &[Task::new(id, "buy milk")]);
        assert_eq!(stored(&store), store.tasks());
        assert_eq!(store.slot().writes(), 1);
    }

    #[test]
    fn test_add_blank_is_silent_noop() {
        let mut store = store();
        store.add_task("keep");
        let before = store.tasks().to_vec();

        assert_eq!(store.add_task(""), None);
        assert_eq!(store.add_task("   "), None);
        assert_eq!(store.add_task("\t\n"), None);

        assert_eq!(store.tasks(), before.as_slice());
        assert_eq!(store.slot().writes(), 1);
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let mut store = store();
        store.add_task("first");
        store.add_task("second");
        store.add_task("third");

        let texts: Vec<_> = store.tasks().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
    }

    #[test]
    fn test_rapid_adds_get_distinct_ids() {
        let mut store = store();
        for i in 0..200 {
            store.add_task(&format!("task {}", i));
        }

        let mut ids: Vec<_> = store.tasks().iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), 200);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn test_new_ids_do_not_collide_with_restored() {
        let far_future = crate::task::now_ms() + 1_000_000;
        let raw = format!(r#"[{{"id":{},"text":"later","completed":false}}]"#, far_future);
        let mut store = TaskListStore::open(MemorySlot::with_value(DEFAULT_KEY, &raw));

        let id = store.add_task("new").unwrap();
        assert!(id > far_future);
    }

    #[test]
    fn test_add_after_max_id_restored() {
        let raw = r#"[{"id":9223372036854775807,"text":"x","completed":false},{"id":1,"text":"y","completed":false}]"#;
        let mut store = TaskListStore::open(MemorySlot::with_value(DEFAULT_KEY, raw));

        let a = store.add_task("next").unwrap();
        let b = store.add_task("after").unwrap();

        assert_eq!((a, b), (2, 3));
        assert_eq!(store.len(), 4);
        assert_eq!(stored(&store).len(), 4);
    }

    #[test]
    fn test_toggle_is_involutive() {
        let mut store = store();
        let id = store.add_task("flip me").unwrap();

        assert!(store.toggle_completion(id));
        assert!(store.get(id).unwrap().completed);
        assert!(stored(&store)[0].completed);

        assert!(store.toggle_completion(id));
        assert!(!store.get(id).unwrap().completed);
        assert!(!stored(&store)[0].completed);
    }

    #[test]
    fn test_toggle_unknown_id_is_noop() {
        let mut store = store();
        store.add_task("a");
        let writes = store.slot().writes();

        assert!(!store.toggle_completion(424242));
        assert_eq!(store.slot().writes(), writes);
    }

    #[test]
    fn test_delete_keeps_relative_order() {
        let mut store = store();
        let a = store.add_task("A").unwrap();
        let b = store.add_task("B").unwrap();
        let c = store.add_task("C").unwrap();

        assert!(store.delete_task(b));

        let ids: Vec<_> = store.tasks().iter().map(|t| t.id).collect();
        assert_eq!(ids, [a, c]);
        assert_eq!(stored(&store), store.tasks());
    }

    #[test]
    fn test_delete_unknown_id_is_noop() {
        let mut store = store();
        store.add_task("a");
        let writes = store.slot().writes();

        assert!(!store.delete_task(-1));
        assert_eq!(store.len(), 1);
        assert_eq!(store.slot().writes(), writes);
    }

    #[test]
    fn test_delete_cancels_edit_of_that_task() {
        let mut store = store();
        let a = store.add_task("A").unwrap();
        let task = store.get(a).unwrap().clone();

        store.begin_edit(&task);
        store.delete_task(a);

        assert!(store.edit_session().is_none());
    }

    #[test]
    fn test_delete_other_task_keeps_edit() {
        let mut store = store();
        let a = store.add_task("A").unwrap();
        let b = store.add_task("B").unwrap();
        let task = store.get(a).unwrap().clone();

        store.begin_edit(&task);
        store.delete_task(b);

        assert_eq!(store.edit_session().unwrap().target_id, a);
    }

    #[test]
    fn test_begin_then_cancel_leaves_task_unchanged() {
        let mut store = store();
        let id = store.add_task("original").unwrap();
        let task = store.get(id).unwrap().clone();
        let writes = store.slot().writes();

        store.begin_edit(&task);
        assert_eq!(
            store.edit_session(),
            Some(&EditSession {
                target_id: id,
                draft_text: "original".to_string(),
            })
        );

        store.update_draft("something else");
        store.cancel_edit();

        assert!(!store.is_editing());
        assert_eq!(store.get(id), Some(&task));
        assert_eq!(store.slot().writes(), writes);
    }

    #[test]
    fn test_begin_then_commit_updates_only_text() {
        let mut store = store();
        let id = store.add_task("draft").unwrap();
        let other = store.add_task("other").unwrap();
        store.toggle_completion(id);
        let task = store.get(id).unwrap().clone();

        store.begin_edit(&task);
        assert!(store.update_draft("  final  "));
        assert!(store.commit_edit());

        let updated = store.get(id).unwrap();
        assert_eq!(updated.text, "final");
        assert_eq!(updated.id, id);
        assert!(updated.completed);
        assert_eq!(store.get(other).unwrap().text, "other");
        assert!(store.edit_session().is_none());
        assert_eq!(stored(&store)[0].text, "final");
    }

    #[test]
    fn test_commit_blank_draft_stays_editing() {
        let mut store = store();
        let id = store.add_task("keep me").unwrap();
        let task = store.get(id).unwrap().clone();
        let writes = store.slot().writes();

        store.begin_edit(&task);
        store.update_draft("   ");
        assert!(!store.commit_edit());

        assert!(store.is_editing());
        assert_eq!(store.get(id).unwrap().text, "keep me");
        assert_eq!(store.slot().writes(), writes);
    }

    #[test]
    fn test_commit_without_session_is_noop() {
        let mut store = store();
        store.add_task("a");
        assert!(!store.commit_edit());
        assert!(!store.update_draft("x"));
    }

    #[test]
    fn test_begin_edit_replaces_previous_session() {
        let mut store = store();
        let a = store.add_task("A").unwrap();
        let b = store.add_task("B").unwrap();
        let task_a = store.get(a).unwrap().clone();
        let task_b = store.get(b).unwrap().clone();

        store.begin_edit(&task_a);
        store.update_draft("changed A");
        store.begin_edit(&task_b);

        let edit = store.edit_session().unwrap();
        assert_eq!(edit.target_id, b);
        assert_eq!(edit.draft_text, "B");
    }

    #[test]
    fn test_commit_for_missing_target_closes_session() {
        let mut store = store();
        let ghost = Task::new(99, "not in list");
        store.begin_edit(&ghost);

        assert!(!store.commit_edit());
        assert!(store.edit_session().is_none());
        assert_eq!(store.slot().writes(), 0);
    }

    #[test]
    fn test_set_filter() {
        let mut store = store();
        store.set_filter("completed").unwrap();
        assert_eq!(store.filter(), FilterMode::Completed);

        let err = store.set_filter("finished").unwrap_err();
        assert_eq!(err, StoreError::InvalidFilterMode("finished".to_string()));
        assert_eq!(store.filter(), FilterMode::Completed);
    }

    #[test]
    fn test_filter_partition() {
        let mut store = store();
        let ids: Vec<_> = (0..6).map(|i| store.add_task(&format!("t{}", i)).unwrap()).collect();
        store.toggle_completion(ids[1]);
        store.toggle_completion(ids[4]);
        store.toggle_completion(ids[5]);

        store.set_filter_mode(FilterMode::Completed);
        let completed = store.visible_tasks();
        store.set_filter_mode(FilterMode::Pending);
        let pending = store.visible_tasks();
        store.set_filter_mode(FilterMode::All);
        let all = store.visible_tasks();

        assert_eq!(all, store.tasks());
        for task in &all {
            assert!(completed.contains(task) ^ pending.contains(task));
        }
        assert_eq!(
            completed.iter().map(|t| t.id).collect::<Vec<_>>(),
            [ids[1], ids[4], ids[5]]
        );
        assert_eq!(
            pending.iter().map(|t| t.id).collect::<Vec<_>>(),
            [ids[0], ids[2], ids[3]]
        );
    }

    #[test]
    fn test_visible_tasks_is_a_snapshot() {
        let mut store = store();
        let id = store.add_task("a").unwrap();
        let view = store.visible_tasks();

        store.toggle_completion(id);
        assert!(!view[0].completed);
        assert!(store.visible_tasks()[0].completed);
    }

    #[test]
    fn test_counts() {
        let mut store = store();
        let a = store.add_task("a").unwrap();
        store.add_task("b");
        store.add_task("c");
        store.toggle_completion(a);

        assert_eq!(
            store.counts(),
            TaskCounts {
                total: 3,
                completed: 1,
                pending: 2,
            }
        );
    }

    #[test]
    fn test_buy_milk_scenario() {
        let mut store = store();
        let x = store.add_task("buy milk").unwrap();
        assert_eq!(store.tasks(), &[Task::new(x, "buy milk")]);

        store.toggle_completion(x);

        store.set_filter("completed").unwrap();
        assert_eq!(
            store.visible_tasks(),
            vec![Task {
                id: x,
                text: "buy milk".to_string(),
                completed: true,
            }]
        );

        store.set_filter("pending").unwrap();
        assert!(store.visible_tasks().is_empty());
    }

    #[test]
    fn test_write_failure_keeps_memory_state() {
        let mut store = store();
        store.add_task("saved");
        store.slot_mut().set_fail_writes(true);

        let id = store.add_task("unsaved").unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(id).unwrap().text, "unsaved");
        assert!(!store.is_synced());
        assert!(matches!(
            store.last_persist_error(),
            Some(StoreError::PersistenceWriteFailure { .. })
        ));
        assert_eq!(stored(&store).len(), 1);

        // Next successful write catches the slot up and clears the error
        store.slot_mut().set_fail_writes(false);
        store.toggle_completion(id);
        assert!(store.is_synced());
        assert_eq!(stored(&store).len(), 2);
    }

    #[test]
    fn test_reopen_sees_same_list() {
        let mut store = store();
        let a = store.add_task("A").unwrap();
        store.add_task("B");
        store.toggle_completion(a);
        let before = store.tasks().to_vec();

        let reopened = TaskListStore::open(store.into_slot());
        assert_eq!(reopened.tasks(), before.as_slice());
        assert_eq!(reopened.filter(), FilterMode::All);
        assert!(reopened.edit_session().is_none());
    }

    #[test]
    fn test_restart_with_sqlite_slot() {
        let temp = TempDir::new().unwrap();

        let (a, b) = {
            let mut store = TaskListStore::open(SqliteSlot::open(temp.path()).unwrap());
            let a = store.add_task("persisted A").unwrap();
            let b = store.add_task("persisted B").unwrap();
            store.toggle_completion(b);
            (a, b)
        };

        let mut store = TaskListStore::open(SqliteSlot::open(temp.path()).unwrap());
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(a).unwrap().text, "persisted A");
        assert!(store.get(b).unwrap().completed);

        let c = store.add_task("after restart").unwrap();
        assert!(c > b);
    }
}
