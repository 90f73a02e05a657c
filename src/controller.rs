// Task list controller: turns user intents into store calls and keeps a display cache

use crate::models::{Priority, Task};
use crate::prefs::Preferences;
use crate::store::TaskRepository;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

/// Failures surfaced to the user
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Input rejected before reaching the store
    #[error("{0}")]
    Validation(String),

    /// The store failed; the cached list is unchanged
    #[error("{0:#}")]
    Store(eyre::Report),

    /// Reading or writing preferences failed
    #[error("{0:#}")]
    Preferences(eyre::Report),
}

/// New values for a task, as supplied by an edit dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditIntent {
    pub name: String,
    pub priority: Priority,
}

/// Where interactive answers come from (dialogs, prompts, scripts)
///
/// Each method either produces the user's answer or signals a cancel.
pub trait IntentSource {
    /// Ask for a new name and priority for `task`; `None` cancels
    fn edit_task(&mut self, task: &Task) -> Option<EditIntent>;

    /// Ask the user to confirm deleting all `count` tasks
    fn confirm_delete_all(&mut self, count: usize) -> bool;
}

/// Holds the injected store, the cached list and the theme flag
pub struct TaskListController<R: TaskRepository> {
    repo: R,
    tasks: Vec<Task>,
    dark_mode: bool,
    prefs_path: Option<PathBuf>,
    notice: Option<String>,
}

impl<R: TaskRepository> TaskListController<R> {
    /// Controller with no persisted preferences; starts in light mode
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            tasks: Vec::new(),
            dark_mode: false,
            prefs_path: None,
            notice: None,
        }
    }

    /// Controller whose theme flag is loaded from, and saved to, `prefs_path`
    ///
    /// An unreadable preferences file falls back to light mode and leaves a notice;
    /// the next theme change overwrites it.
    pub fn with_preferences(repo: R, prefs_path: PathBuf) -> Self {
        let mut controller = Self::new(repo);
        match Preferences::load(&prefs_path) {
            Ok(prefs) => controller.dark_mode = prefs.is_dark_mode,
            Err(e) => {
                warn!(path = ?prefs_path, error = %format!("{:#}", e), "Ignoring unreadable preferences");
                controller.notice = Some(format!("{:#}; using default theme", e));
            }
        }
        controller.prefs_path = Some(prefs_path);
        controller
    }

    /// The cached list, in canonical order as of the last successful refresh
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Give the store back, e.g. to close it
    pub fn into_repository(self) -> R {
        self.repo
    }

    /// Take the pending failure notification, if any
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Re-read the list from the store
    ///
    /// On failure the previous cache is kept.
    pub fn refresh(&mut self) -> Result<(), ControllerError> {
        match self.repo.list() {
            Ok(tasks) => {
                debug!(count = tasks.len(), "Refreshed task list");
                self.tasks = tasks;
                Ok(())
            }
            Err(e) => Err(self.store_failure(e)),
        }
    }

    /// Create a task from user input
    pub fn add(&mut self, name: &str, priority: Priority) -> Result<Task, ControllerError> {
        let name = validate_name(name)?;

        let created = self
            .repo
            .create(Task::new(name, priority))
            .map_err(|e| self.store_failure(e))?;

        self.refresh()?;
        Ok(created)
    }

    /// Flip the completion flag of `task`
    pub fn toggle_done(&mut self, task: &Task) -> Result<Task, ControllerError> {
        let mut updated = task.clone();
        updated.done = !updated.done;

        self.repo.update(&updated).map_err(|e| self.store_failure(e))?;

        self.refresh()?;
        Ok(updated)
    }

    /// Rename and re-prioritise `task`
    pub fn edit(&mut self, task: &Task, new_name: &str, new_priority: Priority) -> Result<Task, ControllerError> {
        let name = validate_name(new_name)?;

        let mut updated = task.clone();
        updated.name = name.to_string();
        updated.priority = new_priority;

        self.repo.update(&updated).map_err(|e| self.store_failure(e))?;

        self.refresh()?;
        Ok(updated)
    }

    /// Ask `intents` for new values and apply them; `Ok(None)` when cancelled
    pub fn edit_interactive(
        &mut self,
        task: &Task,
        intents: &mut impl IntentSource,
    ) -> Result<Option<Task>, ControllerError> {
        match intents.edit_task(task) {
            Some(intent) => self.edit(task, &intent.name, intent.priority).map(Some),
            None => {
                debug!(id = ?task.id, "Edit cancelled");
                Ok(None)
            }
        }
    }

    /// Delete `task`; unpersisted tasks never reach the store
    pub fn remove(&mut self, task: &Task) -> Result<usize, ControllerError> {
        let removed = match task.id {
            Some(id) => self.repo.delete(id).map_err(|e| self.store_failure(e))?,
            None => 0,
        };

        self.refresh()?;
        Ok(removed)
    }

    /// Delete every task after confirmation; `Ok(false)` when cancelled
    pub fn remove_all(&mut self, intents: &mut impl IntentSource) -> Result<bool, ControllerError> {
        if !intents.confirm_delete_all(self.tasks.len()) {
            debug!("Delete all cancelled");
            return Ok(false);
        }

        self.repo.delete_all().map_err(|e| self.store_failure(e))?;

        self.refresh()?;
        Ok(true)
    }

    /// Create fresh copies of `tasks`, keeping their flags and creation times
    ///
    /// Tasks with blank names are skipped. Returns the number created.
    pub fn import(&mut self, tasks: Vec<Task>) -> Result<usize, ControllerError> {
        let mut created = 0;
        for task in tasks {
            if task.name.trim().is_empty() {
                warn!(id = ?task.id, "Skipping task with empty name");
                continue;
            }
            self.repo
                .create(Task { id: None, ..task })
                .map_err(|e| self.store_failure(e))?;
            created += 1;
        }

        self.refresh()?;
        Ok(created)
    }

    pub fn is_dark_mode(&self) -> bool {
        self.dark_mode
    }

    /// Set the theme flag, persisting it when preferences are attached
    pub fn set_dark_mode(&mut self, dark: bool) -> Result<(), ControllerError> {
        if let Some(path) = &self.prefs_path {
            Preferences { is_dark_mode: dark }
                .save(path)
                .map_err(ControllerError::Preferences)?;
        }
        self.dark_mode = dark;
        Ok(())
    }

    pub fn toggle_theme(&mut self) -> Result<bool, ControllerError> {
        let dark = !self.dark_mode;
        self.set_dark_mode(dark)?;
        Ok(dark)
    }

    fn store_failure(&mut self, e: eyre::Report) -> ControllerError {
        warn!(error = %format!("{:#}", e), "Store operation failed");
        self.notice = Some(format!("{:#}", e));
        ControllerError::Store(e)
    }
}

fn validate_name(name: &str) -> Result<&str, ControllerError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ControllerError::Validation("Task name cannot be empty".to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TaskStore;
    use eyre::{Result, eyre};
    use std::collections::VecDeque;
    use tempfile::TempDir;

    /// Store wrapper that can be told to fail reads or writes
    struct FlakyStore {
        inner: TaskStore,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: TaskStore::open_in_memory().unwrap(),
                fail_reads: false,
                fail_writes: false,
            }
        }

        fn write_guard(&self) -> Result<()> {
            if self.fail_writes {
                return Err(eyre!("disk unavailable"));
            }
            Ok(())
        }
    }

    impl TaskRepository for FlakyStore {
        fn create(&mut self, task: Task) -> Result<Task> {
            self.write_guard()?;
            self.inner.create(task)
        }

        fn list(&self) -> Result<Vec<Task>> {
            if self.fail_reads {
                return Err(eyre!("disk unavailable"));
            }
            self.inner.list()
        }

        fn update(&mut self, task: &Task) -> Result<usize> {
            self.write_guard()?;
            self.inner.update(task)
        }

        fn delete(&mut self, id: i64) -> Result<usize> {
            self.write_guard()?;
            self.inner.delete(id)
        }

        fn delete_all(&mut self) -> Result<usize> {
            self.write_guard()?;
            self.inner.delete_all()
        }
    }

    #[derive(Default)]
    struct ScriptedIntents {
        edits: VecDeque<Option<EditIntent>>,
        confirms: VecDeque<bool>,
    }

    impl IntentSource for ScriptedIntents {
        fn edit_task(&mut self, _task: &Task) -> Option<EditIntent> {
            self.edits.pop_front().flatten()
        }

        fn confirm_delete_all(&mut self, _count: usize) -> bool {
            self.confirms.pop_front().unwrap_or(false)
        }
    }

    fn controller() -> TaskListController<TaskStore> {
        TaskListController::new(TaskStore::open_in_memory().unwrap())
    }

    #[test]
    fn test_add_refreshes_cache() {
        let mut ctl = controller();
        let task = ctl.add("  Buy milk ", Priority::High).unwrap();

        assert!(task.id.is_some());
        assert_eq!(task.name, "Buy milk");
        assert!(!task.done);
        assert_eq!(ctl.tasks(), &[task]);
    }

    #[test]
    fn test_add_rejects_blank_name() {
        let mut ctl = controller();
        ctl.add("keep", Priority::Low).unwrap();

        let err = ctl.add("   ", Priority::High).unwrap_err();
        assert!(matches!(err, ControllerError::Validation(_)));
        assert_eq!(ctl.repository().count().unwrap(), 1);
        assert_eq!(ctl.tasks().len(), 1);
        assert!(ctl.take_notice().is_none());
    }

    #[test]
    fn test_cache_follows_store_order() {
        let mut ctl = controller();
        ctl.add("low", Priority::Low).unwrap();
        ctl.add("high", Priority::High).unwrap();
        ctl.add("medium", Priority::Medium).unwrap();

        let names: Vec<&str> = ctl.tasks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["high", "medium", "low"]);
    }

    #[test]
    fn test_toggle_done() {
        let mut ctl = controller();
        let task = ctl.add("toggle me", Priority::Medium).unwrap();

        let done = ctl.toggle_done(&task).unwrap();
        assert!(done.done);
        assert!(ctl.tasks()[0].done);

        let undone = ctl.toggle_done(&done).unwrap();
        assert!(!undone.done);
        assert!(!ctl.tasks()[0].done);
    }

    #[test]
    fn test_edit_keeps_id_and_created_at() {
        let mut ctl = controller();
        let task = ctl.add("draft", Priority::Low).unwrap();

        let edited = ctl.edit(&task, "final", Priority::High).unwrap();
        assert_eq!(edited.id, task.id);
        assert_eq!(edited.created_at, task.created_at);
        assert_eq!(ctl.tasks(), &[edited]);
    }

    #[test]
    fn test_edit_rejects_blank_name() {
        let mut ctl = controller();
        let task = ctl.add("draft", Priority::Low).unwrap();

        assert!(matches!(
            ctl.edit(&task, "", Priority::High),
            Err(ControllerError::Validation(_))
        ));
        assert_eq!(ctl.tasks(), &[task]);
    }

    #[test]
    fn test_edit_interactive_accept_and_cancel() {
        let mut ctl = controller();
        let task = ctl.add("draft", Priority::Low).unwrap();

        let mut intents = ScriptedIntents::default();
        intents.edits.push_back(None);
        intents.edits.push_back(Some(EditIntent {
            name: "renamed".to_string(),
            priority: Priority::High,
        }));

        assert_eq!(ctl.edit_interactive(&task, &mut intents).unwrap(), None);
        assert_eq!(ctl.tasks()[0].name, "draft");

        let edited = ctl.edit_interactive(&task, &mut intents).unwrap().unwrap();
        assert_eq!(edited.name, "renamed");
        assert_eq!(ctl.tasks()[0].priority, Priority::High);
    }

    #[test]
    fn test_remove() {
        let mut ctl = controller();
        let task = ctl.add("gone soon", Priority::Low).unwrap();

        assert_eq!(ctl.remove(&task).unwrap(), 1);
        assert!(ctl.tasks().is_empty());
        assert_eq!(ctl.remove(&task).unwrap(), 0);
    }

    #[test]
    fn test_remove_unpersisted_is_noop() {
        let mut ctl = controller();
        ctl.add("stays", Priority::Low).unwrap();

        assert_eq!(ctl.remove(&Task::new("never saved", Priority::Low)).unwrap(), 0);
        assert_eq!(ctl.tasks().len(), 1);
    }

    #[test]
    fn test_remove_all_requires_confirmation() {
        let mut ctl = controller();
        ctl.add("a", Priority::Low).unwrap();
        ctl.add("b", Priority::High).unwrap();

        let mut intents = ScriptedIntents::default();
        intents.confirms.push_back(false);
        intents.confirms.push_back(true);

        assert!(!ctl.remove_all(&mut intents).unwrap());
        assert_eq!(ctl.repository().count().unwrap(), 2);

        assert!(ctl.remove_all(&mut intents).unwrap());
        assert_eq!(ctl.repository().count().unwrap(), 0);
        assert!(ctl.tasks().is_empty());
    }

    #[test]
    fn test_refresh_failure_keeps_cache_and_records_notice() {
        let mut ctl = TaskListController::new(FlakyStore::new());
        ctl.add("cached", Priority::Medium).unwrap();

        ctl.repo.fail_reads = true;
        let err = ctl.refresh().unwrap_err();
        assert!(matches!(err, ControllerError::Store(_)));
        assert_eq!(ctl.tasks().len(), 1);
        assert_eq!(ctl.tasks()[0].name, "cached");

        let notice = ctl.take_notice().unwrap();
        assert!(notice.contains("disk unavailable"));
        assert!(ctl.take_notice().is_none());
    }

    #[test]
    fn test_write_failure_leaves_cache() {
        let mut ctl = TaskListController::new(FlakyStore::new());
        let task = ctl.add("cached", Priority::Medium).unwrap();

        ctl.repo.fail_writes = true;
        assert!(matches!(ctl.add("new", Priority::High), Err(ControllerError::Store(_))));
        assert!(matches!(ctl.toggle_done(&task), Err(ControllerError::Store(_))));
        assert_eq!(ctl.tasks(), &[task]);
        assert!(ctl.take_notice().is_some());
    }

    #[test]
    fn test_import_reassigns_ids() {
        let mut ctl = controller();
        let existing = ctl.add("existing", Priority::Low).unwrap();

        let mut incoming = Task::at("imported", Priority::High, 5);
        incoming.id = existing.id;
        incoming.done = true;
        let blank = Task::at("  ", Priority::High, 6);

        assert_eq!(ctl.import(vec![incoming, blank]).unwrap(), 1);
        assert_eq!(ctl.tasks().len(), 2);

        let imported = &ctl.tasks()[0];
        assert_eq!(imported.name, "imported");
        assert_ne!(imported.id, existing.id);
        assert!(imported.done);
        assert_eq!(imported.created_at, 5);
    }

    #[test]
    fn test_theme_without_preferences() {
        let mut ctl = controller();
        assert!(!ctl.is_dark_mode());
        assert!(ctl.toggle_theme().unwrap());
        assert!(ctl.is_dark_mode());
    }

    #[test]
    fn test_theme_persists_across_controllers() {
        let temp = TempDir::new().unwrap();
        let prefs_path = temp.path().join("prefs.yaml");

        let mut ctl = TaskListController::with_preferences(TaskStore::open_in_memory().unwrap(), prefs_path.clone());
        assert!(!ctl.is_dark_mode());
        ctl.toggle_theme().unwrap();

        let ctl = TaskListController::with_preferences(TaskStore::open_in_memory().unwrap(), prefs_path);
        assert!(ctl.is_dark_mode());
    }

    #[test]
    fn test_corrupt_preferences_fall_back_to_light() {
        let temp = TempDir::new().unwrap();
        let prefs_path = temp.path().join("prefs.yaml");
        std::fs::write(&prefs_path, "bad: [\n").unwrap();

        let mut ctl = TaskListController::with_preferences(TaskStore::open_in_memory().unwrap(), prefs_path.clone());
        assert!(!ctl.is_dark_mode());
        assert!(ctl.take_notice().unwrap().contains("default theme"));

        ctl.add("still works", Priority::Low).unwrap();
        assert_eq!(ctl.tasks().len(), 1);

        assert!(ctl.toggle_theme().unwrap());
        assert!(Preferences::load(&prefs_path).unwrap().is_dark_mode);
    }
}
