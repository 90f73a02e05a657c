// todostore - Local task list with SQLite persistence

pub mod controller;
pub mod jsonl;
pub mod models;
pub mod prefs;
pub mod render;
pub mod store;

// Re-export main types for convenience
pub use controller::{ControllerError, EditIntent, IntentSource, TaskListController};
pub use models::{Priority, Task, compare, now_ms, sort_tasks};
pub use prefs::Preferences;
pub use store::{STORE_DIR, TaskRepository, TaskStore};
