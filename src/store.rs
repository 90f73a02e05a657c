// Task store backed by a single SQLite connection

use crate::models::Task;
use eyre::{Context, Result, eyre};
use rusqlite::{Connection, OptionalExtension, Row};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CURRENT_VERSION: u32 = 1;

/// Directory created under the store path
pub const STORE_DIR: &str = ".todostore";
const DB_FILE: &str = "todostore.db";

const SELECT_COLUMNS: &str = "SELECT id, name, done, priority, created_at FROM tasks";

/// Operations the controller needs from a task store
pub trait TaskRepository {
    /// Persist a new task and return it with its assigned id
    fn create(&mut self, task: Task) -> Result<Task>;

    /// All tasks in canonical order
    fn list(&self) -> Result<Vec<Task>>;

    /// Overwrite the stored record with the same id; returns rows affected
    fn update(&mut self, task: &Task) -> Result<usize>;

    /// Remove one task; returns rows affected
    fn delete(&mut self, id: i64) -> Result<usize>;

    /// Remove every task; returns rows affected
    fn delete_all(&mut self) -> Result<usize>;
}

/// Durable task collection in an embedded SQLite database
pub struct TaskStore {
    base_path: Option<PathBuf>,
    db: Connection,
}

impl TaskStore {
    /// Open or create a store at the given path
    ///
    /// The store will be created in a `.todostore` subdirectory of the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().join(STORE_DIR);

        fs::create_dir_all(&base_path).context("Failed to create store directory")?;

        let db_path = base_path.join(DB_FILE);
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;

        let store = Self {
            base_path: Some(base_path),
            db,
        };

        store.check_version()?;
        store.create_schema()?;
        store.create_gitignore()?;

        info!(path = ?db_path, "Opened task store");
        Ok(store)
    }

    /// Open a store that lives only as long as this value
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let store = Self { base_path: None, db };
        store.create_schema()?;
        Ok(store)
    }

    /// Close the underlying connection, reporting any failure
    pub fn close(self) -> Result<()> {
        self.db
            .close()
            .map_err(|(_, e)| e)
            .context("Failed to close SQLite database")?;
        debug!("Closed task store");
        Ok(())
    }

    /// Get the directory holding the database, if the store is on disk
    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating database schema");

        self.db
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                done INTEGER NOT NULL DEFAULT 0 CHECK (done IN (0, 1)),
                priority INTEGER NOT NULL CHECK (priority BETWEEN 1 AND 3),
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_order ON tasks(priority DESC, created_at ASC);
            "#,
            )
            .context("Failed to create schema")?;

        Ok(())
    }

    fn create_gitignore(&self) -> Result<()> {
        let Some(base_path) = &self.base_path else {
            return Ok(());
        };
        let gitignore_path = base_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(gitignore_path, "todostore.db\ntodostore.db-shm\ntodostore.db-wal\n")?;
        }
        Ok(())
    }

    /// Write the version file, or refuse a store written by another schema version
    fn check_version(&self) -> Result<()> {
        let Some(base_path) = &self.base_path else {
            return Ok(());
        };
        let version_path = base_path.join(".version");
        if !version_path.exists() {
            return Self::write_version(&version_path);
        }

        let raw = fs::read_to_string(&version_path).context("Failed to read store version")?;
        if raw.trim().is_empty() {
            warn!(path = ?version_path, "Empty version file, rewriting");
            return Self::write_version(&version_path);
        }
        let version: u32 = raw
            .trim()
            .parse()
            .map_err(|_| eyre!("Invalid store version file: {:?}", raw.trim()))?;
        if version != CURRENT_VERSION {
            return Err(eyre!(
                "Unsupported store version {} (expected {})",
                version,
                CURRENT_VERSION
            ));
        }
        Ok(())
    }

    /// Write the version to a temp file and rename it into place
    fn write_version(version_path: &Path) -> Result<()> {
        let tmp_path = version_path.with_extension("tmp");
        fs::write(&tmp_path, CURRENT_VERSION.to_string()).context("Failed to write store version")?;
        fs::rename(&tmp_path, version_path).context("Failed to write store version")?;
        Ok(())
    }

    fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
        Ok(Task {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            done: row.get(2)?,
            priority: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    // ========================================================================
    // CRUD API
    // ========================================================================

    /// Create a new task, assigning it a fresh id
    pub fn create(&mut self, task: Task) -> Result<Task> {
        if let Some(id) = task.id {
            warn!(id, "create called with an id already set, assigning a new one");
        }

        self.db
            .execute(
                "INSERT INTO tasks (name, done, priority, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![task.name, task.done, task.priority, task.created_at],
            )
            .context("Failed to insert task")?;

        let id = self.db.last_insert_rowid();
        debug!(id, priority = %task.priority, "Created task");

        Ok(Task { id: Some(id), ..task })
    }

    /// Get a task by id
    pub fn get(&self, id: i64) -> Result<Option<Task>> {
        let mut stmt = self.db.prepare(&format!("{} WHERE id = ?1", SELECT_COLUMNS))?;

        let task = stmt
            .query_row([id], Self::row_to_task)
            .optional()
            .context("Failed to load task")?;

        Ok(task)
    }

    /// List all tasks: highest priority first, then oldest first
    pub fn list(&self) -> Result<Vec<Task>> {
        let mut stmt = self.db.prepare(&format!(
            "{} ORDER BY priority DESC, created_at ASC, id ASC",
            SELECT_COLUMNS
        ))?;

        let rows = stmt.query_map([], Self::row_to_task)?;

        let mut results = Vec::new();
        for row_result in rows {
            results.push(row_result.context("Failed to read task row")?);
        }
        Ok(results)
    }

    /// Overwrite every field of the stored task with the same id
    ///
    /// Returns the number of rows changed; an unknown or missing id changes nothing.
    pub fn update(&mut self, task: &Task) -> Result<usize> {
        let Some(id) = task.id else {
            debug!("update called on an unpersisted task");
            return Ok(0);
        };

        let changed = self
            .db
            .execute(
                "UPDATE tasks SET name = ?1, done = ?2, priority = ?3, created_at = ?4 WHERE id = ?5",
                rusqlite::params![task.name, task.done, task.priority, task.created_at, id],
            )
            .context("Failed to update task")?;

        debug!(id, changed, "Updated task");
        Ok(changed)
    }

    /// Delete a task by id
    pub fn delete(&mut self, id: i64) -> Result<usize> {
        let changed = self
            .db
            .execute("DELETE FROM tasks WHERE id = ?1", [id])
            .context("Failed to delete task")?;

        debug!(id, changed, "Deleted task");
        Ok(changed)
    }

    /// Delete every task
    pub fn delete_all(&mut self) -> Result<usize> {
        let changed = self
            .db
            .execute("DELETE FROM tasks", [])
            .context("Failed to delete all tasks")?;

        info!(count = changed, "Deleted all tasks");
        Ok(changed)
    }

    /// Number of stored tasks
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .db
            .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))
            .context("Failed to count tasks")?;
        Ok(count as usize)
    }
}

impl TaskRepository for TaskStore {
    fn create(&mut self, task: Task) -> Result<Task> {
        TaskStore::create(self, task)
    }

    fn list(&self) -> Result<Vec<Task>> {
        TaskStore::list(self)
    }

    fn update(&mut self, task: &Task) -> Result<usize> {
        TaskStore::update(self, task)
    }

    fn delete(&mut self, id: i64) -> Result<usize> {
        TaskStore::delete(self, id)
    }

    fn delete_all(&mut self) -> Result<usize> {
        TaskStore::delete_all(self)
    }
}
