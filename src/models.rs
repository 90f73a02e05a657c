// Data models for todostore

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Task priority. The integer values are the persisted representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Priority {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl TryFrom<i64> for Priority {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::Low),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::High),
            other => Err(format!("invalid priority value: {} (expected 1, 2 or 3)", other)),
        }
    }
}

impl From<Priority> for i64 {
    fn from(priority: Priority) -> Self {
        priority.as_i64()
    }
}

impl FromStr for Priority {
    type Err = String;

    /// Accepts names, initials or the numeric encoding, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "l" | "1" => Ok(Priority::Low),
            "medium" | "med" | "m" | "2" => Ok(Priority::Medium),
            "high" | "h" | "3" => Ok(Priority::High),
            other => Err(format!("unknown priority: {:?} (expected low, medium or high)", other)),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl ToSql for Priority {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_i64()))
    }
}

impl FromSql for Priority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = i64::column_result(value)?;
        Priority::try_from(raw).map_err(|_| FromSqlError::OutOfRange(raw))
    }
}

/// A single to-do item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Assigned by the store on create; `None` until then
    pub id: Option<i64>,
    pub name: String,
    pub done: bool,
    pub priority: Priority,
    /// Milliseconds since epoch, fixed when the task is constructed
    pub created_at: i64,
}

impl Task {
    /// Build an unpersisted task stamped with the current time
    pub fn new(name: impl Into<String>, priority: Priority) -> Self {
        Self::at(name, priority, now_ms())
    }

    /// Build an unpersisted task with an explicit creation time
    pub fn at(name: impl Into<String>, priority: Priority, created_at: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            done: false,
            priority,
            created_at,
        }
    }
}

/// Canonical list order: priority descending, then oldest first, then by id.
///
/// Unpersisted tasks (no id) sort after persisted ones on a full tie.
pub fn compare(a: &Task, b: &Task) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then(a.created_at.cmp(&b.created_at))
        .then_with(|| match (a.id, b.id) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// Sort a snapshot in place into the same order the store lists in
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(compare);
}

/// Helper function to get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
