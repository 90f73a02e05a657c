// Terminal rendering of the task list

use crate::models::{Priority, Task};
use chrono::{DateTime, Local};
use colored::{ColoredString, Colorize};

/// Light or dark palette, picked from the theme flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub dark: bool,
}

impl Theme {
    pub fn new(dark: bool) -> Self {
        Self { dark }
    }

    pub fn name(self) -> &'static str {
        if self.dark { "dark" } else { "light" }
    }

    fn priority(self, priority: Priority) -> ColoredString {
        let padded = format!("{:<6}", priority.label());
        let label = padded.as_str();
        match (priority, self.dark) {
            (Priority::High, true) => label.bright_red().bold(),
            (Priority::High, false) => label.red().bold(),
            (Priority::Medium, true) => label.bright_yellow(),
            (Priority::Medium, false) => label.yellow(),
            (Priority::Low, true) => label.bright_cyan(),
            (Priority::Low, false) => label.blue(),
        }
    }

    fn name_text(self, task: &Task) -> ColoredString {
        if task.done {
            task.name.as_str().dimmed().strikethrough()
        } else if self.dark {
            task.name.as_str().bright_white()
        } else {
            task.name.as_str().normal()
        }
    }
}

/// Format a millisecond timestamp in local time
pub fn format_created_at(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// One line per task: id, checkbox, priority, name, creation time
pub fn render_task(task: &Task, theme: Theme) -> String {
    let id = task.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
    let check = if task.done { "[x]" } else { "[ ]" };
    format!(
        "{:>4} {} {} {}  {}",
        id,
        check,
        theme.priority(task.priority),
        theme.name_text(task),
        format_created_at(task.created_at).as_str().dimmed()
    )
}

pub fn render_list(tasks: &[Task], theme: Theme) -> String {
    if tasks.is_empty() {
        return "No tasks".dimmed().to_string();
    }

    let mut out = String::new();
    for task in tasks {
        out.push_str(&render_task(task, theme));
        out.push('\n');
    }
    let done = tasks.iter().filter(|t| t.done).count();
    out.push_str(&format!("{} tasks, {} done", tasks.len(), done).as_str().dimmed().to_string());
    out
}
