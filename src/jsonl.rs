// JSONL backup files

use crate::models::Task;
use eyre::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// Write tasks to a JSONL file, one task per line, replacing any previous content
pub fn export_jsonl(path: &Path, tasks: &[Task]) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .context("Failed to open JSONL file for writing")?;

    // Acquire exclusive lock before truncating
    file.lock_exclusive().context("Failed to acquire file lock")?;
    file.set_len(0)?;

    let mut writer = BufWriter::new(&file);
    for task in tasks {
        let json = serde_json::to_string(task)?;
        writeln!(writer, "{}", json)?;
    }
    writer.flush()?;
    drop(writer);
    file.sync_all()?; // Ensure data is flushed to disk

    info!(file = ?path, count = tasks.len(), "Exported tasks to JSONL");
    Ok(())
}

/// Read tasks from a JSONL file in file order
///
/// Blank lines are ignored and malformed lines are skipped with a warning.
/// A missing file reads as empty.
pub fn read_jsonl(path: &Path) -> Result<Vec<Task>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path).context("Failed to open JSONL file")?;
    let reader = BufReader::new(file);
    let mut tasks = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to read line, skipping"
                );
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Task>(&line) {
            Ok(task) => tasks.push(task),
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to parse task, skipping"
                );
            }
        }
    }

    info!(file = ?path, count = tasks.len(), "Loaded tasks from JSONL");
    Ok(tasks)
}
