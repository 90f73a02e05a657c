use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use eyre::Result;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use todostore::render::{Theme, render_list};
use todostore::{
    ControllerError, EditIntent, IntentSource, Preferences, Priority, STORE_DIR, Task, TaskListController, TaskStore,
    jsonl,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "todo")]
#[command(about = "Local task list with priorities, stored in SQLite")]
#[command(version)]
struct Cli {
    /// Directory holding the task store (default: platform data directory)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add {
        /// Task name (words are joined with spaces)
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,

        /// low, medium or high
        #[arg(short, long, default_value_t = Priority::default())]
        priority: Priority,
    },

    /// Show all tasks (default)
    List,

    /// Toggle a task between done and not done
    Done { id: i64 },

    /// Change a task's name or priority (prompts when neither is given)
    Edit {
        id: i64,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        priority: Option<Priority>,
    },

    /// Delete a task
    Rm { id: i64 },

    /// Delete all tasks
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show or change the color theme
    Theme { mode: Option<ThemeMode> },

    /// Write all tasks to a JSONL file
    Export { file: PathBuf },

    /// Add tasks from a JSONL file
    Import { file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum ThemeMode {
    Dark,
    Light,
    Toggle,
}

/// Answers edit and confirmation prompts from a line-based terminal
struct TerminalIntents<R, W> {
    input: R,
    output: W,
}

impl TerminalIntents<io::StdinLock<'static>, io::Stdout> {
    fn stdio() -> Self {
        Self {
            input: io::stdin().lock(),
            output: io::stdout(),
        }
    }
}

impl<R: BufRead, W: Write> TerminalIntents<R, W> {
    /// Print `prompt` and read one trimmed line; `None` at end of input
    fn ask(&mut self, prompt: &str) -> Option<String> {
        write!(self.output, "{}", prompt).ok()?;
        self.output.flush().ok()?;

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl<R: BufRead, W: Write> IntentSource for TerminalIntents<R, W> {
    fn edit_task(&mut self, task: &Task) -> Option<EditIntent> {
        let name = self.ask(&format!("Name [{}]: ", task.name))?;
        let name = if name.is_empty() { task.name.clone() } else { name };

        // Re-prompt until the priority parses or input ends
        let priority = loop {
            let answer = self.ask(&format!("Priority (low/medium/high) [{}]: ", task.priority))?;
            if answer.is_empty() {
                break task.priority;
            }
            match answer.parse() {
                Ok(p) => break p,
                Err(e) => {
                    writeln!(self.output, "{} {}", "invalid:".yellow(), e).ok()?;
                }
            }
        };

        Some(EditIntent { name, priority })
    }

    fn confirm_delete_all(&mut self, count: usize) -> bool {
        matches!(
            self.ask(&format!("Delete all {} tasks? [y/N]: ", count)).as_deref(),
            Some("y" | "Y" | "yes" | "YES")
        )
    }
}

/// Confirms without asking, for `clear --yes`
struct AssumeYes;

impl IntentSource for AssumeYes {
    fn edit_task(&mut self, _task: &Task) -> Option<EditIntent> {
        None
    }

    fn confirm_delete_all(&mut self, _count: usize) -> bool {
        true
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("todostore"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn lookup(ctl: &TaskListController<TaskStore>, id: i64) -> Result<Task, ControllerError> {
    ctl.repository()
        .get(id)
        .map_err(ControllerError::Store)?
        .ok_or_else(|| ControllerError::Validation(format!("No task with id {}", id)))
}

fn execute(ctl: &mut TaskListController<TaskStore>, command: Commands) -> Result<(), ControllerError> {
    match command {
        Commands::Add { name, priority } => {
            let task = ctl.add(&name.join(" "), priority)?;
            if let Some(id) = task.id {
                println!("Added task {}", id);
            }
        }
        Commands::List => {}
        Commands::Done { id } => {
            let task = lookup(ctl, id)?;
            let task = ctl.toggle_done(&task)?;
            println!("Task {} marked {}", id, if task.done { "done" } else { "not done" });
        }
        Commands::Edit { id, name, priority } => {
            let task = lookup(ctl, id)?;
            if name.is_none() && priority.is_none() {
                if ctl.edit_interactive(&task, &mut TerminalIntents::stdio())?.is_none() {
                    println!("Edit cancelled");
                    return Ok(());
                }
            } else {
                let name = name.unwrap_or_else(|| task.name.clone());
                ctl.edit(&task, &name, priority.unwrap_or(task.priority))?;
            }
            println!("Task {} updated", id);
        }
        Commands::Rm { id } => {
            let task = lookup(ctl, id)?;
            ctl.remove(&task)?;
            println!("Task {} deleted", id);
        }
        Commands::Clear { yes } => {
            let cleared = if yes {
                ctl.remove_all(&mut AssumeYes)?
            } else {
                ctl.remove_all(&mut TerminalIntents::stdio())?
            };
            if !cleared {
                println!("Nothing deleted");
                return Ok(());
            }
        }
        Commands::Theme { mode } => {
            match mode {
                Some(ThemeMode::Dark) => ctl.set_dark_mode(true)?,
                Some(ThemeMode::Light) => ctl.set_dark_mode(false)?,
                Some(ThemeMode::Toggle) => {
                    ctl.toggle_theme()?;
                }
                None => {}
            }
            println!("Theme: {}", Theme::new(ctl.is_dark_mode()).name());
            return Ok(());
        }
        Commands::Export { file } => {
            jsonl::export_jsonl(&file, ctl.tasks()).map_err(ControllerError::Store)?;
            println!("Exported {} tasks to {}", ctl.tasks().len(), file.display());
            return Ok(());
        }
        Commands::Import { file } => {
            let tasks = jsonl::read_jsonl(&file).map_err(ControllerError::Store)?;
            let count = ctl.import(tasks)?;
            println!("Imported {} tasks", count);
        }
    }

    println!("{}", render_list(ctl.tasks(), Theme::new(ctl.is_dark_mode())));
    Ok(())
}

fn run(cli: Cli) -> Result<bool> {
    let root = cli.store_path.unwrap_or_else(default_store_path);
    let prefs_path = Preferences::path_in(&root.join(STORE_DIR));

    let store = TaskStore::open(&root)?;
    let mut ctl = TaskListController::with_preferences(store, prefs_path);
    if let Some(notice) = ctl.take_notice() {
        eprintln!("{} {}", "warning:".yellow().bold(), notice);
    }

    let outcome = ctl
        .refresh()
        .and_then(|()| execute(&mut ctl, cli.command.unwrap_or(Commands::List)));

    let ok = match outcome {
        Ok(()) => true,
        Err(ControllerError::Validation(msg)) => {
            eprintln!("{} {}", "invalid:".yellow().bold(), msg);
            false
        }
        Err(e) => {
            let notice = ctl.take_notice().unwrap_or_else(|| e.to_string());
            eprintln!("{} {}", "error:".red().bold(), notice);
            false
        }
    };

    ctl.into_repository().close()?;
    Ok(ok)
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            process::exit(2);
        }
    }
}
