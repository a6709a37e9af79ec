use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use eyre::{Result, eyre};
use std::path::PathBuf;
use tasklist::{DEFAULT_KEY, FileSlot, Slot, SqliteSlot, Task, TaskId, TaskListStore};
use tracing::Level;

#[derive(Parser)]
#[command(name = "tasklist")]
#[command(about = "TaskList CLI - Add, edit, complete and filter tasks stored locally")]
#[command(version)]
struct Cli {
    /// Directory holding the task list (default: platform data directory)
    #[arg(short, long, env = "TASKLIST_PATH")]
    store_path: Option<PathBuf>,

    /// Storage backend
    #[arg(short, long, value_enum, default_value_t = Backend::Sqlite)]
    backend: Backend,

    /// Slot key the list is stored under
    #[arg(short, long, default_value = DEFAULT_KEY)]
    key: String,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// SQLite database (tasklist.db)
    Sqlite,
    /// Plain JSON file per key
    File,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add {
        /// Task text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// List tasks
    List {
        /// all, completed or pending
        #[arg(short, long, default_value = "all")]
        filter: String,

        /// Show when each task was added
        #[arg(short, long)]
        long: bool,
    },

    /// Mark a task completed, or pending again
    Toggle { id: TaskId },

    /// Delete a task
    Delete { id: TaskId },

    /// Replace the text of a task
    Edit {
        id: TaskId,

        /// New task text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let store_path = match cli.store_path {
        Some(path) => path,
        None => dirs::data_dir()
            .map(|d| d.join("tasklist"))
            .ok_or_else(|| eyre!("Could not determine data directory, pass --store-path"))?,
    };

    let slot: Box<dyn Slot> = match cli.backend {
        Backend::Sqlite => Box::new(SqliteSlot::open(&store_path)?),
        Backend::File => Box::new(FileSlot::open(&store_path)?),
    };

    let mut store = TaskListStore::open_with_key(slot, cli.key);
    if let Some(err) = store.load_error() {
        eprintln!("{} {}", "warning:".yellow().bold(), err);
    }

    match cli.command {
        Commands::Add { text } => match store.add_task(&text.join(" ")) {
            Some(id) => println!("Added task {}", id.to_string().cyan()),
            None => println!("Nothing to add: task text is blank"),
        },
        Commands::List { filter, long } => {
            store.set_filter(&filter)?;
            print_tasks(&store, long);
        }
        Commands::Toggle { id } => {
            if store.toggle_completion(id) {
                let state = match store.get(id) {
                    Some(task) if task.completed => "completed",
                    _ => "pending",
                };
                println!("Task {} is now {}", id.to_string().cyan(), state);
            } else {
                println!("No task with id {}", id);
            }
        }
        Commands::Delete { id } => {
            if store.delete_task(id) {
                println!("Deleted task {}", id.to_string().cyan());
            } else {
                println!("No task with id {}", id);
            }
        }
        Commands::Edit { id, text } => {
            let Some(task) = store.get(id).cloned() else {
                println!("No task with id {}", id);
                return Ok(());
            };

            store.begin_edit(&task);
            store.update_draft(text.join(" "));
            if store.commit_edit() {
                println!("Updated task {}", id.to_string().cyan());
            } else {
                store.cancel_edit();
                println!("Task text cannot be blank, edit discarded");
            }
        }
    }

    if let Some(err) = store.last_persist_error() {
        eprintln!("{} {} (changes were not saved)", "warning:".yellow().bold(), err);
    }

    Ok(())
}

fn print_tasks<S: Slot>(store: &TaskListStore<S>, long: bool) {
    let tasks = store.visible_tasks();
    if tasks.is_empty() {
        println!("No tasks (filter: {})", store.filter());
    }

    for task in &tasks {
        println!("{}", format_task(task, long));
    }

    let counts = store.counts();
    println!(
        "{}",
        format!(
            "{} total, {} completed, {} pending (showing {})",
            counts.total,
            counts.completed,
            counts.pending,
            store.filter()
        )
        .dimmed()
    );
}

fn format_task(task: &Task, long: bool) -> String {
    let (mark, text) = if task.completed {
        ("[x]".green(), task.text.strikethrough())
    } else {
        ("[ ]".normal(), task.text.normal())
    };

    let mut line = format!("{} {} {}", mark, task.id.to_string().cyan(), text);
    if long {
        if let Some(added) = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(task.id) {
            let added = added.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M");
            line.push_str(&format!("  {}", format!("added {}", added).dimmed()));
        }
    }
    line
}
