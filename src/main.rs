//! taskline - boards, tasks and notes from the command line
//!
//! Items live in a pluggable storage backend (local files, a git repository
//! or Firestore) selected in the config file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use xdg::BaseDirectories;

mod commands;
mod config;
mod date;
mod error;
mod ids;
mod item;
mod migration;
mod render;
mod storage;
mod taskline;


use crate::config::{Config, CONFIG_FILE};
use crate::error::TasklineError;
use crate::render::Renderer;
use crate::storage::{StorageKind, StorageManager};
use crate::taskline::Taskline;

const LOG_ENV: &str = "TASKLINE_LOG";

/// Command-line interface structure for taskline
#[derive(Parser)]
#[command(name = "tl")]
#[command(about = "Tasks, boards and notes for the command line", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands; without one the boards are shown
#[derive(Subcommand)]
enum Commands {
    /// Create a task
    #[command(alias = "t")]
    Task {
        #[arg(required = true)]
        description: Vec<String>,
        /// Board(s) for the task, comma separated or repeated
        #[arg(short, long = "board")]
        board: Vec<String>,
        /// 1 (normal), 2 (medium) or 3 (high)
        #[arg(short, long)]
        priority: Option<String>,
        /// Due date, e.g. "tomorrow" or "2024-06-01 14:00"
        #[arg(short, long)]
        due: Option<String>,
    },
    /// Create a note
    #[command(alias = "n")]
    Note {
        #[arg(required = true)]
        description: Vec<String>,
        #[arg(short, long = "board")]
        board: Vec<String>,
    },
    /// Display archived items
    #[command(alias = "a")]
    Archive,
    /// Restore items from the archive
    #[command(alias = "r")]
    Restore {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Move items to the archive
    #[command(alias = "d")]
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Check or uncheck tasks (e.g. "1", "2-4", "1,3")
    #[command(alias = "c")]
    Check {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Archive all checked tasks
    Clear,
    /// Start or pause tasks
    #[command(alias = "b")]
    Begin {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Cancel or revive tasks
    Cancel {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Star or unstar items
    #[command(alias = "s")]
    Star {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Copy item descriptions to the clipboard
    #[command(alias = "y")]
    Copy {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Display items grouped by creation date
    #[command(alias = "i")]
    Timeline,
    /// Set the priority of tasks
    #[command(alias = "p")]
    Priority { ids: String, priority: String },
    /// Set the due date of tasks
    Due {
        ids: String,
        #[arg(required = true)]
        date: Vec<String>,
    },
    /// Search item descriptions
    #[command(alias = "f")]
    Find {
        #[arg(required = true)]
        terms: Vec<String>,
    },
    /// List items by attributes (starred, done, pending, high, ...) or boards
    #[command(alias = "l")]
    List { terms: Vec<String> },
    /// Replace the description of an item
    #[command(alias = "e")]
    Edit {
        id: String,
        #[arg(required = true)]
        description: Vec<String>,
    },
    /// Move items to other boards
    #[command(alias = "m")]
    Move {
        ids: String,
        #[arg(required = true)]
        boards: Vec<String>,
    },
    /// Open the config file in $EDITOR
    Config,
    /// List, switch, add or remove storage modules
    Storage {
        name: Option<String>,
        /// Add a module of this type under NAME
        #[arg(long, value_name = "TYPE")]
        add: Option<StorageKind>,
        /// Directory of an added local or git module
        #[arg(long, requires = "add")]
        dir: Option<PathBuf>,
        /// Project id of an added firestore module
        #[arg(long, requires = "add")]
        project: Option<String>,
        /// Remove the module NAME
        #[arg(long, conflicts_with = "add")]
        remove: bool,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Entry point: parses arguments, prints errors in the theme's error color.
fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let mut renderer = Renderer::new(&Config::default());
    match run(cli, &mut renderer) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            renderer.error(&format!("{:#}", e));
            let user_error = matches!(e.downcast_ref::<TasklineError>(), Some(err) if err.is_user_error());
            if !user_error {
                eprintln!("Run with {}=debug for details", LOG_ENV);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, renderer: &mut Renderer) -> Result<()> {
    let base = BaseDirectories::with_prefix("taskline");
    let config_path = base
        .place_config_file(CONFIG_FILE)
        .context("Failed to create config directory")?;
    let data_root = base
        .create_data_directory("")
        .context("Failed to create data directory")?;

    let mut config = Config::load_or_create(&config_path)?;
    *renderer = Renderer::new(&config);

    let mut manager = StorageManager::load(&config.storage_modules, &config.storage_module, &data_root);

    let command = match cli.command {
        Some(Commands::Config) => return commands::edit_config(&config_path, renderer),
        Some(Commands::Storage {
            name,
            add,
            dir,
            project,
            remove,
        }) => {
            let args = commands::StorageArgs {
                name,
                add,
                dir,
                project,
                remove,
            };
            return commands::storage(&mut manager, &mut config, &config_path, renderer, args);
        }
        command => command,
    };

    let renderer = &*renderer;
    let mut taskline = Taskline::new(&mut manager, &config);
    let tl = &mut taskline;

    match command {
        None => commands::show_boards(tl, renderer),
        Some(Commands::Task {
            description,
            board,
            priority,
            due,
        }) => commands::create_task(tl, renderer, &description, &board, priority.as_deref(), due.as_deref()),
        Some(Commands::Note { description, board }) => commands::create_note(tl, renderer, &description, &board),
        Some(Commands::Archive) => commands::show_archive(tl, renderer),
        Some(Commands::Restore { ids }) => commands::restore_items(tl, renderer, &ids),
        Some(Commands::Delete { ids }) => commands::delete_items(tl, renderer, &ids),
        Some(Commands::Check { ids }) => commands::check_tasks(tl, renderer, &ids),
        Some(Commands::Clear) => commands::clear(tl, renderer),
        Some(Commands::Begin { ids }) => commands::begin_tasks(tl, renderer, &ids),
        Some(Commands::Cancel { ids }) => commands::cancel_tasks(tl, renderer, &ids),
        Some(Commands::Star { ids }) => commands::star_items(tl, renderer, &ids),
        Some(Commands::Copy { ids }) => commands::copy_to_clipboard(tl, renderer, &ids),
        Some(Commands::Timeline) => commands::show_timeline(tl, renderer),
        Some(Commands::Priority { ids, priority }) => commands::update_priority(tl, renderer, &ids, &priority),
        Some(Commands::Due { ids, date }) => commands::update_due_date(tl, renderer, &ids, &date),
        Some(Commands::Find { terms }) => commands::find_items(tl, renderer, &terms),
        Some(Commands::List { terms }) => commands::list_items(tl, renderer, &terms),
        Some(Commands::Edit { id, description }) => commands::edit_description(tl, renderer, &id, &description),
        Some(Commands::Move { ids, boards }) => commands::move_boards(tl, renderer, &ids, &boards),
        Some(Commands::Config) | Some(Commands::Storage { .. }) => Ok(()),
    }
}
