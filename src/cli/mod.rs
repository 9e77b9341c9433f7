//! Command-line interface for tlog
//!
//! This module defines the CLI structure using clap derive macros.
//! Mutating commands live in `task`, read-only views in `view`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::store::{StatusFilter, TaskStore};
use crate::task::Priority;

mod init;
mod prune;
mod task;
mod view;

/// tlog - event-sourced task tracking
///
/// Tasks are never stored directly: every change is appended to a day file
/// under `.tlog/events/` and current state is rebuilt by replaying the log.
#[derive(Parser, Debug)]
#[command(name = "tlog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory to search upward from for `.tlog/` (defaults to current directory)
    #[arg(long, global = true, env = "TLOG_ROOT")]
    pub root: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create `.tlog/` in the current directory
    Init,

    /// Create a task
    Create {
        /// Task title
        title: String,

        /// Task this one depends on (repeatable)
        #[arg(long = "dep")]
        deps: Vec<String>,

        /// Label to attach (repeatable)
        #[arg(long = "label")]
        labels: Vec<String>,

        /// What the task is
        #[arg(long)]
        description: Option<String>,

        /// Initial notes
        #[arg(long)]
        notes: Option<String>,

        /// critical, high, medium, low, backlog
        #[arg(long)]
        priority: Option<Priority>,

        /// Existing task that should wait on the new one
        #[arg(long = "for", value_name = "PARENT")]
        parent: Option<String>,
    },

    /// Mark a task done
    Done {
        /// Task id or unique prefix
        id: String,

        /// Close as won't fix
        #[arg(long, conflicts_with = "duplicate")]
        wontfix: bool,

        /// Close as duplicate
        #[arg(long)]
        duplicate: bool,

        /// Note to append
        #[arg(long)]
        note: Option<String>,

        /// Commit that completed the task
        #[arg(long)]
        commit: Option<String>,
    },

    /// Start work on an open task
    Claim {
        /// Task id or unique prefix
        id: String,

        /// Note to append
        #[arg(long)]
        note: Option<String>,
    },

    /// Return an in-progress task to open
    Unclaim {
        /// Task id or unique prefix
        id: String,

        /// Note to append
        #[arg(long)]
        note: Option<String>,
    },

    /// Reopen a done or in-progress task
    Reopen {
        /// Task id or unique prefix
        id: String,

        /// Note to append
        #[arg(long)]
        note: Option<String>,
    },

    /// Soft-delete a task
    Delete {
        /// Task id or unique prefix
        id: String,

        /// Note to append
        #[arg(long)]
        note: Option<String>,
    },

    /// Change task fields
    Update {
        /// Task id or unique prefix
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description (replaces the old one)
        #[arg(long)]
        description: Option<String>,

        /// Notes to append
        #[arg(long)]
        notes: Option<String>,

        /// Replace labels with these (repeatable)
        #[arg(long = "label", conflicts_with = "clear_labels")]
        labels: Vec<String>,

        /// Remove every label
        #[arg(long)]
        clear_labels: bool,

        /// critical, high, medium, low, backlog
        #[arg(long)]
        priority: Option<Priority>,
    },

    /// List tasks
    List {
        /// open, in_progress, done, all
        #[arg(long, default_value = "open")]
        status: StatusFilter,

        /// Only tasks carrying this label
        #[arg(long)]
        label: Option<String>,

        /// Only tasks at this priority
        #[arg(long)]
        priority: Option<Priority>,
    },

    /// Show one task with its dependencies and dependents
    Show {
        /// Task id or unique prefix
        id: String,
    },

    /// List tasks ready to work on
    Ready,

    /// Add or remove a dependency
    Dep {
        /// Task that waits
        id: String,

        /// Task it waits on
        dep: String,

        /// Remove the dependency instead of adding it
        #[arg(long)]
        remove: bool,
    },

    /// Show active tasks as a dependency tree
    Graph,

    /// List labels in use
    Labels,

    /// Print working context for an agent: claimed, ready, blocked and recent tasks
    Prime,

    /// Compact history and drop finished tasks
    Prune {
        /// Keep done tasks updated within this many days (default from config)
        #[arg(long)]
        save_days: Option<u32>,

        /// Keep every done task; only compact
        #[arg(long)]
        keep_all: bool,

        /// Report what would change without touching files
        #[arg(long)]
        dry_run: bool,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let root = self.root;
        let json = self.json;
        let quiet = self.quiet;

        match self.command {
            Commands::Init => init::run(root, json, quiet),
            Commands::Create {
                title,
                deps,
                labels,
                description,
                notes,
                priority,
                parent,
            } => task::run_create(task::CreateOptions {
                title,
                deps,
                labels,
                description,
                notes,
                priority,
                parent,
                root,
                json,
                quiet,
            }),
            Commands::Done {
                id,
                wontfix,
                duplicate,
                note,
                commit,
            } => task::run_done(task::DoneOptions {
                id,
                wontfix,
                duplicate,
                note,
                commit,
                root,
                json,
                quiet,
            }),
            Commands::Claim { id, note } => task::run_status(task::StatusOptions {
                id,
                action: task::StatusAction::Claim,
                note,
                root,
                json,
                quiet,
            }),
            Commands::Unclaim { id, note } => task::run_status(task::StatusOptions {
                id,
                action: task::StatusAction::Unclaim,
                note,
                root,
                json,
                quiet,
            }),
            Commands::Reopen { id, note } => task::run_status(task::StatusOptions {
                id,
                action: task::StatusAction::Reopen,
                note,
                root,
                json,
                quiet,
            }),
            Commands::Delete { id, note } => task::run_delete(task::DeleteOptions {
                id,
                note,
                root,
                json,
                quiet,
            }),
            Commands::Update {
                id,
                title,
                description,
                notes,
                labels,
                clear_labels,
                priority,
            } => task::run_update(task::UpdateOptions {
                id,
                title,
                description,
                notes,
                labels,
                clear_labels,
                priority,
                root,
                json,
                quiet,
            }),
            Commands::Dep { id, dep, remove } => task::run_dep(task::DepOptions {
                id,
                dep,
                remove,
                root,
                json,
                quiet,
            }),
            Commands::List {
                status,
                label,
                priority,
            } => view::run_list(view::ListOptions {
                status,
                label,
                priority,
                root,
                json,
                quiet,
            }),
            Commands::Show { id } => view::run_show(view::ShowOptions {
                id,
                root,
                json,
                quiet,
            }),
            Commands::Ready => view::run_ready(root, json, quiet),
            Commands::Graph => view::run_graph(root, json, quiet),
            Commands::Labels => view::run_labels(root, json, quiet),
            Commands::Prime => view::run_prime(root, json, quiet),
            Commands::Prune {
                save_days,
                keep_all,
                dry_run,
            } => prune::run(prune::PruneOptions {
                save_days,
                keep_all,
                dry_run,
                root,
                json,
                quiet,
            }),
        }
    }
}

fn start_dir(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(path) => Ok(path),
        None => Ok(std::env::current_dir()?),
    }
}

/// Open the store for `--root` (or the current directory).
fn open_store(root: Option<PathBuf>) -> Result<TaskStore> {
    let start = start_dir(root)?;
    TaskStore::discover(&start)
}
