//! tlog task mutation commands.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::{NewTask, TaskUpdate};
use crate::task::{Priority, Resolution, Task};

pub struct CreateOptions {
    pub title: String,
    pub deps: Vec<String>,
    pub labels: Vec<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub priority: Option<Priority>,
    pub parent: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct DoneOptions {
    pub id: String,
    pub wontfix: bool,
    pub duplicate: bool,
    pub note: Option<String>,
    pub commit: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum StatusAction {
    Claim,
    Unclaim,
    Reopen,
}

pub struct StatusOptions {
    pub id: String,
    pub action: StatusAction,
    pub note: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct DeleteOptions {
    pub id: String,
    pub note: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct UpdateOptions {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub labels: Vec<String>,
    pub clear_labels: bool,
    pub priority: Option<Priority>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct DepOptions {
    pub id: String,
    pub dep: String,
    pub remove: bool,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct DepOutput {
    id: String,
    dep: String,
    action: &'static str,
    changed: bool,
    deps: Vec<String>,
}

pub fn run_create(options: CreateOptions) -> Result<()> {
    let store = super::open_store(options.root)?;
    let parent = options.parent.clone();
    let task = store.create(NewTask {
        title: options.title,
        deps: options.deps,
        labels: options.labels,
        description: options.description,
        notes: options.notes,
        priority: options.priority,
        parent: options.parent,
    })?;

    let mut human = HumanOutput::new("Task created");
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());
    human.push_summary("Priority", task.priority.to_string());
    if !task.deps.is_empty() {
        human.push_summary("Deps", task.deps.join(", "));
    }
    if let Some(parent) = parent {
        human.push_summary("Blocks", parent);
    }
    human.push_next_step(format!("tlog claim {}", task.id));

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "create",
        &task,
        Some(&human),
    )
}

pub fn run_done(options: DoneOptions) -> Result<()> {
    let store = super::open_store(options.root)?;
    let resolution = if options.wontfix {
        Resolution::Wontfix
    } else if options.duplicate {
        Resolution::Duplicate
    } else {
        Resolution::Completed
    };
    let task = store.done(&options.id, Some(resolution), options.note, options.commit)?;

    let mut human = task_summary("Task done", &task);
    if let Some(commit) = task.commit.as_ref() {
        human.push_summary("Commit", commit.clone());
    }
    human.push_next_step("tlog ready");

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "done",
        &task,
        Some(&human),
    )
}

pub fn run_status(options: StatusOptions) -> Result<()> {
    let store = super::open_store(options.root)?;
    let (task, header, command) = match options.action {
        StatusAction::Claim => (store.claim(&options.id, options.note)?, "Task claimed", "claim"),
        StatusAction::Unclaim => (
            store.unclaim(&options.id, options.note)?,
            "Task unclaimed",
            "unclaim",
        ),
        StatusAction::Reopen => (
            store.reopen(&options.id, options.note)?,
            "Task reopened",
            "reopen",
        ),
    };

    let mut human = task_summary(header, &task);
    if matches!(options.action, StatusAction::Claim) {
        human.push_next_step(format!("tlog done {}", task.id));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        command,
        &task,
        Some(&human),
    )
}

pub fn run_delete(options: DeleteOptions) -> Result<()> {
    let store = super::open_store(options.root)?;
    let task = store.delete(&options.id, options.note)?;

    let mut human = HumanOutput::new("Task deleted");
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "delete",
        &task,
        Some(&human),
    )
}

pub fn run_update(options: UpdateOptions) -> Result<()> {
    let store = super::open_store(options.root)?;
    let labels = if options.clear_labels {
        Some(Vec::new())
    } else if options.labels.is_empty() {
        None
    } else {
        Some(options.labels)
    };
    let task = store.update(
        &options.id,
        TaskUpdate {
            title: options.title,
            description: options.description,
            notes: options.notes,
            labels,
            priority: options.priority,
        },
    )?;

    let mut human = task_summary("Task updated", &task);
    human.push_summary("Priority", task.priority.to_string());
    human.push_summary(
        "Labels",
        if task.labels.is_empty() {
            "none".to_string()
        } else {
            task.labels.join(", ")
        },
    );

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "update",
        &task,
        Some(&human),
    )
}

pub fn run_dep(options: DepOptions) -> Result<()> {
    let store = super::open_store(options.root)?;
    let (change, action) = if options.remove {
        (store.remove_dep(&options.id, &options.dep)?, "remove")
    } else {
        (store.add_dep(&options.id, &options.dep)?, "add")
    };

    let header = match (options.remove, change.changed) {
        (false, true) => format!("Dep added: {} -> {}", change.task.id, change.dep),
        (false, false) => format!("Dep already present: {} -> {}", change.task.id, change.dep),
        (true, true) => format!("Dep removed: {} -> {}", change.task.id, change.dep),
        (true, false) => format!("Dep not present: {} -> {}", change.task.id, change.dep),
    };
    let human = HumanOutput::new(header);
    let output = DepOutput {
        id: change.task.id,
        dep: change.dep,
        action,
        changed: change.changed,
        deps: change.task.deps,
    };

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "dep",
        &output,
        Some(&human),
    )
}

fn task_summary(header: &str, task: &Task) -> HumanOutput {
    let mut human = HumanOutput::new(header);
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());
    match task.resolution {
        Some(resolution) => human.push_summary("Status", format!("{} ({resolution})", task.status)),
        None => human.push_summary("Status", task.status.to_string()),
    }
    human
}
