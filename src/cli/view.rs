//! Read-only tlog commands: list, show, ready, graph, labels, prime.

use std::fmt::Write as _;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::Result;
use crate::graph::{self, DependencyGraph};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::{ListFilter, PrimeContext, StatusFilter, TaskRef};
use crate::task::{Priority, Task};

pub struct ListOptions {
    pub status: StatusFilter,
    pub label: Option<String>,
    pub priority: Option<Priority>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct ShowOptions {
    pub id: String,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct TaskList {
    count: usize,
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct GraphReport {
    #[serde(flatten)]
    graph: DependencyGraph,
    tree: String,
}

#[derive(Serialize)]
struct LabelList {
    labels: Vec<String>,
}

/// Run `tlog list`
pub fn run_list(options: ListOptions) -> Result<()> {
    let store = super::open_store(options.root)?;
    let tasks = store.list(&ListFilter {
        status: options.status,
        label: options.label,
        priority: options.priority,
    })?;

    let human = task_lines("Tasks", "No tasks", &tasks);
    let report = TaskList {
        count: tasks.len(),
        tasks,
    };

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "list",
        &report,
        Some(&human),
    )
}

/// Run `tlog show`
pub fn run_show(options: ShowOptions) -> Result<()> {
    let store = super::open_store(options.root)?;
    let details = store.show(&options.id)?;
    let task = &details.task;

    let mut human = HumanOutput::new(format!("{} {}", task.status.glyph(), task.id));
    human.push_summary("Title", task.title.clone());
    match task.resolution {
        Some(resolution) => human.push_summary("Status", format!("{} ({resolution})", task.status)),
        None => human.push_summary("Status", task.status.to_string()),
    }
    human.push_summary("Priority", task.priority.to_string());
    if !task.labels.is_empty() {
        human.push_summary("Labels", task.labels.join(", "));
    }
    if let Some(commit) = task.commit.as_ref() {
        human.push_summary("Commit", commit.clone());
    }
    human.push_summary("Created", task.created.to_rfc3339());
    human.push_summary("Updated", task.updated.to_rfc3339());

    let mut body = String::new();
    if !task.description.is_empty() {
        let _ = writeln!(body, "{}", task.description);
    }
    if !task.notes.is_empty() {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str("Notes:\n");
        for line in task.notes.lines() {
            let _ = writeln!(body, "  {line}");
        }
    }
    if !body.is_empty() {
        human.set_body(body);
    }

    for dep in &details.dep_status {
        human.push_detail(format!("depends on {}", related(dep)));
    }
    for dependent in &details.dependents {
        human.push_detail(format!("blocks {}", related(dependent)));
    }
    for dep in &task.deps {
        if !details.dep_status.iter().any(|known| &known.id == dep) {
            human.push_warning(format!("dependency {dep} not found; treated as satisfied"));
        }
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "show",
        &details,
        Some(&human),
    )
}

/// Run `tlog ready`
pub fn run_ready(root: Option<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let store = super::open_store(root)?;
    let tasks = store.ready()?;

    let mut human = task_lines("Ready", "No ready tasks", &tasks);
    if let Some(first) = tasks.first() {
        human.push_next_step(format!("tlog claim {}", first.id));
    }
    let report = TaskList {
        count: tasks.len(),
        tasks,
    };

    emit_success(OutputOptions { json, quiet }, "ready", &report, Some(&human))
}

/// Run `tlog graph`
pub fn run_graph(root: Option<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let store = super::open_store(root)?;
    let tasks = store.load()?;
    let report = GraphReport {
        graph: graph::dependency_graph(&tasks),
        tree: graph::dependency_tree(&tasks),
    };

    let mut human = HumanOutput::new("Dependency tree");
    human.set_body(report.tree.clone());

    emit_success(OutputOptions { json, quiet }, "graph", &report, Some(&human))
}

/// Run `tlog labels`
pub fn run_labels(root: Option<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let store = super::open_store(root)?;
    let labels = store.labels()?;

    let mut human = HumanOutput::new("Labels");
    if labels.is_empty() {
        human.set_body("No labels");
    } else {
        human.set_body(labels.join("\n"));
    }

    emit_success(
        OutputOptions { json, quiet },
        "labels",
        &LabelList { labels },
        Some(&human),
    )
}

const WORKFLOW: &str = "\
Workflow:
  1. claim a task before starting
  2. split large work into subtasks (create --for <id>) before claiming
  3. commit changes before marking done
  4. done when finished (--commit records the SHA)
  5. unclaim if blocked, so someone else can pick it up

Partial ids work when unambiguous, e.g. `tlog done 4d1`.
";

/// Run `tlog prime`
pub fn run_prime(root: Option<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let store = super::open_store(root)?;
    let context = store.prime()?;
    let human = prime_output(&context);

    emit_success(OutputOptions { json, quiet }, "prime", &context, Some(&human))
}

fn prime_output(context: &PrimeContext) -> HumanOutput {
    let mut human = HumanOutput::new("tlog tracks tasks for agents in this project");
    let counts = context.counts;
    human.push_summary(
        "Status",
        format!(
            "{} open, {} in progress, {} done",
            counts.open, counts.in_progress, counts.done
        ),
    );

    let mut body = String::from(WORKFLOW);
    if !context.in_progress.is_empty() {
        body.push_str("\nIn progress:\n");
        for task in &context.in_progress {
            let _ = writeln!(body, "  {}", task_line(task));
        }
    }
    if !context.ready.is_empty() {
        body.push_str("\nReady:\n");
        for task in &context.ready {
            let _ = writeln!(body, "  {}", task_line(task));
        }
    }
    if !context.blocked.is_empty() {
        body.push_str("\nBlocked:\n");
        for blocked in &context.blocked {
            let _ = writeln!(
                body,
                "  {} (waiting: {})",
                task_line(&blocked.task),
                blocked.waiting_on.join(", ")
            );
        }
    }
    if !context.recent.is_empty() {
        body.push_str("\nRecently done:\n");
        for task in &context.recent {
            match task.commit.as_deref() {
                Some(commit) => {
                    let _ = writeln!(body, "  {}  {} ({commit})", task.id, task.title);
                }
                None => {
                    let _ = writeln!(body, "  {}  {}", task.id, task.title);
                }
            }
        }
    }
    human.set_body(body);

    if context.in_progress.is_empty() && context.ready.is_empty() && context.blocked.is_empty() {
        human.push_next_step("tlog create \"<title>\"");
    } else if let Some(first) = context.ready.first() {
        human.push_next_step(format!("tlog claim {}", first.id));
    }
    human
}

fn task_lines(header: &str, empty: &str, tasks: &[Task]) -> HumanOutput {
    let mut human = HumanOutput::new(format!("{header} ({})", tasks.len()));
    if tasks.is_empty() {
        human.set_body(empty);
        return human;
    }

    let mut body = String::new();
    for task in tasks {
        let _ = writeln!(body, "{}", task_line(task));
    }
    human.set_body(body);
    human
}

/// `◐ [high] tl-1a2b3c4d  Title  #api  #cli`
fn task_line(task: &Task) -> String {
    let mut line = format!(
        "{} [{}] {}  {}",
        task.status.glyph(),
        task.priority,
        task.id,
        task.title
    );
    for label in &task.labels {
        line.push_str("  #");
        line.push_str(label);
    }
    line
}

fn related(task: &TaskRef) -> String {
    format!("{} {}  {}", task.status.glyph(), task.id, task.title)
}
