//! Validated task operations over the event log
//!
//! Every call rebuilds state from disk: load, replay, check, and (for
//! mutations) append exactly one logical change. A rejected mutation appends
//! nothing. Ids accepted from callers may be unique prefixes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::compact::{self, CompactOptions, CompactReport};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{DepAction, Event, EventKind};
use crate::graph::{self, DependencyGraph};
use crate::replay::replay;
use crate::storage::{self, EventLog};
use crate::task::{
    by_priority_then_created, generate_id, resolve_deleted_id, resolve_id, Priority, Resolution,
    Task, TaskMap, TaskStatus,
};

/// Input for `TaskStore::create`
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub deps: Vec<String>,
    pub labels: Vec<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub priority: Option<Priority>,
    /// Existing task that should wait on the new one
    pub parent: Option<String>,
}

/// Input for `TaskStore::update`. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    /// `Some(vec![])` clears all labels
    pub labels: Option<Vec<String>>,
    pub priority: Option<Priority>,
}

impl TaskUpdate {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.notes.is_none()
            && self.labels.is_none()
            && self.priority.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    Open,
    InProgress,
    Done,
    All,
}

impl StatusFilter {
    fn matches(self, status: TaskStatus) -> bool {
        match self {
            StatusFilter::Open => status == TaskStatus::Open,
            StatusFilter::InProgress => status == TaskStatus::InProgress,
            StatusFilter::Done => status == TaskStatus::Done,
            StatusFilter::All => true,
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        Ok(match s.parse::<TaskStatus>()? {
            TaskStatus::Open => StatusFilter::Open,
            TaskStatus::InProgress => StatusFilter::InProgress,
            TaskStatus::Done => StatusFilter::Done,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: StatusFilter,
    pub label: Option<String>,
    pub priority: Option<Priority>,
}

/// Id, title and status of a related task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRef {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
}

impl From<&Task> for TaskRef {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            status: task.status,
        }
    }
}

/// Result of a dependency edit
#[derive(Debug, Clone, Serialize)]
pub struct DepChange {
    pub task: Task,
    /// Resolved id of the dependency
    pub dep: String,
    /// False when the edge was already in the requested state
    pub changed: bool,
}

/// A task with its immediate neighbourhood
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetails {
    pub task: Task,
    /// Tasks this one waits on (unknown ids omitted)
    pub dep_status: Vec<TaskRef>,
    /// Live tasks waiting on this one
    pub dependents: Vec<TaskRef>,
}

/// Done tasks shown by `TaskStore::prime`
pub const RECENT_DONE_LIMIT: usize = 3;

/// Live task counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub open: usize,
    pub in_progress: usize,
    pub done: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockedTask {
    #[serde(flatten)]
    pub task: Task,
    /// Unfinished dependencies, full ids
    pub waiting_on: Vec<String>,
}

/// Working context for an agent picking up the project
#[derive(Debug, Clone, Serialize)]
pub struct PrimeContext {
    pub counts: StatusCounts,
    pub in_progress: Vec<Task>,
    pub ready: Vec<Task>,
    pub blocked: Vec<BlockedTask>,
    /// Most recently finished first
    pub recent: Vec<Task>,
}

pub struct TaskStore {
    log: EventLog,
    config: Config,
}

impl TaskStore {
    pub fn new(log: EventLog, config: Config) -> Self {
        Self { log, config }
    }

    /// Open the store rooted at a `.tlog/` directory.
    pub fn open(root: PathBuf) -> Result<Self> {
        let config = Config::load_from_root(&root)?;
        let log = EventLog::new(root, config.storage.lock_timeout_ms);
        Ok(Self::new(log, config))
    }

    /// Find `.tlog/` at or above `start` and open it.
    pub fn discover(start: &Path) -> Result<Self> {
        Self::open(storage::discover_root(start)?)
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replay the whole log.
    pub fn load(&self) -> Result<TaskMap> {
        let events = self.log.load_all()?;
        Ok(replay(&events))
    }

    fn append_and_reload(&self, events: &[Event], id: &str) -> Result<Task> {
        self.log.append_all(events)?;
        self.load()?
            .remove(id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    pub fn create(&self, request: NewTask) -> Result<Task> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(Error::InvalidArgument("title cannot be empty".to_string()));
        }

        let tasks = self.load()?;
        let mut deps = Vec::new();
        for input in &request.deps {
            let dep = resolve_dependency(&tasks, input)?;
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        let parent = request
            .parent
            .as_deref()
            .map(|input| resolve_id(&tasks, input))
            .transpose()?;

        let id = generate_id(&self.config.tasks.id_prefix, self.config.tasks.id_len);
        if let Some(parent) = parent.as_ref() {
            // The parent will wait on the new task, which waits on `deps`.
            if deps
                .iter()
                .any(|dep| graph::would_create_cycle(&tasks, parent, dep))
            {
                return Err(Error::CycleDetected {
                    task: parent.clone(),
                    dep: id,
                });
            }
        }

        let created_at = Utc::now();
        let mut events = vec![Event::new(
            id.clone(),
            created_at,
            EventKind::Create {
                title: title.to_string(),
                status: Some(TaskStatus::Open),
                resolution: None,
                priority: request.priority,
                deps,
                labels: normalize_labels(request.labels),
                description: non_blank(request.description),
                notes: non_blank(request.notes),
                commit: None,
                updated: None,
            },
        )];
        if let Some(parent) = parent {
            let linked_at = Utc::now().max(created_at);
            events.push(Event::dep(parent, linked_at, id.clone(), DepAction::Add));
        }

        debug!(id = %id, "creating task");
        self.append_and_reload(&events, &id)
    }

    /// Mark a task done with `resolution` (completed by default).
    pub fn done(
        &self,
        input: &str,
        resolution: Option<Resolution>,
        notes: Option<String>,
        commit: Option<String>,
    ) -> Result<Task> {
        let tasks = self.load()?;
        let id = resolve_id(&tasks, input)?;
        let event = Event::new(
            id.clone(),
            Utc::now(),
            EventKind::Status {
                status: TaskStatus::Done,
                resolution: Some(resolution.unwrap_or(Resolution::Completed)),
                notes: non_blank(notes),
                commit: non_blank(commit),
            },
        );
        self.append_and_reload(&[event], &id)
    }

    /// open -> in_progress
    pub fn claim(&self, input: &str, notes: Option<String>) -> Result<Task> {
        self.transition(input, "claim", &[TaskStatus::Open], TaskStatus::InProgress, notes)
    }

    /// in_progress -> open
    pub fn unclaim(&self, input: &str, notes: Option<String>) -> Result<Task> {
        self.transition(input, "unclaim", &[TaskStatus::InProgress], TaskStatus::Open, notes)
    }

    /// done | in_progress -> open
    pub fn reopen(&self, input: &str, notes: Option<String>) -> Result<Task> {
        self.transition(
            input,
            "reopen",
            &[TaskStatus::Done, TaskStatus::InProgress],
            TaskStatus::Open,
            notes,
        )
    }

    fn transition(
        &self,
        input: &str,
        action: &'static str,
        from: &[TaskStatus],
        to: TaskStatus,
        notes: Option<String>,
    ) -> Result<Task> {
        let tasks = self.load()?;
        let id = resolve_id(&tasks, input)?;
        let current = tasks[&id].status;
        if !from.contains(&current) {
            return Err(Error::InvalidTransition {
                id,
                from: current.to_string(),
                action,
            });
        }

        let event = Event::new(
            id.clone(),
            Utc::now(),
            EventKind::Status {
                status: to,
                resolution: None,
                notes: non_blank(notes),
                commit: None,
            },
        );
        self.append_and_reload(&[event], &id)
    }

    /// Tombstone a task. The returned snapshot has `deleted` set.
    pub fn delete(&self, input: &str, notes: Option<String>) -> Result<Task> {
        let tasks = self.load()?;
        let id = match resolve_id(&tasks, input) {
            Ok(id) => id,
            Err(Error::TaskNotFound(missing)) => {
                return Err(match resolve_deleted_id(&tasks, input) {
                    Some(id) => Error::AlreadyDeleted(id),
                    None => Error::TaskNotFound(missing),
                });
            }
            Err(err) => return Err(err),
        };

        let event = Event::new(
            id.clone(),
            Utc::now(),
            EventKind::Delete {
                notes: non_blank(notes),
            },
        );
        self.append_and_reload(&[event], &id)
    }

    pub fn update(&self, input: &str, update: TaskUpdate) -> Result<Task> {
        if update.is_empty() {
            return Err(Error::InvalidArgument(
                "nothing to update: pass at least one field".to_string(),
            ));
        }
        if update
            .title
            .as_deref()
            .is_some_and(|title| title.trim().is_empty())
        {
            return Err(Error::InvalidArgument("title cannot be empty".to_string()));
        }

        let tasks = self.load()?;
        let id = resolve_id(&tasks, input)?;
        let event = Event::new(
            id.clone(),
            Utc::now(),
            EventKind::Update {
                title: update.title.map(|title| title.trim().to_string()),
                description: non_blank(update.description),
                notes: non_blank(update.notes),
                labels: update.labels.map(normalize_labels),
                priority: update.priority,
            },
        );
        self.append_and_reload(&[event], &id)
    }

    /// Record that `input` waits on `dep_input`. Rejected if it would close
    /// a cycle; a no-op if the edge already exists.
    pub fn add_dep(&self, input: &str, dep_input: &str) -> Result<DepChange> {
        let mut tasks = self.load()?;
        let id = resolve_id(&tasks, input)?;
        let dep = resolve_dependency(&tasks, dep_input)?;

        if graph::would_create_cycle(&tasks, &id, &dep) {
            return Err(Error::CycleDetected { task: id, dep });
        }
        if tasks[&id].deps.contains(&dep) {
            debug!(id = %id, dep = %dep, "dependency already present");
            return unchanged(&mut tasks, id, dep);
        }

        let event = Event::dep(id.clone(), Utc::now(), dep.clone(), DepAction::Add);
        let task = self.append_and_reload(&[event], &id)?;
        Ok(DepChange {
            task,
            dep,
            changed: true,
        })
    }

    /// Drop an edge. Exact ids already in the dep list (even dangling ones)
    /// are matched before prefix resolution; removing an absent edge is a
    /// no-op.
    pub fn remove_dep(&self, input: &str, dep_input: &str) -> Result<DepChange> {
        let mut tasks = self.load()?;
        let id = resolve_id(&tasks, input)?;

        let trimmed = dep_input.trim();
        let dep = if tasks[&id].deps.iter().any(|dep| dep == trimmed) {
            trimmed.to_string()
        } else {
            resolve_dependency(&tasks, trimmed)?
        };
        if !tasks[&id].deps.contains(&dep) {
            debug!(id = %id, dep = %dep, "dependency not present");
            return unchanged(&mut tasks, id, dep);
        }

        let event = Event::dep(id.clone(), Utc::now(), dep.clone(), DepAction::Remove);
        let task = self.append_and_reload(&[event], &id)?;
        Ok(DepChange {
            task,
            dep,
            changed: true,
        })
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Live tasks matching `filter`: priority first, newest first within a
    /// priority.
    pub fn list(&self, filter: &ListFilter) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .load()?
            .into_values()
            .filter(|task| !task.deleted)
            .filter(|task| filter.status.matches(task.status))
            .filter(|task| filter.priority.map_or(true, |p| task.priority == p))
            .filter(|task| {
                filter
                    .label
                    .as_ref()
                    .map_or(true, |label| task.labels.contains(label))
            })
            .collect();
        tasks.sort_by(|left, right| {
            left.priority
                .cmp(&right.priority)
                .then_with(|| right.created.cmp(&left.created))
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(tasks)
    }

    pub fn show(&self, input: &str) -> Result<TaskDetails> {
        let mut tasks = self.load()?;
        let id = resolve_id(&tasks, input)?;

        let dep_status = tasks[&id]
            .deps
            .iter()
            .filter_map(|dep| tasks.get(dep))
            .map(TaskRef::from)
            .collect();
        let dependents = tasks
            .values()
            .filter(|other| !other.deleted && other.deps.contains(&id))
            .map(TaskRef::from)
            .collect();

        let task = tasks
            .remove(&id)
            .ok_or_else(|| Error::TaskNotFound(id.clone()))?;
        Ok(TaskDetails {
            task,
            dep_status,
            dependents,
        })
    }

    pub fn ready(&self) -> Result<Vec<Task>> {
        let tasks = self.load()?;
        Ok(graph::ready_tasks(&tasks).into_iter().cloned().collect())
    }

    pub fn tree(&self) -> Result<String> {
        Ok(graph::dependency_tree(&self.load()?))
    }

    pub fn graph(&self) -> Result<DependencyGraph> {
        Ok(graph::dependency_graph(&self.load()?))
    }

    /// Claimed, ready and blocked work plus the last few completions.
    pub fn prime(&self) -> Result<PrimeContext> {
        let tasks = self.load()?;
        let live = || tasks.values().filter(|task| !task.deleted);

        let mut counts = StatusCounts::default();
        for task in live() {
            match task.status {
                TaskStatus::Open => counts.open += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Done => counts.done += 1,
            }
        }

        let mut in_progress: Vec<Task> = live()
            .filter(|task| task.status == TaskStatus::InProgress)
            .cloned()
            .collect();
        in_progress.sort_by(by_priority_then_created);

        let mut recent: Vec<Task> = live()
            .filter(|task| task.status == TaskStatus::Done)
            .cloned()
            .collect();
        recent.sort_by(|left, right| {
            right
                .updated
                .cmp(&left.updated)
                .then_with(|| left.id.cmp(&right.id))
        });
        recent.truncate(RECENT_DONE_LIMIT);

        let ready = graph::ready_tasks(&tasks).into_iter().cloned().collect();
        let blocked = graph::blocked_tasks(&tasks)
            .into_iter()
            .map(|(task, waiting_on)| BlockedTask {
                task: task.clone(),
                waiting_on: waiting_on.into_iter().map(str::to_string).collect(),
            })
            .collect();

        Ok(PrimeContext {
            counts,
            in_progress,
            ready,
            blocked,
            recent,
        })
    }

    /// Sorted, de-duplicated labels of live tasks.
    pub fn labels(&self) -> Result<Vec<String>> {
        let labels: BTreeSet<String> = self
            .load()?
            .into_values()
            .filter(|task| !task.deleted)
            .flat_map(|task| task.labels)
            .collect();
        Ok(labels.into_iter().collect())
    }

    pub fn compact(&self, options: CompactOptions) -> Result<CompactReport> {
        compact::compact(&self.log, options)
    }
}

fn unchanged(tasks: &mut TaskMap, id: String, dep: String) -> Result<DepChange> {
    let task = tasks
        .remove(&id)
        .ok_or_else(|| Error::TaskNotFound(id.clone()))?;
    Ok(DepChange {
        task,
        dep,
        changed: false,
    })
}

fn resolve_dependency(tasks: &TaskMap, input: &str) -> Result<String> {
    resolve_id(tasks, input).map_err(|err| match err {
        Error::TaskNotFound(id) => Error::DependencyNotFound(id),
        other => other,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn normalize_labels(labels: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for label in labels {
        let label = label.trim();
        if !label.is_empty() && !out.iter().any(|existing| existing == label) {
            out.push(label.to_string());
        }
    }
    out
}
