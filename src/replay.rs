//! Fold an ordered event sequence into the current task map.
//!
//! Pure: no I/O and no clock reads, so replaying the same sequence always
//! produces the same map. Events for ids that were never created are
//! ignored.

use crate::event::{DepAction, Event, EventKind};
use crate::task::{Task, TaskMap, TaskStatus};

/// Replay `events` in the order given.
pub fn replay<'a>(events: impl IntoIterator<Item = &'a Event>) -> TaskMap {
    let mut tasks = TaskMap::new();
    for event in events {
        apply_event(&mut tasks, event);
    }
    tasks
}

/// Apply one event to `tasks` using its kind's merge rule.
pub fn apply_event(tasks: &mut TaskMap, event: &Event) {
    if let EventKind::Create {
        title,
        status,
        resolution,
        priority,
        deps,
        labels,
        description,
        notes,
        commit,
        updated,
    } = &event.kind
    {
        let task = Task {
            id: event.id.clone(),
            title: title.clone(),
            status: status.unwrap_or(TaskStatus::Open),
            resolution: *resolution,
            priority: priority.unwrap_or_default(),
            deps: deps.clone(),
            labels: labels.clone(),
            description: description.clone().unwrap_or_default(),
            notes: notes.clone().unwrap_or_default(),
            commit: commit.clone(),
            created: event.timestamp,
            updated: updated.unwrap_or(event.timestamp),
            deleted: false,
        };
        tasks.insert(event.id.clone(), task);
        return;
    }

    let Some(task) = tasks.get_mut(&event.id) else {
        return;
    };

    match &event.kind {
        EventKind::Create { .. } => {}
        EventKind::Status {
            status,
            resolution,
            notes,
            commit,
        } => {
            task.status = *status;
            task.resolution = *resolution;
            task.commit = commit.clone();
            append_note(&mut task.notes, notes.as_deref());
        }
        EventKind::Dep { dep, action } => match action {
            DepAction::Add => {
                if !task.deps.contains(dep) {
                    task.deps.push(dep.clone());
                }
            }
            DepAction::Remove => task.deps.retain(|existing| existing != dep),
        },
        EventKind::Update {
            title,
            description,
            notes,
            labels,
            priority,
        } => {
            if let Some(title) = title.as_ref().filter(|value| !value.is_empty()) {
                task.title = title.clone();
            }
            if let Some(description) = description.as_ref().filter(|value| !value.is_empty()) {
                task.description = description.clone();
            }
            if let Some(priority) = priority {
                task.priority = *priority;
            }
            if let Some(labels) = labels {
                task.labels = labels.clone();
            }
            append_note(&mut task.notes, notes.as_deref());
        }
        EventKind::Delete { notes } => {
            task.deleted = true;
            append_note(&mut task.notes, notes.as_deref());
        }
    }
    task.updated = event.timestamp;
}

fn append_note(existing: &mut String, note: Option<&str>) {
    let Some(note) = note.filter(|note| !note.is_empty()) else {
        return;
    };
    if !existing.is_empty() {
        existing.push('\n');
    }
    existing.push_str(note);
}

#[cfg(test)]
pub(crate) mod builders {
    use super::*;
    use crate::task::fixtures::at;
    use crate::task::{Priority, Resolution};

    pub fn create(id: &str, seconds: i64) -> Event {
        create_with(id, seconds, &[], None)
    }

    pub fn create_with(id: &str, seconds: i64, deps: &[&str], priority: Option<Priority>) -> Event {
        Event::new(
            id,
            at(seconds),
            EventKind::Create {
                title: format!("Task {id}"),
                status: None,
                resolution: None,
                priority,
                deps: deps.iter().map(|dep| dep.to_string()).collect(),
                labels: Vec::new(),
                description: None,
                notes: None,
                commit: None,
                updated: None,
            },
        )
    }

    pub fn status(id: &str, seconds: i64, status: TaskStatus, notes: Option<&str>) -> Event {
        let resolution = (status == TaskStatus::Done).then_some(Resolution::Completed);
        Event::new(
            id,
            at(seconds),
            EventKind::Status {
                status,
                resolution,
                notes: notes.map(str::to_string),
                commit: None,
            },
        )
    }

    pub fn dep(id: &str, seconds: i64, dep: &str, action: DepAction) -> Event {
        Event::dep(id, at(seconds), dep, action)
    }

    pub fn delete(id: &str, seconds: i64) -> Event {
        Event::new(id, at(seconds), EventKind::Delete { notes: None })
    }
}
