//! Event model for the append-only task log
//!
//! One JSON object per line:
//!
//! ```text
//! {"id":"tl-1a2b3c4d","ts":"2026-01-05T10:00:00Z","type":"create","title":"Write docs"}
//! {"id":"tl-1a2b3c4d","ts":"2026-01-05T11:00:00Z","type":"status","status":"done","resolution":"completed"}
//! ```
//!
//! Each variant of `EventKind` carries only the fields its merge rule reads;
//! the per-kind fold lives in `replay`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{Priority, Resolution, Task, TaskStatus};

/// An immutable fact about one task id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Create {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<TaskStatus>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resolution: Option<Resolution>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<Priority>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        deps: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        labels: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        commit: Option<String>,
        /// Last-modified instant carried by compaction snapshots.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        updated: Option<DateTime<Utc>>,
    },
    Status {
        status: TaskStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resolution: Option<Resolution>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        commit: Option<String>,
    },
    Dep {
        dep: String,
        action: DepAction,
    },
    Update {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
        /// `Some(vec![])` clears every label; `None` leaves them alone.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        labels: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<Priority>,
    },
    Delete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Create { .. } => "create",
            EventKind::Status { .. } => "status",
            EventKind::Dep { .. } => "dep",
            EventKind::Update { .. } => "update",
            EventKind::Delete { .. } => "delete",
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl Event {
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>, kind: EventKind) -> Self {
        Self {
            id: id.into(),
            timestamp,
            kind,
        }
    }

    pub fn dep(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        dep: impl Into<String>,
        action: DepAction,
    ) -> Self {
        Self::new(
            id,
            timestamp,
            EventKind::Dep {
                dep: dep.into(),
                action,
            },
        )
    }

    /// A create event that reproduces `task` exactly when replayed alone.
    ///
    /// Stamped with the task's original creation time so it still sorts
    /// ahead of any later events for the same id.
    pub fn snapshot(task: &Task) -> Self {
        Self::new(
            task.id.clone(),
            task.created,
            EventKind::Create {
                title: task.title.clone(),
                status: Some(task.status),
                resolution: task.resolution,
                priority: Some(task.priority),
                deps: task.deps.clone(),
                labels: task.labels.clone(),
                description: non_empty(&task.description),
                notes: non_empty(&task.notes),
                commit: task.commit.clone(),
                updated: (task.updated != task.created).then_some(task.updated),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::fixtures::at;

    #[test]
    fn wire_format_uses_flat_tagged_objects() {
        let event = Event::dep("tl-aaaa0001", at(0), "tl-bbbb0002", DepAction::Add);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["id"], "tl-aaaa0001");
        assert_eq!(value["type"], "dep");
        assert_eq!(value["dep"], "tl-bbbb0002");
        assert_eq!(value["action"], "add");
        assert!(value["ts"].is_string());
    }

    #[test]
    fn minimal_create_line_parses_with_defaults() {
        let line = r#"{"id":"tl-1","ts":"2026-01-05T10:00:00Z","type":"create","title":"Docs"}"#;
        let event: Event = serde_json::from_str(line).unwrap();

        match event.kind {
            EventKind::Create {
                title,
                status,
                priority,
                deps,
                labels,
                ..
            } => {
                assert_eq!(title, "Docs");
                assert_eq!(status, None);
                assert_eq!(priority, None);
                assert!(deps.is_empty());
                assert!(labels.is_empty());
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn unset_optionals_are_omitted() {
        let event = Event::new(
            "tl-1",
            at(0),
            EventKind::Update {
                title: None,
                description: None,
                notes: Some("progress".to_string()),
                labels: Some(Vec::new()),
                priority: None,
            },
        );
        let line = serde_json::to_string(&event).unwrap();

        assert!(line.contains(r#""notes":"progress""#));
        assert!(line.contains(r#""labels":[]"#));
        assert!(!line.contains("title"));
        assert!(!line.contains("priority"));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let line = r#"{"id":"tl-1","ts":"2026-01-05T10:00:00Z","type":"block","block":"tl-2"}"#;
        assert!(serde_json::from_str::<Event>(line).is_err());
    }
}
