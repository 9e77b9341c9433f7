//! Derived task snapshots.
//!
//! A `Task` is never persisted as-is; it is rebuilt by `replay` from the
//! event log on every read. The types here are shared by the event payloads
//! and the derived view.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Replayed state, keyed by task id. Ordered so iteration is deterministic.
pub type TaskMap = BTreeMap<String, Task>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Open,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }

    /// Single-character glyph used by the dependency tree.
    pub fn glyph(self) -> char {
        match self {
            TaskStatus::Open => '○',
            TaskStatus::InProgress => '◐',
            TaskStatus::Done => '●',
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(TaskStatus::Open),
            "in_progress" | "in-progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(Error::InvalidArgument(format!(
                "unknown task status '{other}' (expected open, in_progress, done)"
            ))),
        }
    }
}

/// Why a task was closed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Completed,
    Wontfix,
    Duplicate,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Completed => "completed",
            Resolution::Wontfix => "wontfix",
            Resolution::Duplicate => "duplicate",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency tiers. Declaration order is the sort order: lower is more urgent.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
    /// Parked work; never offered as ready.
    Backlog,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
        Priority::Backlog,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::Backlog => "backlog",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Priority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == normalized)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "unknown priority '{}' (expected critical, high, medium, low, backlog)",
                    s.trim()
                ))
            })
    }
}

/// Current state of one task, as derived from its events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    pub priority: Priority,
    pub deps: Vec<String>,
    pub labels: Vec<String>,
    /// What the task is. Last write wins.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// What happened. Newline-joined, append only.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

impl Task {
    pub fn is_active(&self) -> bool {
        !self.deleted && self.status != TaskStatus::Done
    }
}

/// Sort key shared by the ready list and the tree renderer:
/// priority ascending, then oldest first, then id.
pub fn by_priority_then_created(left: &Task, right: &Task) -> std::cmp::Ordering {
    left.priority
        .cmp(&right.priority)
        .then_with(|| left.created.cmp(&right.created))
        .then_with(|| left.id.cmp(&right.id))
}

/// Generate a fresh task id of the form `<prefix>-<hex>`.
///
/// The hex part is a truncated SHA-256 of the wall clock in nanoseconds and
/// 16 random bytes, so two ids minted in the same instant still differ.
pub fn generate_id(prefix: &str, len: usize) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(nanos.to_le_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    let digest = hasher.finalize();

    let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
    let len = len.min(hex.len());
    format!("{}-{}", prefix, &hex[..len])
}

/// Resolve a full id or unique prefix to a task id.
///
/// Exact matches win. Otherwise the input is matched as a prefix of the
/// full id or of the hex part after the `<prefix>-`. Tombstoned tasks are
/// never candidates.
pub fn resolve_id(tasks: &TaskMap, input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
    }

    let candidates = tasks.values().filter(|task| !task.deleted);

    let mut matches = Vec::new();
    for task in candidates {
        if task.id == trimmed {
            return Ok(task.id.clone());
        }
        if prefix_matches(&task.id, trimmed) {
            matches.push(task.id.clone());
        }
    }

    match matches.len() {
        0 => Err(Error::TaskNotFound(trimmed.to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(Error::AmbiguousId {
            prefix: trimmed.to_string(),
            matches,
        }),
    }
}

/// The single tombstoned task `input` names, by full id or unique prefix.
pub fn resolve_deleted_id(tasks: &TaskMap, input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut matches = tasks
        .values()
        .filter(|task| task.deleted)
        .filter(|task| task.id == trimmed || prefix_matches(&task.id, trimmed));
    match (matches.next(), matches.next()) {
        (Some(task), None) => Some(task.id.clone()),
        _ => None,
    }
}

fn prefix_matches(id: &str, input: &str) -> bool {
    let suffix = id.split_once('-').map(|(_, suffix)| suffix).unwrap_or(id);
    id.starts_with(input) || suffix.starts_with(input)
}


#[cfg(test)]
mod tests {
    use super::fixtures::{map, task};
    use super::*;

    #[test]
    fn generated_ids_have_prefix_and_length() {
        let id1 = generate_id("tl", 8);
        let id2 = generate_id("tl", 8);

        assert!(id1.starts_with("tl-"));
        assert_eq!(id1.len(), 11);
        assert!(id1[3..].chars().all(|ch| ch.is_ascii_hexdigit()));
        assert_ne!(id1, id2);
    }

    #[test]
    fn priority_order_puts_backlog_last() {
        let mut priorities = vec![Priority::Backlog, Priority::Low, Priority::Critical];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::Critical, Priority::Low, Priority::Backlog]
        );
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn status_parses_both_spellings() {
        assert_eq!("in-progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert!("closed".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn resolve_id_accepts_exact_and_prefix() {
        let tasks = map(vec![
            task("tl-ab12cd34", TaskStatus::Open, &[], 0),
            task("tl-ab99ee00", TaskStatus::Open, &[], 1),
            task("tl-f0f0f0f0", TaskStatus::Open, &[], 2),
        ]);

        assert_eq!(resolve_id(&tasks, "tl-ab12cd34").unwrap(), "tl-ab12cd34");
        assert_eq!(resolve_id(&tasks, "f0").unwrap(), "tl-f0f0f0f0");
        assert_eq!(resolve_id(&tasks, "tl-ab1").unwrap(), "tl-ab12cd34");

        match resolve_id(&tasks, "ab") {
            Err(Error::AmbiguousId { matches, .. }) => assert_eq!(matches.len(), 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }
        assert!(matches!(
            resolve_id(&tasks, "zz"),
            Err(Error::TaskNotFound(_))
        ));
    }

    #[test]
    fn resolve_id_skips_deleted() {
        let mut deleted = task("tl-dead0000", TaskStatus::Open, &[], 0);
        deleted.deleted = true;
        let tasks = map(vec![deleted, task("tl-deaf1111", TaskStatus::Open, &[], 1)]);

        assert_eq!(resolve_id(&tasks, "dea").unwrap(), "tl-deaf1111");
        assert!(matches!(
            resolve_id(&tasks, "tl-dead0000"),
            Err(Error::TaskNotFound(_))
        ));
    }

    #[test]
    fn resolve_deleted_id_finds_unique_tombstones() {
        let mut first = task("tl-dead0000", TaskStatus::Open, &[], 0);
        first.deleted = true;
        let mut second = task("tl-dead1111", TaskStatus::Done, &[], 1);
        second.deleted = true;
        let tasks = map(vec![first, second, task("tl-beef2222", TaskStatus::Open, &[], 2)]);

        assert_eq!(resolve_deleted_id(&tasks, "dead0").as_deref(), Some("tl-dead0000"));
        assert_eq!(
            resolve_deleted_id(&tasks, "tl-dead1111").as_deref(),
            Some("tl-dead1111")
        );
        assert_eq!(resolve_deleted_id(&tasks, "dead"), None);
        assert_eq!(resolve_deleted_id(&tasks, "beef"), None);
    }
}
