//! Log compaction
//!
//! Every file except today's is replayed and replaced by a single
//! `compacted.jsonl` holding one create snapshot per surviving task. A
//! snapshot is stamped with the task's original creation time, so replaying
//! it together with today's file gives the same state as replaying the full
//! history.
//!
//! Two kinds of task do not survive:
//! - tombstoned tasks, always
//! - done tasks, unless `keep_all` is set or `save_days` keeps them
//!
//! A real run holds the writer lock from the first listing until the last
//! delete, so no append can land in a file that is about to be removed.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::event::Event;
use crate::replay::replay;
use crate::storage::{day_file_name, EventLog, COMPACTED_FILE};
use crate::task::{Task, TaskStatus};

#[derive(Debug, Clone, Copy, Default)]
pub struct CompactOptions {
    /// Keep done tasks updated within this many days; 0 prunes every done task
    pub save_days: u32,
    /// Never prune done tasks
    pub keep_all: bool,
    /// Report only; touch nothing
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactStatus {
    NothingToDo,
    DryRun,
    /// History was rewritten; under `keep_all` this holds even when
    /// tombstones were dropped
    Compacted,
    /// At least one task was dropped by retention or as a tombstone
    Pruned,
}

impl CompactStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CompactStatus::NothingToDo => "nothing_to_do",
            CompactStatus::DryRun => "dry_run",
            CompactStatus::Compacted => "compacted",
            CompactStatus::Pruned => "pruned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactReport {
    pub status: CompactStatus,
    /// Files read as input
    pub files: Vec<String>,
    /// Files deleted (or that would be, on a dry run)
    pub files_removed: usize,
    pub tasks_before: usize,
    pub tasks_after: usize,
    /// Done tasks dropped by the retention policy
    pub pruned: usize,
    /// Tombstoned tasks dropped
    pub deleted_dropped: usize,
    pub dry_run: bool,
}

impl CompactReport {
    fn nothing_to_do(files: Vec<String>, tasks: usize, dry_run: bool) -> Self {
        Self {
            status: CompactStatus::NothingToDo,
            files,
            files_removed: 0,
            tasks_before: tasks,
            tasks_after: tasks,
            pruned: 0,
            deleted_dropped: 0,
            dry_run,
        }
    }
}

/// Compact everything but today's file.
pub fn compact(log: &EventLog, options: CompactOptions) -> Result<CompactReport> {
    compact_at(log, options, Utc::now())
}

/// Compact as if the current instant were `now`. "Today" and the retention
/// cutoff are both derived from it.
pub fn compact_at(
    log: &EventLog,
    options: CompactOptions,
    now: DateTime<Utc>,
) -> Result<CompactReport> {
    let _lock = if options.dry_run {
        None
    } else {
        Some(log.lock()?)
    };

    let today = day_file_name(now.date_naive());
    let files: Vec<String> = log
        .list_files()?
        .into_iter()
        .filter(|name| *name != today)
        .collect();

    if files.is_empty() {
        debug!(today = %today, "nothing to compact");
        return Ok(CompactReport::nothing_to_do(files, 0, options.dry_run));
    }

    let events = log.load_files(&files)?;
    let tasks = replay(&events);
    let cutoff = now - Duration::days(i64::from(options.save_days));

    let mut snapshots = Vec::new();
    let mut pruned = 0;
    let mut deleted_dropped = 0;
    for task in tasks.values() {
        if task.deleted {
            deleted_dropped += 1;
        } else if should_prune(task, &options, cutoff) {
            pruned += 1;
        } else {
            snapshots.push(Event::snapshot(task));
        }
    }
    snapshots.sort_by(|left, right| {
        left.timestamp
            .cmp(&right.timestamp)
            .then_with(|| left.id.cmp(&right.id))
    });

    let dropped = pruned + deleted_dropped;
    let only_snapshot = files.len() == 1 && files[0] == COMPACTED_FILE;
    if only_snapshot && dropped == 0 {
        debug!("compacted file already minimal");
        return Ok(CompactReport::nothing_to_do(
            files,
            tasks.len(),
            options.dry_run,
        ));
    }

    let rewrites_snapshot = !snapshots.is_empty();
    let files_removed = files
        .iter()
        .filter(|name| !rewrites_snapshot || name.as_str() != COMPACTED_FILE)
        .count();

    let status = if options.dry_run {
        CompactStatus::DryRun
    } else if options.keep_all {
        CompactStatus::Compacted
    } else if dropped > 0 {
        CompactStatus::Pruned
    } else {
        CompactStatus::Compacted
    };
    let report = CompactReport {
        status,
        files,
        files_removed,
        tasks_before: tasks.len(),
        tasks_after: snapshots.len(),
        pruned,
        deleted_dropped,
        dry_run: options.dry_run,
    };

    if options.dry_run {
        info!(
            files = report.files.len(),
            tasks_before = report.tasks_before,
            tasks_after = report.tasks_after,
            "dry run, log unchanged"
        );
        return Ok(report);
    }

    if rewrites_snapshot {
        log.write_file(COMPACTED_FILE, &snapshots)?;
    } else {
        log.delete_file(COMPACTED_FILE)?;
    }
    for name in report.files.iter().filter(|name| *name != COMPACTED_FILE) {
        log.delete_file(name)?;
    }

    info!(
        files_removed = report.files_removed,
        tasks_before = report.tasks_before,
        tasks_after = report.tasks_after,
        pruned = report.pruned,
        deleted_dropped = report.deleted_dropped,
        "compacted event log"
    );
    Ok(report)
}

fn should_prune(task: &Task, options: &CompactOptions, cutoff: DateTime<Utc>) -> bool {
    if options.keep_all || task.status != TaskStatus::Done {
        return false;
    }
    options.save_days == 0 || task.updated < cutoff
}
