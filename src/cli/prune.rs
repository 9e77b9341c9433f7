//! tlog prune command implementation
//!
//! Folds every day file except today's into `compacted.jsonl`, dropping
//! deleted tasks and (unless told otherwise) done tasks past retention.

use std::path::PathBuf;

use crate::compact::{CompactOptions, CompactReport, CompactStatus};
use crate::config::PruneConfig;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};

pub struct PruneOptions {
    /// Overrides `prune.save_days` from config
    pub save_days: Option<u32>,
    /// Forces keep-all on; config can also enable it
    pub keep_all: bool,
    pub dry_run: bool,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub fn run(options: PruneOptions) -> Result<()> {
    let store = super::open_store(options.root.clone())?;
    let compact_options = effective_options(&options, &store.config().prune);
    let report = store.compact(compact_options)?;

    let human = report_human(&report, &compact_options);
    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "prune",
        &report,
        Some(&human),
    )
}

fn effective_options(options: &PruneOptions, config: &PruneConfig) -> CompactOptions {
    CompactOptions {
        save_days: options.save_days.unwrap_or(config.save_days),
        keep_all: options.keep_all || config.keep_all,
        dry_run: options.dry_run,
    }
}

fn report_human(report: &CompactReport, options: &CompactOptions) -> HumanOutput {
    let mut human = HumanOutput::new(format!(
        "tlog prune: {}",
        report.status.as_str().replace('_', " ")
    ));
    if report.status == CompactStatus::NothingToDo {
        return human;
    }

    human.push_summary("files", report.files.len().to_string());
    human.push_summary("files removed", report.files_removed.to_string());
    human.push_summary(
        "tasks",
        format!("{} -> {}", report.tasks_before, report.tasks_after),
    );
    human.push_summary("done pruned", report.pruned.to_string());
    human.push_summary("deleted dropped", report.deleted_dropped.to_string());
    if options.keep_all {
        human.push_summary("retention", "keep all");
    } else if options.save_days == 0 {
        human.push_summary("retention", "drop every done task");
    } else {
        human.push_summary("retention", format!("{} days", options.save_days));
    }

    for file in &report.files {
        human.push_detail(file.clone());
    }
    if report.status == CompactStatus::DryRun {
        human.push_next_step("tlog prune");
    }
    human
}
