//! tlog init command implementation
//!
//! Creates `.tlog/` with an empty event directory and a default config.

use std::path::PathBuf;

use crate::config::CONFIG_FILE;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::{self, EVENTS_DIR};

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    events_dir: PathBuf,
    config: PathBuf,
}

pub fn run(root: Option<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let project_dir = super::start_dir(root)?;
    let tlog_root = storage::init(&project_dir)?;

    let report = InitReport {
        events_dir: tlog_root.join(EVENTS_DIR),
        config: tlog_root.join(CONFIG_FILE),
        root: tlog_root,
    };

    let mut human = HumanOutput::new("tlog init: initialized");
    human.push_summary("root", report.root.display().to_string());
    human.push_next_step("tlog create \"<title>\"");

    emit_success(OutputOptions { json, quiet }, "init", &report, Some(&human))
}
