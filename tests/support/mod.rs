#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// A scratch project directory, optionally with `.tlog/` initialized.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    /// A project with `tlog init` already run.
    pub fn init() -> Self {
        let dir = Self::new();
        dir.cmd().arg("init").assert().success();
        dir
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn tlog_root(&self) -> PathBuf {
        self.dir.path().join(".tlog")
    }

    pub fn events_dir(&self) -> PathBuf {
        self.tlog_root().join("events")
    }

    /// `tlog` running inside this directory.
    pub fn cmd(&self) -> Command {
        let mut cmd = tlog_cmd();
        cmd.current_dir(self.path());
        cmd
    }

    /// Run a command with `--json` and return the parsed envelope. Panics
    /// unless the command succeeds.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("json envelope")
    }

    /// Create a task and return its id.
    pub fn create(&self, args: &[&str]) -> String {
        let mut full = vec!["create"];
        full.extend_from_slice(args);
        let value = self.json(&full);
        value["data"]["id"].as_str().expect("task id").to_string()
    }

    pub fn write_event_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.events_dir().join(name);
        fs::write(&path, contents).expect("write event file");
        path
    }

    /// Sorted names of files under `.tlog/events/`.
    pub fn event_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.events_dir())
            .expect("read events dir")
            .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub fn tlog_cmd() -> Command {
    let mut cmd = Command::cargo_bin("tlog").expect("binary");
    cmd.env_remove("TLOG_ROOT").env_remove("RUST_LOG");
    cmd
}

/// Ids of the tasks in a `list` or `ready` envelope, in output order.
pub fn task_ids(value: &Value) -> Vec<String> {
    value["data"]["tasks"]
        .as_array()
        .expect("tasks array")
        .iter()
        .map(|task| task["id"].as_str().expect("id").to_string())
        .collect()
}
