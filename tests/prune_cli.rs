mod support;

use serde_json::Value;

use support::{task_ids, TestDir};

const OLD_DAY: &str = "2020-01-01.jsonl";

const OLD_EVENTS: &str = r#"{"id":"tl-01d00001","ts":"2020-01-01T09:00:00Z","type":"create","title":"Old done"}
{"id":"tl-01d00002","ts":"2020-01-01T09:01:00Z","type":"create","title":"Old open","labels":["legacy"]}
{"id":"tl-01d00003","ts":"2020-01-01T09:02:00Z","type":"create","title":"Old deleted"}
{"id":"tl-01d00001","ts":"2020-01-01T10:00:00Z","type":"status","status":"done","resolution":"completed"}
{"id":"tl-01d00003","ts":"2020-01-01T10:01:00Z","type":"delete"}
"#;

/// A project with one historical day file and one task created today.
fn seeded() -> (TestDir, String) {
    let dir = TestDir::init();
    dir.write_event_file(OLD_DAY, OLD_EVENTS);
    let fresh = dir.create(&["Fresh"]);
    (dir, fresh)
}

fn compacted_lines(dir: &TestDir) -> Vec<Value> {
    let content = std::fs::read_to_string(dir.events_dir().join("compacted.jsonl"))
        .expect("compacted file");
    content
        .lines()
        .map(|line| serde_json::from_str(line).expect("snapshot line"))
        .collect()
}

#[test]
fn dry_run_reports_without_touching_files() {
    let (dir, _) = seeded();
    let before = dir.event_files();

    let report = dir.json(&["prune", "--dry-run"])["data"].clone();
    assert_eq!(report["status"], "dry_run");
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["files"], serde_json::json!([OLD_DAY]));
    assert_eq!(report["tasks_before"], 3);
    assert_eq!(report["tasks_after"], 1);
    assert_eq!(report["pruned"], 1);
    assert_eq!(report["deleted_dropped"], 1);

    assert_eq!(dir.event_files(), before);
}

#[test]
fn prune_rewrites_history_and_keeps_today() {
    let (dir, fresh) = seeded();
    let today = dir
        .event_files()
        .into_iter()
        .find(|name| name != OLD_DAY)
        .expect("today's file");

    let report = dir.json(&["prune"])["data"].clone();
    assert_eq!(report["status"], "pruned");
    assert_eq!(report["files_removed"], 1);

    let mut expected = vec!["compacted.jsonl".to_string(), today];
    expected.sort();
    assert_eq!(dir.event_files(), expected);

    let lines = compacted_lines(&dir);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["id"], "tl-01d00002");
    assert_eq!(lines[0]["type"], "create");
    assert_eq!(lines[0]["title"], "Old open");
    assert_eq!(lines[0]["labels"], serde_json::json!(["legacy"]));

    let mut remaining = task_ids(&dir.json(&["list", "--status", "all"]));
    remaining.sort();
    let mut want = vec!["tl-01d00002".to_string(), fresh];
    want.sort();
    assert_eq!(remaining, want);
}

#[test]
fn second_prune_has_nothing_to_do() {
    let (dir, _) = seeded();
    dir.cmd().arg("prune").assert().success();
    let files = dir.event_files();

    let report = dir.json(&["prune"])["data"].clone();
    assert_eq!(report["status"], "nothing_to_do");
    assert_eq!(dir.event_files(), files);
}

#[test]
fn keep_all_only_compacts() {
    let (dir, _) = seeded();

    let report = dir.json(&["prune", "--keep-all"])["data"].clone();
    assert_eq!(report["status"], "compacted");
    assert_eq!(report["pruned"], 0);
    assert_eq!(report["deleted_dropped"], 1);
    assert_eq!(report["tasks_after"], 2);

    let done = dir.json(&["show", "tl-01d00001"])["data"]["task"].clone();
    assert_eq!(done["status"], "done");
    assert_eq!(done["resolution"], "completed");
    assert_eq!(done["created"], "2020-01-01T09:00:00Z");
    assert_eq!(done["updated"], "2020-01-01T10:00:00Z");
}

#[test]
fn config_retention_applies_when_flags_are_omitted() {
    let (dir, _) = seeded();
    std::fs::write(
        dir.tlog_root().join("config.toml"),
        "[prune]\nsave_days = 36500\n",
    )
    .expect("write config");

    let report = dir.json(&["prune"])["data"].clone();
    assert_eq!(report["pruned"], 0);
    assert_eq!(report["tasks_after"], 2);

    let report = dir.json(&["prune", "--save-days", "0"])["data"].clone();
    assert_eq!(report["status"], "pruned");
    assert_eq!(report["pruned"], 1);
}

#[test]
fn only_today_means_nothing_to_do() {
    let dir = TestDir::init();
    dir.create(&["Today only"]);

    dir.cmd()
        .arg("prune")
        .assert()
        .success()
        .stdout(predicates::str::contains("nothing to do"));
}
