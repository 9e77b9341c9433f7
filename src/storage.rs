//! Log storage for tlog
//!
//! All state lives in one directory next to the project:
//!
//! ```text
//! .tlog/
//!   config.toml                 # Optional settings
//!   tlog.lock                   # Advisory lock for writers
//!   events/
//!     2026-01-05.jsonl          # One append-only file per UTC day
//!     2026-01-06.jsonl
//!     compacted.jsonl           # Snapshot written by `tlog prune`
//! ```
//!
//! Appends are serialized across processes by `tlog.lock`. Reads take no
//! lock; a reader racing a writer may see a torn final line and should retry.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::config::{Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::lock::{self, FileLock};

/// Name of the state directory
pub const TLOG_DIR: &str = ".tlog";

/// Subdirectory holding the day files
pub const EVENTS_DIR: &str = "events";

/// Name of the advisory lock file inside `.tlog/`
pub const LOCK_FILE: &str = "tlog.lock";

/// File produced by compaction
pub const COMPACTED_FILE: &str = "compacted.jsonl";

const LOG_EXTENSION: &str = "jsonl";

/// Walk up from `start` looking for a `.tlog/` directory.
pub fn discover_root(start: &Path) -> Result<PathBuf> {
    for dir in start.ancestors() {
        let candidate = dir.join(TLOG_DIR);
        if candidate.is_dir() {
            debug!(root = %candidate.display(), "found tlog root");
            return Ok(candidate);
        }
    }
    Err(Error::NotInitialized(start.to_path_buf()))
}

/// Create `.tlog/` under `project_dir` with an empty event directory and a
/// default `config.toml`. Returns the new root.
pub fn init(project_dir: &Path) -> Result<PathBuf> {
    let root = project_dir.join(TLOG_DIR);
    if root.exists() {
        return Err(Error::AlreadyInitialized(root));
    }

    fs::create_dir_all(root.join(EVENTS_DIR))?;
    Config::default().save(&root.join(CONFIG_FILE))?;

    if project_dir.join(".git").is_dir() {
        if let Err(err) = exclude_lock_file(project_dir) {
            warn!(error = %err, "could not update .git/info/exclude");
        }
    }

    info!(root = %root.display(), "initialized tlog");
    Ok(root)
}

/// Keep the lock file out of `git status` without touching `.gitignore`.
fn exclude_lock_file(project_dir: &Path) -> io::Result<()> {
    let info_dir = project_dir.join(".git").join("info");
    fs::create_dir_all(&info_dir)?;
    let exclude = info_dir.join("exclude");
    let pattern = format!("{TLOG_DIR}/{LOCK_FILE}");

    let existing = match fs::read_to_string(&exclude) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err),
    };
    if existing.lines().any(|line| line.trim() == pattern) {
        return Ok(());
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&exclude)?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        writeln!(file)?;
    }
    writeln!(file, "{pattern}")?;
    Ok(())
}

/// File name of the day partition for `date`.
pub fn day_file_name(date: NaiveDate) -> String {
    format!("{}.{LOG_EXTENSION}", date.format("%Y-%m-%d"))
}

/// File name of the partition that receives today's appends.
pub fn today_file_name() -> String {
    day_file_name(Utc::now().date_naive())
}

/// Handle on a `.tlog/` directory
#[derive(Debug, Clone)]
pub struct EventLog {
    root: PathBuf,
    lock_timeout_ms: u64,
}

impl EventLog {
    pub fn new(root: PathBuf, lock_timeout_ms: u64) -> Self {
        Self {
            root,
            lock_timeout_ms,
        }
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    /// Path to the `.tlog/` directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn events_dir(&self) -> PathBuf {
        self.root.join(EVENTS_DIR)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.events_dir().join(name)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Take the directory-wide writer lock.
    pub fn lock(&self) -> Result<FileLock> {
        FileLock::acquire(self.lock_file(), self.lock_timeout_ms)
    }

    /// Append one event to today's file under the writer lock.
    pub fn append(&self, event: &Event) -> Result<()> {
        let _lock = self.lock()?;
        self.append_unlocked(&today_file_name(), event)
    }

    /// Append several events to today's file under a single lock hold.
    pub fn append_all(&self, events: &[Event]) -> Result<()> {
        let _lock = self.lock()?;
        let name = today_file_name();
        for event in events {
            self.append_unlocked(&name, event)?;
        }
        Ok(())
    }

    /// Append to a named file. Callers must already hold `lock()`.
    fn append_unlocked(&self, name: &str, event: &Event) -> Result<()> {
        let path = self.file_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        // One write per line so concurrent readers never see a split event.
        file.write_all(line.as_bytes())?;
        file.sync_all()?;

        debug!(
            file = name,
            id = %event.id,
            kind = event.kind.name(),
            "appended event"
        );
        Ok(())
    }

    /// Replace `name` with `events`, one per line, atomically.
    ///
    /// Only compaction rewrites files; it must hold `lock()` while doing so.
    pub fn write_file(&self, name: &str, events: &[Event]) -> Result<()> {
        let mut data = Vec::new();
        for event in events {
            serde_json::to_writer(&mut data, event)?;
            data.push(b'\n');
        }
        lock::replace_atomic(self.file_path(name), &data)?;
        debug!(file = name, events = events.len(), "rewrote log file");
        Ok(())
    }

    /// Remove a log file. Missing files are not an error.
    pub fn delete_file(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.file_path(name)) {
            Ok(()) => {
                debug!(file = name, "deleted log file");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::Io(err)),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Names of every log file, sorted lexicographically.
    ///
    /// Date names sort chronologically; `compacted.jsonl` sorts after them,
    /// which is harmless because `load_all` re-sorts by timestamp.
    pub fn list_files(&self) -> Result<Vec<String>> {
        let dir = self.events_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(Error::Io(err)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(LOG_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Parse every event in one file, in file order.
    ///
    /// Blank lines are skipped. Any other line that fails to parse aborts
    /// the load with its file and 1-based line number.
    pub fn load_file(&self, name: &str) -> Result<Vec<Event>> {
        let path = self.file_path(name);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(Error::Io(err)),
        };

        let reader = BufReader::new(file);
        let mut events = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: Event = serde_json::from_str(&line).map_err(|source| Error::Parse {
                file: path.clone(),
                line: index + 1,
                source,
            })?;
            events.push(event);
        }
        Ok(events)
    }

    /// Load the given files in order and merge them into timestamp order.
    ///
    /// The sort is stable, so events sharing a timestamp keep file order
    /// then line order.
    pub fn load_files(&self, names: &[String]) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        for name in names {
            events.extend(self.load_file(name)?);
        }
        events.sort_by_key(|event| event.timestamp);
        Ok(events)
    }

    /// Every event in the log, in replay order.
    pub fn load_all(&self) -> Result<Vec<Event>> {
        let names = self.list_files()?;
        let events = self.load_files(&names)?;
        debug!(files = names.len(), events = events.len(), "loaded event log");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DepAction, EventKind};
    use crate::task::fixtures::at;
    use tempfile::TempDir;

    fn create(id: &str, seconds: i64) -> Event {
        Event::new(
            id,
            at(seconds),
            EventKind::Create {
                title: format!("Task {id}"),
                status: None,
                resolution: None,
                priority: None,
                deps: Vec::new(),
                labels: Vec::new(),
                description: None,
                notes: None,
                commit: None,
                updated: None,
            },
        )
    }

    fn setup() -> (TempDir, EventLog) {
        let temp = TempDir::new().unwrap();
        let root = init(temp.path()).unwrap();
        let log = EventLog::new(root, 1000);
        (temp, log)
    }

    #[test]
    fn init_creates_layout_and_rejects_second_run() {
        let temp = TempDir::new().unwrap();
        let root = init(temp.path()).unwrap();

        assert!(root.join(EVENTS_DIR).is_dir());
        assert!(root.join(CONFIG_FILE).is_file());
        assert!(matches!(
            init(temp.path()),
            Err(Error::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn init_excludes_lock_file_from_git_once() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".git").join("info")).unwrap();
        fs::write(temp.path().join(".git/info/exclude"), "*.swp").unwrap();

        init(temp.path()).unwrap();
        exclude_lock_file(temp.path()).unwrap();

        let exclude = fs::read_to_string(temp.path().join(".git/info/exclude")).unwrap();
        assert_eq!(exclude, "*.swp\n.tlog/tlog.lock\n");
    }

    #[test]
    fn discover_walks_up_from_subdirectory() {
        let temp = TempDir::new().unwrap();
        let root = init(temp.path()).unwrap();
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(discover_root(&nested).unwrap(), root);
    }

    #[test]
    fn discover_without_root_is_not_initialized() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            discover_root(temp.path()),
            Err(Error::NotInitialized(_))
        ));
    }

    #[test]
    fn append_writes_todays_file() {
        let (_temp, log) = setup();
        log.append(&create("tl-1", 0)).unwrap();
        log.append(&create("tl-2", 1)).unwrap();

        assert_eq!(log.list_files().unwrap(), vec![today_file_name()]);
        let events = log.load_file(&today_file_name()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].id, "tl-2");
        assert!(log.lock_file().exists());
    }

    #[test]
    fn load_all_merges_files_by_timestamp() {
        let (_temp, log) = setup();
        log.write_file("2026-01-01.jsonl", &[create("tl-a", 30), create("tl-b", 10)])
            .unwrap();
        log.write_file("2026-01-02.jsonl", &[create("tl-c", 20)]).unwrap();

        let ids: Vec<_> = log
            .load_all()
            .unwrap()
            .into_iter()
            .map(|event| event.id)
            .collect();
        assert_eq!(ids, vec!["tl-b", "tl-c", "tl-a"]);
    }

    #[test]
    fn ties_keep_file_then_line_order() {
        let (_temp, log) = setup();
        let dep = Event::dep("tl-a", at(5), "tl-x", DepAction::Add);
        log.write_file("2026-01-02.jsonl", &[create("tl-late", 5)]).unwrap();
        log.write_file("2026-01-01.jsonl", &[create("tl-a", 5), dep]).unwrap();

        let first = log.load_all().unwrap();
        let second = log.load_all().unwrap();
        assert_eq!(first, second);
        let ids: Vec<_> = first.iter().map(|event| event.id.as_str()).collect();
        assert_eq!(ids, vec!["tl-a", "tl-a", "tl-late"]);
        assert_eq!(first[1].kind.name(), "dep");
    }

    #[test]
    fn malformed_line_fails_with_location() {
        let (_temp, log) = setup();
        let good = serde_json::to_string(&create("tl-1", 0)).unwrap();
        fs::write(
            log.events_dir().join("2026-01-01.jsonl"),
            format!("{good}\n\n{{not json\n"),
        )
        .unwrap();

        match log.load_all() {
            Err(Error::Parse { file, line, .. }) => {
                assert!(file.ends_with("2026-01-01.jsonl"));
                assert_eq!(line, 3);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn list_ignores_foreign_files() {
        let (_temp, log) = setup();
        fs::write(log.events_dir().join("notes.txt"), "x").unwrap();
        fs::create_dir(log.events_dir().join("sub.jsonl")).unwrap();
        log.write_file(COMPACTED_FILE, &[create("tl-1", 0)]).unwrap();
        log.write_file("2026-01-01.jsonl", &[create("tl-2", 1)]).unwrap();

        assert_eq!(
            log.list_files().unwrap(),
            vec!["2026-01-01.jsonl".to_string(), COMPACTED_FILE.to_string()]
        );
    }

    #[test]
    fn delete_missing_file_is_ok() {
        let (_temp, log) = setup();
        log.write_file("2026-01-01.jsonl", &[create("tl-1", 0)]).unwrap();
        log.delete_file("2026-01-01.jsonl").unwrap();
        log.delete_file("2026-01-01.jsonl").unwrap();
        assert!(log.list_files().unwrap().is_empty());
    }

    #[test]
    fn append_times_out_while_lock_held() {
        let temp = TempDir::new().unwrap();
        let root = init(temp.path()).unwrap();
        let log = EventLog::new(root, 50);

        let _held = log.lock().unwrap();
        assert!(matches!(
            log.append(&create("tl-1", 0)),
            Err(Error::LockFailed(_))
        ));
    }

    #[test]
    fn day_file_names_are_iso_dates() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(day_file_name(date), "2026-03-07.jsonl");
    }
}
