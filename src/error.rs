//! Error types for tlog
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task, rejected edit)
//! - 4: Operation failed (I/O, lock, corrupt log)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the tlog CLI
pub mod exit_codes {
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for tlog operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("not a tlog repository (or any parent): {0}")]
    NotInitialized(PathBuf),

    #[error("tlog already initialized: {0}")]
    AlreadyInitialized(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("dependency task not found: {0}")]
    DependencyNotFound(String),

    #[error("ambiguous prefix '{prefix}' matches {} tasks: {}", .matches.len(), .matches.join(", "))]
    AmbiguousId { prefix: String, matches: Vec<String> },

    #[error("circular dependency: adding {dep} as dependency of {task} would create a cycle")]
    CycleDetected { task: String, dep: String },

    #[error("task already deleted: {0}")]
    AlreadyDeleted(String),

    #[error("cannot {action} task {id}: task is {from}")]
    InvalidTransition {
        id: String,
        from: String,
        action: &'static str,
    },

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt event log {file}:{line}: {source}")]
    Parse {
        file: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NotInitialized(_)
            | Error::AlreadyInitialized(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::TaskNotFound(_)
            | Error::DependencyNotFound(_)
            | Error::AmbiguousId { .. }
            | Error::CycleDetected { .. }
            | Error::AlreadyDeleted(_)
            | Error::InvalidTransition { .. } => exit_codes::USER_ERROR,

            Error::Io(_)
            | Error::Json(_)
            | Error::Parse { .. }
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured context for JSON error output, when the error carries any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::AmbiguousId { prefix, matches } => Some(serde_json::json!({
                "prefix": prefix,
                "matches": matches,
            })),
            Error::CycleDetected { task, dep } => Some(serde_json::json!({
                "task": task,
                "dep": dep,
            })),
            Error::InvalidTransition { id, from, action } => Some(serde_json::json!({
                "id": id,
                "status": from,
                "action": action,
            })),
            Error::Parse { file, line, .. } => Some(serde_json::json!({
                "file": file,
                "line": line,
            })),
            _ => None,
        }
    }
}

/// Result type alias for tlog operations
pub type Result<T> = std::result::Result<T, Error>;
