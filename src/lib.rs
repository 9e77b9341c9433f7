//! tlog - event-sourced task tracking
//!
//! Task state is never stored directly. Every change is an [`event::Event`]
//! appended to a per-day JSONL file under `.tlog/events/`, and the current
//! set of tasks is rebuilt by replaying those events in timestamp order.
//!
//! # Module Organization
//!
//! - `task`: task model, id generation and prefix resolution
//! - `event`: the event vocabulary and its wire format
//! - `replay`: folding events into a task map
//! - `graph`: ready list, cycle checks, tree and graph views
//! - `storage`: `.tlog/` discovery and the day-file event log
//! - `compact`: history compaction and retention pruning
//! - `store`: validated operations that tie the above together
//! - `lock`: directory lock and atomic file replacement
//! - `config`: `.tlog/config.toml`
//! - `output`: human and JSON output envelopes
//! - `cli`: command-line interface using clap

pub mod cli;
pub mod compact;
pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod lock;
pub mod output;
pub mod replay;
pub mod storage;
pub mod store;
pub mod task;

pub use error::{Error, Result};
