//! # rehearse
//!
//! Timed rehearsal for coding interviews.
//!
//! A session walks through fixed phases under a hard time limit. When it
//! ends, a short postmortem is appended to a local, append-only history.
//! That history drives problem selection toward weak patterns and feeds the
//! progress dashboard.
//!
//! ## Modules
//!
//! - [`catalog`] - Problems, patterns and modes
//! - [`session`] - Phase state machine and session clock
//! - [`history`] - Postmortems and the append-only store
//! - [`selector`] - Next-problem selection
//! - [`progress`] - Per-pattern statistics, trends and dashboard
//! - [`hooks`] - Session event hooks
//! - [`engine`] - Everything above behind one handle
//! - [`cli`] - Command-line interface
//! - [`types`] - Configuration and errors

pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod engine;
pub mod history;
pub mod hooks;
pub mod progress;
pub mod selector;
pub mod session;
pub mod types;

pub use engine::{PracticeEngine, StartOptions};
pub use types::config::Config;
pub use types::errors::{RehearseError, RehearseResult};
