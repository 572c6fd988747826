//! Postmortem history: record model, recorder and the SQLite store.
//!
//! History is the only durable state. It is append-only; a correction is a
//! new postmortem, never an edit.

pub mod export;
pub mod postmortem;
pub mod recorder;
pub mod store;

pub use postmortem::{BugClass, Postmortem, Reflection, SELF_CONFIDENCE};
pub use store::{HistoryStore, VerifyReport};
