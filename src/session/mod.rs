//! Timed practice sessions.
//!
//! A session walks a fixed list of phases under a per-mode plan:
//!
//! ```text
//! restate_problem -> write_tests -> baseline_prompt -> implement
//!     -> invariant_prompt -> edge_cases -> done
//! ```
//!
//! [`SessionClock`] owns the transitions; callers drive it with `advance`,
//! `tick`, `finish` and `abandon` and drain [`SessionEvent`]s to render.

mod clock;
mod phase;

pub use clock::{
    CompletionStatus, Outcome, PhaseExit, PhaseLog, Session, SessionClock, SessionEvent,
};
pub use phase::{Phase, PhasePlan};
