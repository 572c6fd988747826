//! Progress signals derived from history: per-pattern confidence, weakest
//! pattern, bug-class frequency, time trends and the dashboard.
//!
//! Nothing is cached; every call recomputes from the history it is handed.

mod aggregator;
mod dashboard;
mod trend;

pub use aggregator::{confidence, Aggregator, PatternStat};
pub use dashboard::{pending_drills, streak, Dashboard, Drill, PatternRow, PatternStatus, PENDING_DRILLS};
pub use trend::{Trend, TrendPoint};
