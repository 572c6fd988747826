//! Built-in hooks:
//! - `LoggingHook`: structured log line per event
//! - `BellHook`: terminal bell on phase changes and timeout

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::session::Phase;
use crate::RehearseResult;

use super::{Hook, HookContext, HookEvent};

/// Logs each event through `tracing`.
#[derive(Debug)]
pub struct LoggingHook {
    event: HookEvent,
}

impl LoggingHook {
    pub fn new(event: HookEvent) -> Self {
        Self { event }
    }
}

#[async_trait]
impl Hook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    fn event(&self) -> HookEvent {
        self.event
    }

    async fn execute(&self, context: &HookContext<'_>) -> RehearseResult<()> {
        match context {
            HookContext::PhaseEntered { session, phase, .. } => {
                tracing::info!(
                    session_id = %session.id,
                    phase = %phase,
                    target_secs = session.plan.target(*phase).as_secs(),
                    "Phase entered"
                );
            }
            HookContext::TimedOut { session } => {
                tracing::warn!(
                    session_id = %session.id,
                    problem = %session.problem.id,
                    truncated = ?session.truncated_phase,
                    "Time limit reached"
                );
            }
            HookContext::Finished { session } => {
                tracing::info!(
                    session_id = %session.id,
                    status = %session.status,
                    outcome = ?session.outcome,
                    elapsed_secs = session.time_to_solution().as_secs(),
                    "Session finished"
                );
            }
            HookContext::Recorded { postmortem } => {
                tracing::info!(
                    session_id = %postmortem.session_id,
                    pattern = %postmortem.pattern,
                    outcome = %postmortem.outcome,
                    bug_class = ?postmortem.bug_class.as_ref().map(|c| c.to_string()),
                    "Postmortem stored"
                );
            }
        }

        Ok(())
    }
}

/// Rings the terminal bell (BEL on stderr).
#[derive(Debug)]
pub struct BellHook {
    event: HookEvent,
    rings: AtomicU64,
}

impl BellHook {
    pub fn new(event: HookEvent) -> Self {
        Self {
            event,
            rings: AtomicU64::new(0),
        }
    }

    /// How many times the bell rang.
    pub fn rings(&self) -> u64 {
        self.rings.load(Ordering::Relaxed)
    }

    fn ring(&self) -> RehearseResult<()> {
        let mut stderr = std::io::stderr();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        self.rings.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl Hook for BellHook {
    fn name(&self) -> &str {
        "bell"
    }

    fn event(&self) -> HookEvent {
        self.event
    }

    async fn execute(&self, context: &HookContext<'_>) -> RehearseResult<()> {
        match context {
            // The first phase starts with the session; no bell for it.
            HookContext::PhaseEntered { phase, .. } if *phase == Phase::RestateProblem => Ok(()),
            HookContext::PhaseEntered { .. } | HookContext::TimedOut { .. } => self.ring(),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Mode};
    use crate::session::{PhasePlan, Session, SessionClock};
    use crate::types::config::ModePlanConfig;

    fn test_session() -> Session {
        SessionClock::start(
            &Catalog::builtin(),
            "sorting/merge_intervals",
            Mode::Core,
            PhasePlan::from_config(&ModePlanConfig::core()),
        )
        .unwrap()
        .into_session()
    }

    #[test]
    fn test_logging_hook_name_and_event() {
        let hook = LoggingHook::new(HookEvent::Recorded);
        assert_eq!(hook.name(), "logging");
        assert_eq!(hook.event(), HookEvent::Recorded);
    }

    #[tokio::test]
    async fn test_logging_hook_execute() {
        let hook = LoggingHook::new(HookEvent::Finished);
        let session = test_session();
        hook.execute(&HookContext::Finished { session: &session })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bell_rings_on_later_phases_only() {
        let hook = BellHook::new(HookEvent::PhaseEntered);
        let session = test_session();

        hook.execute(&HookContext::PhaseEntered {
            session: &session,
            phase: Phase::RestateProblem,
            prompt: "",
        })
        .await
        .unwrap();
        assert_eq!(hook.rings(), 0);

        hook.execute(&HookContext::PhaseEntered {
            session: &session,
            phase: Phase::Implement,
            prompt: "",
        })
        .await
        .unwrap();
        assert_eq!(hook.rings(), 1);
    }

    #[tokio::test]
    async fn test_bell_rings_on_timeout() {
        let hook = BellHook::new(HookEvent::TimedOut);
        let session = test_session();
        hook.execute(&HookContext::TimedOut { session: &session })
            .await
            .unwrap();
        assert_eq!(hook.rings(), 1);
    }
}
