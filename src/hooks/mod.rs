//! Session hook system.
//!
//! Hooks observe a session at fixed points:
//!
//! - `phase_entered`: a new phase began (including `done` after a timeout)
//! - `timed_out`: the overall limit was reached
//! - `finished`: the session completed or was abandoned
//! - `recorded`: a postmortem landed in history
//!
//! Hooks only observe; they cannot change the session.

mod builtin;

pub use builtin::{BellHook, LoggingHook};

use async_trait::async_trait;

use crate::history::Postmortem;
use crate::session::{Phase, Session};
use crate::types::config::SessionConfig;
use crate::RehearseResult;

/// Point in a session that fires hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    PhaseEntered,
    TimedOut,
    Finished,
    Recorded,
}

impl HookEvent {
    pub const ALL: [HookEvent; 4] = [
        HookEvent::PhaseEntered,
        HookEvent::TimedOut,
        HookEvent::Finished,
        HookEvent::Recorded,
    ];
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookEvent::PhaseEntered => write!(f, "phase_entered"),
            HookEvent::TimedOut => write!(f, "timed_out"),
            HookEvent::Finished => write!(f, "finished"),
            HookEvent::Recorded => write!(f, "recorded"),
        }
    }
}

/// Data handed to hooks.
pub enum HookContext<'a> {
    PhaseEntered {
        session: &'a Session,
        phase: Phase,
        prompt: &'a str,
    },
    TimedOut {
        session: &'a Session,
    },
    Finished {
        session: &'a Session,
    },
    Recorded {
        postmortem: &'a Postmortem,
    },
}

impl HookContext<'_> {
    pub fn event(&self) -> HookEvent {
        match self {
            HookContext::PhaseEntered { .. } => HookEvent::PhaseEntered,
            HookContext::TimedOut { .. } => HookEvent::TimedOut,
            HookContext::Finished { .. } => HookEvent::Finished,
            HookContext::Recorded { .. } => HookEvent::Recorded,
        }
    }
}

/// A session observer.
#[async_trait]
pub trait Hook: Send + Sync {
    fn name(&self) -> &str;

    /// Event this hook listens to.
    fn event(&self) -> HookEvent;

    async fn execute(&self, context: &HookContext<'_>) -> RehearseResult<()>;
}

/// Registered hooks, grouped by event and run in registration order.
pub struct HookSystem {
    phase_entered: Vec<Box<dyn Hook>>,
    timed_out: Vec<Box<dyn Hook>>,
    finished: Vec<Box<dyn Hook>>,
    recorded: Vec<Box<dyn Hook>>,
}

impl HookSystem {
    pub fn new() -> Self {
        Self {
            phase_entered: Vec::new(),
            timed_out: Vec::new(),
            finished: Vec::new(),
            recorded: Vec::new(),
        }
    }

    /// Logging on every event.
    pub fn with_defaults() -> Self {
        let mut system = Self::new();
        for event in HookEvent::ALL {
            system.register(Box::new(LoggingHook::new(event)));
        }
        system
    }

    /// Defaults plus the terminal bell when `session.bell` is on.
    pub fn from_config(config: &SessionConfig) -> Self {
        let mut system = Self::with_defaults();
        if config.bell {
            system.register(Box::new(BellHook::new(HookEvent::PhaseEntered)));
            system.register(Box::new(BellHook::new(HookEvent::TimedOut)));
        }
        system
    }

    pub fn register(&mut self, hook: Box<dyn Hook>) {
        let event = hook.event();
        tracing::debug!(hook_name = hook.name(), event = %event, "Registering hook");

        match event {
            HookEvent::PhaseEntered => self.phase_entered.push(hook),
            HookEvent::TimedOut => self.timed_out.push(hook),
            HookEvent::Finished => self.finished.push(hook),
            HookEvent::Recorded => self.recorded.push(hook),
        }
    }

    /// Runs every hook registered for the context's event. Stops at the
    /// first error.
    pub async fn run(&self, context: &HookContext<'_>) -> RehearseResult<()> {
        for hook in self.hooks_for(context.event()) {
            hook.execute(context).await?;
        }
        Ok(())
    }

    pub async fn run_phase_entered(
        &self,
        session: &Session,
        phase: Phase,
        prompt: &str,
    ) -> RehearseResult<()> {
        self.run(&HookContext::PhaseEntered {
            session,
            phase,
            prompt,
        })
        .await
    }

    pub async fn run_timed_out(&self, session: &Session) -> RehearseResult<()> {
        self.run(&HookContext::TimedOut { session }).await
    }

    pub async fn run_finished(&self, session: &Session) -> RehearseResult<()> {
        self.run(&HookContext::Finished { session }).await
    }

    pub async fn run_recorded(&self, postmortem: &Postmortem) -> RehearseResult<()> {
        self.run(&HookContext::Recorded { postmortem }).await
    }

    fn hooks_for(&self, event: HookEvent) -> &[Box<dyn Hook>] {
        match event {
            HookEvent::PhaseEntered => &self.phase_entered,
            HookEvent::TimedOut => &self.timed_out,
            HookEvent::Finished => &self.finished,
            HookEvent::Recorded => &self.recorded,
        }
    }

    pub fn count(&self) -> usize {
        HookEvent::ALL.iter().map(|e| self.count_for_event(*e)).sum()
    }

    pub fn count_for_event(&self, event: HookEvent) -> usize {
        self.hooks_for(event).len()
    }
}

impl Default for HookSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Mode};
    use crate::session::{PhasePlan, SessionClock};
    use crate::types::config::ModePlanConfig;
    use crate::types::errors::RehearseError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHook {
        name: String,
        event: HookEvent,
        count: Arc<AtomicUsize>,
    }

    impl CountingHook {
        fn new(name: &str, event: HookEvent, count: Arc<AtomicUsize>) -> Self {
            Self {
                name: name.to_string(),
                event,
                count,
            }
        }
    }

    #[async_trait]
    impl Hook for CountingHook {
        fn name(&self) -> &str {
            &self.name
        }

        fn event(&self) -> HookEvent {
            self.event
        }

        async fn execute(&self, _context: &HookContext<'_>) -> RehearseResult<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingHook;

    #[async_trait]
    impl Hook for FailingHook {
        fn name(&self) -> &str {
            "failing"
        }

        fn event(&self) -> HookEvent {
            HookEvent::Finished
        }

        async fn execute(&self, _context: &HookContext<'_>) -> RehearseResult<()> {
            Err(RehearseError::other("hook failed"))
        }
    }

    fn test_session() -> Session {
        SessionClock::start(
            &Catalog::builtin(),
            "hashmap/two_sum",
            Mode::Core,
            PhasePlan::from_config(&ModePlanConfig::core()),
        )
        .unwrap()
        .into_session()
    }

    #[test]
    fn test_hook_system_new() {
        assert_eq!(HookSystem::new().count(), 0);
    }

    #[test]
    fn test_with_defaults_logs_every_event() {
        let system = HookSystem::with_defaults();
        for event in HookEvent::ALL {
            assert_eq!(system.count_for_event(event), 1);
        }
    }

    #[test]
    fn test_from_config_bell_toggle() {
        let mut config = SessionConfig::default();
        let with_bell = HookSystem::from_config(&config);
        assert_eq!(with_bell.count_for_event(HookEvent::PhaseEntered), 2);

        config.bell = false;
        let quiet = HookSystem::from_config(&config);
        assert_eq!(quiet.count_for_event(HookEvent::PhaseEntered), 1);
    }

    #[tokio::test]
    async fn test_run_only_matching_event() {
        let mut system = HookSystem::new();
        let entered = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        system.register(Box::new(CountingHook::new(
            "entered",
            HookEvent::PhaseEntered,
            entered.clone(),
        )));
        system.register(Box::new(CountingHook::new(
            "finished",
            HookEvent::Finished,
            finished.clone(),
        )));

        let session = test_session();
        system
            .run_phase_entered(&session, Phase::WriteTests, "write tests")
            .await
            .unwrap();

        assert_eq!(entered.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_multiple_hooks_chain() {
        let mut system = HookSystem::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        system.register(Box::new(CountingHook::new(
            "first",
            HookEvent::TimedOut,
            first.clone(),
        )));
        system.register(Box::new(CountingHook::new(
            "second",
            HookEvent::TimedOut,
            second.clone(),
        )));

        system.run_timed_out(&test_session()).await.unwrap();

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_stops_chain() {
        let mut system = HookSystem::new();
        let after = Arc::new(AtomicUsize::new(0));
        system.register(Box::new(FailingHook));
        system.register(Box::new(CountingHook::new(
            "after",
            HookEvent::Finished,
            after.clone(),
        )));

        assert!(system.run_finished(&test_session()).await.is_err());
        assert_eq!(after.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_hook_event_display() {
        assert_eq!(HookEvent::PhaseEntered.to_string(), "phase_entered");
        assert_eq!(HookEvent::TimedOut.to_string(), "timed_out");
        assert_eq!(HookEvent::Finished.to_string(), "finished");
        assert_eq!(HookEvent::Recorded.to_string(), "recorded");
    }
}
