//! `PracticeEngine`: catalog, history, selector, clock and aggregator behind
//! one handle. The CLI is a thin layer over this type.

use crate::catalog::{Catalog, Mode, Pattern};
use crate::history::{recorder, HistoryStore, Postmortem, Reflection, VerifyReport};
use crate::hooks::HookSystem;
use crate::progress::{Aggregator, Dashboard, PatternStat, TrendPoint};
use crate::selector::Selector;
use crate::session::{CompletionStatus, Outcome, Phase, PhasePlan, SessionClock, SessionEvent};
use crate::types::config::Config;
use crate::types::errors::RehearseError;
use crate::RehearseResult;

/// How to start a session.
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub mode: Mode,
    /// Restrict selection to one pattern.
    pub pattern: Option<Pattern>,
    /// Skip selection and practise this problem.
    pub problem_id: Option<String>,
    /// Override the mode's overall limit; phase targets scale along.
    pub duration_mins: Option<u64>,
}

impl StartOptions {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            pattern: None,
            problem_id: None,
            duration_mins: None,
        }
    }

    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn with_problem(mut self, problem_id: impl Into<String>) -> Self {
        self.problem_id = Some(problem_id.into());
        self
    }

    pub fn with_duration(mut self, minutes: u64) -> Self {
        self.duration_mins = Some(minutes);
        self
    }
}

pub struct PracticeEngine {
    config: Config,
    catalog: Catalog,
    store: HistoryStore,
    hooks: HookSystem,
}

impl PracticeEngine {
    pub fn new(config: Config, catalog: Catalog, store: HistoryStore) -> Self {
        let hooks = HookSystem::from_config(&config.session);
        Self {
            config,
            catalog,
            store,
            hooks,
        }
    }

    /// Opens the catalog and history named by `config`.
    pub fn from_config(config: Config) -> RehearseResult<Self> {
        let catalog = Catalog::from_config(&config.catalog)?;
        let store = HistoryStore::from_config(&config.history)?;
        Ok(Self::new(config, catalog, store))
    }

    pub fn with_hooks(mut self, hooks: HookSystem) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub fn hooks(&self) -> &HookSystem {
        &self.hooks
    }

    /// Full history, oldest first.
    pub fn history(&self) -> RehearseResult<Vec<Postmortem>> {
        self.store.all()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Sessions
    // ═══════════════════════════════════════════════════════════════════════

    /// Selects a problem and starts the clock. `mode` and `pattern_filter`
    /// are parsed here so bad input fails before anything starts.
    pub fn start_session(
        &self,
        mode: &str,
        pattern_filter: Option<&str>,
    ) -> RehearseResult<SessionClock> {
        let mut options = StartOptions::new(mode.parse()?);
        if let Some(pattern) = pattern_filter {
            options = options.with_pattern(pattern.parse()?);
        }
        self.start(&options)
    }

    pub fn start(&self, options: &StartOptions) -> RehearseResult<SessionClock> {
        let mut plan = PhasePlan::from_config(self.config.session.plan_for(options.mode));
        if let Some(minutes) = options.duration_mins {
            if minutes == 0 {
                return Err(RehearseError::config("duration must be at least one minute"));
            }
            plan = plan.scaled_to(minutes);
        }

        let problem_id = match &options.problem_id {
            Some(id) => id.clone(),
            None => {
                let history = self.history()?;
                let selector = Selector::new(&self.catalog, &history, &self.config.progress);
                selector
                    .select(
                        options.mode,
                        options.pattern,
                        self.config.selector.exclude_recent,
                    )?
                    .id
                    .clone()
            }
        };

        let clock = SessionClock::start(&self.catalog, &problem_id, options.mode, plan)?;
        Ok(clock.with_auto_advance(self.config.session.auto_advance))
    }

    pub fn advance(&self, clock: &mut SessionClock) -> Phase {
        clock.advance()
    }

    pub fn tick(&self, clock: &mut SessionClock) -> CompletionStatus {
        clock.tick()
    }

    pub fn finish(&self, clock: &mut SessionClock, outcome: Outcome) -> CompletionStatus {
        clock.finish(outcome)
    }

    pub fn abandon(&self, clock: &mut SessionClock) -> CompletionStatus {
        clock.abandon()
    }

    /// Drains the clock's pending events through the hooks and hands them
    /// back for rendering.
    pub async fn dispatch(&self, clock: &mut SessionClock) -> RehearseResult<Vec<SessionEvent>> {
        let events = clock.take_events();
        let session = clock.session();

        for event in &events {
            match event {
                SessionEvent::PhaseEntered { phase, prompt } => {
                    self.hooks.run_phase_entered(session, *phase, prompt).await?;
                }
                SessionEvent::TimedOut { .. } => self.hooks.run_timed_out(session).await?,
                SessionEvent::Finished { .. } | SessionEvent::Abandoned { .. } => {
                    self.hooks.run_finished(session).await?
                }
                SessionEvent::PhaseOverrun { .. } => {}
            }
        }

        Ok(events)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Postmortems
    // ═══════════════════════════════════════════════════════════════════════

    /// Validates and stores the postmortem for a finished session.
    pub async fn record(
        &mut self,
        clock: &SessionClock,
        reflection: &Reflection,
    ) -> RehearseResult<Postmortem> {
        let postmortem = recorder::prepare(clock.session(), reflection)?;
        self.append(&postmortem).await
    }

    /// Appends an already prepared postmortem. Safe to call again after a
    /// failed write. Once the row is committed the call succeeds; a failing
    /// `Recorded` hook is only logged.
    pub async fn append(&mut self, postmortem: &Postmortem) -> RehearseResult<Postmortem> {
        let stored = self.store.append(postmortem)?;
        if let Err(e) = self.hooks.run_recorded(&stored).await {
            tracing::warn!(
                session_id = %stored.session_id,
                error = %e,
                "Recorded hook failed after the postmortem was stored"
            );
        }
        Ok(stored)
    }

    pub fn verify(&self) -> RehearseResult<VerifyReport> {
        self.store.verify()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Progress
    // ═══════════════════════════════════════════════════════════════════════

    pub fn weakest_pattern(&self, mode: Mode) -> RehearseResult<Option<Pattern>> {
        let history = self.history()?;
        Ok(Aggregator::new(&history, &self.config.progress).weakest_pattern(&self.catalog, mode))
    }

    pub fn bug_class_histogram(&self) -> RehearseResult<Vec<(String, usize)>> {
        let history = self.history()?;
        Ok(Aggregator::new(&history, &self.config.progress).bug_class_histogram())
    }

    pub fn trend(&self, pattern: Pattern) -> RehearseResult<Vec<TrendPoint>> {
        let history = self.history()?;
        let points = Aggregator::new(&history, &self.config.progress)
            .trend(pattern)
            .collect();
        Ok(points)
    }

    /// Patterns with catalog problems, weakest first.
    pub fn ranked_patterns(&self, mode: Mode) -> RehearseResult<Vec<PatternStat>> {
        let history = self.history()?;
        Ok(Aggregator::new(&history, &self.config.progress).ranked(&self.catalog, mode))
    }

    pub fn dashboard(&self, mode: Mode) -> RehearseResult<Dashboard> {
        let history = self.history()?;
        Ok(Aggregator::new(&history, &self.config.progress).dashboard(mode))
    }
}
