//! Session clock: drives one timed attempt through the phase list.
//!
//! Phase targets are soft: with `auto_advance` on, `tick` moves past a phase
//! once its target elapses, otherwise the phase runs over and a single
//! overrun event is raised. The overall limit is hard: `tick` (and every
//! other operation, lazily) forces `Done` with status `TimedOut` once it is
//! exhausted, whatever phase is active.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Mode, Problem};
use crate::types::errors::RehearseError;
use crate::RehearseResult;

use super::phase::{Phase, PhasePlan};

/// Completion status of a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Running,
    Completed,
    TimedOut,
    Abandoned,
}

impl CompletionStatus {
    /// No further transitions are possible.
    pub fn is_final(&self) -> bool {
        !matches!(self, CompletionStatus::Running)
    }

    /// Eligible for a postmortem.
    pub fn is_recordable(&self) -> bool {
        matches!(self, CompletionStatus::Completed | CompletionStatus::TimedOut)
    }
}

impl std::fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionStatus::Running => write!(f, "running"),
            CompletionStatus::Completed => write!(f, "completed"),
            CompletionStatus::TimedOut => write!(f, "timed_out"),
            CompletionStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

impl FromStr for CompletionStatus {
    type Err = RehearseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(CompletionStatus::Running),
            "completed" => Ok(CompletionStatus::Completed),
            "timed_out" => Ok(CompletionStatus::TimedOut),
            "abandoned" => Ok(CompletionStatus::Abandoned),
            other => Err(RehearseError::config(format!("unknown completion status '{}'", other))),
        }
    }
}

/// Pass/fail against the problem's tests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail,
}

impl Outcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Pass)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Pass => write!(f, "pass"),
            Outcome::Fail => write!(f, "fail"),
        }
    }
}

impl FromStr for Outcome {
    type Err = RehearseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pass" | "passed" => Ok(Outcome::Pass),
            "fail" | "failed" => Ok(Outcome::Fail),
            other => Err(RehearseError::config(format!(
                "unknown outcome '{}' (expected 'pass' or 'fail')",
                other
            ))),
        }
    }
}

/// How a phase was left.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseExit {
    /// Practitioner signalled completion.
    Advanced,
    /// Target duration elapsed.
    AutoAdvanced,
    /// Overall limit interrupted the phase.
    TimedOut,
    /// Session finished early with an outcome.
    Finished,
    /// Session abandoned.
    Abandoned,
}

/// Time spent in one visited phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseLog {
    pub phase: Phase,
    pub entered_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub exit: PhaseExit,
}

/// Something the practitioner should see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A phase began; `prompt` comes from the mode's prompt set.
    PhaseEntered { phase: Phase, prompt: String },
    /// The active phase passed its target without advancing.
    PhaseOverrun { phase: Phase, target: Duration },
    /// The overall limit was reached while `truncated` was active.
    TimedOut { truncated: Option<Phase> },
    /// Completed before the limit.
    Finished { outcome: Outcome },
    /// Abandoned by the practitioner.
    Abandoned { phase: Phase },
}

/// One timed attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub mode: Mode,
    pub problem: Problem,
    pub started_at: DateTime<Utc>,
    pub plan: PhasePlan,
    pub phase: Phase,
    pub phase_started_at: DateTime<Utc>,
    /// Closed phases, in visiting order.
    pub phase_log: Vec<PhaseLog>,
    pub status: CompletionStatus,
    pub outcome: Option<Outcome>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Phase that was active when the overall limit hit.
    pub truncated_phase: Option<Phase>,
}

impl Session {
    /// Wall-clock time since start, frozen once the session ends.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> Duration {
        let end = self.ended_at.unwrap_or(now);
        between(self.started_at, end)
    }

    /// Time left before the hard limit.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        self.plan
            .overall_limit()
            .saturating_sub(self.elapsed_at(now))
    }

    /// Time in the active phase.
    pub fn phase_elapsed_at(&self, now: DateTime<Utc>) -> Duration {
        let end = self.ended_at.unwrap_or(now);
        between(self.phase_started_at, end)
    }

    /// Recorded time for a closed phase.
    pub fn phase_time(&self, phase: Phase) -> Option<Duration> {
        self.phase_log
            .iter()
            .find(|log| log.phase == phase)
            .map(|log| log.elapsed)
    }

    /// Phases visited so far, in order, including the active one.
    pub fn visited_phases(&self) -> Vec<Phase> {
        let mut visited: Vec<Phase> = self.phase_log.iter().map(|log| log.phase).collect();
        if visited.last() != Some(&self.phase) {
            visited.push(self.phase);
        }
        visited
    }

    /// Wall-clock time to solution; only meaningful once the session ended.
    pub fn time_to_solution(&self) -> Duration {
        self.ended_at
            .map(|end| between(self.started_at, end))
            .unwrap_or_default()
    }
}

fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).to_std().unwrap_or_default()
}

fn after(at: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| at.checked_add_signed(d))
        .unwrap_or(at)
}

/// Finite state machine over a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionClock {
    session: Session,
    auto_advance: bool,
    overrun_reported: bool,
    pending: Vec<SessionEvent>,
}

impl SessionClock {
    /// Starts a session for `problem_id` now.
    pub fn start(
        catalog: &Catalog,
        problem_id: &str,
        mode: Mode,
        plan: PhasePlan,
    ) -> RehearseResult<Self> {
        Self::start_at(catalog, problem_id, mode, plan, Utc::now())
    }

    /// Starts a session at an explicit instant. The problem must resolve in
    /// the catalog and belong to `mode`; nothing is created otherwise.
    pub fn start_at(
        catalog: &Catalog,
        problem_id: &str,
        mode: Mode,
        plan: PhasePlan,
        now: DateTime<Utc>,
    ) -> RehearseResult<Self> {
        let problem = catalog.get(problem_id).ok_or_else(|| {
            RehearseError::config(format!("problem '{}' is not in the catalog", problem_id))
        })?;

        if !mode.includes(problem.pattern) {
            return Err(RehearseError::config(format!(
                "problem '{}' ({}) is not part of the {} track",
                problem.id, problem.pattern, mode
            )));
        }

        if plan.overall_limit().is_zero() {
            return Err(RehearseError::config("overall session limit must be positive"));
        }

        let id = format!(
            "{}-{}",
            now.format("%Y%m%dT%H%M%S"),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );

        let first = Phase::RestateProblem;
        let prompt = plan.prompt(first).to_string();

        tracing::info!(
            session_id = %id,
            problem = %problem.id,
            mode = %mode,
            limit_secs = plan.overall_limit().as_secs(),
            "Session started"
        );

        Ok(Self {
            session: Session {
                id,
                mode,
                problem: problem.clone(),
                started_at: now,
                plan,
                phase: first,
                phase_started_at: now,
                phase_log: Vec::new(),
                status: CompletionStatus::Running,
                outcome: None,
                ended_at: None,
                truncated_phase: None,
            },
            auto_advance: true,
            overrun_reported: false,
            pending: vec![SessionEvent::PhaseEntered {
                phase: first,
                prompt,
            }],
        })
    }

    /// Enables or disables soft auto-advance on target expiry.
    pub fn with_auto_advance(mut self, enabled: bool) -> Self {
        self.auto_advance = enabled;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Consumes the clock, yielding the session.
    pub fn into_session(self) -> Session {
        self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn status(&self) -> CompletionStatus {
        self.session.status
    }

    /// Prompt of the active phase.
    pub fn current_prompt(&self) -> &str {
        self.session.plan.prompt(self.session.phase)
    }

    /// Events raised since the last call, oldest first.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Moves to the next phase.
    pub fn advance(&mut self) -> Phase {
        self.advance_at(Utc::now())
    }

    pub fn advance_at(&mut self, now: DateTime<Utc>) -> Phase {
        if self.enforce_limit(now) {
            return self.session.phase;
        }
        if self.session.status.is_final() || self.session.phase.is_done() {
            tracing::warn!(
                session_id = %self.session.id,
                status = %self.session.status,
                "advance() ignored: session has no further phases"
            );
            return self.session.phase;
        }

        self.close_phase(now, PhaseExit::Advanced);
        self.enter_next(now);
        self.session.phase
    }

    /// Checks the hard limit and applies soft auto-advance.
    pub fn tick(&mut self) -> CompletionStatus {
        self.tick_at(Utc::now())
    }

    pub fn tick_at(&mut self, now: DateTime<Utc>) -> CompletionStatus {
        if self.enforce_limit(now) || self.session.status.is_final() {
            return self.session.status;
        }

        loop {
            let phase = self.session.phase;
            if phase.is_done() {
                break;
            }
            let target = self.session.plan.target(phase);
            let boundary = after(self.session.phase_started_at, target);
            if now < boundary {
                break;
            }

            // The last timed phase and manual mode run over instead of moving on.
            if self.auto_advance && phase != Phase::EdgeCases {
                self.close_phase(boundary, PhaseExit::AutoAdvanced);
                self.enter_next(boundary);
                continue;
            }

            if !self.overrun_reported && !target.is_zero() {
                self.overrun_reported = true;
                tracing::debug!(session_id = %self.session.id, phase = %phase, "Phase overrun");
                self.pending.push(SessionEvent::PhaseOverrun { phase, target });
            }
            break;
        }

        self.session.status
    }

    /// Completes the session with an outcome. After a timeout the outcome is
    /// attached to the timed-out session instead.
    pub fn finish(&mut self, outcome: Outcome) -> CompletionStatus {
        self.finish_at(outcome, Utc::now())
    }

    pub fn finish_at(&mut self, outcome: Outcome, now: DateTime<Utc>) -> CompletionStatus {
        self.enforce_limit(now);

        match self.session.status {
            CompletionStatus::Running => {
                if !self.session.phase.is_done() {
                    self.close_phase(now, PhaseExit::Finished);
                    self.session.phase = Phase::Done;
                    self.session.phase_started_at = now;
                }
                self.session.status = CompletionStatus::Completed;
                self.session.outcome = Some(outcome);
                self.session.ended_at = Some(now);
                self.pending.push(SessionEvent::Finished { outcome });
                tracing::info!(
                    session_id = %self.session.id,
                    outcome = %outcome,
                    elapsed_secs = self.session.time_to_solution().as_secs(),
                    "Session completed"
                );
            }
            CompletionStatus::TimedOut if self.session.outcome.is_none() => {
                self.session.outcome = Some(outcome);
            }
            status => {
                tracing::warn!(
                    session_id = %self.session.id,
                    status = %status,
                    "finish() ignored: session already finished"
                );
            }
        }

        self.session.status
    }

    /// Abandons a running session. Abandoned sessions are never recorded.
    pub fn abandon(&mut self) -> CompletionStatus {
        self.abandon_at(Utc::now())
    }

    pub fn abandon_at(&mut self, now: DateTime<Utc>) -> CompletionStatus {
        if self.enforce_limit(now) || self.session.status.is_final() {
            return self.session.status;
        }

        let phase = self.session.phase;
        if !phase.is_done() {
            self.close_phase(now, PhaseExit::Abandoned);
        }
        self.session.status = CompletionStatus::Abandoned;
        self.session.ended_at = Some(now);
        self.pending.push(SessionEvent::Abandoned { phase });
        tracing::info!(session_id = %self.session.id, phase = %phase, "Session abandoned");

        self.session.status
    }

    /// Forces the timeout transition when the limit is exhausted. Returns
    /// `true` if it fired on this call.
    fn enforce_limit(&mut self, now: DateTime<Utc>) -> bool {
        if self.session.status.is_final() {
            return false;
        }
        let deadline = after(self.session.started_at, self.session.plan.overall_limit());
        if now < deadline {
            return false;
        }

        // Soft transitions that fell due before the deadline happen first.
        if self.auto_advance {
            self.advance_due_phases(deadline);
        }

        let truncated = (!self.session.phase.is_done()).then_some(self.session.phase);
        if truncated.is_some() {
            self.close_phase(deadline, PhaseExit::TimedOut);
        }
        self.session.phase = Phase::Done;
        self.session.phase_started_at = deadline;
        self.session.status = CompletionStatus::TimedOut;
        self.session.truncated_phase = truncated;
        self.session.ended_at = Some(deadline);

        self.pending.push(SessionEvent::TimedOut { truncated });
        self.pending.push(SessionEvent::PhaseEntered {
            phase: Phase::Done,
            prompt: self.session.plan.prompt(Phase::Done).to_string(),
        });

        tracing::info!(
            session_id = %self.session.id,
            truncated = ?truncated,
            "Session timed out"
        );
        true
    }

    fn advance_due_phases(&mut self, until: DateTime<Utc>) {
        loop {
            let phase = self.session.phase;
            if phase.is_done() || phase == Phase::EdgeCases {
                return;
            }
            let boundary = after(
                self.session.phase_started_at,
                self.session.plan.target(phase),
            );
            if boundary > until {
                return;
            }
            self.close_phase(boundary, PhaseExit::AutoAdvanced);
            self.enter_next(boundary);
        }
    }

    fn close_phase(&mut self, at: DateTime<Utc>, exit: PhaseExit) {
        let phase = self.session.phase;
        let elapsed = between(self.session.phase_started_at, at);
        self.session.phase_log.push(PhaseLog {
            phase,
            entered_at: self.session.phase_started_at,
            elapsed,
            exit,
        });
        tracing::debug!(
            session_id = %self.session.id,
            phase = %phase,
            elapsed_secs = elapsed.as_secs(),
            exit = ?exit,
            "Phase closed"
        );
    }

    fn enter_next(&mut self, at: DateTime<Utc>) {
        let Some(next) = self.session.phase.next() else {
            return;
        };
        self.session.phase = next;
        self.session.phase_started_at = at;
        self.overrun_reported = false;
        self.pending.push(SessionEvent::PhaseEntered {
            phase: next,
            prompt: self.session.plan.prompt(next).to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::config::ModePlanConfig;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn at_min(m: i64) -> DateTime<Utc> {
        t0() + chrono::Duration::minutes(m)
    }

    fn core_clock() -> SessionClock {
        let plan = PhasePlan::from_config(&ModePlanConfig::core());
        SessionClock::start_at(&Catalog::builtin(), "hashmap/two_sum", Mode::Core, plan, t0())
            .unwrap()
    }

    #[test]
    fn test_start_enters_restate() {
        let mut clock = core_clock();
        assert_eq!(clock.phase(), Phase::RestateProblem);
        assert_eq!(clock.status(), CompletionStatus::Running);
        assert!(clock.session().phase_log.is_empty());

        let events = clock.take_events();
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::PhaseEntered { phase: Phase::RestateProblem, .. }]
        ));
        assert!(clock.take_events().is_empty());
    }

    #[test]
    fn test_start_unknown_problem() {
        let plan = PhasePlan::from_config(&ModePlanConfig::core());
        let result =
            SessionClock::start_at(&Catalog::builtin(), "nope/missing", Mode::Core, plan, t0());
        assert!(matches!(result, Err(RehearseError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_start_rejects_problem_from_other_mode() {
        let plan = PhasePlan::from_config(&ModePlanConfig::core());
        let result = SessionClock::start_at(
            &Catalog::builtin(),
            "web_api/error_handling",
            Mode::Core,
            plan,
            t0(),
        );
        assert!(matches!(result, Err(RehearseError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_advance_stamps_elapsed() {
        let mut clock = core_clock();
        assert_eq!(clock.advance_at(at_min(3)), Phase::WriteTests);
        assert_eq!(
            clock.session().phase_time(Phase::RestateProblem),
            Some(Duration::from_secs(180))
        );
        assert_eq!(clock.session().phase_log[0].exit, PhaseExit::Advanced);
    }

    #[test]
    fn test_advance_after_done_is_noop() {
        let mut clock = core_clock();
        for m in 1..=6 {
            clock.advance_at(at_min(m));
        }
        assert_eq!(clock.phase(), Phase::Done);
        let logged = clock.session().phase_log.len();

        assert_eq!(clock.advance_at(at_min(7)), Phase::Done);
        assert_eq!(clock.session().phase_log.len(), logged);
        assert_eq!(clock.status(), CompletionStatus::Running);
    }

    #[test]
    fn test_auto_advance_through_prompt_phases() {
        let mut clock = core_clock();
        clock.take_events();

        // Restate (2) and write-tests (2) elapse; baseline checkpoint is zero-length.
        clock.tick_at(at_min(4));
        assert_eq!(clock.phase(), Phase::Implement);

        let entered: Vec<Phase> = clock
            .take_events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::PhaseEntered { phase, .. } => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            entered,
            vec![Phase::WriteTests, Phase::BaselinePrompt, Phase::Implement]
        );
        assert_eq!(
            clock.session().phase_time(Phase::WriteTests),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn test_manual_mode_reports_overrun_once() {
        let mut clock = core_clock().with_auto_advance(false);
        clock.take_events();

        clock.tick_at(at_min(3));
        clock.tick_at(at_min(4));
        assert_eq!(clock.phase(), Phase::RestateProblem);

        let events = clock.take_events();
        assert_eq!(
            events,
            vec![SessionEvent::PhaseOverrun {
                phase: Phase::RestateProblem,
                target: Duration::from_secs(120),
            }]
        );
    }

    #[test]
    fn test_timeout_during_implement() {
        let mut clock = core_clock().with_auto_advance(false);
        clock.advance_at(at_min(2));
        clock.advance_at(at_min(4));
        clock.advance_at(at_min(4));
        assert_eq!(clock.phase(), Phase::Implement);

        assert_eq!(clock.tick_at(at_min(36)), CompletionStatus::TimedOut);
        let session = clock.session();
        assert_eq!(session.phase, Phase::Done);
        assert_eq!(session.truncated_phase, Some(Phase::Implement));
        // Truncated at the deadline, not when the tick noticed it.
        assert_eq!(
            session.phase_time(Phase::Implement),
            Some(Duration::from_secs(31 * 60))
        );
        assert_eq!(session.time_to_solution(), Duration::from_secs(35 * 60));
        assert_eq!(session.phase_log.last().map(|l| l.exit), Some(PhaseExit::TimedOut));
    }

    #[test]
    fn test_lazy_timeout_on_advance() {
        let mut clock = core_clock().with_auto_advance(false);
        assert_eq!(clock.advance_at(at_min(40)), Phase::Done);
        assert_eq!(clock.status(), CompletionStatus::TimedOut);
        assert_eq!(clock.session().truncated_phase, Some(Phase::RestateProblem));
    }

    #[test]
    fn test_finish_early() {
        let mut clock = core_clock();
        clock.advance_at(at_min(1));
        assert_eq!(clock.finish_at(Outcome::Pass, at_min(9)), CompletionStatus::Completed);

        let session = clock.session();
        assert_eq!(session.outcome, Some(Outcome::Pass));
        assert_eq!(session.phase, Phase::Done);
        assert_eq!(session.time_to_solution(), Duration::from_secs(9 * 60));
        assert_eq!(
            session.visited_phases(),
            vec![Phase::RestateProblem, Phase::WriteTests, Phase::Done]
        );
    }

    #[test]
    fn test_finish_after_timeout_attaches_outcome() {
        let mut clock = core_clock();
        clock.tick_at(at_min(35));
        assert_eq!(clock.finish_at(Outcome::Fail, at_min(37)), CompletionStatus::TimedOut);
        assert_eq!(clock.session().outcome, Some(Outcome::Fail));
    }

    #[test]
    fn test_abandon() {
        let mut clock = core_clock();
        clock.take_events();
        assert_eq!(clock.abandon_at(at_min(5)), CompletionStatus::Abandoned);
        assert!(!clock.status().is_recordable());
        assert_eq!(
            clock.take_events(),
            vec![SessionEvent::Abandoned {
                phase: Phase::RestateProblem
            }]
        );
        // Nothing moves afterwards.
        assert_eq!(clock.tick_at(at_min(60)), CompletionStatus::Abandoned);
    }

    #[test]
    fn test_visited_phases_follow_fixed_order() {
        for stop_at in 0..40 {
            let mut clock = core_clock();
            clock.tick_at(at_min(stop_at));
            if clock.status() == CompletionStatus::Running {
                clock.finish_at(Outcome::Pass, at_min(stop_at));
            }
            let visited = clock.session().visited_phases();
            let mut previous: Option<Phase> = None;
            for phase in &visited {
                if let Some(prev) = previous {
                    assert!(prev < *phase, "{:?} visited out of order", visited);
                }
                previous = Some(*phase);
            }
            assert_eq!(visited.last(), Some(&Phase::Done));
        }
    }

    #[test]
    fn test_outcome_from_str() {
        assert_eq!("PASS".parse::<Outcome>().unwrap(), Outcome::Pass);
        assert_eq!("failed".parse::<Outcome>().unwrap(), Outcome::Fail);
        assert!("maybe".parse::<Outcome>().is_err());
    }
}
