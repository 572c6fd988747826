//! Session phases and the per-mode phase plan.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::config::{ModePlanConfig, PhasePrompts};

/// One ordered stage of a timed session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    RestateProblem,
    WriteTests,
    BaselinePrompt,
    Implement,
    InvariantPrompt,
    EdgeCases,
    Done,
}

impl Phase {
    /// The fixed phase order.
    pub const ORDER: [Phase; 7] = [
        Phase::RestateProblem,
        Phase::WriteTests,
        Phase::BaselinePrompt,
        Phase::Implement,
        Phase::InvariantPrompt,
        Phase::EdgeCases,
        Phase::Done,
    ];

    /// Position in [`Phase::ORDER`].
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The phase after this one, `None` for `Done`.
    pub fn next(&self) -> Option<Phase> {
        Self::ORDER.get(self.index() + 1).copied()
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Phase::Done)
    }

    /// Human-readable heading.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::RestateProblem => "Restate & pick pattern",
            Phase::WriteTests => "Write tests first",
            Phase::BaselinePrompt => "Baseline checkpoint",
            Phase::Implement => "Implement",
            Phase::InvariantPrompt => "Invariant checkpoint",
            Phase::EdgeCases => "Edge cases & cleanup",
            Phase::Done => "Done",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::RestateProblem => "restate_problem",
            Phase::WriteTests => "write_tests",
            Phase::BaselinePrompt => "baseline_prompt",
            Phase::Implement => "implement",
            Phase::InvariantPrompt => "invariant_prompt",
            Phase::EdgeCases => "edge_cases",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Resolved timing and prompts for one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhasePlan {
    overall_limit: Duration,
    targets: [Duration; 6],
    prompts: PhasePrompts,
}

impl PhasePlan {
    /// Builds a plan from a mode's configuration.
    pub fn from_config(config: &ModePlanConfig) -> Self {
        let t = &config.targets;
        let minutes = |m: u64| Duration::from_secs(m * 60);
        Self {
            overall_limit: minutes(config.overall_limit_mins),
            targets: [
                minutes(t.restate_problem),
                minutes(t.write_tests),
                minutes(t.baseline_prompt),
                minutes(t.implement),
                minutes(t.invariant_prompt),
                minutes(t.edge_cases),
            ],
            prompts: config.prompts.clone(),
        }
    }

    /// Rescales the plan to a new overall limit. Every non-zero phase target
    /// scales by the same ratio and never drops below one minute.
    pub fn scaled_to(mut self, overall_limit_mins: u64) -> Self {
        let old = self.overall_limit.as_secs_f64();
        let new = Duration::from_secs(overall_limit_mins * 60);
        if old > 0.0 {
            let ratio = new.as_secs_f64() / old;
            for target in self.targets.iter_mut().filter(|t| !t.is_zero()) {
                let whole_minutes = ((target.as_secs_f64() * ratio) / 60.0).floor() as u64;
                *target = Duration::from_secs(whole_minutes.max(1) * 60);
            }
        }
        self.overall_limit = new;
        self
    }

    /// Hard limit for the whole session.
    pub fn overall_limit(&self) -> Duration {
        self.overall_limit
    }

    /// Soft target for `phase`; zero for `Done`.
    pub fn target(&self, phase: Phase) -> Duration {
        self.targets
            .get(phase.index())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Prompt surfaced when `phase` is entered.
    pub fn prompt(&self, phase: Phase) -> &str {
        let p = &self.prompts;
        match phase {
            Phase::RestateProblem => &p.restate_problem,
            Phase::WriteTests => &p.write_tests,
            Phase::BaselinePrompt => &p.baseline_prompt,
            Phase::Implement => &p.implement,
            Phase::InvariantPrompt => &p.invariant_prompt,
            Phase::EdgeCases => &p.edge_cases,
            Phase::Done => &p.done,
        }
    }
}
