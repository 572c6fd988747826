//! Progress dashboard: streak, open drills and per-pattern status.

use std::collections::BTreeSet;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde::Serialize;

use crate::catalog::{Mode, Pattern};
use crate::history::Postmortem;

use super::aggregator::{Aggregator, PatternStat};

/// How many recent micro-drills the dashboard lists.
pub const PENDING_DRILLS: usize = 10;

/// Coarse standing of a pattern.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatternStatus {
    NotStarted,
    NeedsWork,
    Practicing,
    Mastered,
}

impl std::fmt::Display for PatternStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternStatus::NotStarted => write!(f, "not_started"),
            PatternStatus::NeedsWork => write!(f, "needs_work"),
            PatternStatus::Practicing => write!(f, "practicing"),
            PatternStatus::Mastered => write!(f, "mastered"),
        }
    }
}

/// A micro-drill still worth repeating.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Drill {
    pub pattern: Pattern,
    pub problem_id: String,
    pub drill: String,
}

/// One row of the pattern table.
#[derive(Debug, Clone, Serialize)]
pub struct PatternRow {
    #[serde(flatten)]
    pub stat: PatternStat,
    pub status: PatternStatus,
}

/// Summary of a mode's progress.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub mode: Mode,
    pub total_sessions: usize,
    pub passes: usize,
    pub streak_days: u32,
    pub pending_drills: Vec<Drill>,
    pub patterns: Vec<PatternRow>,
}

impl Aggregator<'_> {
    /// Classifies a pattern from its stat.
    pub fn status(&self, stat: &PatternStat) -> PatternStatus {
        let config = self.config();
        if stat.attempts == 0 {
            PatternStatus::NotStarted
        } else if stat.attempts >= config.min_samples
            && stat.confidence >= config.mastery_threshold
        {
            PatternStatus::Mastered
        } else if stat.confidence >= config.reliable_threshold {
            PatternStatus::Practicing
        } else {
            PatternStatus::NeedsWork
        }
    }

    /// Builds the dashboard for `mode` as of today.
    pub fn dashboard(&self, mode: Mode) -> Dashboard {
        self.dashboard_on(mode, Utc::now().date_naive())
    }

    pub fn dashboard_on(&self, mode: Mode, today: NaiveDate) -> Dashboard {
        let in_mode: Vec<&Postmortem> =
            self.history().iter().filter(|p| p.mode == mode).collect();

        let patterns = self
            .pattern_stats(mode)
            .into_iter()
            .map(|stat| PatternRow {
                status: self.status(&stat),
                stat,
            })
            .collect();

        Dashboard {
            mode,
            total_sessions: in_mode.len(),
            passes: in_mode.iter().filter(|p| p.is_pass()).count(),
            streak_days: streak(self.history(), today),
            pending_drills: pending_drills(in_mode.iter().copied(), PENDING_DRILLS),
            patterns,
        }
    }
}

/// Consecutive days with at least one postmortem, ending today or, if
/// nothing was recorded today yet, yesterday.
pub fn streak(history: &[Postmortem], today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = history
        .iter()
        .map(|p| p.recorded_at.date_naive())
        .collect();

    let mut day = if days.contains(&today) {
        today
    } else {
        today - ChronoDuration::days(1)
    };

    let mut count = 0;
    while days.contains(&day) {
        count += 1;
        day -= ChronoDuration::days(1);
    }
    count
}

/// The most recent non-empty micro-drills, newest first.
pub fn pending_drills<'a, I>(records: I, limit: usize) -> Vec<Drill>
where
    I: DoubleEndedIterator<Item = &'a Postmortem>,
{
    records
        .rev()
        .filter(|p| !p.micro_drill.trim().is_empty())
        .take(limit)
        .map(|p| Drill {
            pattern: p.pattern,
            problem_id: p.problem_id.clone(),
            drill: p.micro_drill.clone(),
        })
        .collect()
}
