//! Per-pattern statistics and weak-spot ranking.
//!
//! Everything here is a pure function of the history slice it is given.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::{Catalog, Mode, Pattern};
use crate::history::Postmortem;
use crate::types::config::ProgressConfig;

use super::trend::Trend;

/// Derived statistics for one pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternStat {
    pub pattern: Pattern,
    pub attempts: usize,
    pub passes: usize,
    pub pass_rate: f64,
    pub avg_time_to_solution: Option<Duration>,
    pub last_time_to_solution: Option<Duration>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub confidence: f64,
}

impl PatternStat {
    fn untried(pattern: Pattern) -> Self {
        Self {
            pattern,
            attempts: 0,
            passes: 0,
            pass_rate: 0.0,
            avg_time_to_solution: None,
            last_time_to_solution: None,
            last_attempt: None,
            confidence: 0.0,
        }
    }

    /// Weakest-first order: lower confidence, then fewer attempts, then the
    /// attempt furthest in the past (never attempted sorts first).
    pub fn weakness_cmp(&self, other: &Self) -> Ordering {
        self.confidence
            .total_cmp(&other.confidence)
            .then(self.attempts.cmp(&other.attempts))
            .then(self.last_attempt.cmp(&other.last_attempt))
    }
}

/// Recency-weighted pass average with a small-sample penalty.
///
/// `outcomes` is newest first. Each outcome at age `i` weighs `decay^i`.
/// With fewer than `min_samples` outcomes the average is scaled by
/// `reliable_threshold * n / min_samples`, which keeps it strictly below the
/// reliable threshold.
pub fn confidence(outcomes: &[bool], config: &ProgressConfig) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }

    let mut weighted = 0.0;
    let mut total = 0.0;
    let mut weight = 1.0;
    for &passed in outcomes {
        if passed {
            weighted += weight;
        }
        total += weight;
        weight *= config.decay;
    }
    let average = if total > 0.0 { weighted / total } else { 0.0 };

    let n = outcomes.len();
    if n < config.min_samples {
        average * config.reliable_threshold * n as f64 / config.min_samples as f64
    } else {
        average
    }
}

/// Read-only view that derives progress signals from history.
pub struct Aggregator<'a> {
    history: &'a [Postmortem],
    config: &'a ProgressConfig,
}

impl<'a> Aggregator<'a> {
    /// `history` must be in chronological order, as the store returns it.
    pub fn new(history: &'a [Postmortem], config: &'a ProgressConfig) -> Self {
        Self { history, config }
    }

    pub fn history(&self) -> &'a [Postmortem] {
        self.history
    }

    pub fn config(&self) -> &'a ProgressConfig {
        self.config
    }

    /// Statistics for one pattern; untried patterns get a zeroed stat.
    pub fn stat(&self, pattern: Pattern) -> PatternStat {
        let records: Vec<&Postmortem> = self
            .history
            .iter()
            .filter(|p| p.pattern == pattern)
            .collect();

        if records.is_empty() {
            return PatternStat::untried(pattern);
        }

        let attempts = records.len();
        let passes = records.iter().filter(|p| p.is_pass()).count();
        let total_secs: u64 = records.iter().map(|p| p.time_to_solution_secs).sum();
        let newest_first: Vec<bool> = records.iter().rev().map(|p| p.is_pass()).collect();
        let last = records.last();

        PatternStat {
            pattern,
            attempts,
            passes,
            pass_rate: passes as f64 / attempts as f64,
            avg_time_to_solution: Some(Duration::from_secs(total_secs / attempts as u64)),
            last_time_to_solution: last.map(|p| p.time_to_solution()),
            last_attempt: records.iter().map(|p| p.recorded_at).max(),
            confidence: confidence(&newest_first, self.config),
        }
    }

    /// Statistics for every pattern of `mode`, in the mode's order.
    pub fn pattern_stats(&self, mode: Mode) -> Vec<PatternStat> {
        mode.patterns().iter().map(|p| self.stat(*p)).collect()
    }

    /// Orders `patterns` weakest first.
    ///
    /// Attempted patterns still below the reliable threshold come first,
    /// then untried patterns, then reliable ones. Within each group the
    /// order is [`PatternStat::weakness_cmp`]. Ties keep the input order.
    pub fn rank<I>(&self, patterns: I) -> Vec<PatternStat>
    where
        I: IntoIterator<Item = Pattern>,
    {
        let mut stats: Vec<PatternStat> = patterns.into_iter().map(|p| self.stat(p)).collect();
        stats.sort_by(|a, b| {
            self.group(a)
                .cmp(&self.group(b))
                .then_with(|| a.weakness_cmp(b))
        });
        stats
    }

    fn group(&self, stat: &PatternStat) -> u8 {
        if stat.attempts == 0 {
            1
        } else if stat.confidence < self.config.reliable_threshold {
            0
        } else {
            2
        }
    }

    /// Patterns of `mode` with problems in `catalog`, weakest first.
    pub fn ranked(&self, catalog: &Catalog, mode: Mode) -> Vec<PatternStat> {
        self.rank(catalog.patterns_with_problems(mode))
    }

    /// The head of [`Aggregator::ranked`]: never a pattern without catalog
    /// problems, `None` only when the mode has none at all.
    pub fn weakest_pattern(&self, catalog: &Catalog, mode: Mode) -> Option<Pattern> {
        self.ranked(catalog, mode).first().map(|s| s.pattern)
    }

    /// Bug-class counts over failing postmortems, most frequent first, ties
    /// alphabetical.
    pub fn bug_class_histogram(&self) -> Vec<(String, usize)> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in self.history.iter().filter(|p| !p.is_pass()) {
            if let Some(class) = &record.bug_class {
                *counts.entry(class.to_string()).or_insert(0) += 1;
            }
        }

        let mut histogram: Vec<(String, usize)> = counts.into_iter().collect();
        histogram.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        histogram
    }

    /// Chronological time-to-solution series for `pattern`.
    pub fn trend(&self, pattern: Pattern) -> Trend<'a> {
        Trend::new(self.history, pattern)
    }
}
