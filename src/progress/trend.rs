//! Time-to-solution series for one pattern.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::Pattern;
use crate::history::Postmortem;
use crate::session::Outcome;

/// One point of a trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub at: DateTime<Utc>,
    pub time_to_solution: Duration,
    pub outcome: Outcome,
}

/// Lazy iterator over a pattern's postmortems, oldest first. Cloning gives
/// an independent cursor, so a trend can be walked any number of times.
#[derive(Debug, Clone)]
pub struct Trend<'a> {
    records: std::slice::Iter<'a, Postmortem>,
    pattern: Pattern,
}

impl<'a> Trend<'a> {
    pub fn new(history: &'a [Postmortem], pattern: Pattern) -> Self {
        Self {
            records: history.iter(),
            pattern,
        }
    }

    pub fn pattern(&self) -> Pattern {
        self.pattern
    }
}

impl Iterator for Trend<'_> {
    type Item = TrendPoint;

    fn next(&mut self) -> Option<Self::Item> {
        let pattern = self.pattern;
        self.records
            .find(|p| p.pattern == pattern)
            .map(|p| TrendPoint {
                at: p.recorded_at,
                time_to_solution: p.time_to_solution(),
                outcome: p.outcome,
            })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.records.size_hint().1)
    }
}

impl std::iter::FusedIterator for Trend<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CompletionStatus;
    use chrono::TimeZone;

    fn pm(day: u32, pattern: Pattern, secs: u64) -> Postmortem {
        Postmortem {
            session_id: format!("{}-{}", pattern, day),
            problem_id: format!("{}/p", pattern),
            mode: pattern.mode(),
            pattern,
            outcome: Outcome::Pass,
            completion_status: CompletionStatus::Completed,
            bug_class: None,
            fix_rule: String::new(),
            micro_drill: String::new(),
            test_note: String::new(),
            notes: String::new(),
            time_to_solution_secs: secs,
            self_confidence: None,
            truncated_phase: None,
            recorded_at: Utc.with_ymd_and_hms(2026, 4, day, 8, 0, 0).unwrap(),
            digest: None,
        }
    }

    #[test]
    fn test_trend_filters_and_orders() {
        let history = vec![
            pm(1, Pattern::Heap, 1500),
            pm(2, Pattern::Graph, 900),
            pm(3, Pattern::Heap, 1200),
        ];
        let points: Vec<TrendPoint> = Trend::new(&history, Pattern::Heap).collect();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].time_to_solution, Duration::from_secs(1500));
        assert_eq!(points[1].time_to_solution, Duration::from_secs(1200));
        assert!(points[0].at < points[1].at);
    }

    #[test]
    fn test_trend_is_restartable() {
        let history = vec![pm(1, Pattern::Sorting, 700), pm(2, Pattern::Sorting, 650)];
        let trend = Trend::new(&history, Pattern::Sorting);

        let first: Vec<_> = trend.clone().collect();
        let second: Vec<_> = trend.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_trend_empty_for_untried_pattern() {
        let history = vec![pm(1, Pattern::Sorting, 700)];
        let mut trend = Trend::new(&history, Pattern::AgentLoop);
        assert!(trend.next().is_none());
        assert!(trend.next().is_none());
    }
}
