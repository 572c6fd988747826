//! Next-problem selection.
//!
//! Deterministic. Patterns are tried in the aggregator's weakest-first
//! order and the first one with a problem outside the recent window wins.
//! Within a pattern never-attempted problems come before the least recently
//! attempted ones.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::catalog::{Catalog, Mode, Pattern, Problem};
use crate::history::Postmortem;
use crate::progress::Aggregator;
use crate::types::config::ProgressConfig;
use crate::types::errors::RehearseError;
use crate::RehearseResult;

/// Picks problems from a catalog given the history so far.
pub struct Selector<'a> {
    catalog: &'a Catalog,
    history: &'a [Postmortem],
    progress: &'a ProgressConfig,
}

impl<'a> Selector<'a> {
    pub fn new(
        catalog: &'a Catalog,
        history: &'a [Postmortem],
        progress: &'a ProgressConfig,
    ) -> Self {
        Self {
            catalog,
            history,
            progress,
        }
    }

    /// Chooses one problem for `mode`, optionally within `pattern_filter`,
    /// avoiding the last `exclude_recent` distinct problems when possible.
    pub fn select(
        &self,
        mode: Mode,
        pattern_filter: Option<Pattern>,
        exclude_recent: usize,
    ) -> RehearseResult<&'a Problem> {
        if let Some(pattern) = pattern_filter {
            if !mode.includes(pattern) {
                return Err(RehearseError::config(format!(
                    "pattern '{}' belongs to the {} track, not {}",
                    pattern,
                    pattern.mode(),
                    mode
                )));
            }
        }

        let pool = self.catalog.list(mode, pattern_filter);
        if pool.is_empty() {
            let scope = match pattern_filter {
                Some(pattern) => format!("{} mode, pattern {}", mode, pattern),
                None => format!("{} mode", mode),
            };
            return Err(RehearseError::EmptyCatalog(scope));
        }

        let recent = self.recent_problems(exclude_recent);
        let groups = match pattern_filter {
            Some(_) => vec![pool],
            None => self.weakest_first(pool),
        };

        let fresh = groups.iter().find_map(|group| {
            let fresh: Vec<&'a Problem> = group
                .iter()
                .copied()
                .filter(|p| !recent.contains(p.id.as_str()))
                .collect();
            (!fresh.is_empty()).then_some(fresh)
        });
        let candidates = match fresh {
            Some(fresh) => fresh,
            None => {
                tracing::debug!(
                    mode = %mode,
                    excluded = recent.len(),
                    "Every eligible problem was recent; allowing repeats"
                );
                groups.into_iter().next().unwrap_or_default()
            }
        };

        // Never attempted (None) sorts before any timestamp.
        let last_seen = self.last_attempts();
        let chosen = candidates
            .into_iter()
            .min_by_key(|p| last_seen.get(p.id.as_str()).copied())
            .ok_or_else(|| RehearseError::EmptyCatalog(format!("{} mode", mode)))?;

        tracing::info!(problem = %chosen.id, pattern = %chosen.pattern, "Problem selected");
        Ok(chosen)
    }

    /// The last `n` distinct problem ids, newest first.
    pub fn recent_problems(&self, n: usize) -> HashSet<&'a str> {
        let mut recent = HashSet::new();
        for record in self.history.iter().rev() {
            if recent.len() >= n {
                break;
            }
            recent.insert(record.problem_id.as_str());
        }
        recent
    }

    /// Splits `pool` by pattern, weakest pattern first.
    fn weakest_first(&self, pool: Vec<&'a Problem>) -> Vec<Vec<&'a Problem>> {
        let mut patterns: Vec<Pattern> = Vec::new();
        for problem in &pool {
            if !patterns.contains(&problem.pattern) {
                patterns.push(problem.pattern);
            }
        }

        Aggregator::new(self.history, self.progress)
            .rank(patterns)
            .into_iter()
            .map(|stat| {
                pool.iter()
                    .copied()
                    .filter(|p| p.pattern == stat.pattern)
                    .collect()
            })
            .collect()
    }

    fn last_attempts(&self) -> HashMap<&'a str, DateTime<Utc>> {
        let mut last: HashMap<&'a str, DateTime<Utc>> = HashMap::new();
        for record in self.history {
            let entry = last
                .entry(record.problem_id.as_str())
                .or_insert(record.recorded_at);
            if record.recorded_at > *entry {
                *entry = record.recorded_at;
            }
        }
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{CompletionStatus, Outcome};
    use chrono::TimeZone;

    fn pm(n: i64, problem_id: &str, outcome: Outcome) -> Postmortem {
        let pattern: Pattern = problem_id
            .split('/')
            .next()
            .unwrap_or_default()
            .parse()
            .unwrap();
        Postmortem {
            session_id: format!("s{}", n),
            problem_id: problem_id.to_string(),
            mode: pattern.mode(),
            pattern,
            outcome,
            completion_status: CompletionStatus::Completed,
            bug_class: None,
            fix_rule: String::new(),
            micro_drill: String::new(),
            test_note: String::new(),
            notes: String::new(),
            time_to_solution_secs: 1200,
            self_confidence: None,
            truncated_phase: None,
            recorded_at: Utc.with_ymd_and_hms(2026, 6, 1, 7, 0, 0).unwrap()
                + chrono::Duration::hours(n),
            digest: None,
        }
    }

    fn three_heaps() -> Catalog {
        Catalog::from_toml_str(
            r#"
            [[problems]]
            id = "heap/a"
            pattern = "heap"
            difficulty = "easy"
            title = "A"

            [[problems]]
            id = "heap/b"
            pattern = "heap"
            difficulty = "medium"
            title = "B"

            [[problems]]
            id = "heap/c"
            pattern = "heap"
            difficulty = "hard"
            title = "C"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_excludes_recent_problems() {
        let catalog = three_heaps();
        let history = vec![pm(0, "heap/a", Outcome::Pass), pm(1, "heap/c", Outcome::Fail)];
        let config = ProgressConfig::default();
        let selector = Selector::new(&catalog, &history, &config);

        let chosen = selector.select(Mode::Core, Some(Pattern::Heap), 2).unwrap();
        assert_eq!(chosen.id, "heap/b");
    }

    #[test]
    fn test_falls_back_to_least_recent_when_all_excluded() {
        let catalog = three_heaps();
        let history = vec![
            pm(0, "heap/b", Outcome::Pass),
            pm(1, "heap/a", Outcome::Pass),
            pm(2, "heap/c", Outcome::Pass),
        ];
        let config = ProgressConfig::default();
        let selector = Selector::new(&catalog, &history, &config);

        let chosen = selector.select(Mode::Core, None, 5).unwrap();
        assert_eq!(chosen.id, "heap/b");
    }

    #[test]
    fn test_weak_attempted_pattern_beats_untried() {
        let catalog = Catalog::builtin();
        let history = vec![
            pm(0, "hashmap/two_sum", Outcome::Pass),
            pm(1, "hashmap/two_sum", Outcome::Pass),
            pm(2, "binary_search/search_rotated", Outcome::Fail),
        ];
        let config = ProgressConfig::default();
        let selector = Selector::new(&catalog, &history, &config);

        let chosen = selector.select(Mode::Core, None, 0).unwrap();
        assert_eq!(chosen.id, "binary_search/search_rotated");

        let weakest = Aggregator::new(&history, &config).weakest_pattern(&catalog, Mode::Core);
        assert_eq!(Some(chosen.pattern), weakest);
    }

    #[test]
    fn test_recent_weakest_moves_to_next_pattern() {
        let catalog = Catalog::builtin();
        let history = vec![
            pm(0, "hashmap/two_sum", Outcome::Pass),
            pm(1, "hashmap/two_sum", Outcome::Pass),
            pm(2, "binary_search/search_rotated", Outcome::Fail),
        ];
        let config = ProgressConfig::default();
        let selector = Selector::new(&catalog, &history, &config);

        // binary_search has a single problem and it is recent.
        let chosen = selector.select(Mode::Core, None, 2).unwrap();
        assert_eq!(chosen.id, "hashmap/group_anagrams");
    }

    #[test]
    fn test_untried_pattern_once_attempted_are_reliable() {
        let catalog = Catalog::builtin();
        let history = vec![
            pm(0, "hashmap/two_sum", Outcome::Pass),
            pm(1, "hashmap/group_anagrams", Outcome::Pass),
            pm(2, "hashmap/two_sum", Outcome::Pass),
        ];
        let config = ProgressConfig::default();
        let selector = Selector::new(&catalog, &history, &config);

        let chosen = selector.select(Mode::Core, None, 0).unwrap();
        assert_eq!(chosen.pattern, Pattern::TwoPointers);
    }

    #[test]
    fn test_prefers_low_confidence_pattern() {
        let catalog = Catalog::builtin();
        let mut history = Vec::new();
        let mut n = 0;
        for pattern in catalog.patterns_with_problems(Mode::Core) {
            if pattern == Pattern::Graph {
                continue;
            }
            let problem = catalog.list(Mode::Core, Some(pattern))[0].id.clone();
            for _ in 0..3 {
                history.push(pm(n, &problem, Outcome::Pass));
                n += 1;
            }
        }
        history.push(pm(n, "graph/num_islands", Outcome::Fail));

        let config = ProgressConfig::default();
        let selector = Selector::new(&catalog, &history, &config);
        let chosen = selector.select(Mode::Core, None, 0).unwrap();
        assert_eq!(chosen.pattern, Pattern::Graph);
    }

    #[test]
    fn test_filter_from_other_mode_is_invalid() {
        let catalog = Catalog::builtin();
        let config = ProgressConfig::default();
        let selector = Selector::new(&catalog, &[], &config);

        assert!(matches!(
            selector.select(Mode::Core, Some(Pattern::WebApi), 2),
            Err(RehearseError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_empty_pool() {
        let catalog = three_heaps();
        let config = ProgressConfig::default();
        let selector = Selector::new(&catalog, &[], &config);

        assert!(matches!(
            selector.select(Mode::Specialized, None, 2),
            Err(RehearseError::EmptyCatalog(_))
        ));
        assert!(matches!(
            selector.select(Mode::Core, Some(Pattern::Graph), 2),
            Err(RehearseError::EmptyCatalog(_))
        ));
    }

    #[test]
    fn test_never_attempted_before_repeats() {
        let catalog = three_heaps();
        let history = vec![pm(0, "heap/a", Outcome::Pass)];
        let config = ProgressConfig::default();
        let selector = Selector::new(&catalog, &history, &config);

        // Even without exclusion, an unseen problem is preferred.
        let chosen = selector.select(Mode::Core, None, 0).unwrap();
        assert_eq!(chosen.id, "heap/b");
    }
}
