//! Integration tests for selection and progress over a real history.

use rehearse::catalog::{Catalog, Mode, Pattern};
use rehearse::history::{HistoryStore, Reflection};
use rehearse::hooks::HookSystem;
use rehearse::progress::PatternStatus;
use rehearse::session::Outcome;
use rehearse::{Config, PracticeEngine, RehearseError};

fn engine_with(catalog: Catalog) -> PracticeEngine {
    PracticeEngine::new(
        Config::default_config(),
        catalog,
        HistoryStore::open_in_memory().expect("Failed to open store"),
    )
    .with_hooks(HookSystem::new())
}

fn engine() -> PracticeEngine {
    engine_with(Catalog::builtin())
}

async fn practise(engine: &mut PracticeEngine, pattern: &str, outcome: Outcome, reflection: Reflection) {
    let mut clock = engine
        .start_session("core", Some(pattern))
        .expect("Failed to start session");
    engine.advance(&mut clock);
    engine.finish(&mut clock, outcome);
    engine.dispatch(&mut clock).await.unwrap();
    engine
        .record(&clock, &reflection)
        .await
        .expect("Failed to record postmortem");
}

fn off_by_one() -> Reflection {
    Reflection {
        bug_class: "off-by-one".to_string(),
        fix_rule: "loop while lo < hi".to_string(),
        micro_drill: "rotated search on 2 elements".to_string(),
        test_note: "pivot at last index".to_string(),
        ..Reflection::default()
    }
}

mod weakest_tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_pattern_is_weakest() {
        let mut engine = engine();
        practise(&mut engine, "hashmap", Outcome::Pass, Reflection::default()).await;
        practise(&mut engine, "hashmap", Outcome::Pass, Reflection::default()).await;
        practise(&mut engine, "binary_search", Outcome::Fail, off_by_one()).await;

        assert_eq!(
            engine.weakest_pattern(Mode::Core).unwrap(),
            Some(Pattern::BinarySearch)
        );
        assert_eq!(
            engine.bug_class_histogram().unwrap(),
            vec![("off-by-one".to_string(), 1)]
        );

        let dashboard = engine.dashboard(Mode::Core).unwrap();
        assert_eq!(dashboard.total_sessions, 3);
        assert_eq!(dashboard.passes, 2);
        assert_eq!(dashboard.pending_drills.len(), 1);
        assert_eq!(dashboard.pending_drills[0].pattern, Pattern::BinarySearch);
    }

    #[tokio::test]
    async fn test_weakest_only_returns_patterns_with_problems() {
        let catalog = Catalog::from_toml_str(
            r#"
            [[problems]]
            id = "graph/islands"
            pattern = "graph"
            difficulty = "medium"
            title = "Islands"

            [[problems]]
            id = "heap/top_k"
            pattern = "heap"
            difficulty = "easy"
            title = "Top K"
            "#,
        )
        .unwrap();
        let mut engine = engine_with(catalog);
        practise(&mut engine, "heap", Outcome::Pass, Reflection::default()).await;

        for _ in 0..5 {
            let weakest = engine.weakest_pattern(Mode::Core).unwrap().unwrap();
            assert!(matches!(weakest, Pattern::Graph | Pattern::Heap));
        }
        assert_eq!(engine.weakest_pattern(Mode::Specialized).unwrap(), None);
    }

    #[tokio::test]
    async fn test_untouched_catalog_reports_not_started() {
        let engine = engine();
        let dashboard = engine.dashboard(Mode::Specialized).unwrap();

        assert_eq!(dashboard.total_sessions, 0);
        assert!(dashboard
            .patterns
            .iter()
            .all(|row| row.status == PatternStatus::NotStarted));
    }
}

mod trend_tests {
    use super::*;

    #[tokio::test]
    async fn test_trend_is_idempotent() {
        let mut engine = engine();
        practise(&mut engine, "sorting", Outcome::Fail, off_by_one()).await;
        practise(&mut engine, "sorting", Outcome::Pass, Reflection::default()).await;

        let first = engine.trend(Pattern::Sorting).unwrap();
        let second = engine.trend(Pattern::Sorting).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].outcome, Outcome::Fail);
        assert!(first[0].at <= first[1].at);
        assert!(engine.trend(Pattern::Graph).unwrap().is_empty());
    }
}

mod selection_tests {
    use super::*;

    #[tokio::test]
    async fn test_recent_problems_are_skipped() {
        let catalog = Catalog::from_toml_str(
            r#"
            [[problems]]
            id = "heap/a"
            pattern = "heap"
            difficulty = "easy"
            title = "A"

            [[problems]]
            id = "heap/b"
            pattern = "heap"
            difficulty = "easy"
            title = "B"

            [[problems]]
            id = "heap/c"
            pattern = "heap"
            difficulty = "easy"
            title = "C"
            "#,
        )
        .unwrap();
        let mut engine = engine_with(catalog);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let mut clock = engine.start_session("core", Some("heap")).unwrap();
            seen.push(clock.session().problem.id.clone());
            engine.finish(&mut clock, Outcome::Pass);
            engine.record(&clock, &Reflection::default()).await.unwrap();
        }

        seen.sort();
        assert_eq!(seen, vec!["heap/a", "heap/b", "heap/c"]);
    }

    #[test]
    fn test_filter_from_other_mode_is_rejected() {
        let engine = engine();
        assert!(matches!(
            engine.start_session("specialized", Some("heap")),
            Err(RehearseError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_empty_pool_is_reported() {
        let catalog = Catalog::from_toml_str(
            r#"
            [[problems]]
            id = "heap/a"
            pattern = "heap"
            difficulty = "easy"
            title = "A"
            "#,
        )
        .unwrap();
        let engine = engine_with(catalog);
        assert!(matches!(
            engine.start_session("core", Some("graph")),
            Err(RehearseError::EmptyCatalog(_))
        ));
    }
}
