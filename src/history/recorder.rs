//! Turns a finished session plus reflection answers into a postmortem.
//!
//! [`prepare`] is pure: it validates and builds the record. [`record`]
//! prepares and appends. Callers that want to retry a failed write keep the
//! prepared record and call [`HistoryStore::append`] again.

use chrono::{DateTime, Utc};

use crate::session::{CompletionStatus, Outcome, Session};
use crate::types::errors::RehearseError;
use crate::RehearseResult;

use super::postmortem::{BugClass, Postmortem, Reflection, SELF_CONFIDENCE};
use super::store::HistoryStore;

/// Validates `reflection` against `session` and builds the record.
pub fn prepare(session: &Session, reflection: &Reflection) -> RehearseResult<Postmortem> {
    prepare_at(session, reflection, Utc::now())
}

pub fn prepare_at(
    session: &Session,
    reflection: &Reflection,
    now: DateTime<Utc>,
) -> RehearseResult<Postmortem> {
    let outcome = match session.status {
        CompletionStatus::Completed => session
            .outcome
            .or(reflection.outcome)
            .unwrap_or(Outcome::Fail),
        CompletionStatus::TimedOut => reflection
            .outcome
            .or(session.outcome)
            .unwrap_or(Outcome::Fail),
        status => {
            return Err(RehearseError::IncompleteSession {
                session_id: session.id.clone(),
                status: status.to_string(),
            })
        }
    };

    if let Some(rating) = reflection.self_confidence {
        if !SELF_CONFIDENCE.contains(&rating) {
            return Err(RehearseError::config(format!(
                "self_confidence must be between {} and {}, got {}",
                SELF_CONFIDENCE.start(),
                SELF_CONFIDENCE.end(),
                rating
            )));
        }
    }

    let bug_class = BugClass::parse(&reflection.bug_class);

    if outcome == Outcome::Fail {
        let mut missing = Vec::new();
        if bug_class.is_none() {
            missing.push("bug_class");
        }
        for (name, value) in [
            ("fix_rule", &reflection.fix_rule),
            ("micro_drill", &reflection.micro_drill),
            ("test_note", &reflection.test_note),
        ] {
            if value.trim().is_empty() {
                missing.push(name);
            }
        }
        if !missing.is_empty() {
            return Err(RehearseError::MissingReflection(missing));
        }
    }

    Ok(Postmortem {
        session_id: session.id.clone(),
        problem_id: session.problem.id.clone(),
        mode: session.mode,
        pattern: reflection.pattern_used.unwrap_or(session.problem.pattern),
        outcome,
        completion_status: session.status,
        bug_class,
        fix_rule: reflection.fix_rule.trim().to_string(),
        micro_drill: reflection.micro_drill.trim().to_string(),
        test_note: reflection.test_note.trim().to_string(),
        notes: reflection.notes.trim().to_string(),
        self_confidence: reflection.self_confidence,
        time_to_solution_secs: session.time_to_solution().as_secs(),
        truncated_phase: session.truncated_phase,
        recorded_at: now,
        digest: None,
    })
}

/// Validates and appends. History is untouched on any error.
pub fn record(
    store: &mut HistoryStore,
    session: &Session,
    reflection: &Reflection,
) -> RehearseResult<Postmortem> {
    let postmortem = prepare(session, reflection)?;
    store.append(&postmortem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Mode, Pattern};
    use crate::session::{PhasePlan, SessionClock};
    use crate::types::config::ModePlanConfig;
    use chrono::TimeZone;

    fn t(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap() + chrono::Duration::minutes(min)
    }

    fn clock() -> SessionClock {
        SessionClock::start_at(
            &Catalog::builtin(),
            "binary_search/search_rotated",
            Mode::Core,
            PhasePlan::from_config(&ModePlanConfig::core()),
            t(0),
        )
        .unwrap()
    }

    fn full_reflection() -> Reflection {
        Reflection {
            bug_class: "off-by-one".to_string(),
            fix_rule: "closed interval means lo <= hi".to_string(),
            micro_drill: "three boundary searches".to_string(),
            test_note: "array of length one".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_fail_requires_reflection() {
        let mut clock = clock();
        clock.finish_at(Outcome::Fail, t(20));

        let err = prepare_at(clock.session(), &Reflection::default(), t(21)).unwrap_err();
        match err {
            RehearseError::MissingReflection(fields) => {
                assert_eq!(fields, vec!["bug_class", "fix_rule", "micro_drill", "test_note"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        let pm = prepare_at(clock.session(), &full_reflection(), t(21)).unwrap();
        assert_eq!(pm.bug_class, Some(BugClass::OffByOne));
        assert_eq!(pm.time_to_solution_secs, 20 * 60);
        assert_eq!(pm.pattern, Pattern::BinarySearch);
    }

    #[test]
    fn test_pass_accepts_empty_reflection() {
        let mut clock = clock();
        clock.finish_at(Outcome::Pass, t(15));

        let pm = prepare_at(clock.session(), &Reflection::default(), t(15)).unwrap();
        assert_eq!(pm.outcome, Outcome::Pass);
        assert!(pm.bug_class.is_none());
        assert_eq!(pm.completion_status, CompletionStatus::Completed);
    }

    #[test]
    fn test_running_and_abandoned_are_incomplete() {
        let running = clock();
        assert!(matches!(
            prepare_at(running.session(), &full_reflection(), t(1)),
            Err(RehearseError::IncompleteSession { .. })
        ));

        let mut abandoned = clock();
        abandoned.abandon_at(t(3));
        assert!(matches!(
            prepare_at(abandoned.session(), &full_reflection(), t(4)),
            Err(RehearseError::IncompleteSession { status, .. }) if status == "abandoned"
        ));
    }

    #[test]
    fn test_timed_out_defaults_to_fail() {
        let mut clock = clock();
        clock.tick_at(t(40));
        assert_eq!(clock.status(), CompletionStatus::TimedOut);

        // Without an outcome the session counts as failed, so reflection is required.
        assert!(matches!(
            prepare_at(clock.session(), &Reflection::default(), t(41)),
            Err(RehearseError::MissingReflection(_))
        ));

        let passed = Reflection {
            outcome: Some(Outcome::Pass),
            ..Default::default()
        };
        let pm = prepare_at(clock.session(), &passed, t(41)).unwrap();
        assert_eq!(pm.outcome, Outcome::Pass);
        assert_eq!(pm.completion_status, CompletionStatus::TimedOut);
        assert_eq!(pm.time_to_solution_secs, 35 * 60);
        assert!(pm.truncated_phase.is_some());
    }

    #[test]
    fn test_record_leaves_history_untouched_on_error() {
        let mut store = HistoryStore::open_in_memory().unwrap();
        let mut clock = clock();
        clock.finish_at(Outcome::Fail, t(10));

        assert!(record(&mut store, clock.session(), &Reflection::default()).is_err());
        assert_eq!(store.len().unwrap(), 0);

        record(&mut store, clock.session(), &full_reflection()).unwrap();
        assert_eq!(store.len().unwrap(), 1);

        // Recording the same session again is refused.
        assert!(matches!(
            record(&mut store, clock.session(), &full_reflection()),
            Err(RehearseError::DuplicateRecord(_))
        ));
    }

    #[test]
    fn test_self_confidence_is_kept_and_range_checked() {
        let mut clock = clock();
        clock.finish_at(Outcome::Pass, t(18));

        let rated = Reflection {
            self_confidence: Some(4),
            ..Default::default()
        };
        let postmortem = prepare_at(clock.session(), &rated, t(19)).unwrap();
        assert_eq!(postmortem.self_confidence, Some(4));

        let unrated = prepare_at(clock.session(), &Reflection::default(), t(19)).unwrap();
        assert_eq!(unrated.self_confidence, None);
        assert!(!unrated.canonical_json().unwrap().contains("self_confidence"));

        for rating in [0, 6] {
            let out_of_range = Reflection {
                self_confidence: Some(rating),
                ..Default::default()
            };
            assert!(matches!(
                prepare_at(clock.session(), &out_of_range, t(19)),
                Err(RehearseError::InvalidConfiguration(_))
            ));
        }
    }
}
