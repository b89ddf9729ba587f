// src/scoring/attempts.rs

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The slice of an attempt row the reductions below need. `id` is carried
/// through untouched so callers can find the winning row again.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptView {
    pub id: i64,
    pub student_id: String,
    pub subtest_id: i64,
    pub score: i64,
    pub completed_at: DateTime<Utc>,
}

/// Picks the canonical attempt per subtest: highest score wins, equal
/// scores keep the earlier attempt. Expects attempts in chronological
/// order, which is how callers query them. Stored rows are never touched;
/// retakes only add inputs to this reduction.
pub fn best_by_subtest(attempts: &[AttemptView]) -> BTreeMap<i64, AttemptView> {
    let mut best: BTreeMap<i64, AttemptView> = BTreeMap::new();

    for attempt in attempts {
        match best.get(&attempt.subtest_id) {
            Some(current) if attempt.score <= current.score => {}
            _ => {
                best.insert(attempt.subtest_id, attempt.clone());
            }
        }
    }

    best
}

/// Distinct students who have completed the whole exam, in completion
/// order.
///
/// A student has completed once every subtest in `subtest_ids` has at least
/// one attempt; the completion instant is the earliest moment that full
/// coverage existed, i.e. the latest of the per-subtest first attempts.
/// Retakes never move a student's completion instant. Ties keep the input
/// encounter order.
pub fn completion_order(attempts: &[AttemptView], subtest_ids: &[i64]) -> Vec<String> {
    if subtest_ids.is_empty() {
        return Vec::new();
    }

    let mut first_attempt: HashMap<(&str, i64), DateTime<Utc>> = HashMap::new();
    let mut encounter_order: Vec<&str> = Vec::new();

    for attempt in attempts {
        let key = (attempt.student_id.as_str(), attempt.subtest_id);
        match first_attempt.get_mut(&key) {
            Some(existing) => {
                if attempt.completed_at < *existing {
                    *existing = attempt.completed_at;
                }
            }
            None => {
                first_attempt.insert(key, attempt.completed_at);
            }
        }
        if !encounter_order.contains(&attempt.student_id.as_str()) {
            encounter_order.push(attempt.student_id.as_str());
        }
    }

    let mut completed: Vec<(&str, DateTime<Utc>)> = Vec::new();
    for student in encounter_order {
        let instants: Option<Vec<DateTime<Utc>>> = subtest_ids
            .iter()
            .map(|&subtest_id| first_attempt.get(&(student, subtest_id)).copied())
            .collect();

        if let Some(instants) = instants {
            if let Some(completed_at) = instants.into_iter().max() {
                completed.push((student, completed_at));
            }
        }
    }

    completed.sort_by_key(|&(_, at)| at);
    completed.into_iter().map(|(id, _)| id.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, minute, 0).unwrap()
    }

    fn attempt(student: &str, subtest_id: i64, score: i64, minute: u32) -> AttemptView {
        AttemptView {
            id: i64::from(minute),
            student_id: student.to_string(),
            subtest_id,
            score,
            completed_at: at(minute),
        }
    }

    #[test]
    fn best_attempt_keeps_highest_score_per_subtest() {
        let attempts = vec![
            attempt("a", 1, 600, 0),
            attempt("a", 1, 750, 5),
            attempt("a", 2, 500, 10),
            attempt("a", 1, 700, 15),
        ];

        let best = best_by_subtest(&attempts);
        assert_eq!(best.len(), 2);
        assert_eq!(best[&1].score, 750);
        assert_eq!(best[&2].score, 500);
    }

    #[test]
    fn equal_scores_keep_the_earlier_attempt() {
        let attempts = vec![attempt("a", 1, 600, 0), attempt("a", 1, 600, 5)];
        let best = best_by_subtest(&attempts);
        assert_eq!(best[&1].completed_at, at(0));
    }

    #[test]
    fn completion_requires_every_subtest() {
        let attempts = vec![
            attempt("a", 1, 100, 0),
            attempt("a", 2, 100, 1),
            attempt("b", 1, 100, 2),
        ];

        let order = completion_order(&attempts, &[1, 2]);
        assert_eq!(order, vec!["a".to_string()]);
    }

    #[test]
    fn order_follows_the_moment_coverage_was_reached() {
        // "b" starts later but finishes the battery first.
        let attempts = vec![
            attempt("a", 1, 100, 0),
            attempt("b", 1, 100, 1),
            attempt("b", 2, 100, 2),
            attempt("a", 2, 100, 3),
        ];

        let order = completion_order(&attempts, &[1, 2]);
        assert_eq!(order, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn retakes_do_not_move_the_completion_instant() {
        let attempts = vec![
            attempt("a", 1, 100, 0),
            attempt("a", 2, 100, 1),
            attempt("b", 1, 100, 2),
            attempt("b", 2, 100, 3),
            // "a" retakes subtest 1 after "b" completed.
            attempt("a", 1, 900, 10),
        ];

        let order = completion_order(&attempts, &[1, 2]);
        assert_eq!(order, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn no_subtests_means_nobody_completes() {
        let attempts = vec![attempt("a", 1, 100, 0)];
        assert!(completion_order(&attempts, &[]).is_empty());
    }
}
