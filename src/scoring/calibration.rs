// src/scoring/calibration.rs

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

/// One pilot-cohort observation: a student's outcome on one item.
#[derive(Debug, Clone)]
pub struct PilotResponse {
    pub student_id: String,
    pub question_id: i64,
    pub subtest_id: i64,
    pub is_correct: bool,
}

/// Calibrated IRT parameters for one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibratedItem {
    pub question_id: i64,
    pub subtest_id: i64,
    pub difficulty: f64,
    pub discrimination: f64,
    pub sample_size: i64,
    /// Proportion correct before clamping. Kept raw so extreme items can be
    /// surfaced for review.
    pub p_value: f64,
}

/// Derives item parameters from pilot-cohort responses using classical test
/// theory statistics converted into 2PL-compatible values.
///
/// Responses are grouped by (subtest, question). The proportion correct is
/// clamped to [0.05, 0.95] before the logit transform so an item nobody or
/// everybody solved still gets a finite difficulty; higher proportion
/// correct means more negative difficulty, i.e. an easier item.
/// Discrimination comes from the response variance of the raw proportion.
///
/// Output order is sorted by (subtest, question), so recalibrating on the
/// same responses reproduces the same table.
pub fn calibrate(pilot_responses: &[PilotResponse]) -> Vec<CalibratedItem> {
    let mut groups: BTreeMap<(i64, i64), (i64, i64)> = BTreeMap::new();

    for response in pilot_responses {
        let entry = groups
            .entry((response.subtest_id, response.question_id))
            .or_insert((0, 0));
        if response.is_correct {
            entry.0 += 1;
        }
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|((subtest_id, question_id), (correct, total))| {
            let p_value = correct as f64 / total as f64;

            let adjusted_p = p_value.clamp(0.05, 0.95);
            let difficulty = -(adjusted_p / (1.0 - adjusted_p)).ln();

            let variance = p_value * (1.0 - p_value);
            let discrimination = (variance * 4.0 + 0.8).clamp(0.5, 2.0);

            CalibratedItem {
                question_id,
                subtest_id,
                difficulty,
                discrimination,
                sample_size: total,
                p_value,
            }
        })
        .collect()
}

/// Number of distinct students among the responses. Callers gate calibration
/// on this reaching the pilot threshold; `calibrate` itself stays a pure
/// function of whatever it is handed.
pub fn distinct_students(responses: &[PilotResponse]) -> usize {
    responses
        .iter()
        .map(|r| r.student_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Items at the pre-clamp extremes are candidates for manual review. They
/// stay in the scoring table regardless.
pub fn needs_review(item: &CalibratedItem) -> bool {
    item.p_value < 0.05 || item.p_value > 0.95
}

#[derive(Debug, Clone, Serialize)]
pub struct DifficultyRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubtestSummary {
    pub question_count: usize,
    pub avg_difficulty: f64,
    pub avg_discrimination: f64,
}

/// Admin-facing summary of a calibration run.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationReport {
    pub total_questions: usize,
    pub average_difficulty: f64,
    pub difficulty_range: DifficultyRange,
    pub questions_needing_review: Vec<CalibratedItem>,
    pub subtest_summary: BTreeMap<i64, SubtestSummary>,
}

pub fn build_report(items: &[CalibratedItem]) -> CalibrationReport {
    if items.is_empty() {
        return CalibrationReport {
            total_questions: 0,
            average_difficulty: 0.0,
            difficulty_range: DifficultyRange { min: 0.0, max: 0.0 },
            questions_needing_review: Vec::new(),
            subtest_summary: BTreeMap::new(),
        };
    }

    let total = items.len();
    let average_difficulty = items.iter().map(|i| i.difficulty).sum::<f64>() / total as f64;
    let min = items.iter().map(|i| i.difficulty).fold(f64::INFINITY, f64::min);
    let max = items
        .iter()
        .map(|i| i.difficulty)
        .fold(f64::NEG_INFINITY, f64::max);

    let questions_needing_review: Vec<CalibratedItem> =
        items.iter().filter(|i| needs_review(i)).cloned().collect();

    let mut per_subtest: BTreeMap<i64, Vec<&CalibratedItem>> = BTreeMap::new();
    for item in items {
        per_subtest.entry(item.subtest_id).or_default().push(item);
    }

    let subtest_summary = per_subtest
        .into_iter()
        .map(|(subtest_id, entries)| {
            let count = entries.len() as f64;
            let summary = SubtestSummary {
                question_count: entries.len(),
                avg_difficulty: entries.iter().map(|i| i.difficulty).sum::<f64>() / count,
                avg_discrimination: entries.iter().map(|i| i.discrimination).sum::<f64>() / count,
            };
            (subtest_id, summary)
        })
        .collect();

    CalibrationReport {
        total_questions: total,
        average_difficulty,
        difficulty_range: DifficultyRange { min, max },
        questions_needing_review,
        subtest_summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(student: &str, question_id: i64, subtest_id: i64, is_correct: bool) -> PilotResponse {
        PilotResponse {
            student_id: student.to_string(),
            question_id,
            subtest_id,
            is_correct,
        }
    }

    /// 18 of 20 students correct on one item.
    fn mostly_correct_item() -> Vec<PilotResponse> {
        (0..20)
            .map(|i| response(&format!("s{i}"), 1, 1, i < 18))
            .collect()
    }

    #[test]
    fn p_value_of_090_maps_to_expected_difficulty() {
        let items = calibrate(&mostly_correct_item());
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.sample_size, 20);
        assert!((item.p_value - 0.9).abs() < 1e-12);
        // -ln(0.9 / 0.1) = -ln(9)
        assert!((item.difficulty - (-(9.0_f64).ln())).abs() < 1e-9);
        assert!((item.difficulty - (-2.197)).abs() < 0.001);
    }

    #[test]
    fn calibration_is_idempotent() {
        let responses: Vec<PilotResponse> = (0..20)
            .flat_map(|i| {
                vec![
                    response(&format!("s{i}"), 1, 1, i % 2 == 0),
                    response(&format!("s{i}"), 2, 1, i % 3 == 0),
                    response(&format!("s{i}"), 1, 2, i < 15),
                ]
            })
            .collect();

        assert_eq!(calibrate(&responses), calibrate(&responses));
    }

    #[test]
    fn extreme_p_values_are_clamped_and_flagged() {
        let all_correct: Vec<PilotResponse> =
            (0..20).map(|i| response(&format!("s{i}"), 1, 1, true)).collect();
        let items = calibrate(&all_correct);
        let item = &items[0];

        assert_eq!(item.p_value, 1.0);
        // Clamped to 0.95 before the logit: -ln(0.95/0.05) = -ln(19).
        assert!((item.difficulty - (-(19.0_f64).ln())).abs() < 1e-9);
        // Zero variance at the raw extreme bottoms out the discrimination.
        assert!((item.discrimination - 0.8).abs() < 1e-12);
        assert!(needs_review(item));
    }

    #[test]
    fn discrimination_stays_within_bounds() {
        // p = 0.5 maximizes variance: 0.25 * 4 + 0.8 = 1.8, inside the cap.
        let half: Vec<PilotResponse> =
            (0..20).map(|i| response(&format!("s{i}"), 1, 1, i < 10)).collect();
        let item = &calibrate(&half)[0];
        assert!((item.discrimination - 1.8).abs() < 1e-12);
        assert!(item.discrimination >= 0.5 && item.discrimination <= 2.0);
    }

    #[test]
    fn same_question_id_in_different_subtests_stays_separate() {
        let responses = vec![
            response("a", 1, 1, true),
            response("b", 1, 1, true),
            response("a", 1, 2, false),
            response("b", 1, 2, false),
        ];
        let items = calibrate(&responses);
        assert_eq!(items.len(), 2);
        assert!(items[0].subtest_id != items[1].subtest_id);
    }

    #[test]
    fn distinct_students_counts_unique_ids() {
        let responses = vec![
            response("a", 1, 1, true),
            response("a", 2, 1, false),
            response("b", 1, 1, true),
        ];
        assert_eq!(distinct_students(&responses), 2);
        assert_eq!(distinct_students(&[]), 0);
    }

    #[test]
    fn report_summarizes_per_subtest() {
        let mut responses = mostly_correct_item();
        responses.extend((0..20).map(|i| response(&format!("s{i}"), 5, 2, true)));

        let items = calibrate(&responses);
        let report = build_report(&items);

        assert_eq!(report.total_questions, 2);
        assert_eq!(report.questions_needing_review.len(), 1);
        assert_eq!(report.questions_needing_review[0].subtest_id, 2);
        assert_eq!(report.subtest_summary.len(), 2);
        assert_eq!(report.subtest_summary[&1].question_count, 1);
        assert!(report.difficulty_range.min <= report.difficulty_range.max);
    }

    #[test]
    fn empty_input_builds_an_empty_report() {
        let report = build_report(&[]);
        assert_eq!(report.total_questions, 0);
        assert!(report.questions_needing_review.is_empty());
    }
}
