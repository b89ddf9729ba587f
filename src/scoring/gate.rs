// src/scoring/gate.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

/// System-wide calibration progress, derived from the ordered list of
/// students who have completed the full exam.
#[derive(Debug, Clone, Serialize)]
pub struct SystemScoringStatus {
    pub is_calibration_complete: bool,
    pub total_students_completed: usize,
    pub calibration_threshold: usize,
    pub pilot_student_ids: Vec<String>,
}

/// Visibility verdict for one student.
#[derive(Debug, Clone, Serialize)]
pub struct StudentScoringStatus {
    pub student_id: String,
    pub is_pilot_student: bool,
    pub has_scores: bool,
    pub waiting_for_calibration: bool,
}

/// `completed_ids` must be distinct student ids in first-completion order.
/// The pilot cohort is the first `threshold` of them.
pub fn system_status(completed_ids: &[String], threshold: usize) -> SystemScoringStatus {
    SystemScoringStatus {
        is_calibration_complete: completed_ids.len() >= threshold,
        total_students_completed: completed_ids.len(),
        calibration_threshold: threshold,
        pilot_student_ids: completed_ids.iter().take(threshold).cloned().collect(),
    }
}

pub fn is_pilot_student(student_id: &str, completed_ids: &[String], threshold: usize) -> bool {
    completed_ids
        .iter()
        .take(threshold)
        .any(|id| id == student_id)
}

pub fn student_status(
    student_id: &str,
    completed_ids: &[String],
    threshold: usize,
) -> StudentScoringStatus {
    let is_pilot = is_pilot_student(student_id, completed_ids, threshold);
    let calibration_complete = completed_ids.len() >= threshold;

    StudentScoringStatus {
        student_id: student_id.to_string(),
        is_pilot_student: is_pilot,
        has_scores: !is_pilot || calibration_complete,
        waiting_for_calibration: is_pilot && !calibration_complete,
    }
}

/// Whether a student's scores may be shown yet.
///
/// Pilot-cohort members wait until the whole cohort has finished, since
/// their parameters are calibrated from all of them. Everyone after the
/// cohort sees scores immediately. The asymmetry is deliberate and the
/// transition is monotonic: growth of the completed list never hides a
/// score that was already visible.
pub fn should_display_scores(student_id: &str, completed_ids: &[String], threshold: usize) -> bool {
    student_status(student_id, completed_ids, threshold).has_scores
}

/// Message shown to a pilot student whose scores are still withheld.
pub fn waiting_message(total_completed: usize, threshold: usize) -> String {
    let remaining = threshold.saturating_sub(total_completed);

    if remaining == 0 {
        return "Kalibrasi selesai! Skor Anda sedang dihitung...".to_string();
    }

    format!(
        "Menunggu {remaining} peserta lagi untuk menyelesaikan kalibrasi sistem penilaian. \
         Skor akan ditampilkan setelah kalibrasi selesai."
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationPhase {
    Waiting,
    Ready,
    Completed,
}

/// Admin dashboard summary of where the calibration workflow stands.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationSummary {
    pub status: CalibrationPhase,
    pub progress: i64,
    pub message: String,
    pub can_run_calibration: bool,
}

pub fn calibration_summary(
    total_completed: usize,
    threshold: usize,
    calibrated_at: Option<DateTime<Utc>>,
) -> CalibrationSummary {
    if total_completed < threshold {
        let remaining = threshold - total_completed;
        return CalibrationSummary {
            status: CalibrationPhase::Waiting,
            progress: ((total_completed as f64 / threshold as f64) * 100.0).round() as i64,
            message: format!("Menunggu {remaining} peserta lagi untuk memulai kalibrasi"),
            can_run_calibration: false,
        };
    }

    if let Some(at) = calibrated_at {
        return CalibrationSummary {
            status: CalibrationPhase::Completed,
            progress: 100,
            message: format!("Kalibrasi selesai pada {}", at.format("%d/%m/%Y %H:%M UTC")),
            can_run_calibration: false,
        };
    }

    CalibrationSummary {
        status: CalibrationPhase::Ready,
        progress: 100,
        message: format!("{total_completed} peserta telah selesai. Siap untuk kalibrasi!"),
        can_run_calibration: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("student-{i}")).collect()
    }

    #[test]
    fn pilot_cohort_is_first_n_by_completion_order() {
        let completed = ids(25);
        let status = system_status(&completed, 20);

        assert_eq!(status.pilot_student_ids.len(), 20);
        assert_eq!(status.pilot_student_ids[0], "student-0");
        assert!(status.is_calibration_complete);
        assert!(is_pilot_student("student-19", &completed, 20));
        assert!(!is_pilot_student("student-20", &completed, 20));
    }

    #[test]
    fn pilot_scores_unlock_at_the_threshold() {
        // 19 of 20: a pilot member still waits.
        let nineteen = ids(19);
        assert!(!should_display_scores("student-0", &nineteen, 20));
        assert!(student_status("student-0", &nineteen, 20).waiting_for_calibration);

        // The 20th completion unlocks every pilot member at once.
        let twenty = ids(20);
        for id in &twenty {
            assert!(should_display_scores(id, &twenty, 20), "{id} still hidden");
        }

        // A 21st student was never part of the cohort and never waits.
        let twenty_one = ids(21);
        let late = student_status("student-20", &twenty_one, 20);
        assert!(late.has_scores);
        assert!(!late.is_pilot_student);
    }

    #[test]
    fn visibility_is_monotonic_under_growth() {
        let mut completed = ids(20);
        assert!(should_display_scores("student-3", &completed, 20));

        for extra in 20..40 {
            completed.push(format!("student-{extra}"));
            assert!(should_display_scores("student-3", &completed, 20));
            assert!(should_display_scores(&format!("student-{extra}"), &completed, 20));
        }
    }

    #[test]
    fn students_outside_the_cohort_see_scores_immediately() {
        // Even before the threshold, a student who is not among the first N
        // is not withheld. Only the pilot cohort waits.
        let completed = ids(5);
        assert!(should_display_scores("someone-else", &completed, 20));
        assert!(!should_display_scores("student-0", &completed, 20));
    }

    #[test]
    fn waiting_message_counts_down() {
        assert!(waiting_message(15, 20).contains("Menunggu 5 peserta lagi"));
        assert!(waiting_message(20, 20).starts_with("Kalibrasi selesai"));
        assert!(waiting_message(25, 20).starts_with("Kalibrasi selesai"));
    }

    #[test]
    fn summary_walks_through_the_three_phases() {
        let waiting = calibration_summary(5, 20, None);
        assert_eq!(waiting.status, CalibrationPhase::Waiting);
        assert_eq!(waiting.progress, 25);
        assert!(!waiting.can_run_calibration);

        let ready = calibration_summary(20, 20, None);
        assert_eq!(ready.status, CalibrationPhase::Ready);
        assert_eq!(ready.progress, 100);
        assert!(ready.can_run_calibration);

        let completed = calibration_summary(22, 20, Some(Utc::now()));
        assert_eq!(completed.status, CalibrationPhase::Completed);
        assert!(!completed.can_run_calibration);
        assert!(completed.message.starts_with("Kalibrasi selesai pada"));
    }
}
