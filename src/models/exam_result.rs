// src/models/exam_result.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'exam_results' table: one row per attempt, append-only.
/// The score here is the provisional raw score; calibrated IRT scores are
/// derived at read time and never stored.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamResult {
    pub id: i64,
    pub student_id: String,
    pub subtest_id: i64,
    pub score: i64,
    pub total_questions: i64,
    pub correct_count: i64,
    pub wrong_count: i64,
    pub duration_seconds: i64,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for submitting one subtest attempt.
///
/// `answers` maps question id to the selected option index in the order
/// the student saw, i.e. the shuffled frame. The server translates back to
/// canonical indices before grading and storage. Unanswered questions are
/// simply absent from the map.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitExamRequest {
    #[validate(length(min = 1, max = 64))]
    pub student_id: String,
    pub subtest_id: i64,
    #[validate(range(min = 0))]
    pub duration_seconds: i64,
    pub answers: std::collections::HashMap<i64, i64>,
}

/// Per-question outcome returned with a submission, in canonical indices.
/// `is_correct` is `None` for ungradable items (correct text matching no
/// option), which stay out of both score and calibration.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerReview {
    pub question_id: i64,
    pub selected_index: Option<i64>,
    pub correct_index: Option<i64>,
    pub is_correct: Option<bool>,
}
