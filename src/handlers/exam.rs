// src/handlers/exam.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        exam_result::{AnswerReview, SubmitExamRequest},
        question::{ExamQuestion, Question},
        subtest::Subtest,
    },
    scoring::{randomizer::randomize_options, scale},
};

/// Outcome of grading one attempt, before persistence.
struct GradedAttempt {
    reviews: Vec<AnswerReview>,
    correct_count: i64,
    gradable_count: i64,
    ungradable_count: i64,
    score: i64,
}

/// Helper function to grade a submitted attempt.
///
/// `answers` maps question ids to on-screen option indices; each question's
/// shuffle is re-derived here to translate them back to canonical indices.
/// A bank question missing from the map counts as wrong. A question whose
/// correct text matches no option is ungradable and excluded from both the
/// numerator and the denominator. An index outside the option list rejects
/// the whole submission.
fn grade_attempt(
    questions: &[Question],
    student_id: &str,
    answers: &HashMap<i64, i64>,
) -> Result<GradedAttempt, AppError> {
    let mut reviews: Vec<AnswerReview> = Vec::with_capacity(questions.len());
    let mut gradable_count: i64 = 0;
    let mut correct_count: i64 = 0;

    for q in questions {
        let randomized = randomize_options(student_id, q.id, &q.options, &q.correct_answer);

        let selected_index = match answers.get(&q.id) {
            Some(&shown) => {
                let canonical = usize::try_from(shown)
                    .ok()
                    .and_then(|s| randomized.canonical_index(s))
                    .ok_or_else(|| {
                        AppError::BadRequest(format!(
                            "Selected option {shown} is out of range for question {}",
                            q.id
                        ))
                    })?;
                Some(canonical as i64)
            }
            None => None,
        };

        let correct_index = q.options.iter().position(|opt| opt == &q.correct_answer);

        let (correct_index, is_correct) = match correct_index {
            Some(ci) => {
                gradable_count += 1;
                let hit = selected_index == Some(ci as i64);
                if hit {
                    correct_count += 1;
                }
                (Some(ci as i64), Some(hit))
            }
            None => (None, None),
        };

        reviews.push(AnswerReview {
            question_id: q.id,
            selected_index,
            correct_index,
            is_correct,
        });
    }

    Ok(GradedAttempt {
        reviews,
        correct_count,
        gradable_count,
        ungradable_count: questions.len() as i64 - gradable_count,
        score: scale::raw_subtest_score(correct_count, gradable_count),
    })
}

/// Lists the fixed exam structure, one row per subtest.
pub async fn list_subtests(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let subtests = sqlx::query_as::<_, Subtest>(
        "SELECT id, name, duration_minutes, question_count FROM subtests ORDER BY id",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch subtests: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(subtests))
}

#[derive(Debug, Deserialize)]
pub struct PaperParams {
    pub student_id: String,
}

/// Delivers a subtest paper for one student.
///
/// * Options come back in that student's deterministic shuffle, so the
///   paper is stable across reloads.
/// * The correct answer never leaves the server; submissions refer to
///   on-screen option indices.
pub async fn get_paper(
    State(pool): State<SqlitePool>,
    Path(subtest_id): Path<i64>,
    Query(params): Query<PaperParams>,
) -> Result<impl IntoResponse, AppError> {
    let subtest = sqlx::query_as::<_, Subtest>(
        "SELECT id, name, duration_minutes, question_count FROM subtests WHERE id = ?",
    )
    .bind(subtest_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Subtest not found".to_string()))?;

    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, subtest_id, content, options, correct_answer, analysis, created_at
         FROM questions WHERE subtest_id = ? ORDER BY id",
    )
    .bind(subtest_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch questions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let questions: Vec<ExamQuestion> = questions
        .into_iter()
        .map(|q| {
            let randomized =
                randomize_options(&params.student_id, q.id, &q.options, &q.correct_answer);
            ExamQuestion {
                id: q.id,
                subtest_id: q.subtest_id,
                content: q.content,
                options: randomized.options,
            }
        })
        .collect();

    Ok(Json(serde_json::json!({
        "subtest": subtest,
        "questions": questions,
    })))
}

/// Submits one subtest attempt and stores the graded outcome.
/// Attempts are append-only; a retake inserts a new row.
pub async fn submit_attempt(
    State(pool): State<SqlitePool>,
    Json(req): Json<SubmitExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let student_exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM students WHERE id = ?")
        .bind(&req.student_id)
        .fetch_one(&pool)
        .await?;
    if student_exists == 0 {
        return Err(AppError::NotFound("Student not found".to_string()));
    }

    let subtest_exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM subtests WHERE id = ?")
        .bind(req.subtest_id)
        .fetch_one(&pool)
        .await?;
    if subtest_exists == 0 {
        return Err(AppError::NotFound("Subtest not found".to_string()));
    }

    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, subtest_id, content, options, correct_answer, analysis, created_at
         FROM questions WHERE subtest_id = ? ORDER BY id",
    )
    .bind(req.subtest_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch questions for grading: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if questions.is_empty() {
        return Err(AppError::BadRequest(
            "Subtest has no questions yet".to_string(),
        ));
    }

    let graded = grade_attempt(&questions, &req.student_id, &req.answers)?;
    let wrong_count = graded.gradable_count - graded.correct_count;
    let completed_at = chrono::Utc::now();

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO exam_results
            (student_id, subtest_id, score, total_questions, correct_count, wrong_count, duration_seconds, completed_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&req.student_id)
    .bind(req.subtest_id)
    .bind(graded.score)
    .bind(graded.gradable_count)
    .bind(graded.correct_count)
    .bind(wrong_count)
    .bind(req.duration_seconds)
    .bind(completed_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to insert exam result: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let result_id = result.last_insert_rowid();

    for review in &graded.reviews {
        sqlx::query(
            "INSERT INTO exam_answers (result_id, question_id, selected_index, correct_index, is_correct)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(result_id)
        .bind(review.question_id)
        .bind(review.selected_index)
        .bind(review.correct_index)
        .bind(review.is_correct)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert exam answer: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;
    }

    tx.commit().await?;

    Ok(Json(serde_json::json!({
        "result_id": result_id,
        "score": graded.score,
        "correct_count": graded.correct_count,
        "wrong_count": wrong_count,
        "total_questions": graded.gradable_count,
        "ungradable_count": graded.ungradable_count,
        "answers": graded.reviews,
        "message": "Exam submitted successfully"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn make_question(id: i64, options: &[&str], correct_answer: &str) -> Question {
        Question {
            id,
            subtest_id: 1,
            content: format!("Question {id}"),
            options: Json(options.iter().map(|s| s.to_string()).collect()),
            correct_answer: correct_answer.to_string(),
            analysis: None,
            created_at: None,
        }
    }

    /// Finds the on-screen index a student must pick to select the given
    /// canonical option text.
    fn shown_index_of(student_id: &str, question: &Question, text: &str) -> i64 {
        let randomized = randomize_options(
            student_id,
            question.id,
            &question.options,
            &question.correct_answer,
        );
        randomized.options.iter().position(|opt| opt == text).unwrap() as i64
    }

    #[test]
    fn test_grade_full_marks() {
        let q = make_question(1, &["A", "B", "C"], "A");
        let mut answers = HashMap::new();
        answers.insert(1, shown_index_of("stu", &q, "A"));

        let graded = grade_attempt(&[q], "stu", &answers).unwrap();
        assert_eq!(graded.correct_count, 1);
        assert_eq!(graded.gradable_count, 1);
        assert_eq!(graded.score, 1000);
        assert_eq!(graded.reviews[0].is_correct, Some(true));
        assert_eq!(graded.reviews[0].correct_index, Some(0));
    }

    #[test]
    fn test_grade_unanswered_counts_as_wrong() {
        let q1 = make_question(1, &["A", "B"], "A");
        let q2 = make_question(2, &["A", "B"], "A");
        let mut answers = HashMap::new();
        answers.insert(1, shown_index_of("stu", &q1, "A"));

        let graded = grade_attempt(&[q1, q2], "stu", &answers).unwrap();
        assert_eq!(graded.correct_count, 1);
        assert_eq!(graded.gradable_count, 2);
        assert_eq!(graded.score, 500);
        assert_eq!(graded.reviews[1].selected_index, None);
        assert_eq!(graded.reviews[1].is_correct, Some(false));
    }

    #[test]
    fn test_grade_rejects_out_of_range_index() {
        let q = make_question(1, &["A", "B"], "A");
        let mut answers = HashMap::new();
        answers.insert(1, 9);
        assert!(grade_attempt(&[q], "stu", &answers).is_err());

        let q = make_question(1, &["A", "B"], "A");
        let mut answers = HashMap::new();
        answers.insert(1, -1);
        assert!(grade_attempt(&[q], "stu", &answers).is_err());
    }

    #[test]
    fn test_grade_ungradable_question_excluded() {
        // The correct text matches no option, so the item cannot be graded
        let q = make_question(1, &["A", "B"], "Z");
        let graded = grade_attempt(&[q], "stu", &HashMap::new()).unwrap();

        assert_eq!(graded.gradable_count, 0);
        assert_eq!(graded.ungradable_count, 1);
        assert_eq!(graded.correct_count, 0);
        assert_eq!(graded.score, 0);
        assert_eq!(graded.reviews[0].is_correct, None);
        assert_eq!(graded.reviews[0].correct_index, None);
    }

    #[test]
    fn test_grade_ignores_unknown_question_ids() {
        let q = make_question(1, &["A", "B"], "A");
        let mut answers = HashMap::new();
        answers.insert(99, 0);

        let graded = grade_attempt(&[q], "stu", &answers).unwrap();
        assert_eq!(graded.gradable_count, 1);
        // The bank question itself was left unanswered
        assert_eq!(graded.reviews[0].is_correct, Some(false));
    }
}
