// src/handlers/results.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::exam_result::ExamResult,
    scoring::{
        attempts::{self, AttemptView},
        gate,
        irt::{self, ItemResponse},
        scale,
    },
    state::AppState,
};

/// Helper struct for loading attempt rows into the pure reductions.
#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: i64,
    student_id: String,
    subtest_id: i64,
    score: i64,
    completed_at: chrono::DateTime<chrono::Utc>,
}

impl From<AttemptRow> for AttemptView {
    fn from(row: AttemptRow) -> Self {
        AttemptView {
            id: row.id,
            student_id: row.student_id,
            subtest_id: row.subtest_id,
            score: row.score,
            completed_at: row.completed_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AnswerOutcomeRow {
    question_id: i64,
    is_correct: bool,
}

async fn ensure_student(pool: &SqlitePool, student_id: &str) -> Result<(), AppError> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM students WHERE id = ?")
        .bind(student_id)
        .fetch_one(pool)
        .await?;
    if exists == 0 {
        return Err(AppError::NotFound("Student not found".to_string()));
    }
    Ok(())
}

async fn subtest_ids(pool: &SqlitePool) -> Result<Vec<i64>, AppError> {
    let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM subtests ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

/// Loads every attempt in submission order, oldest first. The order matters:
/// the completion-order reduction derives the pilot cohort from it.
async fn all_attempt_views(pool: &SqlitePool) -> Result<Vec<AttemptView>, AppError> {
    let rows = sqlx::query_as::<_, AttemptRow>(
        "SELECT id, student_id, subtest_id, score, completed_at
         FROM exam_results ORDER BY completed_at, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(AttemptView::from).collect())
}

/// Retrieves a student's attempt history and best scores per subtest.
///
/// The total is the average of best raw scores over all subtests, so it is
/// comparable between students regardless of how many retakes they used.
pub async fn get_results(
    State(pool): State<SqlitePool>,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    ensure_student(&pool, &student_id).await?;

    let attempts_rows = sqlx::query_as::<_, ExamResult>(
        "SELECT id, student_id, subtest_id, score, total_questions, correct_count, wrong_count, duration_seconds, completed_at
         FROM exam_results WHERE student_id = ? ORDER BY completed_at, id",
    )
    .bind(&student_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch exam results: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let views: Vec<AttemptView> = attempts_rows
        .iter()
        .map(|r| AttemptView {
            id: r.id,
            student_id: r.student_id.clone(),
            subtest_id: r.subtest_id,
            score: r.score,
            completed_at: r.completed_at,
        })
        .collect();
    let best = attempts::best_by_subtest(&views);

    let subtests = subtest_ids(&pool).await?;
    let total_subtests = subtests.len();

    let raw_total: i64 = best.values().map(|a| a.score).sum();
    let total_score = if total_subtests == 0 {
        0
    } else {
        (raw_total as f64 / total_subtests as f64).round() as i64
    };

    Ok(Json(serde_json::json!({
        "student_id": student_id,
        "attempts": attempts_rows,
        "best_by_subtest": best,
        "total_score": total_score,
        "completed_subtests": best.len(),
        "total_subtests": total_subtests,
        "is_complete": best.len() == total_subtests && total_subtests > 0,
    })))
}

/// Retrieves a student's calibrated ability profile.
///
/// Pilot-cohort students get a waiting payload until enough students have
/// completed the whole exam. Once visible, every subtest estimate is derived
/// from the best attempt's stored answers against the current parameter
/// snapshot, so a calibration run changes profiles without touching rows.
pub async fn get_profile(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    ensure_student(&state.pool, &student_id).await?;

    let subtests = subtest_ids(&state.pool).await?;
    let everyone = all_attempt_views(&state.pool).await?;
    let completed = attempts::completion_order(&everyone, &subtests);

    let threshold = state.config.pilot_threshold;
    let status = gate::student_status(&student_id, &completed, threshold);

    if !status.has_scores {
        return Ok(Json(serde_json::json!({
            "student_id": student_id,
            "scores_visible": false,
            "is_pilot_student": status.is_pilot_student,
            "waiting_message": gate::waiting_message(completed.len(), threshold),
            "total_completed": completed.len(),
            "calibration_threshold": threshold,
        })));
    }

    let own: Vec<AttemptView> = everyone
        .into_iter()
        .filter(|a| a.student_id == student_id)
        .collect();
    let best = attempts::best_by_subtest(&own);

    let table = state.params.current();

    let mut subtest_estimates = Vec::with_capacity(best.len());
    let mut scaled_scores = Vec::with_capacity(best.len());
    for (subtest_id, attempt) in &best {
        let answers = sqlx::query_as::<_, AnswerOutcomeRow>(
            "SELECT question_id, is_correct FROM exam_answers
             WHERE result_id = ? AND is_correct IS NOT NULL",
        )
        .bind(attempt.id)
        .fetch_all(&state.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch answers for estimation: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        let responses: Vec<ItemResponse> = answers
            .iter()
            .map(|row| {
                let params = table.get(*subtest_id, row.question_id);
                ItemResponse {
                    difficulty: params.difficulty,
                    discrimination: params.discrimination,
                    is_correct: row.is_correct,
                }
            })
            .collect();

        let estimate = irt::estimate(&responses);
        scaled_scores.push(estimate.scaled_score);
        subtest_estimates.push(serde_json::json!({
            "subtest_id": subtest_id,
            "raw_score": attempt.score,
            "theta": estimate.theta,
            "standard_error": estimate.standard_error,
            "scaled_score": estimate.scaled_score,
            "percentile": estimate.percentile,
        }));
    }

    let overall = scale::overall_score(&scaled_scores);

    Ok(Json(serde_json::json!({
        "student_id": student_id,
        "scores_visible": true,
        "is_pilot_student": status.is_pilot_student,
        "subtest_estimates": subtest_estimates,
        "overall": overall,
        "parameter_version": table.version(),
    })))
}
