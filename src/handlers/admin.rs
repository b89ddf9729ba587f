// src/handlers/admin.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        question::{CreateQuestionRequest, Question},
        student::{CreateStudentRequest, Student},
    },
    scoring::{
        attempts::{self, AttemptView},
        calibration::{self, PilotResponse},
        gate,
        params::ItemParams,
    },
    state::AppState,
    utils::html::{clean_html, clean_options},
};

/// Helper struct for loading attempt rows into the pure reductions.
#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: i64,
    student_id: String,
    subtest_id: i64,
    score: i64,
    completed_at: DateTime<Utc>,
}

/// Helper struct for loading pilot-cohort observations.
#[derive(sqlx::FromRow)]
struct PilotRow {
    student_id: String,
    question_id: i64,
    subtest_id: i64,
    is_correct: bool,
}

async fn subtest_ids(pool: &SqlitePool) -> Result<Vec<i64>, AppError> {
    let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM subtests ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

async fn all_attempt_views(pool: &SqlitePool) -> Result<Vec<AttemptView>, AppError> {
    let rows = sqlx::query_as::<_, AttemptRow>(
        "SELECT id, student_id, subtest_id, score, completed_at
         FROM exam_results ORDER BY completed_at, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| AttemptView {
            id: row.id,
            student_id: row.student_id,
            subtest_id: row.subtest_id,
            score: row.score,
            completed_at: row.completed_at,
        })
        .collect())
}

/// Lists all provisioned students.
/// Admin only.
pub async fn list_students(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let students = sqlx::query_as::<_, Student>(
        "SELECT id, name, email, created_at FROM students ORDER BY created_at DESC, id",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list students: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(students))
}

/// Provisions a new student with a generated id.
/// Admin only.
pub async fn create_student(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateStudentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query("INSERT INTO students (id, name, email) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(clean_html(&payload.name))
        .bind(&payload.email)
        .execute(&pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                AppError::Conflict(format!("Email '{}' is already registered", payload.email))
            } else {
                tracing::error!("Failed to create student: {:?}", e);
                AppError::InternalServerError(e.to_string())
            }
        })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Lists the full question bank, answers included.
/// Admin only.
pub async fn list_questions(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, subtest_id, content, options, correct_answer, analysis, created_at
         FROM questions ORDER BY subtest_id, id",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list questions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(questions))
}

/// Creates a new question.
/// Admin only. The correct answer must be one of the options after
/// sanitization, otherwise grading could never find it again.
pub async fn create_question(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let options = clean_options(&payload.options);
    let correct_answer = clean_html(&payload.correct_answer);
    if !options.contains(&correct_answer) {
        return Err(AppError::BadRequest(
            "Correct answer must be one of the options".to_string(),
        ));
    }

    let subtest_exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM subtests WHERE id = ?")
        .bind(payload.subtest_id)
        .fetch_one(&pool)
        .await?;
    if subtest_exists == 0 {
        return Err(AppError::NotFound("Subtest not found".to_string()));
    }

    let result = sqlx::query(
        "INSERT INTO questions (subtest_id, content, options, correct_answer, analysis)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(payload.subtest_id)
    .bind(clean_html(&payload.content))
    .bind(sqlx::types::Json(options))
    .bind(correct_answer)
    .bind(payload.analysis.as_deref().map(clean_html))
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": result.last_insert_rowid()})),
    ))
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    pub content: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<String>,
    pub analysis: Option<String>,
}

/// Updates a question by ID.
/// Admin only. The merged state must still contain the correct answer by
/// text, whichever of the two fields the update touches.
pub async fn update_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let current = sqlx::query_as::<_, Question>(
        "SELECT id, subtest_id, content, options, correct_answer, analysis, created_at
         FROM questions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?
    .ok_or(AppError::NotFound("Question not found".to_string()))?;

    if payload.content.is_none()
        && payload.options.is_none()
        && payload.correct_answer.is_none()
        && payload.analysis.is_none()
    {
        return Ok(StatusCode::OK);
    }

    let options = payload.options.as_deref().map(clean_options);
    let correct_answer = payload.correct_answer.as_deref().map(clean_html);

    if let Some(opts) = &options {
        if opts.len() < 2 {
            return Err(AppError::BadRequest(
                "At least two options are required".to_string(),
            ));
        }
    }

    let merged_options = match &options {
        Some(opts) => opts,
        None => &current.options.0,
    };
    let merged_answer = match &correct_answer {
        Some(ans) => ans.as_str(),
        None => current.correct_answer.as_str(),
    };
    if !merged_options.iter().any(|opt| opt == merged_answer) {
        return Err(AppError::BadRequest(
            "Correct answer must be one of the options".to_string(),
        ));
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE questions SET ");
    let mut separated = builder.separated(", ");

    if let Some(content) = payload.content {
        separated.push("content = ");
        separated.push_bind_unseparated(clean_html(&content));
    }

    if let Some(opts) = options {
        separated.push("options = ");
        separated.push_bind_unseparated(sqlx::types::Json(opts));
    }

    if let Some(ans) = correct_answer {
        separated.push("correct_answer = ");
        separated.push_bind_unseparated(ans);
    }

    if let Some(analysis) = payload.analysis {
        separated.push("analysis = ");
        separated.push_bind_unseparated(clean_html(&analysis));
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a question by ID.
/// Admin only. Stored answers keep their question_id; history is not
/// rewritten when the bank shrinks.
pub async fn delete_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Platform-wide exam statistics.
/// Admin only.
pub async fn get_statistics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let pool = &state.pool;

    let total_students = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM students")
        .fetch_one(pool)
        .await?;

    let students_started =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(DISTINCT student_id) FROM exam_results")
            .fetch_one(pool)
            .await?;

    let total_attempts = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM exam_results")
        .fetch_one(pool)
        .await?;

    let average_score = sqlx::query_scalar::<_, Option<f64>>("SELECT AVG(score) FROM exam_results")
        .fetch_one(pool)
        .await?
        .map(|avg| (avg * 100.0).round() / 100.0)
        .unwrap_or(0.0);

    let subtests = subtest_ids(pool).await?;
    let views = all_attempt_views(pool).await?;
    let students_completed = attempts::completion_order(&views, &subtests).len();

    Ok(Json(serde_json::json!({
        "total_students": total_students,
        "students_started": students_started,
        "students_completed": students_completed,
        "students_not_started": total_students - students_started,
        "total_attempts": total_attempts,
        "average_score": average_score,
    })))
}

/// Reports calibration progress and the active parameter snapshot.
/// Admin only.
pub async fn calibration_status(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let subtests = subtest_ids(&state.pool).await?;
    let views = all_attempt_views(&state.pool).await?;
    let completed = attempts::completion_order(&views, &subtests);

    let calibrated_at = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "SELECT MAX(calibrated_at) FROM item_parameters",
    )
    .fetch_one(&state.pool)
    .await?;

    let threshold = state.config.pilot_threshold;
    let summary = gate::calibration_summary(completed.len(), threshold, calibrated_at);
    let system = gate::system_status(&completed, threshold);
    let table = state.params.current();

    Ok(Json(serde_json::json!({
        "summary": summary,
        "system": system,
        "parameter_version": table.version(),
        "calibrated_items": table.len(),
    })))
}

/// Runs difficulty calibration over the pilot cohort.
///
/// * Refuses until enough students have completed every subtest.
/// * Replaces the persisted parameter table in one transaction, then swaps
///   the in-memory snapshot. Estimates already being served keep the old
///   snapshot until they finish.
/// * Re-running with the same data yields identical parameters.
///
/// Admin only.
pub async fn run_calibration(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let threshold = state.config.pilot_threshold;
    let subtests = subtest_ids(&state.pool).await?;

    let mut tx = state.pool.begin().await?;

    let rows = sqlx::query_as::<_, AttemptRow>(
        "SELECT id, student_id, subtest_id, score, completed_at
         FROM exam_results ORDER BY completed_at, id",
    )
    .fetch_all(&mut *tx)
    .await?;
    let views: Vec<AttemptView> = rows
        .into_iter()
        .map(|row| AttemptView {
            id: row.id,
            student_id: row.student_id,
            subtest_id: row.subtest_id,
            score: row.score,
            completed_at: row.completed_at,
        })
        .collect();
    let completed = attempts::completion_order(&views, &subtests);

    if completed.len() < threshold {
        return Err(AppError::BadRequest(format!(
            "Calibration requires {threshold} completed students, only {} so far",
            completed.len()
        )));
    }

    let pilot_ids: Vec<String> = completed.into_iter().take(threshold).collect();

    // Use QueryBuilder for dynamic IN clause
    let mut query_builder = sqlx::QueryBuilder::<Sqlite>::new(
        "SELECT er.student_id, ea.question_id, er.subtest_id, ea.is_correct
         FROM exam_answers ea
         JOIN exam_results er ON er.id = ea.result_id
         WHERE ea.is_correct IS NOT NULL AND er.student_id IN (",
    );

    let mut separated = query_builder.separated(",");
    for id in &pilot_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let pilot_rows: Vec<PilotRow> = query_builder
        .build_query_as()
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let responses: Vec<PilotResponse> = pilot_rows
        .into_iter()
        .map(|row| PilotResponse {
            student_id: row.student_id,
            question_id: row.question_id,
            subtest_id: row.subtest_id,
            is_correct: row.is_correct,
        })
        .collect();

    tracing::info!(
        "Calibrating from {} observations across {} students",
        responses.len(),
        calibration::distinct_students(&responses)
    );

    let items = calibration::calibrate(&responses);
    let calibrated_at = Utc::now();

    sqlx::query("DELETE FROM item_parameters")
        .execute(&mut *tx)
        .await?;

    for item in &items {
        sqlx::query(
            "INSERT INTO item_parameters
                (question_id, subtest_id, difficulty, discrimination, sample_size, p_value, calibrated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(item.question_id)
        .bind(item.subtest_id)
        .bind(item.difficulty)
        .bind(item.discrimination)
        .bind(item.sample_size)
        .bind(item.p_value)
        .bind(calibrated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to persist item parameters: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;
    }

    tx.commit().await?;

    let table: HashMap<(i64, i64), ItemParams> = items
        .iter()
        .map(|item| {
            (
                (item.subtest_id, item.question_id),
                ItemParams {
                    difficulty: item.difficulty,
                    discrimination: item.discrimination,
                },
            )
        })
        .collect();
    let version = state.params.replace(table);

    let report = calibration::build_report(&items);

    tracing::info!(
        "Calibration complete: {} items from {} pilot students (version {})",
        items.len(),
        pilot_ids.len(),
        version
    );

    Ok(Json(serde_json::json!({
        "message": "Calibration completed",
        "calibrated_items": items.len(),
        "pilot_students": pilot_ids,
        "parameter_version": version,
        "report": report,
    })))
}

/// Helper struct for the review listing, joined against question content.
#[derive(Debug, sqlx::FromRow, serde::Serialize)]
struct ReviewItem {
    question_id: i64,
    subtest_id: i64,
    content: Option<String>,
    p_value: f64,
    difficulty: f64,
    discrimination: f64,
    sample_size: i64,
}

/// Lists calibrated items with extreme p-values for manual review.
/// Admin only.
pub async fn questions_needing_review(
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse, AppError> {
    let items = sqlx::query_as::<_, ReviewItem>(
        "SELECT ip.question_id, ip.subtest_id, q.content, ip.p_value, ip.difficulty, ip.discrimination, ip.sample_size
         FROM item_parameters ip
         LEFT JOIN questions q ON q.id = ip.question_id
         WHERE ip.p_value < 0.05 OR ip.p_value > 0.95
         ORDER BY ip.subtest_id, ip.question_id",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list questions needing review: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(items))
}
