// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// The subtest this question belongs to.
    pub subtest_id: i64,

    /// The text content of the question.
    pub content: String,

    /// List of options in canonical order (e.g., ["Option A", "Option B"]).
    /// Stored as a JSON array in the database. Students never see this
    /// order; papers are delivered with a per-student shuffle.
    pub options: Json<Vec<String>>,

    /// The text of the correct option. Grading matches this against the
    /// option list by text equality.
    pub correct_answer: String,

    /// Explanation or analysis of the correct answer.
    pub analysis: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for delivering a question to a student: the correct answer is
/// withheld and the options are already in that student's shuffled order.
#[derive(Debug, Serialize)]
pub struct ExamQuestion {
    pub id: i64,
    pub subtest_id: i64,
    pub content: String,
    pub options: Vec<String>,
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub subtest_id: i64,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 500))]
    pub correct_answer: String,
    #[validate(length(max = 2000))]
    pub analysis: Option<String>,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 {
        return Err(validator::ValidationError::new("at_least_two_options"));
    }
    for opt in options {
        if opt.is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}
