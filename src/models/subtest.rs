// src/models/subtest.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'subtests' table: the fixed exam structure seeded by
/// migration.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subtest {
    pub id: i64,
    pub name: String,
    pub duration_minutes: f64,
    pub question_count: i64,
}
