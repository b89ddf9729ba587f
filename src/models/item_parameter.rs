// src/models/item_parameter.rs

use serde::Serialize;
use sqlx::FromRow;

/// Represents the 'item_parameters' table: the persisted calibration
/// output. The whole table is replaced by each calibration run; the
/// in-memory snapshot in `scoring::params` is hydrated from these rows at
/// startup.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ItemParameterRow {
    pub question_id: i64,
    pub subtest_id: i64,
    pub difficulty: f64,
    pub discrimination: f64,
    pub sample_size: i64,
    pub p_value: f64,
    pub calibrated_at: chrono::DateTime<chrono::Utc>,
}
