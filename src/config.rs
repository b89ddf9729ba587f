// src/config.rs

use dotenvy::dotenv;
use std::env;

/// Students that must complete the exam before calibration can run and
/// pilot scores unlock. Every use site goes through `Config`; this is only
/// the fallback when the environment does not say otherwise.
pub const DEFAULT_PILOT_THRESHOLD: usize = 20;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub rust_log: String,

    /// Pilot-cohort size. Overridable via PILOT_THRESHOLD for smaller
    /// deployments.
    pub pilot_threshold: usize,

    /// Seed a demo question bank at startup when the bank is empty.
    pub seed_sample_data: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let pilot_threshold = env::var("PILOT_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PILOT_THRESHOLD);

        let seed_sample_data = env::var("SEED_SAMPLE_DATA")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Self {
            database_url,
            rust_log,
            pilot_threshold,
            seed_sample_data,
        }
    }
}
