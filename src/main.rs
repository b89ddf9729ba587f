// src/main.rs

use dotenvy::dotenv;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use tryout_backend::config::Config;
use tryout_backend::models::item_parameter::ItemParameterRow;
use tryout_backend::routes;
use tryout_backend::scoring::params::{ItemParams, ParameterStore};
use tryout_backend::state::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool
    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .expect("DATABASE_URL is not a valid SQLite connection string")
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(connect_options)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    // Seed Demo Question Bank
    if config.seed_sample_data {
        if let Err(e) = seed_sample_questions(&pool).await {
            tracing::error!("Failed to seed sample questions: {:?}", e);
        }
    }

    // Hydrate the parameter snapshot from the last calibration run
    let params = ParameterStore::empty();
    if let Err(e) = hydrate_parameters(&pool, &params).await {
        tracing::error!("Failed to load item parameters: {:?}", e);
    }

    // Create AppState
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        params,
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Start the server
    axum::serve(listener, app).await.unwrap();
}

/// Loads persisted calibration output into the in-memory snapshot so a
/// restart serves the same estimates as before.
async fn hydrate_parameters(pool: &SqlitePool, params: &ParameterStore) -> Result<(), sqlx::Error> {
    let rows = sqlx::query_as::<_, ItemParameterRow>(
        "SELECT question_id, subtest_id, difficulty, discrimination, sample_size, p_value, calibrated_at
         FROM item_parameters",
    )
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        tracing::info!("No calibrated item parameters yet, estimates use neutral defaults");
        return Ok(());
    }

    let items: HashMap<(i64, i64), ItemParams> = rows
        .iter()
        .map(|row| {
            (
                (row.subtest_id, row.question_id),
                ItemParams {
                    difficulty: row.difficulty,
                    discrimination: row.discrimination,
                },
            )
        })
        .collect();

    let count = items.len();
    let version = params.replace(items);
    tracing::info!("Loaded {} calibrated item parameters (version {})", count, version);
    Ok(())
}

/// Seeds a small demo bank so a fresh deployment can be exercised right
/// away. Skips any subtest that already has questions.
async fn seed_sample_questions(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let subtest_ids = sqlx::query_scalar::<_, i64>("SELECT id FROM subtests ORDER BY id")
        .fetch_all(pool)
        .await?;

    for subtest_id in subtest_ids {
        let existing =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions WHERE subtest_id = ?")
                .bind(subtest_id)
                .fetch_one(pool)
                .await?;
        if existing > 0 {
            continue;
        }

        tracing::info!("Seeding sample questions for subtest {}", subtest_id);
        for number in 1..=5 {
            let options: Vec<String> = ["A", "B", "C", "D", "E"]
                .iter()
                .map(|label| format!("Pilihan {label}"))
                .collect();
            sqlx::query(
                "INSERT INTO questions (subtest_id, content, options, correct_answer, analysis)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(subtest_id)
            .bind(format!("Contoh soal {number} untuk subtes {subtest_id}"))
            .bind(sqlx::types::Json(options))
            .bind("Pilihan A")
            .bind("Pembahasan contoh soal")
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}
