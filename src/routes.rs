// src/routes.rs

use axum::{
    Router,
    http::Method,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, exam, results},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (exam, results, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, parameter snapshot).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:5173".parse().unwrap(),
        "http://127.0.0.1:5173".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let exam_routes = Router::new()
        .route("/subtests", get(exam::list_subtests))
        .route("/paper/{subtest_id}", get(exam::get_paper))
        .route("/submit", post(exam::submit_attempt));

    let results_routes = Router::new()
        .route("/{student_id}", get(results::get_results))
        .route("/{student_id}/profile", get(results::get_profile));

    let admin_routes = Router::new()
        .route("/statistics", get(admin::get_statistics))
        .route("/calibration", get(admin::calibration_status))
        .route("/calibration/run", post(admin::run_calibration))
        .route(
            "/students",
            get(admin::list_students).post(admin::create_student),
        )
        .route(
            "/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route("/questions/review", get(admin::questions_needing_review))
        .route(
            "/questions/{id}",
            put(admin::update_question).delete(admin::delete_question),
        );

    Router::new()
        .nest("/api/exam", exam_routes)
        .nest("/api/results", results_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
