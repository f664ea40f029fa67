// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, cbt, exams},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, staff_middleware, student_middleware},
};

/// Assembles the main application router.
///
/// * Public: login.
/// * Admin: account creation and ID tools.
/// * Staff/admin: exam authoring and result listing.
/// * Student: exam taking and own results.
///
/// Protected groups run `auth_middleware` first, then their role check.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_layer = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new().route("/login", post(auth::login));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/students", post(admin::create_student))
        .route("/staff", post(admin::create_staff))
        .route("/ids/preview", post(admin::preview_ids))
        .route("/ids/{login_id}", get(admin::parse_id))
        .layer(
            ServiceBuilder::new()
                .layer(auth_layer.clone())
                .layer(middleware::from_fn(admin_middleware)),
        );

    let exam_routes = Router::new()
        .route("/", post(exams::create_exam))
        .route("/{exam_id}", get(exams::get_exam))
        .route("/{exam_id}/results", get(exams::list_exam_results))
        .layer(
            ServiceBuilder::new()
                .layer(auth_layer.clone())
                .layer(middleware::from_fn(staff_middleware)),
        );

    let cbt_routes = Router::new()
        .route("/exams/{exam_id}/start", post(cbt::start_exam))
        .route("/attempts/{attempt_id}", get(cbt::get_attempt))
        .route("/attempts/{attempt_id}/answers", put(cbt::record_answer))
        .route("/attempts/{attempt_id}/navigate", post(cbt::navigate))
        .route("/attempts/{attempt_id}/submit", post(cbt::submit_attempt))
        .route("/results", get(cbt::list_results))
        .layer(
            ServiceBuilder::new()
                .layer(auth_layer)
                .layer(middleware::from_fn(student_middleware)),
        );

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/exams", exam_routes)
        .nest("/api/cbt", cbt_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
