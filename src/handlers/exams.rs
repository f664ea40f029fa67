// src/handlers/exams.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::exam::CreateExamRequest,
    session::ExamCatalog,
    state::AppState,
    utils::jwt::Claims,
};

/// Creates an exam with its questions.
/// Staff or admin.
pub async fn create_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let exam = payload.into_exam(uuid::Uuid::new_v4().to_string())?;
    state.exams.create(&exam, &claims.sub).await?;

    tracing::info!(
        exam_id = %exam.id,
        created_by = %claims.sub,
        questions = exam.question_count(),
        "Exam created"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": exam.id,
            "total_marks": exam.total_marks,
            "duration_seconds": exam.duration_seconds,
        })),
    ))
}

/// Returns an exam including its answer key.
/// Staff or admin.
pub async fn get_exam(
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let exam = state
        .exams
        .get(&exam_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Exam '{}' not found", exam_id)))?;

    Ok(Json(exam))
}

/// Every stored result for an exam, newest first, answers included for
/// theory grading.
/// Staff or admin.
pub async fn list_exam_results(
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let results = state.session_deps.submissions.for_exam(&exam_id).await?;

    tracing::debug!(exam_id = %exam_id, count = results.len(), "Listed exam results");

    Ok(Json(results))
}
