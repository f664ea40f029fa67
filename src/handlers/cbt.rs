// src/handlers/cbt.rs

//! Computer-based test endpoints. Every attempt belongs to the student who
//! started it; other callers get 404.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{AnswerRequest, AttemptView, NavigateRequest, SubmitReason},
        exam::PublicExam,
    },
    session::{ExamSession, SessionDeps, SessionRegistry},
    utils::{
        format::{format_countdown, is_low_time},
        jwt::Claims,
    },
};

async fn attempt_view(session: &ExamSession, with_exam: bool) -> AttemptView {
    let state = session.snapshot().await;
    AttemptView {
        time_display: format_countdown(state.remaining_seconds),
        low_time: is_low_time(state.remaining_seconds),
        exam: with_exam.then(|| PublicExam::from(session.exam())),
        state,
    }
}

/// Opens (or resumes) the caller's attempt at an exam.
///
/// 201 with the exam and fresh state for a new attempt, 200 when an
/// attempt was already running.
pub async fn start_exam(
    State(registry): State<SessionRegistry>,
    State(deps): State<SessionDeps>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (session, created) = registry.start(&deps, &exam_id, &claims).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(attempt_view(&session, true).await)))
}

pub async fn get_attempt(
    State(registry): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry.get_owned(attempt_id, &claims.sub).await?;
    Ok(Json(attempt_view(&session, true).await))
}

/// Records an answer. Late answers are dropped silently; the returned
/// state shows what was kept.
pub async fn record_answer(
    State(registry): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry.get_owned(attempt_id, &claims.sub).await?;
    session
        .record_answer(&payload.question_id, &payload.answer)
        .await;
    Ok(Json(attempt_view(&session, false).await))
}

pub async fn navigate(
    State(registry): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
    Json(payload): Json<NavigateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry.get_owned(attempt_id, &claims.sub).await?;
    match payload {
        NavigateRequest::Next => session.next().await,
        NavigateRequest::Previous => session.previous().await,
        NavigateRequest::Goto { index } => session.go_to(index).await,
    }
    Ok(Json(attempt_view(&session, false).await))
}

/// Manual submission. 409 if a submission is already running or done,
/// 503 if the result could not be stored (the attempt stays open).
pub async fn submit_attempt(
    State(registry): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry.get_owned(attempt_id, &claims.sub).await?;
    let result = session.submit(SubmitReason::Manual).await?;
    Ok(Json(result))
}

/// The caller's stored results, newest first. Survives restarts, unlike
/// the attempts themselves.
pub async fn list_results(
    State(deps): State<SessionDeps>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let results = deps.submissions.for_candidate(&claims.sub).await?;
    Ok(Json(results))
}
