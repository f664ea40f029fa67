// src/session/ports.rs

//! Collaborators an exam session talks to. Real implementations live in
//! `crate::services`; tests swap in their own.

use async_trait::async_trait;
use serde::Serialize;

use crate::{
    error::AppError,
    models::{
        attempt::{ResultRecord, Submission},
        exam::Exam,
    },
};

/// Supplies exam content.
#[async_trait]
pub trait ExamCatalog: Send + Sync {
    /// `Ok(None)` when no exam has this id.
    async fn get(&self, exam_id: &str) -> Result<Option<Exam>, AppError>;
}

/// Persists finished attempts and reads them back.
///
/// `submit` must be idempotent on `Submission::attempt_id`: submitting an
/// attempt that was already stored returns the stored result id.
#[async_trait]
pub trait SubmissionService: Send + Sync {
    async fn submit(&self, submission: &Submission) -> Result<String, AppError>;

    /// The stored result of `candidate_id` for `exam_id`, if any.
    async fn find(
        &self,
        exam_id: &str,
        candidate_id: &str,
    ) -> Result<Option<ResultRecord>, AppError>;

    /// All results of one candidate, newest first.
    async fn for_candidate(&self, candidate_id: &str) -> Result<Vec<ResultRecord>, AppError>;

    /// All results for one exam, newest first.
    async fn for_exam(&self, exam_id: &str) -> Result<Vec<ResultRecord>, AppError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
}

/// Who is asking to sit an exam.
pub trait IdentityProvider {
    /// `Err(AppError::AuthError)` unless the caller is an authenticated candidate.
    fn current_candidate(&self) -> Result<Candidate, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub candidate_id: String,
    pub message: String,
}

impl Notification {
    pub fn success(candidate_id: &str, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            candidate_id: candidate_id.to_string(),
            message: message.into(),
        }
    }

    pub fn error(candidate_id: &str, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            candidate_id: candidate_id.to_string(),
            message: message.into(),
        }
    }
}

/// Surfaces success/failure messages to the candidate.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}
