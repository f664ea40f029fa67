// src/models/attempt.rs

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, models::exam::PublicExam};

/// Lifecycle of an attempt. Only moves forward, except that a failed
/// submission returns `Submitting` to `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    InProgress,
    Submitting,
    Submitted,
    /// The final forced timeout submission failed. Terminal.
    Failed,
}

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Submitted | SubmissionStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitReason {
    Manual,
    Timeout,
}

impl SubmitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitReason::Manual => "manual",
            SubmitReason::Timeout => "timeout",
        }
    }
}

impl FromStr for SubmitReason {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(SubmitReason::Manual),
            "timeout" => Ok(SubmitReason::Timeout),
            other => Err(AppError::InternalServerError(format!(
                "Unknown submit reason '{}'",
                other
            ))),
        }
    }
}

/// Provisional grading of an attempt. Theory marks await manual grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub awarded: u32,
    pub total_possible: u32,
    pub pending_theory_marks: u32,
}

/// Payload handed to the submission service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// Idempotency key: one persisted result per attempt.
    pub attempt_id: Uuid,
    pub exam_id: String,
    pub candidate_id: String,
    pub answers: HashMap<String, String>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    /// Seconds the candidate actually spent, capped at the exam duration.
    pub duration_seconds: u64,
    pub reason: SubmitReason,
    pub score: Score,
}

/// A persisted result as read back from the submission store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    pub result_id: String,
    pub attempt_id: Uuid,
    pub exam_id: String,
    pub candidate_id: String,
    pub answers: HashMap<String, String>,
    pub provisional_score: u32,
    pub total_possible: u32,
    pub pending_theory_marks: u32,
    pub duration_seconds: u64,
    pub reason: SubmitReason,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
}

impl ResultRecord {
    pub fn new(result_id: String, submission: &Submission) -> Self {
        Self {
            result_id,
            attempt_id: submission.attempt_id,
            exam_id: submission.exam_id.clone(),
            candidate_id: submission.candidate_id.clone(),
            answers: submission.answers.clone(),
            provisional_score: submission.score.awarded,
            total_possible: submission.score.total_possible,
            pending_theory_marks: submission.score.pending_theory_marks,
            duration_seconds: submission.duration_seconds,
            reason: submission.reason,
            started_at: submission.started_at,
            submitted_at: submission.submitted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub result_id: String,
    pub provisional_score: u32,
    pub total_possible: u32,
    pub pending_theory_marks: u32,
    pub reason: SubmitReason,
    pub submitted_at: DateTime<Utc>,
}

/// Snapshot of the mutable attempt state.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptSnapshot {
    pub attempt_id: Uuid,
    pub exam_id: String,
    pub answers: HashMap<String, String>,
    pub current_question_index: usize,
    pub remaining_seconds: u64,
    pub submission_status: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SubmissionResult>,
}

/// Response body for the attempt endpoints.
#[derive(Debug, Serialize)]
pub struct AttemptView {
    #[serde(flatten)]
    pub state: AttemptSnapshot,
    /// Countdown formatted for display (`M:SS` or `H:MM:SS`).
    pub time_display: String,
    pub low_time: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam: Option<PublicExam>,
}

/// DTO for recording an answer.
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_id: String,
    /// Any text is accepted, including the empty string.
    pub answer: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NavigateRequest {
    Next,
    Previous,
    Goto { index: usize },
}
