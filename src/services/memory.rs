// src/services/memory.rs

//! Process-local catalog and submission store, used by tests and demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{ResultRecord, Submission},
        exam::Exam,
    },
    session::{ExamCatalog, SubmissionService},
};

#[derive(Default)]
pub struct InMemoryExamCatalog {
    exams: RwLock<HashMap<String, Exam>>,
}

impl InMemoryExamCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exams(exams: Vec<Exam>) -> Self {
        Self {
            exams: RwLock::new(exams.into_iter().map(|e| (e.id.clone(), e)).collect()),
        }
    }
}

#[async_trait]
impl ExamCatalog for InMemoryExamCatalog {
    async fn get(&self, exam_id: &str) -> Result<Option<Exam>, AppError> {
        Ok(self.exams.read().await.get(exam_id).cloned())
    }
}

/// Keeps one result per attempt. Can be told to fail upcoming calls and to
/// answer slowly.
#[derive(Default)]
pub struct InMemorySubmissionStore {
    results: RwLock<HashMap<Uuid, (String, Submission)>>,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
    latency: Duration,
}

impl InMemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Makes the next `n` calls fail.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Calls received, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Results actually stored.
    pub async fn len(&self) -> usize {
        self.results.read().await.len()
    }

    /// Stored results accepted by `filter`, newest first.
    async fn matching(&self, filter: impl Fn(&Submission) -> bool) -> Vec<ResultRecord> {
        let mut found: Vec<ResultRecord> = self
            .results
            .read()
            .await
            .values()
            .filter(|(_, s)| filter(s))
            .map(|(id, s)| ResultRecord::new(id.clone(), s))
            .collect();
        found.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        found
    }

    pub async fn get(&self, attempt_id: Uuid) -> Option<Submission> {
        self.results
            .read()
            .await
            .get(&attempt_id)
            .map(|(_, s)| s.clone())
    }
}

#[async_trait]
impl SubmissionService for InMemorySubmissionStore {
    async fn submit(&self, submission: &Submission) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::InternalServerError(
                "submission store unavailable".to_string(),
            ));
        }

        let mut results = self.results.write().await;
        let (result_id, _) = results
            .entry(submission.attempt_id)
            .or_insert_with(|| (Uuid::new_v4().to_string(), submission.clone()));
        Ok(result_id.clone())
    }

    async fn find(
        &self,
        exam_id: &str,
        candidate_id: &str,
    ) -> Result<Option<ResultRecord>, AppError> {
        Ok(self
            .matching(|s| s.exam_id == exam_id && s.candidate_id == candidate_id)
            .await
            .into_iter()
            .next())
    }

    async fn for_candidate(&self, candidate_id: &str) -> Result<Vec<ResultRecord>, AppError> {
        Ok(self.matching(|s| s.candidate_id == candidate_id).await)
    }

    async fn for_exam(&self, exam_id: &str) -> Result<Vec<ResultRecord>, AppError> {
        Ok(self.matching(|s| s.exam_id == exam_id).await)
    }
}
