// src/session/exam_session.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptSnapshot, Submission, SubmissionResult, SubmissionStatus, SubmitReason},
        exam::Exam,
    },
    session::{
        clock::{Clock, remaining_at},
        grading::provisional_score,
        ports::{Candidate, ExamCatalog, IdentityProvider, Notification, Notifier, SubmissionService},
    },
};

/// How hard a session tries before giving up on a submission.
#[derive(Debug, Clone)]
pub struct SubmitPolicy {
    /// Extra service calls after the first failure, per submission.
    pub max_retries: u32,
    pub retry_backoff: Duration,
    /// Window after a failed forced timeout submission during which the
    /// candidate may still submit manually before the last forced attempt.
    pub timeout_grace: Duration,
}

impl Default for SubmitPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_backoff: Duration::from_secs(1),
            timeout_grace: Duration::from_secs(30),
        }
    }
}

/// Everything a session needs from the outside world.
#[derive(Clone)]
pub struct SessionDeps {
    pub catalog: Arc<dyn ExamCatalog>,
    pub submissions: Arc<dyn SubmissionService>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub policy: SubmitPolicy,
}

/// Forced timeout submissions allowed per attempt.
const MAX_FORCED_SUBMISSIONS: u8 = 2;

#[derive(Debug)]
struct AttemptState {
    answers: HashMap<String, String>,
    current_question_index: usize,
    remaining_seconds: u64,
    status: SubmissionStatus,
    forced_submissions: u8,
    forced_failed_at: Option<DateTime<Utc>>,
    result: Option<SubmissionResult>,
}

/// One candidate's single attempt at one exam.
///
/// All mutation goes through one async mutex, and the lock is never held
/// across a call to a collaborator. The `InProgress -> Submitting` flip
/// happens under the lock before the submission service is contacted, so
/// a timer tick and a manual submit can never both get past it.
pub struct ExamSession {
    attempt_id: Uuid,
    exam: Exam,
    candidate_id: String,
    started_at: DateTime<Utc>,
    submissions: Arc<dyn SubmissionService>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    policy: SubmitPolicy,
    state: Mutex<AttemptState>,
}

impl ExamSession {
    /// Loads the exam and opens a fresh attempt for the calling candidate.
    ///
    /// Fails with `AuthError` when the caller is not a candidate and with
    /// `NotFound` when the catalog has no such exam.
    pub async fn start(
        deps: &SessionDeps,
        exam_id: &str,
        identity: &impl IdentityProvider,
    ) -> Result<Self, AppError> {
        let candidate = identity.current_candidate()?;

        let exam = deps
            .catalog
            .get(exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam '{}' not found", exam_id)))?;

        if exam.questions.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Exam '{}' has no questions",
                exam_id
            )));
        }

        let session = Self::open(deps, exam, candidate);
        tracing::info!(
            attempt_id = %session.attempt_id,
            exam_id = %session.exam.id,
            candidate_id = %session.candidate_id,
            duration_seconds = session.exam.duration_seconds,
            "Exam attempt started"
        );
        Ok(session)
    }

    fn open(deps: &SessionDeps, exam: Exam, candidate: Candidate) -> Self {
        let state = AttemptState {
            answers: HashMap::new(),
            current_question_index: 0,
            remaining_seconds: exam.duration_seconds,
            status: SubmissionStatus::InProgress,
            forced_submissions: 0,
            forced_failed_at: None,
            result: None,
        };

        Self {
            attempt_id: Uuid::new_v4(),
            exam,
            candidate_id: candidate.id,
            started_at: deps.clock.now(),
            submissions: Arc::clone(&deps.submissions),
            notifier: Arc::clone(&deps.notifier),
            clock: Arc::clone(&deps.clock),
            policy: deps.policy.clone(),
            state: Mutex::new(state),
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn exam(&self) -> &Exam {
        &self.exam
    }

    pub fn candidate_id(&self) -> &str {
        &self.candidate_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub async fn status(&self) -> SubmissionStatus {
        self.state.lock().await.status
    }

    pub async fn result(&self) -> Option<SubmissionResult> {
        self.state.lock().await.result.clone()
    }

    pub async fn snapshot(&self) -> AttemptSnapshot {
        let mut state = self.state.lock().await;
        self.refresh_remaining(&mut state);
        AttemptSnapshot {
            attempt_id: self.attempt_id,
            exam_id: self.exam.id.clone(),
            answers: state.answers.clone(),
            current_question_index: state.current_question_index,
            remaining_seconds: state.remaining_seconds,
            submission_status: state.status,
            result: state.result.clone(),
        }
    }

    /// Records an answer, replacing any earlier one for the question.
    ///
    /// Silently ignored once submission has begun, once time is up, or
    /// for a question that is not part of this exam.
    pub async fn record_answer(&self, question_id: &str, answer: &str) {
        let mut state = self.state.lock().await;
        self.refresh_remaining(&mut state);

        if state.status != SubmissionStatus::InProgress || state.remaining_seconds == 0 {
            tracing::debug!(
                attempt_id = %self.attempt_id,
                question_id,
                status = ?state.status,
                "Ignoring answer outside the answering window"
            );
            return;
        }
        if self.exam.question(question_id).is_none() {
            tracing::warn!(
                attempt_id = %self.attempt_id,
                question_id,
                "Ignoring answer for unknown question"
            );
            return;
        }

        let previous = state
            .answers
            .insert(question_id.to_string(), answer.to_string());
        tracing::debug!(
            attempt_id = %self.attempt_id,
            candidate_id = %self.candidate_id,
            question_id,
            changed = previous.is_some(),
            "Answer recorded"
        );
    }

    /// Moves to `index`, clamped to the question range.
    pub async fn go_to(&self, index: usize) {
        let last = self.exam.question_count().saturating_sub(1);
        self.navigate(|_| index.min(last)).await;
    }

    pub async fn next(&self) {
        let last = self.exam.question_count().saturating_sub(1);
        self.navigate(|current| if current < last { current + 1 } else { current })
            .await;
    }

    pub async fn previous(&self) {
        self.navigate(|current| current.saturating_sub(1)).await;
    }

    async fn navigate(&self, target: impl FnOnce(usize) -> usize) {
        let mut state = self.state.lock().await;
        if state.status != SubmissionStatus::InProgress {
            return;
        }
        state.current_question_index = target(state.current_question_index);
    }

    /// Advances the countdown. Called about once a second by the scheduler.
    ///
    /// Remaining time is derived from the clock, so late or missed ticks do
    /// not make the countdown drift. When time is up a forced submission is
    /// made; if it fails, one more is made after the grace window, and a
    /// second failure closes the attempt as `Failed`.
    pub async fn tick(&self) {
        let submission = {
            let mut state = self.state.lock().await;
            if state.status != SubmissionStatus::InProgress {
                return;
            }
            self.refresh_remaining(&mut state);
            if state.remaining_seconds > 0 {
                return;
            }

            let due = match (state.forced_submissions, state.forced_failed_at) {
                (0, _) => true,
                (n, Some(failed_at)) if n < MAX_FORCED_SUBMISSIONS => {
                    let since = (self.clock.now() - failed_at).to_std().unwrap_or_default();
                    since >= self.policy.timeout_grace
                }
                _ => false,
            };
            if !due {
                return;
            }

            state.forced_submissions += 1;
            tracing::info!(
                attempt_id = %self.attempt_id,
                forced_submission = state.forced_submissions,
                "Time is up, submitting"
            );
            self.begin_submission(&mut state, SubmitReason::Timeout)
        };

        // Failures are already logged and notified inside deliver.
        let _ = self.deliver(submission, true).await;
    }

    /// Submits the attempt.
    ///
    /// Only one submission can be in flight; a call made while one is
    /// running, or after the attempt is closed, is a `Conflict` and never
    /// reaches the submission service.
    ///
    /// Delivery runs on its own task. A caller that stops waiting (a dropped
    /// request) does not stop it, so the attempt always leaves `Submitting`.
    pub async fn submit(self: &Arc<Self>, reason: SubmitReason) -> Result<SubmissionResult, AppError> {
        let submission = {
            let mut state = self.state.lock().await;
            match state.status {
                SubmissionStatus::InProgress => {}
                SubmissionStatus::Submitting => {
                    return Err(AppError::Conflict(
                        "Submission already in progress".to_string(),
                    ));
                }
                SubmissionStatus::Submitted => {
                    return Err(AppError::Conflict("Exam already submitted".to_string()));
                }
                SubmissionStatus::Failed => {
                    return Err(AppError::Conflict("Exam attempt is closed".to_string()));
                }
            }
            self.refresh_remaining(&mut state);
            self.begin_submission(&mut state, reason)
        };

        let session = Arc::clone(self);
        tokio::spawn(async move { session.deliver(submission, false).await })
            .await
            .map_err(|e| {
                tracing::error!(attempt_id = %self.attempt_id, "Submission task failed: {}", e);
                AppError::InternalServerError(e.to_string())
            })?
    }

    /// The check-and-set half of a submission. Caller holds the lock and
    /// has verified the attempt is `InProgress`.
    fn begin_submission(&self, state: &mut AttemptState, reason: SubmitReason) -> Submission {
        state.status = SubmissionStatus::Submitting;

        Submission {
            attempt_id: self.attempt_id,
            exam_id: self.exam.id.clone(),
            candidate_id: self.candidate_id.clone(),
            answers: state.answers.clone(),
            started_at: self.started_at,
            submitted_at: self.clock.now(),
            duration_seconds: self.exam.duration_seconds.saturating_sub(state.remaining_seconds),
            reason,
            score: provisional_score(&self.exam, &state.answers),
        }
    }

    async fn deliver(
        &self,
        submission: Submission,
        forced: bool,
    ) -> Result<SubmissionResult, AppError> {
        let mut retries = 0;
        let outcome = loop {
            match self.submissions.submit(&submission).await {
                Ok(result_id) => break Ok(result_id),
                Err(e) if retries < self.policy.max_retries => {
                    retries += 1;
                    tracing::warn!(
                        attempt_id = %self.attempt_id,
                        retry = retries,
                        "Submission failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(self.policy.retry_backoff).await;
                }
                Err(e) => break Err(e),
            }
        };

        let mut state = self.state.lock().await;
        match outcome {
            Ok(result_id) => {
                let result = SubmissionResult {
                    result_id,
                    provisional_score: submission.score.awarded,
                    total_possible: submission.score.total_possible,
                    pending_theory_marks: submission.score.pending_theory_marks,
                    reason: submission.reason,
                    submitted_at: submission.submitted_at,
                };
                state.status = SubmissionStatus::Submitted;
                state.result = Some(result.clone());
                drop(state);

                tracing::info!(
                    attempt_id = %self.attempt_id,
                    exam_id = %self.exam.id,
                    candidate_id = %self.candidate_id,
                    reason = submission.reason.as_str(),
                    score = result.provisional_score,
                    total = result.total_possible,
                    "Exam submitted"
                );
                self.notifier.notify(Notification::success(
                    &self.candidate_id,
                    "Exam submitted successfully",
                ));
                Ok(result)
            }
            Err(e) => {
                let closed = forced && state.forced_submissions >= MAX_FORCED_SUBMISSIONS;
                if closed {
                    state.status = SubmissionStatus::Failed;
                } else {
                    state.status = SubmissionStatus::InProgress;
                    if forced {
                        state.forced_failed_at = Some(self.clock.now());
                    }
                }
                drop(state);

                if closed {
                    tracing::error!(
                        attempt_id = %self.attempt_id,
                        candidate_id = %self.candidate_id,
                        "Final forced submission failed, attempt closed: {}",
                        e
                    );
                    self.notifier.notify(Notification::error(
                        &self.candidate_id,
                        "Your exam could not be submitted. Please contact an administrator.",
                    ));
                } else {
                    tracing::warn!(
                        attempt_id = %self.attempt_id,
                        reason = submission.reason.as_str(),
                        "Submission failed, attempt reopened: {}",
                        e
                    );
                    self.notifier.notify(Notification::error(
                        &self.candidate_id,
                        "Failed to submit exam. Your answers are saved, please try again.",
                    ));
                }
                Err(AppError::SubmissionFailed(e.to_string()))
            }
        }
    }

    fn refresh_remaining(&self, state: &mut AttemptState) {
        if state.status.is_terminal() {
            return;
        }
        let remaining = remaining_at(self.started_at, self.exam.duration_seconds, self.clock.now());
        state.remaining_seconds = state.remaining_seconds.min(remaining);
    }

    /// Drives `tick` once a second until the attempt is closed.
    pub fn spawn_countdown(self: &Arc<Self>) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if session.status().await.is_terminal() {
                    break;
                }
                session.tick().await;
            }
            tracing::debug!(attempt_id = %session.attempt_id, "Countdown stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use chrono::Utc;

    use super::*;
    use crate::{
        models::exam::{Question, QuestionKind},
        services::memory::{InMemoryExamCatalog, InMemorySubmissionStore},
        session::clock::ManualClock,
    };

    #[derive(Default)]
    struct RecordingNotifier {
        seen: StdMutex<Vec<Notification>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: Notification) {
            self.seen.lock().unwrap().push(notification);
        }
    }

    impl RecordingNotifier {
        fn errors(&self) -> usize {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .filter(|n| n.level == crate::session::NotificationLevel::Error)
                .count()
        }
    }

    struct Student(&'static str);

    impl IdentityProvider for Student {
        fn current_candidate(&self) -> Result<Candidate, AppError> {
            Ok(Candidate {
                id: self.0.to_string(),
            })
        }
    }

    struct Anonymous;

    impl IdentityProvider for Anonymous {
        fn current_candidate(&self) -> Result<Candidate, AppError> {
            Err(AppError::AuthError("not logged in".to_string()))
        }
    }

    struct Harness {
        deps: SessionDeps,
        clock: Arc<ManualClock>,
        store: Arc<InMemorySubmissionStore>,
        notifier: Arc<RecordingNotifier>,
    }

    fn pi_question() -> Question {
        Question {
            id: "q1".to_string(),
            prompt: "What is the value of pi approximately?".to_string(),
            marks: 5,
            kind: QuestionKind::Objective {
                options: vec!["3.14".to_string(), "3.41".to_string(), "3.04".to_string()],
                correct_answer: "3.14".to_string(),
            },
        }
    }

    fn exam(questions: Vec<Question>) -> Exam {
        let total_marks = questions.iter().map(|q| q.marks).sum();
        Exam {
            id: "math".to_string(),
            title: "Mathematics".to_string(),
            description: String::new(),
            duration_seconds: 60,
            total_marks,
            passing_score: 3,
            questions,
        }
    }

    fn harness_with(store: InMemorySubmissionStore, questions: Vec<Question>) -> Harness {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(store);
        let notifier = Arc::new(RecordingNotifier::default());
        let deps = SessionDeps {
            catalog: Arc::new(InMemoryExamCatalog::with_exams(vec![exam(questions)])),
            submissions: store.clone(),
            notifier: notifier.clone(),
            clock: clock.clone(),
            policy: SubmitPolicy {
                max_retries: 1,
                retry_backoff: Duration::ZERO,
                timeout_grace: Duration::from_secs(30),
            },
        };
        Harness {
            deps,
            clock,
            store,
            notifier,
        }
    }

    fn harness() -> Harness {
        harness_with(InMemorySubmissionStore::new(), vec![pi_question()])
    }

    async fn started(h: &Harness) -> Arc<ExamSession> {
        Arc::new(
            ExamSession::start(&h.deps, "math", &Student("VSP-24-PR-0001"))
                .await
                .unwrap(),
        )
    }

    async fn elapse(h: &Harness, session: &ExamSession, seconds: u32) {
        for _ in 0..seconds {
            h.clock.advance_secs(1);
            session.tick().await;
        }
    }

    #[tokio::test]
    async fn start_initializes_attempt() {
        let h = harness();
        let session = started(&h).await;
        let snap = session.snapshot().await;
        assert_eq!(snap.remaining_seconds, 60);
        assert_eq!(snap.current_question_index, 0);
        assert!(snap.answers.is_empty());
        assert_eq!(snap.submission_status, SubmissionStatus::InProgress);
    }

    #[tokio::test]
    async fn start_rejects_unknown_exam() {
        let h = harness();
        let err = ExamSession::start(&h.deps, "missing", &Student("s1"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn start_rejects_unauthenticated_caller() {
        let h = harness();
        let err = ExamSession::start(&h.deps, "math", &Anonymous)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[tokio::test]
    async fn last_answer_wins() {
        let h = harness();
        let session = started(&h).await;
        for answer in ["3.41", "3.04", "3.14"] {
            session.record_answer("q1", answer).await;
        }
        assert_eq!(session.snapshot().await.answers["q1"], "3.14");
    }

    #[tokio::test]
    async fn empty_answer_is_accepted() {
        let h = harness();
        let session = started(&h).await;
        session.record_answer("q1", "").await;
        assert_eq!(session.snapshot().await.answers["q1"], "");
    }

    #[tokio::test]
    async fn answer_for_unknown_question_is_ignored() {
        let h = harness();
        let session = started(&h).await;
        session.record_answer("q99", "x").await;
        assert!(session.snapshot().await.answers.is_empty());
    }

    #[tokio::test]
    async fn ticks_count_down_to_zero() {
        let h = harness();
        let session = started(&h).await;
        for n in 1..=70u64 {
            h.clock.advance_secs(1);
            session.tick().await;
            assert_eq!(session.snapshot().await.remaining_seconds, 60u64.saturating_sub(n));
        }
    }

    #[tokio::test]
    async fn missed_ticks_do_not_cause_drift() {
        let h = harness();
        let session = started(&h).await;
        h.clock.advance_secs(10);
        session.tick().await;
        assert_eq!(session.snapshot().await.remaining_seconds, 50);
    }

    #[tokio::test]
    async fn clock_stepping_back_adds_no_time() {
        let h = harness();
        let session = started(&h).await;
        h.clock.advance_secs(20);
        session.tick().await;
        h.clock.advance_secs(-15);
        session.tick().await;
        assert_eq!(session.snapshot().await.remaining_seconds, 40);
    }

    #[tokio::test]
    async fn manual_submit_scores_correct_answer() {
        let h = harness();
        let session = started(&h).await;
        session.record_answer("q1", "3.14").await;

        let result = session.submit(SubmitReason::Manual).await.unwrap();
        assert_eq!(result.provisional_score, 5);
        assert_eq!(result.total_possible, 5);
        assert_eq!(result.reason, SubmitReason::Manual);
        assert_eq!(session.status().await, SubmissionStatus::Submitted);

        let stored = h.store.get(session.attempt_id()).await.unwrap();
        assert_eq!(stored.reason, SubmitReason::Manual);
        assert_eq!(stored.candidate_id, "VSP-24-PR-0001");
    }

    #[tokio::test]
    async fn timeout_submits_exactly_once() {
        let h = harness();
        let session = started(&h).await;
        session.record_answer("q1", "3.41").await;

        elapse(&h, &session, 59).await;
        assert_eq!(h.store.calls(), 0);

        elapse(&h, &session, 1).await;
        assert_eq!(h.store.calls(), 1);

        elapse(&h, &session, 30).await;
        assert_eq!(h.store.calls(), 1);

        let result = session.result().await.unwrap();
        assert_eq!(result.reason, SubmitReason::Timeout);
        assert_eq!(result.provisional_score, 0);
        assert_eq!(result.total_possible, 5);
        assert_eq!(h.store.get(session.attempt_id()).await.unwrap().duration_seconds, 60);
    }

    #[tokio::test]
    async fn next_on_last_question_is_clamped() {
        let h = harness();
        let session = started(&h).await;
        session.next().await;
        assert_eq!(session.snapshot().await.current_question_index, 0);
    }

    #[tokio::test]
    async fn navigation_clamps_and_keeps_state() {
        let mut theory = pi_question();
        theory.id = "q2".to_string();
        theory.kind = QuestionKind::Theory;
        let h = harness_with(InMemorySubmissionStore::new(), vec![pi_question(), theory]);
        let session = started(&h).await;
        session.record_answer("q1", "3.14").await;

        session.previous().await;
        assert_eq!(session.snapshot().await.current_question_index, 0);
        session.go_to(42).await;
        assert_eq!(session.snapshot().await.current_question_index, 1);
        session.previous().await;
        session.next().await;

        let snap = session.snapshot().await;
        assert_eq!(snap.current_question_index, 1);
        assert_eq!(snap.answers["q1"], "3.14");
        assert_eq!(snap.remaining_seconds, 60);
    }

    #[tokio::test]
    async fn theory_answers_do_not_score() {
        let mut theory = pi_question();
        theory.id = "q2".to_string();
        theory.marks = 10;
        theory.kind = QuestionKind::Theory;
        let h = harness_with(InMemorySubmissionStore::new(), vec![pi_question(), theory]);
        let session = started(&h).await;
        session.record_answer("q2", "3.14").await;

        let result = session.submit(SubmitReason::Manual).await.unwrap();
        assert_eq!(result.provisional_score, 0);
        assert_eq!(result.total_possible, 15);
        assert_eq!(result.pending_theory_marks, 10);
    }

    #[tokio::test]
    async fn concurrent_submits_reach_service_once() {
        let h = harness_with(
            InMemorySubmissionStore::new().with_latency(Duration::from_millis(50)),
            vec![pi_question()],
        );
        let session = started(&h).await;

        let (a, b) = tokio::join!(
            session.submit(SubmitReason::Manual),
            session.submit(SubmitReason::Manual)
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert!(matches!(a.err().or(b.err()), Some(AppError::Conflict(_))));
        assert_eq!(h.store.calls(), 1);
    }

    #[tokio::test]
    async fn timeout_racing_manual_submit_reaches_service_once() {
        let h = harness_with(
            InMemorySubmissionStore::new().with_latency(Duration::from_millis(50)),
            vec![pi_question()],
        );
        let session = started(&h).await;
        h.clock.advance_secs(60);

        let (_, manual) = tokio::join!(session.tick(), session.submit(SubmitReason::Manual));
        assert_eq!(h.store.calls(), 1);
        assert_eq!(session.status().await, SubmissionStatus::Submitted);
        // Whichever path lost the race was turned away at the guard.
        if let Err(e) = manual {
            assert!(matches!(e, AppError::Conflict(_)));
        }
    }

    #[tokio::test]
    async fn failure_then_retry_persists_once() {
        let h = harness();
        h.store.fail_next(1);
        let session = started(&h).await;
        session.record_answer("q1", "3.14").await;

        let result = session.submit(SubmitReason::Manual).await.unwrap();
        assert_eq!(session.status().await, SubmissionStatus::Submitted);
        assert_eq!(h.store.calls(), 2);
        assert_eq!(h.store.len().await, 1);
        assert_eq!(result.provisional_score, 5);
    }

    #[tokio::test]
    async fn exhausted_retries_reopen_attempt() {
        let h = harness();
        h.store.fail_next(2);
        let session = started(&h).await;
        session.record_answer("q1", "3.14").await;

        let err = session.submit(SubmitReason::Manual).await.unwrap_err();
        assert!(matches!(err, AppError::SubmissionFailed(_)));
        assert_eq!(session.status().await, SubmissionStatus::InProgress);
        assert_eq!(session.snapshot().await.answers["q1"], "3.14");
        assert_eq!(h.notifier.errors(), 1);

        // The candidate can try again.
        session.submit(SubmitReason::Manual).await.unwrap();
        assert_eq!(h.store.len().await, 1);
    }

    #[tokio::test]
    async fn answers_after_submission_are_ignored() {
        let h = harness();
        let session = started(&h).await;
        session.record_answer("q1", "3.14").await;
        session.submit(SubmitReason::Manual).await.unwrap();

        session.record_answer("q1", "3.41").await;
        session.go_to(0).await;
        let snap = session.snapshot().await;
        assert_eq!(snap.answers["q1"], "3.14");
        assert_eq!(snap.submission_status, SubmissionStatus::Submitted);

        let again = session.submit(SubmitReason::Manual).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
        assert_eq!(h.store.calls(), 1);
    }

    #[tokio::test]
    async fn answers_freeze_when_time_is_up() {
        let h = harness();
        h.store.fail_next(usize::MAX);
        let session = started(&h).await;
        session.record_answer("q1", "3.41").await;
        elapse(&h, &session, 60).await;

        // Forced submission failed and the attempt reopened, but time is up.
        assert_eq!(session.status().await, SubmissionStatus::InProgress);
        session.record_answer("q1", "3.14").await;
        assert_eq!(session.snapshot().await.answers["q1"], "3.41");
    }

    #[tokio::test]
    async fn manual_submit_allowed_in_grace_window() {
        let h = harness();
        h.store.fail_next(2);
        let session = started(&h).await;
        elapse(&h, &session, 60).await;
        assert_eq!(session.status().await, SubmissionStatus::InProgress);

        let result = session.submit(SubmitReason::Manual).await.unwrap();
        assert_eq!(result.reason, SubmitReason::Manual);
    }

    #[tokio::test]
    async fn second_forced_failure_closes_attempt() {
        let h = harness();
        h.store.fail_next(usize::MAX);
        let session = started(&h).await;
        elapse(&h, &session, 60).await;
        let after_first = h.store.calls();
        assert_eq!(after_first, 2);

        // Inside the grace window nothing is retried.
        elapse(&h, &session, 29).await;
        assert_eq!(h.store.calls(), after_first);

        elapse(&h, &session, 1).await;
        assert_eq!(h.store.calls(), after_first + 2);
        assert_eq!(session.status().await, SubmissionStatus::Failed);

        elapse(&h, &session, 60).await;
        assert_eq!(h.store.calls(), after_first + 2);
        assert!(matches!(
            session.submit(SubmitReason::Manual).await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(h.notifier.errors(), 2);
    }

    #[tokio::test]
    async fn second_forced_attempt_can_succeed() {
        let h = harness();
        h.store.fail_next(2);
        let session = started(&h).await;
        elapse(&h, &session, 60).await;
        elapse(&h, &session, 30).await;

        assert_eq!(session.status().await, SubmissionStatus::Submitted);
        assert_eq!(session.result().await.unwrap().reason, SubmitReason::Timeout);
        assert_eq!(h.store.len().await, 1);
    }

    #[tokio::test]
    async fn abandoned_submit_still_completes() {
        let h = harness_with(
            InMemorySubmissionStore::new().with_latency(Duration::from_millis(200)),
            vec![pi_question()],
        );
        let session = started(&h).await;
        session.record_answer("q1", "3.14").await;

        // The caller gives up long before the store answers.
        let waited =
            tokio::time::timeout(Duration::from_millis(50), session.submit(SubmitReason::Manual))
                .await;
        assert!(waited.is_err());
        assert_eq!(session.status().await, SubmissionStatus::Submitting);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(session.status().await, SubmissionStatus::Submitted);
        assert_eq!(h.store.len().await, 1);
        assert_eq!(session.result().await.unwrap().provisional_score, 5);
    }

    #[tokio::test]
    async fn abandoned_failing_submit_reopens_attempt() {
        let h = harness_with(
            InMemorySubmissionStore::new().with_latency(Duration::from_millis(100)),
            vec![pi_question()],
        );
        h.store.fail_next(2);
        let session = started(&h).await;

        let waited =
            tokio::time::timeout(Duration::from_millis(20), session.submit(SubmitReason::Manual))
                .await;
        assert!(waited.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(session.status().await, SubmissionStatus::InProgress);
        session.submit(SubmitReason::Manual).await.unwrap();
        assert_eq!(h.store.len().await, 1);
    }
}
