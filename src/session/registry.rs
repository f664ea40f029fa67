// src/session/registry.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::{sync::RwLock, task::JoinHandle};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::attempt::SubmissionStatus,
    session::{ExamSession, IdentityProvider, SessionDeps},
};

#[derive(Default)]
struct Sessions {
    by_attempt: HashMap<Uuid, Arc<ExamSession>>,
    /// (candidate id, exam id) -> attempt id
    by_candidate: HashMap<(String, String), Uuid>,
}

/// Live attempts, at most one per candidate per exam.
///
/// A closed attempt is kept for `retention` after its countdown stops and
/// then forgotten; its result lives on in the submission store.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<Sessions>>,
    retention: Duration,
}

impl SessionRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Sessions::default())),
            retention,
        }
    }

    /// Opens an attempt for the caller, or hands back the one already
    /// running (its countdown is not reset). A closed attempt cannot be
    /// reopened, and neither can one whose result is already stored.
    ///
    /// The second value is `true` when a new attempt was created; its
    /// countdown task is already running.
    pub async fn start(
        &self,
        deps: &SessionDeps,
        exam_id: &str,
        identity: &impl IdentityProvider,
    ) -> Result<(Arc<ExamSession>, bool), AppError> {
        let candidate = identity.current_candidate()?;
        let key = (candidate.id, exam_id.to_string());

        if let Some(existing) = self.existing(&key).await? {
            return Ok((existing, false));
        }
        if let Some(stored) = deps.submissions.find(exam_id, &key.0).await? {
            tracing::info!(
                candidate_id = %key.0,
                exam_id,
                result_id = %stored.result_id,
                "Refusing restart of a submitted exam"
            );
            return Err(AppError::Conflict("Exam already submitted".to_string()));
        }

        let session = Arc::new(ExamSession::start(deps, exam_id, identity).await?);

        let mut sessions = self.inner.write().await;
        // Another request for the same pair may have won while the exam loaded.
        if let Some(attempt_id) = sessions.by_candidate.get(&key) {
            if let Some(existing) = sessions.by_attempt.get(attempt_id) {
                return Ok((Arc::clone(existing), false));
            }
        }
        sessions
            .by_attempt
            .insert(session.attempt_id(), Arc::clone(&session));
        sessions.by_candidate.insert(key, session.attempt_id());
        drop(sessions);

        let countdown = session.spawn_countdown();
        self.evict_when_closed(session.attempt_id(), countdown);
        Ok((session, true))
    }

    fn evict_when_closed(&self, attempt_id: Uuid, countdown: JoinHandle<()>) {
        let registry = self.clone();
        tokio::spawn(async move {
            // The countdown only stops once the attempt is closed.
            if let Err(e) = countdown.await {
                tracing::error!(attempt_id = %attempt_id, "Countdown task failed: {}", e);
            }
            tokio::time::sleep(registry.retention).await;
            registry.remove(attempt_id).await;
        });
    }

    async fn remove(&self, attempt_id: Uuid) {
        let mut sessions = self.inner.write().await;
        let Some(session) = sessions.by_attempt.remove(&attempt_id) else {
            return;
        };
        let key = (session.candidate_id().to_string(), session.exam().id.clone());
        if sessions.by_candidate.get(&key) == Some(&attempt_id) {
            sessions.by_candidate.remove(&key);
        }
        tracing::debug!(attempt_id = %attempt_id, "Closed attempt evicted");
    }

    async fn existing(&self, key: &(String, String)) -> Result<Option<Arc<ExamSession>>, AppError> {
        let session = {
            let sessions = self.inner.read().await;
            sessions
                .by_candidate
                .get(key)
                .and_then(|id| sessions.by_attempt.get(id))
                .cloned()
        };

        let Some(session) = session else {
            return Ok(None);
        };
        match session.status().await {
            SubmissionStatus::Submitted => Err(AppError::Conflict(
                "Exam already submitted".to_string(),
            )),
            SubmissionStatus::Failed => Err(AppError::Conflict(
                "Exam attempt is closed".to_string(),
            )),
            _ => Ok(Some(session)),
        }
    }

    pub async fn get(&self, attempt_id: Uuid) -> Option<Arc<ExamSession>> {
        self.inner.read().await.by_attempt.get(&attempt_id).cloned()
    }

    /// Looks up an attempt owned by `candidate_id`. Someone else's attempt
    /// is reported as missing.
    pub async fn get_owned(
        &self,
        attempt_id: Uuid,
        candidate_id: &str,
    ) -> Result<Arc<ExamSession>, AppError> {
        self.get(attempt_id)
            .await
            .filter(|s| s.candidate_id() == candidate_id)
            .ok_or_else(|| AppError::NotFound(format!("Attempt '{}' not found", attempt_id)))
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_attempt.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            attempt::SubmitReason,
            exam::{Exam, Question, QuestionKind},
        },
        services::{
            memory::{InMemoryExamCatalog, InMemorySubmissionStore},
            notify::TracingNotifier,
        },
        session::{Candidate, ManualClock, SubmitPolicy},
    };

    struct Student(&'static str);

    impl IdentityProvider for Student {
        fn current_candidate(&self) -> Result<Candidate, AppError> {
            Ok(Candidate {
                id: self.0.to_string(),
            })
        }
    }

    fn deps() -> SessionDeps {
        deps_with(Arc::new(InMemorySubmissionStore::new()))
    }

    fn deps_with(store: Arc<InMemorySubmissionStore>) -> SessionDeps {
        let exam = Exam {
            id: "math".to_string(),
            title: "Mathematics".to_string(),
            description: String::new(),
            duration_seconds: 600,
            total_marks: 5,
            passing_score: 3,
            questions: vec![Question {
                id: "q1".to_string(),
                prompt: "pi?".to_string(),
                marks: 5,
                kind: QuestionKind::Objective {
                    options: vec!["3.14".to_string(), "3.41".to_string()],
                    correct_answer: "3.14".to_string(),
                },
            }],
        };
        SessionDeps {
            catalog: Arc::new(InMemoryExamCatalog::with_exams(vec![exam])),
            submissions: store,
            notifier: Arc::new(TracingNotifier),
            clock: Arc::new(ManualClock::new(chrono::Utc::now())),
            policy: SubmitPolicy {
                retry_backoff: Duration::ZERO,
                ..SubmitPolicy::default()
            },
        }
    }

    #[tokio::test]
    async fn restarting_returns_running_attempt() {
        let registry = SessionRegistry::new(Duration::from_secs(600));
        let deps = deps();

        let (first, created) = registry.start(&deps, "math", &Student("a")).await.unwrap();
        assert!(created);
        first.record_answer("q1", "3.14").await;

        let (second, created) = registry.start(&deps, "math", &Student("a")).await.unwrap();
        assert!(!created);
        assert_eq!(first.attempt_id(), second.attempt_id());
        assert_eq!(second.snapshot().await.answers["q1"], "3.14");
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn submitted_attempt_cannot_restart() {
        let registry = SessionRegistry::new(Duration::from_secs(600));
        let deps = deps();

        let (session, _) = registry.start(&deps, "math", &Student("a")).await.unwrap();
        session.submit(SubmitReason::Manual).await.unwrap();

        let again = registry.start(&deps, "math", &Student("a")).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn candidates_get_separate_attempts() {
        let registry = SessionRegistry::new(Duration::from_secs(600));
        let deps = deps();

        let (a, _) = registry.start(&deps, "math", &Student("a")).await.unwrap();
        let (b, _) = registry.start(&deps, "math", &Student("b")).await.unwrap();
        assert_ne!(a.attempt_id(), b.attempt_id());
    }

    #[tokio::test]
    async fn attempts_are_private_to_their_candidate() {
        let registry = SessionRegistry::new(Duration::from_secs(600));
        let deps = deps();

        let (a, _) = registry.start(&deps, "math", &Student("a")).await.unwrap();
        assert!(registry.get_owned(a.attempt_id(), "a").await.is_ok());
        assert!(matches!(
            registry.get_owned(a.attempt_id(), "b").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn stored_result_blocks_restart_in_fresh_registry() {
        let store = Arc::new(InMemorySubmissionStore::new());
        let deps = deps_with(store.clone());

        let before_restart = SessionRegistry::new(Duration::from_secs(600));
        let (session, _) = before_restart
            .start(&deps, "math", &Student("a"))
            .await
            .unwrap();
        session.submit(SubmitReason::Manual).await.unwrap();

        // A new registry knows nothing of the old attempt, but the store does.
        let after_restart = SessionRegistry::new(Duration::from_secs(600));
        let again = after_restart.start(&deps, "math", &Student("a")).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
        assert_eq!(after_restart.len().await, 0);
        assert_eq!(store.len().await, 1);

        assert!(after_restart.start(&deps, "math", &Student("b")).await.is_ok());
    }

    #[tokio::test]
    async fn closed_attempts_are_evicted_after_retention() {
        let registry = SessionRegistry::new(Duration::ZERO);
        let deps = deps();

        let (session, _) = registry.start(&deps, "math", &Student("a")).await.unwrap();
        let (running, _) = registry.start(&deps, "math", &Student("b")).await.unwrap();
        session.submit(SubmitReason::Manual).await.unwrap();

        // The countdown notices the closed attempt on its next one-second tick.
        for _ in 0..40 {
            if registry.len().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(session.attempt_id()).await.is_none());
        assert!(registry.get(running.attempt_id()).await.is_some());

        // Eviction does not reopen the exam.
        let again = registry.start(&deps, "math", &Student("a")).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }
}
