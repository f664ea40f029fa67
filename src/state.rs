use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{
    config::Config,
    services::{
        notify::TracingNotifier,
        postgres::{PgExamCatalog, PgSubmissionStore},
    },
    session::{ExamCatalog, SessionDeps, SessionRegistry, SubmissionService, SystemClock},
    utils::ids::IdScheme,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    /// Exam content for candidates; also where new exams are written.
    pub exams: PgExamCatalog,
    pub sessions: SessionRegistry,
    pub session_deps: SessionDeps,
    pub ids: IdScheme,
}

impl AppState {
    /// Production wiring: Postgres-backed catalog and results, wall clock.
    pub fn new(pool: PgPool, config: Config, ids: IdScheme) -> Self {
        let exams = PgExamCatalog::new(pool.clone());
        let catalog: Arc<dyn ExamCatalog> = Arc::new(exams.clone());
        let submissions: Arc<dyn SubmissionService> = Arc::new(PgSubmissionStore::new(pool.clone()));
        Self::with_session_deps(
            pool,
            config.clone(),
            ids,
            SessionDeps {
                catalog,
                submissions,
                notifier: Arc::new(TracingNotifier),
                clock: Arc::new(SystemClock),
                policy: config.submit_policy,
            },
        )
    }

    /// Same state with caller-chosen session collaborators.
    pub fn with_session_deps(
        pool: PgPool,
        config: Config,
        ids: IdScheme,
        session_deps: SessionDeps,
    ) -> Self {
        Self {
            exams: PgExamCatalog::new(pool.clone()),
            sessions: SessionRegistry::new(config.session_retention),
            pool,
            config,
            session_deps,
            ids,
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for SessionDeps {
    fn from_ref(state: &AppState) -> Self {
        state.session_deps.clone()
    }
}

impl FromRef<AppState> for IdScheme {
    fn from_ref(state: &AppState) -> Self {
        state.ids.clone()
    }
}
