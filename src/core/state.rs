use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;

use crate::core::config::Settings;
use crate::services::embedding::SharedEmbedder;
use crate::services::question_files::QuestionFileStore;
use crate::services::session_store::SessionManager;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: SqlitePool,
    sessions: SessionManager,
    embedder: SharedEmbedder,
    question_files: QuestionFileStore,
}

impl AppState {
    pub(crate) fn new(settings: Settings, db: SqlitePool, embedder: SharedEmbedder) -> Self {
        let ttl = Duration::from_secs(settings.quiz().session_ttl_minutes * 60);
        let sessions = SessionManager::new(ttl);
        let question_files = QuestionFileStore::from_settings(&settings);
        Self { inner: Arc::new(InnerState { settings, db, sessions, embedder, question_files }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    pub(crate) fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }

    pub(crate) fn embedder(&self) -> &SharedEmbedder {
        &self.inner.embedder
    }

    pub(crate) fn question_files(&self) -> &QuestionFileStore {
        &self.inner.question_files
    }
}
