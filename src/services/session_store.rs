use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::RwLock;

use crate::db::models::User;
use crate::db::types::UserType;
use crate::services::quiz_session::QuizSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(crate) enum SessionError {
    #[error("session not found")]
    UnknownSession,
    #[error("no quiz is loaded for this session")]
    NoActiveQuiz,
}

/// Identity cached on the session so request guards need no database round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionUser {
    pub(crate) id: String,
    pub(crate) login: String,
    pub(crate) user_type: UserType,
    pub(crate) full_name: String,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            login: user.login.clone(),
            user_type: user.user_type,
            full_name: user.full_name(),
        }
    }
}

#[derive(Debug)]
struct SessionEntry {
    user: SessionUser,
    quiz: Option<QuizSession>,
    last_seen: Instant,
}

/// Login sessions keyed by session id. Each session owns at most one quiz, so concurrent
/// test-takers never share answers or reference embeddings.
#[derive(Debug, Clone)]
pub(crate) struct SessionManager {
    inner: Arc<RwLock<HashMap<String, SessionEntry>>>,
    ttl: Duration,
}

impl SessionManager {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self { inner: Arc::new(RwLock::new(HashMap::new())), ttl }
    }

    pub(crate) async fn create(&self, user: SessionUser) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        let entry = SessionEntry { user, quiz: None, last_seen: Instant::now() };
        self.inner.write().await.insert(session_id.clone(), entry);
        session_id
    }

    /// Returns the session's user and refreshes its idle timer. Expired sessions are dropped.
    pub(crate) async fn lookup(&self, session_id: &str) -> Option<SessionUser> {
        let mut sessions = self.inner.write().await;
        let now = Instant::now();
        let expired = match sessions.get_mut(session_id) {
            None => return None,
            Some(entry) if now.duration_since(entry.last_seen) > self.ttl => true,
            Some(entry) => {
                entry.last_seen = now;
                return Some(entry.user.clone());
            }
        };

        if expired {
            sessions.remove(session_id);
        }
        None
    }

    pub(crate) async fn evict(&self, session_id: &str) -> bool {
        self.inner.write().await.remove(session_id).is_some()
    }

    /// Drops every session of a user, e.g. after the account is deleted.
    pub(crate) async fn evict_user(&self, user_id: &str) -> usize {
        let mut sessions = self.inner.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.user.id != user_id);
        before - sessions.len()
    }

    /// Updates the cached identity on all of the user's sessions.
    pub(crate) async fn refresh_user(&self, user: SessionUser) {
        let mut sessions = self.inner.write().await;
        for entry in sessions.values_mut().filter(|entry| entry.user.id == user.id) {
            entry.user = user.clone();
        }
    }

    /// Replaces the session's quiz in one step; the old quiz stays visible until this call.
    pub(crate) async fn install_quiz(
        &self,
        session_id: &str,
        quiz: QuizSession,
    ) -> Result<(), SessionError> {
        let mut sessions = self.inner.write().await;
        let entry = sessions.get_mut(session_id).ok_or(SessionError::UnknownSession)?;
        entry.quiz = Some(quiz);
        Ok(())
    }

    pub(crate) async fn with_quiz<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut QuizSession) -> R,
    ) -> Result<R, SessionError> {
        let mut sessions = self.inner.write().await;
        let entry = sessions.get_mut(session_id).ok_or(SessionError::UnknownSession)?;
        let quiz = entry.quiz.as_mut().ok_or(SessionError::NoActiveQuiz)?;
        Ok(f(quiz))
    }

    pub(crate) async fn clear_quiz(&self, session_id: &str) -> Result<bool, SessionError> {
        let mut sessions = self.inner.write().await;
        let entry = sessions.get_mut(session_id).ok_or(SessionError::UnknownSession)?;
        Ok(entry.quiz.take().is_some())
    }

    pub(crate) async fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now()).await
    }

    pub(crate) async fn sweep_expired_at(&self, now: Instant) -> usize {
        let mut sessions = self.inner.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= self.ttl);
        before - sessions.len()
    }

    pub(crate) async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
