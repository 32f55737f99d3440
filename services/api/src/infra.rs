use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use quiz_funnel::funnel::{QuizSession, SessionId, SessionStore, SessionStoreError};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local session storage. Sessions expire `ttl` after they started and are evicted
/// on the next write, whatever state they reached.
#[derive(Clone)]
pub(crate) struct InMemorySessionStore {
    sessions: Arc<Mutex<Sessions>>,
    ttl: Duration,
}

type Sessions = HashMap<SessionId, QuizSession>;

impl InMemorySessionStore {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            ttl,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Sessions>, SessionStoreError> {
        self.sessions
            .lock()
            .map_err(|_| SessionStoreError::Unavailable("session mutex poisoned".to_string()))
    }

    fn is_expired(&self, session: &QuizSession, now: DateTime<Utc>) -> bool {
        (now - session.started_at)
            .to_std()
            .map(|age| age >= self.ttl)
            .unwrap_or(false)
    }

    fn evict_expired(&self, sessions: &mut Sessions, now: DateTime<Utc>) {
        let before = sessions.len();
        sessions.retain(|_, session| !self.is_expired(session, now));
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "evicted expired quiz sessions");
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

impl SessionStore for InMemorySessionStore {
    fn insert(&self, session: QuizSession) -> Result<QuizSession, SessionStoreError> {
        let mut guard = self.lock()?;
        self.evict_expired(&mut guard, Utc::now());
        if guard.contains_key(&session.id) {
            return Err(SessionStoreError::Conflict);
        }
        guard.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn update_with<R, F>(&self, id: &SessionId, apply: F) -> Result<R, SessionStoreError>
    where
        F: FnOnce(&mut QuizSession) -> R,
    {
        let mut guard = self.lock()?;
        self.evict_expired(&mut guard, Utc::now());
        let session = guard.get_mut(id).ok_or(SessionStoreError::NotFound)?;
        Ok(apply(session))
    }

    fn remove(&self, id: &SessionId) -> Result<Option<QuizSession>, SessionStoreError> {
        let mut guard = self.lock()?;
        Ok(guard.remove(id))
    }
}

/// Zero-based option indices, one per question, in quiz order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AnswerList(pub(crate) Vec<usize>);

/// Parses a comma-separated list of option indices, e.g. `0,2,1`.
pub(crate) fn parse_answers(raw: &str) -> Result<AnswerList, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<usize>()
                .map_err(|err| format!("failed to parse '{part}' as an option index ({err})"))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(AnswerList)
}
