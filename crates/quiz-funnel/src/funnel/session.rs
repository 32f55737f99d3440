use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::catalog::{self, Landing, ResultView};
use super::flow::{FlowError, FlowSettings, FlowSnapshot, FlowState, QuizFlow};
use super::resolver::ConditionReport;
use super::source::{DataLoadError, FunnelSource};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> SessionId {
    let id = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SessionId(format!("quiz-{id:06}"))
}

/// One visitor's pass through the quiz.
#[derive(Debug, Clone)]
pub struct QuizSession {
    pub id: SessionId,
    pub started_at: DateTime<Utc>,
    pub flow: QuizFlow,
}

impl QuizSession {
    pub fn view(&self) -> SessionView {
        let redirect_path = match self.flow.state() {
            FlowState::Completed { outcome } => {
                Some(format!("/quiz/result/{}", catalog::outcome_slug(outcome)))
            }
            _ => None,
        };

        SessionView {
            session_id: self.id.clone(),
            started_at: self.started_at,
            flow: self.flow.snapshot(),
            redirect_path,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    #[serde(flatten)]
    pub flow: FlowSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_path: Option<String>,
}

/// Storage abstraction so the service can be exercised in isolation.
pub trait SessionStore: Send + Sync {
    fn insert(&self, session: QuizSession) -> Result<QuizSession, SessionStoreError>;
    /// Applies `apply` to the stored session while holding the store's lock, so concurrent
    /// requests on one session serialize instead of overwriting each other.
    fn update_with<R, F>(&self, id: &SessionId, apply: F) -> Result<R, SessionStoreError>
    where
        F: FnOnce(&mut QuizSession) -> R;
    fn remove(&self, id: &SessionId) -> Result<Option<QuizSession>, SessionStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session already exists")]
    Conflict,
    #[error("session not found")]
    NotFound,
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error(transparent)]
    Store(#[from] SessionStoreError),
    #[error(transparent)]
    DataLoad(#[from] DataLoadError),
}

/// Service composing the data source, the session store, and the flow settings.
pub struct FunnelService<S> {
    store: Arc<S>,
    source: Arc<FunnelSource>,
    settings: FlowSettings,
}

impl<S> FunnelService<S>
where
    S: SessionStore + 'static,
{
    pub fn new(store: Arc<S>, source: Arc<FunnelSource>, settings: FlowSettings) -> Self {
        Self {
            store,
            source,
            settings,
        }
    }

    /// Loads quiz and conditions and stores a new session. A failed quiz load leaves the session
    /// in the errored state rather than failing the call.
    pub async fn start(&self) -> Result<QuizSession, SessionError> {
        let mut flow = QuizFlow::new(self.settings.clone());
        let (quiz, conditions) = tokio::join!(
            self.source.load_quiz(),
            self.source.load_conditions_or_empty()
        );

        match quiz {
            Ok(questions) => flow.load_questions(questions),
            Err(err) => {
                warn!(error = %err, "quiz load failed");
                flow.load_failed(err.to_string());
            }
        }
        flow.set_conditions(conditions);

        let session = QuizSession {
            id: next_session_id(),
            started_at: Utc::now(),
            flow,
        };
        info!(session = %session.id.0, "quiz session started");

        Ok(self.store.insert(session)?)
    }

    pub fn get(&self, id: &SessionId) -> Result<QuizSession, SessionError> {
        let session = self.store.update_with(id, |session| {
            session.flow.settle(Instant::now());
            session.clone()
        })?;
        Ok(session)
    }

    pub fn select(&self, id: &SessionId, option: usize) -> Result<QuizSession, SessionError> {
        self.mutate(id, |flow, now| flow.select(option, now))
    }

    pub fn advance(&self, id: &SessionId) -> Result<QuizSession, SessionError> {
        self.mutate(id, |flow, now| flow.advance(now).map(drop))
    }

    pub fn retreat(&self, id: &SessionId) -> Result<QuizSession, SessionError> {
        self.mutate(id, |flow, now| flow.retreat(now).map(drop))
    }

    pub fn summary(&self, id: &SessionId) -> Result<ConditionReport, SessionError> {
        Ok(self.get(id)?.flow.report())
    }

    /// Cancels any scheduled transition, then removes the session.
    pub fn dispose(&self, id: &SessionId) -> Result<(), SessionError> {
        if self.store.update_with(id, |session| session.flow.cancel())? {
            info!(session = %id.0, "cancelled pending transition on dispose");
        }
        self.store.remove(id)?;
        Ok(())
    }

    pub async fn catalog(&self) -> Result<Landing, SessionError> {
        let records = self.source.load_blogs().await?;
        Ok(Landing::build(&records))
    }

    pub async fn result(&self, slug: &str) -> Result<Option<ResultView>, SessionError> {
        let records = self.source.load_blogs().await?;
        Ok(catalog::find_result(&records, slug))
    }

    // Validation failures also change observable state, so the session is kept on error too.
    fn mutate<F>(&self, id: &SessionId, apply: F) -> Result<QuizSession, SessionError>
    where
        F: FnOnce(&mut QuizFlow, Instant) -> Result<(), FlowError>,
    {
        let (outcome, session) = self.store.update_with(id, |session| {
            let outcome = apply(&mut session.flow, Instant::now());
            (outcome, session.clone())
        })?;
        outcome?;
        Ok(session)
    }
}
