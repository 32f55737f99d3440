//! Quiz flow state machine.
//!
//! The flow starts in `Loading`, moves to `Answering { index: 0 }` once questions arrive (or to
//! `Errored` if the fetch failed) and ends in `Completed`, from which there is no way back.
//! Index changes are delayed by the configured transition delay; until the delay has elapsed the
//! flow rejects input with [`FlowError::TransitionPending`]. Callers pass the current [`Instant`]
//! into every operation so timing stays deterministic under test.

use super::domain::{AnswerSet, Condition, ParameterTotals, Question};
use super::resolver::{select_outcome, ConditionReport};
use super::scoring::accumulate;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_TRANSITION_DELAY: Duration = Duration::from_millis(300);
pub const DEFAULT_FALLBACK_OUTCOME: &str = "マンジャロ";

/// Tunables for a single quiz attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSettings {
    pub transition_delay: Duration,
    pub fallback_outcome: String,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            transition_delay: DEFAULT_TRANSITION_DELAY,
            fallback_outcome: DEFAULT_FALLBACK_OUTCOME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FlowState {
    Loading,
    Errored { message: String },
    Answering { index: usize },
    Completed { outcome: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransition {
    pub target: usize,
    pub ready_at: Instant,
}

/// Observable result of a successful `advance` or `retreat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Moving(PendingTransition),
    Completed { outcome: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("quiz is not ready for answers")]
    NotReady,
    #[error("質問に答えてから次へ進んでください。")]
    NoAnswerSelected,
    #[error("option {option} is out of range for a question with {available} options")]
    OptionOutOfRange { option: usize, available: usize },
    #[error("a question transition is still in progress")]
    TransitionPending,
    #[error("already at the first question")]
    AtFirstQuestion,
    #[error("quiz attempt already completed")]
    Completed,
}

#[derive(Debug, Clone)]
pub struct QuizFlow {
    settings: FlowSettings,
    questions: Vec<Question>,
    conditions: Vec<Condition>,
    answers: AnswerSet,
    state: FlowState,
    pending: Option<PendingTransition>,
    validation_error: Option<FlowError>,
}

impl QuizFlow {
    pub fn new(settings: FlowSettings) -> Self {
        Self {
            settings,
            questions: Vec::new(),
            conditions: Vec::new(),
            answers: AnswerSet::default(),
            state: FlowState::Loading,
            pending: None,
            validation_error: None,
        }
    }

    /// Builds a flow that has already received its questions.
    pub fn with_questions(settings: FlowSettings, questions: Vec<Question>) -> Self {
        let mut flow = Self::new(settings);
        flow.load_questions(questions);
        flow
    }

    pub fn load_questions(&mut self, questions: Vec<Question>) {
        if self.state != FlowState::Loading {
            warn!("ignoring questions delivered outside the loading state");
            return;
        }

        if questions.is_empty() {
            self.state = FlowState::Errored {
                message: "quiz has no questions".to_string(),
            };
            return;
        }

        self.answers = AnswerSet::unanswered(questions.len());
        self.questions = questions;
        self.state = FlowState::Answering { index: 0 };
    }

    pub fn load_failed(&mut self, message: impl Into<String>) {
        if self.state == FlowState::Loading {
            self.state = FlowState::Errored {
                message: message.into(),
            };
        }
    }

    /// Conditions may arrive late or never; until they do resolution matches nothing.
    pub fn set_conditions(&mut self, conditions: Vec<Condition>) {
        self.conditions = conditions;
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    pub fn pending(&self) -> Option<PendingTransition> {
        self.pending
    }

    pub fn validation_error(&self) -> Option<&FlowError> {
        self.validation_error.as_ref()
    }

    pub fn totals(&self) -> ParameterTotals {
        accumulate(&self.questions, &self.answers)
    }

    pub fn report(&self) -> ConditionReport {
        ConditionReport::build(
            &self.conditions,
            &self.totals(),
            &self.settings.fallback_outcome,
        )
    }

    /// Applies a due transition. Returns the new index when one was applied.
    pub fn settle(&mut self, now: Instant) -> Option<usize> {
        let pending = self.pending?;
        if now < pending.ready_at {
            return None;
        }

        self.pending = None;
        if let FlowState::Answering { .. } = self.state {
            self.state = FlowState::Answering {
                index: pending.target,
            };
            debug!(index = pending.target, "question transition settled");
            return Some(pending.target);
        }
        None
    }

    /// Drops a scheduled transition, e.g. when the page is torn down.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn select(&mut self, option: usize, now: Instant) -> Result<(), FlowError> {
        let index = self.ready_index(now)?;
        let available = self.questions[index].options.len();
        if option >= available {
            return Err(FlowError::OptionOutOfRange { option, available });
        }

        self.answers.record(index, option);
        self.validation_error = None;
        Ok(())
    }

    pub fn advance(&mut self, now: Instant) -> Result<Transition, FlowError> {
        let index = self.ready_index(now)?;
        if !self.answers.is_answered(index) {
            self.validation_error = Some(FlowError::NoAnswerSelected);
            return Err(FlowError::NoAnswerSelected);
        }
        self.validation_error = None;

        if index + 1 < self.questions.len() {
            return Ok(Transition::Moving(self.schedule(index + 1, now)));
        }

        let outcome = select_outcome(
            &self.conditions,
            &self.totals(),
            &self.settings.fallback_outcome,
        );
        self.state = FlowState::Completed {
            outcome: outcome.clone(),
        };
        Ok(Transition::Completed { outcome })
    }

    pub fn retreat(&mut self, now: Instant) -> Result<Transition, FlowError> {
        let index = self.ready_index(now)?;
        if index == 0 {
            return Err(FlowError::AtFirstQuestion);
        }
        Ok(Transition::Moving(self.schedule(index - 1, now)))
    }

    fn schedule(&mut self, target: usize, now: Instant) -> PendingTransition {
        let pending = PendingTransition {
            target,
            ready_at: now + self.settings.transition_delay,
        };
        self.pending = Some(pending);
        pending
    }

    fn ready_index(&mut self, now: Instant) -> Result<usize, FlowError> {
        self.settle(now);
        match self.state {
            FlowState::Answering { index } => {
                if self.pending.is_some() {
                    Err(FlowError::TransitionPending)
                } else {
                    Ok(index)
                }
            }
            FlowState::Completed { .. } => Err(FlowError::Completed),
            FlowState::Loading | FlowState::Errored { .. } => Err(FlowError::NotReady),
        }
    }
}

/// Serializable view of the flow for the current question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowSnapshot {
    #[serde(flatten)]
    pub state: FlowState,
    pub total_questions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionView>,
    pub transitioning: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub number: usize,
    pub prompt: String,
    pub options: Vec<String>,
    pub selected: Option<usize>,
    pub progress_percent: u8,
    pub can_retreat: bool,
}

impl QuizFlow {
    pub fn snapshot(&self) -> FlowSnapshot {
        let question = match self.state {
            FlowState::Answering { index } => self.questions.get(index).map(|question| {
                let total = self.questions.len();
                QuestionView {
                    number: index + 1,
                    prompt: question.prompt.clone(),
                    options: question.options.iter().map(|opt| opt.text.clone()).collect(),
                    selected: self.answers.get(index),
                    progress_percent: ((index + 1) * 100 / total) as u8,
                    can_retreat: index > 0,
                }
            }),
            _ => None,
        };

        FlowSnapshot {
            state: self.state.clone(),
            total_questions: self.questions.len(),
            question,
            transitioning: self.pending.is_some(),
            validation_error: self.validation_error.as_ref().map(ToString::to_string),
        }
    }
}
