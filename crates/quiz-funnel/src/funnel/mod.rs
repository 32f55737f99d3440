//! Quiz funnel: weighted answers, threshold conditions, and outcome routing.
//!
//! Answers collected by [`flow::QuizFlow`] are summed by [`scoring::accumulate`]; the resulting
//! totals are tested against each configured condition by [`resolver::resolve`] and the first
//! match, or the fallback outcome, becomes the redirect target.

pub mod catalog;
pub mod condition;
pub mod domain;
pub mod flow;
pub mod resolver;
pub mod router;
pub mod scoring;
pub mod session;
pub mod source;

pub use catalog::{CharacterCard, Landing, ResultView};
pub use condition::{Clause, Comparison, ConditionParseError, ParsedCondition};
pub use domain::{AnswerOption, AnswerSet, Condition, OutcomeRecord, ParameterTotals, Question};
pub use flow::{FlowError, FlowSettings, FlowSnapshot, FlowState, QuizFlow, Transition};
pub use resolver::{resolve, select_outcome, ConditionReport, ConditionRow, Resolution};
pub use router::funnel_router;
pub use scoring::accumulate;
pub use session::{
    FunnelService, QuizSession, SessionError, SessionId, SessionStore, SessionStoreError,
    SessionView,
};
pub use source::{DataLoadError, FunnelSource};
