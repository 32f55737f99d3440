//! Threshold condition language.
//!
//! A condition is one or more clauses joined by the literal token ` and `; each clause compares a
//! parameter total with a numeric threshold using a strict `>` or `<`. Parameters missing from the
//! totals count as zero.

mod parser;

pub use parser::ConditionParseError;

use super::domain::ParameterTotals;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    GreaterThan,
    LessThan,
}

impl Comparison {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::LessThan => "<",
        }
    }

    pub(crate) const fn separator(self) -> &'static str {
        match self {
            Self::GreaterThan => " > ",
            Self::LessThan => " < ",
        }
    }

    fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::LessThan => value < threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clause {
    pub parameter: String,
    pub comparison: Comparison,
    pub threshold: f64,
}

impl Clause {
    pub fn holds(&self, totals: &ParameterTotals) -> bool {
        let value = totals.get(&self.parameter).copied().unwrap_or(0);
        self.comparison.holds(value as f64, self.threshold)
    }
}

/// Conjunction of clauses produced by [`ParsedCondition::parse`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedCondition {
    clauses: Vec<Clause>,
}

impl ParsedCondition {
    pub fn parse(text: &str) -> Result<Self, ConditionParseError> {
        parser::parse(text)
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Left to right, stopping at the first clause that does not hold.
    pub fn evaluate(&self, totals: &ParameterTotals) -> bool {
        self.clauses.iter().all(|clause| clause.holds(totals))
    }
}

/// Parses and evaluates raw condition text; malformed text never matches.
pub fn matches(text: &str, totals: &ParameterTotals) -> bool {
    match ParsedCondition::parse(text) {
        Ok(parsed) => parsed.evaluate(totals),
        Err(err) => {
            warn!(condition = text, error = %err, "condition text rejected");
            false
        }
    }
}

/// Word tokens in the condition text, deduplicated in order of first appearance.
pub fn referenced_words(text: &str) -> Vec<&str> {
    let mut words: Vec<&str> = Vec::new();
    for token in text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-')) {
        let token = token.trim_matches('-');
        if !token.is_empty() && !words.contains(&token) {
            words.push(token);
        }
    }
    words
}
