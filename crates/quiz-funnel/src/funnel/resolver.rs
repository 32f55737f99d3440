use super::condition::{referenced_words, ParsedCondition};
use super::domain::{Condition, ParameterTotals};
use super::scoring::display_order;
use serde::Serialize;
use std::io::Write;
use tracing::{debug, info};

/// Conditions whose predicate held, in configured order, plus the count of unparseable ones.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution<'a> {
    pub matched: Vec<&'a Condition>,
    pub inert: usize,
}

impl<'a> Resolution<'a> {
    pub fn first(&self) -> Option<&'a Condition> {
        self.matched.first().copied()
    }

    /// Redirect of the first match, or `fallback` when nothing matched.
    pub fn outcome(&self, fallback: &str) -> String {
        match self.first() {
            Some(condition) => condition.redirect.clone(),
            None => fallback.to_string(),
        }
    }
}

/// Evaluates every condition in list order; list order is the only tie-break.
pub fn resolve<'a>(conditions: &'a [Condition], totals: &ParameterTotals) -> Resolution<'a> {
    let mut resolution = Resolution::default();

    for condition in conditions {
        match ParsedCondition::parse(&condition.text) {
            Ok(parsed) => {
                if parsed.evaluate(totals) {
                    resolution.matched.push(condition);
                }
            }
            Err(err) => {
                debug!(redirect = %condition.redirect, error = %err, "skipping inert condition");
                resolution.inert += 1;
            }
        }
    }

    resolution
}

/// Resolves and returns the winning redirect identifier, never failing.
pub fn select_outcome(conditions: &[Condition], totals: &ParameterTotals, fallback: &str) -> String {
    let resolution = resolve(conditions, totals);
    let outcome = resolution.outcome(fallback);
    info!(
        matched = resolution.matched.len(),
        inert = resolution.inert,
        outcome = %outcome,
        "quiz outcome selected"
    );
    outcome
}

/// Row of the debug summary describing how one condition fared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionRow {
    pub redirect: String,
    pub text: String,
    pub matched: bool,
    pub parsed: bool,
    pub params: Vec<(String, i64)>,
}

impl ConditionRow {
    pub fn params_label(&self) -> String {
        self.params
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Debug summary: sorted totals and a per-condition match table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionReport {
    pub totals: Vec<(String, i64)>,
    pub loaded: usize,
    pub inert: usize,
    pub rows: Vec<ConditionRow>,
    pub outcome: String,
}

impl ConditionReport {
    pub fn build(conditions: &[Condition], totals: &ParameterTotals, fallback: &str) -> Self {
        let rows: Vec<ConditionRow> = conditions
            .iter()
            .map(|condition| {
                let parsed = ParsedCondition::parse(&condition.text).ok();
                let matched = parsed
                    .as_ref()
                    .is_some_and(|parsed| parsed.evaluate(totals));
                let params = referenced_words(&condition.text)
                    .into_iter()
                    .filter_map(|word| totals.get(word).map(|value| (word.to_string(), *value)))
                    .collect();

                ConditionRow {
                    redirect: condition.redirect.clone(),
                    text: condition.text.clone(),
                    matched,
                    parsed: parsed.is_some(),
                    params,
                }
            })
            .collect();

        let resolution = resolve(conditions, totals);

        Self {
            totals: display_order(totals)
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
            loaded: conditions.len(),
            inert: resolution.inert,
            rows,
            outcome: resolution.outcome(fallback),
        }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["redirect", "condition", "matched", "params"])?;
        for row in &self.rows {
            let matched = if row.matched { "true" } else { "false" };
            csv_writer.write_record([
                row.redirect.as_str(),
                row.text.as_str(),
                matched,
                row.params_label().as_str(),
            ])?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(entries: &[(&str, i64)]) -> ParameterTotals {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), *value))
            .collect()
    }

    fn conditions() -> Vec<Condition> {
        vec![
            Condition::new("リベルサス", "p1 > 5"),
            Condition::new("ウゴービ", "p1 > 4"),
            Condition::new("broken", "p1 == 5"),
            Condition::new("サクセンダ/GLP-1", "p1 > 1 and p2 < 1"),
        ]
    }

    #[test]
    fn collects_matches_in_configured_order() {
        let conditions = conditions();
        let resolution = resolve(&conditions, &totals(&[("p1", 5)]));

        let redirects: Vec<&str> = resolution
            .matched
            .iter()
            .map(|condition| condition.redirect.as_str())
            .collect();
        assert_eq!(redirects, vec!["ウゴービ", "サクセンダ/GLP-1"]);
        assert_eq!(resolution.inert, 1);
        assert_eq!(resolution.outcome("fallback"), "ウゴービ");
    }

    #[test]
    fn no_match_routes_to_fallback() {
        let conditions = conditions();
        let sums = totals(&[("p1", 0), ("p2", 3)]);

        assert!(resolve(&conditions, &sums).matched.is_empty());
        assert_eq!(select_outcome(&conditions, &sums, "マンジャロ"), "マンジャロ");
        assert_eq!(select_outcome(&[], &sums, "マンジャロ"), "マンジャロ");
    }

    #[test]
    fn resolution_is_deterministic() {
        let conditions = conditions();
        let sums = totals(&[("p1", 9)]);
        assert_eq!(resolve(&conditions, &sums), resolve(&conditions, &sums));
    }

    #[test]
    fn report_lists_referenced_params_present_in_totals() {
        let conditions = conditions();
        let report = ConditionReport::build(&conditions, &totals(&[("p1", 5)]), "マンジャロ");

        assert_eq!(report.loaded, 4);
        assert_eq!(report.inert, 1);
        assert_eq!(report.outcome, "ウゴービ");
        assert_eq!(report.rows[3].params_label(), "p1: 5");
        assert!(!report.rows[2].parsed);
        assert!(!report.rows[2].matched);
        assert!(report.rows[1].matched);
    }

    #[test]
    fn report_serializes_to_csv() {
        let conditions = vec![Condition::new("A", "p1 > 1")];
        let report = ConditionReport::build(&conditions, &totals(&[("p1", 2)]), "fallback");

        let mut buffer = Vec::new();
        report.write_csv(&mut buffer).expect("csv writes");
        let output = String::from_utf8(buffer).expect("utf8");

        assert_eq!(output, "redirect,condition,matched,params\nA,p1 > 1,true,p1: 2\n");
    }
}
