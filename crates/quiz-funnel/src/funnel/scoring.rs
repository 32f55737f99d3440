use super::domain::{AnswerSet, ParameterTotals, Question};
use tracing::warn;

/// Sums the chosen options' parameter weights across every answered slot.
///
/// Totals are recomputed from scratch on each call. Integer addition keeps the result identical
/// regardless of the order questions are visited in. Slots whose index points past a question's
/// options contribute nothing. Sums saturate at the `i64` bounds instead of overflowing.
pub fn accumulate(questions: &[Question], answers: &AnswerSet) -> ParameterTotals {
    let mut totals = ParameterTotals::new();

    for (question, slot) in questions.iter().zip(answers.slots()) {
        let Some(option) = slot.and_then(|index| question.option(index)) else {
            continue;
        };

        for (parameter, weight) in &option.parameters {
            let total = totals.entry(parameter.clone()).or_insert(0);
            *total = match total.checked_add(*weight) {
                Some(sum) => sum,
                None => {
                    warn!(%parameter, weight, "parameter total saturated");
                    total.saturating_add(*weight)
                }
            };
        }
    }

    totals
}

/// Orders totals for display: `paramN` keys by their numeric suffix, then any other keys.
pub fn display_order(totals: &ParameterTotals) -> Vec<(&str, i64)> {
    let mut entries: Vec<(&str, i64)> = totals
        .iter()
        .map(|(key, value)| (key.as_str(), *value))
        .collect();

    entries.sort_by(|(left, _), (right, _)| {
        match (numeric_suffix(left), numeric_suffix(right)) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| left.cmp(right)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => left.cmp(right),
        }
    });

    entries
}

fn numeric_suffix(key: &str) -> Option<u64> {
    key.strip_prefix("param")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::domain::AnswerOption;
    use std::collections::BTreeMap;

    fn option(weights: &[(&str, i64)]) -> AnswerOption {
        AnswerOption {
            text: "option".to_string(),
            parameters: weights
                .iter()
                .map(|(key, value)| (key.to_string(), *value))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn question(id: u32, options: Vec<AnswerOption>) -> Question {
        Question {
            id,
            ordinal: id,
            prompt: format!("Q{id}"),
            options,
        }
    }

    fn answers(slots: &[Option<usize>]) -> AnswerSet {
        let mut set = AnswerSet::unanswered(slots.len());
        for (slot, choice) in slots.iter().enumerate() {
            if let Some(choice) = choice {
                set.record(slot, *choice);
            }
        }
        set
    }

    #[test]
    fn sums_selected_option_weights() {
        let questions = vec![
            question(1, vec![option(&[("p1", 3)]), option(&[("p1", 1)])]),
            question(2, vec![option(&[("p1", 2)]), option(&[("p1", 0)])]),
        ];

        let totals = accumulate(&questions, &answers(&[Some(0), Some(0)]));
        assert_eq!(totals.get("p1"), Some(&5));
        assert_eq!(totals.len(), 1);
    }

    #[test]
    fn unanswered_slots_and_missing_keys_contribute_nothing() {
        let questions = vec![
            question(1, vec![option(&[("p1", 3), ("p2", -2)])]),
            question(2, vec![option(&[("p3", 4)])]),
            question(3, vec![option(&[("p1", 10)])]),
        ];

        let totals = accumulate(&questions, &answers(&[Some(0), Some(0), None]));
        assert_eq!(totals.get("p1"), Some(&3));
        assert_eq!(totals.get("p2"), Some(&-2));
        assert_eq!(totals.get("p3"), Some(&4));
    }

    #[test]
    fn question_order_does_not_change_totals() {
        let first = question(1, vec![option(&[("p1", 3), ("p2", 1)])]);
        let second = question(2, vec![option(&[("p1", -7)])]);
        let third = question(3, vec![option(&[("p2", 5), ("p3", 2)])]);
        let all = answers(&[Some(0), Some(0), Some(0)]);

        let forward = accumulate(&[first.clone(), second.clone(), third.clone()], &all);
        let reversed = accumulate(&[third.clone(), first.clone(), second.clone()], &all);
        let shuffled = accumulate(&[second, third, first], &all);

        assert_eq!(forward, reversed);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn extreme_weights_saturate_instead_of_overflowing() {
        let questions = vec![
            question(1, vec![option(&[("p1", i64::MAX), ("p2", i64::MIN)])]),
            question(2, vec![option(&[("p1", 1), ("p2", -1)])]),
        ];

        let totals = accumulate(&questions, &answers(&[Some(0), Some(0)]));
        assert_eq!(totals.get("p1"), Some(&i64::MAX));
        assert_eq!(totals.get("p2"), Some(&i64::MIN));
    }

    #[test]
    fn display_order_sorts_param_suffix_numerically() {
        let totals: ParameterTotals = [("param10", 1), ("param2", 2), ("energy", 3), ("param1", 4)]
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();

        let keys: Vec<&str> = display_order(&totals).into_iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["param1", "param2", "param10", "energy"]);
    }
}
