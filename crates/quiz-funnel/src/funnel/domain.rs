use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Accumulated score per named parameter axis.
pub type ParameterTotals = BTreeMap<String, i64>;

/// One quiz question as served by the backend `/api/quiz` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    #[serde(rename = "serial_number")]
    pub ordinal: u32,
    #[serde(rename = "question")]
    pub prompt: String,
    pub options: Vec<AnswerOption>,
}

impl Question {
    pub fn option(&self, index: usize) -> Option<&AnswerOption> {
        self.options.get(index)
    }
}

/// Selectable answer carrying weighted parameter contributions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub text: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, i64>,
}

/// Outcome paired with a textual threshold predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub redirect: String,
    pub text: String,
}

impl Condition {
    pub fn new(redirect: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            redirect: redirect.into(),
            text: text.into(),
        }
    }
}

/// Per-question answer slots. Length always matches the question count.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AnswerSet {
    slots: Vec<Option<usize>>,
}

impl AnswerSet {
    pub fn unanswered(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<usize> {
        self.slots.get(slot).copied().flatten()
    }

    pub fn is_answered(&self, slot: usize) -> bool {
        self.get(slot).is_some()
    }

    pub fn slots(&self) -> &[Option<usize>] {
        &self.slots
    }

    pub(crate) fn record(&mut self, slot: usize, option: usize) {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = Some(option);
        }
    }
}

/// Outcome record (a "blog" entry) backing both the landing cards and the result pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub id: u32,
    #[serde(default)]
    pub post_color: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub short_description: String,
    pub title: String,
    #[serde(default)]
    pub result_img1: Option<String>,
    #[serde(default)]
    pub result_img2: Option<String>,
    #[serde(default)]
    pub result_img3: Option<String>,
    #[serde(default)]
    pub script_tag: Option<String>,
    #[serde(default)]
    pub referrer_url: Option<String>,
}

impl OutcomeRecord {
    pub fn result_images(&self) -> Vec<&str> {
        [&self.result_img1, &self.result_img2, &self.result_img3]
            .into_iter()
            .filter_map(|image| image.as_deref())
            .filter(|src| !src.trim().is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_deserializes_from_backend_shape() {
        let raw = r#"{
            "id": 7,
            "serial_number": 1,
            "question": "朝食は食べますか？",
            "options": [
                { "text": "毎日", "parameters": { "param1": 2, "param3": -1 } },
                { "text": "食べない", "parameters": {} }
            ]
        }"#;

        let question: Question = serde_json::from_str(raw).expect("question parses");
        assert_eq!(question.ordinal, 1);
        assert_eq!(question.options.len(), 2);
        assert_eq!(question.options[0].parameters.get("param3"), Some(&-1));
        assert!(question.option(2).is_none());
    }

    #[test]
    fn answer_set_ignores_out_of_range_slots() {
        let mut answers = AnswerSet::unanswered(2);
        answers.record(5, 1);
        answers.record(1, 0);

        assert_eq!(answers.len(), 2);
        assert_eq!(answers.slots(), &[None, Some(0)]);
    }

    #[test]
    fn result_images_skip_missing_entries() {
        let record = OutcomeRecord {
            id: 1,
            post_color: "#FFF".to_string(),
            thumbnail_url: String::new(),
            short_description: String::new(),
            title: "GLP-1".to_string(),
            result_img1: Some("https://cdn/1.png".to_string()),
            result_img2: None,
            result_img3: Some("  ".to_string()),
            script_tag: None,
            referrer_url: None,
        };

        assert_eq!(record.result_images(), vec!["https://cdn/1.png"]);
    }
}
