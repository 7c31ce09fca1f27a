//! The AskQuestion interface (spec §6): the wire contract between the
//! clarification engine and the external human questioner collaborator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskOption {
    pub label: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskQuestion {
    pub question: String,
    /// Header, spec-limited to 20 characters.
    pub header: String,
    pub options: Vec<AskOption>,
    #[serde(rename = "multiSelect")]
    pub multi_select: bool,
}

/// A single answer: one label, or several when `multiSelect` was true.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Single(String),
    Multi(Vec<String>),
}

impl Answer {
    /// The first selected label, regardless of single/multi shape.
    pub fn first_label(&self) -> Option<&str> {
        match self {
            Answer::Single(s) => Some(s.as_str()),
            Answer::Multi(items) => items.first().map(String::as_str),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AskResponse {
    pub answers: HashMap<String, Answer>,
}

/// The external human questioner collaborator (out of scope per spec §1;
/// specified here only as the interface the clarification engine calls).
pub trait Questioner {
    fn ask(&self, questions: &[AskQuestion]) -> AskResponse;
}

/// A questioner that answers every question with its first option,
/// useful for tests and non-interactive batch modes.
pub struct FirstOptionQuestioner;

impl Questioner for FirstOptionQuestioner {
    fn ask(&self, questions: &[AskQuestion]) -> AskResponse {
        let mut answers = HashMap::new();
        for (idx, question) in questions.iter().enumerate() {
            if let Some(first) = question.options.first() {
                answers.insert(format!("question_{}", idx + 1), Answer::Single(first.label.clone()));
            }
        }
        AskResponse { answers }
    }
}
