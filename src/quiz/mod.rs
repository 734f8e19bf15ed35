pub mod ai_helper;
pub mod parse;

use std::collections::HashSet;

/// Number of options every generated question must carry.
pub const OPTIONS_PER_QUESTION: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question_text: String,
    pub options: Vec<QuizOption>,
    pub correct_answer_id: String,
    pub explanation: String,
    #[serde(default)]
    pub is_answered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_user_correct: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QuizOption {
    pub id: String,
    pub text: String,
}

impl Question {
    /// Resets the answer state, whatever the generator claimed.
    pub fn unanswered(self) -> Self {
        Self {
            is_answered: false,
            selected_option_id: None,
            is_user_correct: None,
            ..self
        }
    }

    /// Four options with distinct labels, one of which is the correct one.
    pub fn is_well_formed(&self) -> bool {
        if self.options.len() != OPTIONS_PER_QUESTION {
            return false;
        }
        let labels: HashSet<&str> = self.options.iter().map(|o| o.id.as_str()).collect();
        labels.len() == OPTIONS_PER_QUESTION && labels.contains(self.correct_answer_id.as_str())
    }

    /// Records the user's pick. Returns `None` (and leaves the question alone)
    /// when it has already been answered.
    pub fn answer(&mut self, option_id: &str) -> Option<bool> {
        if self.is_answered {
            return None;
        }
        let is_correct = option_id == self.correct_answer_id;
        self.is_answered = true;
        self.selected_option_id = Some(option_id.to_string());
        self.is_user_correct = Some(is_correct);
        Some(is_correct)
    }
}

#[cfg(test)]
pub(crate) fn sample_question() -> Question {
    let option = |id: &str, text: &str| QuizOption {
        id: id.to_string(),
        text: text.to_string(),
    };
    Question {
        question_text: "What is 2 + 2?".to_string(),
        options: vec![option("A", "3"), option("B", "5"), option("C", "4"), option("D", "22")],
        correct_answer_id: "C".to_string(),
        explanation: "Two plus two makes four.".to_string(),
        is_answered: false,
        selected_option_id: None,
        is_user_correct: None,
    }
}
