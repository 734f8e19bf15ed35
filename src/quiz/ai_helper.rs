use std::sync::Arc;

use async_trait::async_trait;

use crate::chat::texts::BOT_NAME;
use crate::llm::{GenerationRequest, Generator, Source};
use crate::quiz::{parse::parse_json_response, Question};

/// What the tutor said, plus any web pages it leaned on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Explanation {
    pub text: Option<String>,
    pub sources: Vec<Source>,
}

/// The two things the conversation asks of the outside world.
///
/// Both operations are total: failures are logged and come back as an absent
/// result.
#[async_trait]
pub trait ContentService: Send + Sync {
    async fn request_question(&self, subject: &str) -> Option<Question>;

    async fn request_explanation(&self, query: &str) -> Explanation;
}

fn mcq_instruction() -> String {
    format!(
        r#"You are {BOT_NAME}, a friendly AI tutor for Nigerian secondary school students preparing for WAEC/NECO.
Generate a single multiple-choice question about the given subject suitable for this audience.
The question should have 4 options.
Your response MUST be a JSON object with the following structure:
{{
  "questionText": "The question itself",
  "options": [
    {{"id": "A", "text": "Option A text"}},
    {{"id": "B", "text": "Option B text"}},
    {{"id": "C", "text": "Option C text"}},
    {{"id": "D", "text": "Option D text"}}
  ],
  "correctAnswerId": "C",
  "explanation": "A brief explanation of why the correct answer is right and, if possible, why common distractors are wrong."
}}
Ensure the JSON is valid. The explanation should be encouraging and helpful."#
    )
}

fn tutor_instruction() -> String {
    format!(
        "You are {BOT_NAME}, a friendly, patient, and encouraging AI tutor. You are helping Nigerian secondary school students (ages 12-16) prepare for their WAEC/NECO exams.
Your explanations should be clear, simple, and tailored to this audience.
When explaining, break down complex topics into easily understandable parts.
Use Nigerian context or examples if relevant and respectful. Keep the explanation concise but comprehensive enough for a secondary school student.
If the question is unclear or too broad, ask for clarification in a friendly manner.
If the question is outside of an academic context for WAEC/NECO, politely state that you are focused on exam preparation."
    )
}

pub struct QuizHelper {
    generator: Arc<dyn Generator>,
    search_grounding: bool,
}

impl QuizHelper {
    pub fn new(generator: Arc<dyn Generator>, search_grounding: bool) -> Self {
        Self {
            generator,
            search_grounding,
        }
    }
}

#[async_trait]
impl ContentService for QuizHelper {
    async fn request_question(&self, subject: &str) -> Option<Question> {
        log::debug!("Generating question for subject: {subject:?}");
        let request = GenerationRequest {
            system_instruction: mcq_instruction(),
            contents: format!("Generate an MCQ for the subject: {subject}"),
            json_output: true,
            search_grounding: false,
        };

        let generation = match self.generator.generate(&request).await {
            Ok(generation) => generation,
            Err(err) => {
                log::error!(
                    "Error generating MCQ with {} ({:?}): {err}",
                    self.generator.model_id(),
                    err.kind
                );
                return None;
            }
        };

        let question = parse_json_response::<Question>(&generation.text)?.unanswered();
        if !question.is_well_formed() {
            log::error!("Generated question is malformed: {question:?}");
            return None;
        }
        Some(question)
    }

    async fn request_explanation(&self, query: &str) -> Explanation {
        log::debug!("Generating explanation for: {query:?}");
        let request = GenerationRequest {
            system_instruction: tutor_instruction(),
            contents: query.to_string(),
            json_output: false,
            search_grounding: self.search_grounding,
        };

        match self.generator.generate(&request).await {
            Ok(generation) => Explanation {
                text: Some(generation.text).filter(|text| !text.trim().is_empty()),
                sources: generation.sources,
            },
            Err(err) => {
                log::error!(
                    "Error getting tutor explanation from {} ({:?}): {err}",
                    self.generator.model_id(),
                    err.kind
                );
                Explanation::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Generation, LlmError};
    use std::sync::Mutex;

    /// Replays canned generator output and remembers what it was asked.
    struct ScriptedGenerator {
        reply: Result<Generation, fn() -> LlmError>,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedGenerator {
        fn text(text: &str) -> Arc<Self> {
            Self::generation(Generation {
                text: text.to_string(),
                sources: Vec::new(),
            })
        }

        fn generation(generation: Generation) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(generation),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(|| LlmError::network("Request timeout")),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<Generation, LlmError> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(generation) => Ok(generation.clone()),
                Err(make_error) => Err(make_error()),
            }
        }

        fn model_id(&self) -> &str {
            "scripted"
        }
    }

    const QUESTION_JSON: &str = r#"{
        "questionText": "Which gas do plants absorb?",
        "options": [
            {"id": "A", "text": "Oxygen"},
            {"id": "B", "text": "Nitrogen"},
            {"id": "C", "text": "Carbon dioxide"},
            {"id": "D", "text": "Helium"}
        ],
        "correctAnswerId": "C",
        "explanation": "Plants take in carbon dioxide for photosynthesis.",
        "isAnswered": true
    }"#;

    #[tokio::test]
    async fn question_from_fenced_json() {
        let generator = ScriptedGenerator::text(&format!("```json\n{QUESTION_JSON}\n```"));
        let helper = QuizHelper::new(generator.clone(), true);

        let question = helper.request_question("Biology").await.unwrap();

        assert_eq!(question.correct_answer_id, "C");
        assert_eq!(question.options.len(), 4);
        assert!(!question.is_answered);
        assert_eq!(question.selected_option_id, None);

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen[0].contents, "Generate an MCQ for the subject: Biology");
        assert!(seen[0].json_output);
        assert!(!seen[0].search_grounding);
        assert!(seen[0].system_instruction.contains("JSON"));
    }

    #[tokio::test]
    async fn question_embedded_in_prose() {
        let generator = ScriptedGenerator::text(&format!("Here you go!\n{QUESTION_JSON}\nEnjoy."));
        let helper = QuizHelper::new(generator, false);

        assert!(helper.request_question("Biology").await.is_some());
    }

    #[tokio::test]
    async fn unparseable_question_is_absent() {
        let helper = QuizHelper::new(ScriptedGenerator::text("I cannot do that."), false);
        assert_eq!(helper.request_question("Biology").await, None);
    }

    #[tokio::test]
    async fn malformed_question_is_absent() {
        let three_options = r#"{"questionText": "Q", "options": [
            {"id": "A", "text": "1"}, {"id": "B", "text": "2"}, {"id": "C", "text": "3"}
        ], "correctAnswerId": "A", "explanation": "E"}"#;
        let helper = QuizHelper::new(ScriptedGenerator::text(three_options), false);
        assert_eq!(helper.request_question("Physics").await, None);
    }

    #[tokio::test]
    async fn transport_failure_is_absent() {
        let helper = QuizHelper::new(ScriptedGenerator::failing(), false);

        assert_eq!(helper.request_question("Physics").await, None);
        assert_eq!(helper.request_explanation("what is work?").await, Explanation::default());
    }

    #[tokio::test]
    async fn explanation_carries_sources() {
        let generator = ScriptedGenerator::generation(Generation {
            text: "Work is force times distance.".to_string(),
            sources: vec![Source::new("https://example.org/work", "Work")],
        });
        let helper = QuizHelper::new(generator.clone(), true);

        let explanation = helper.request_explanation("What is work?").await;

        assert_eq!(explanation.text.as_deref(), Some("Work is force times distance."));
        assert_eq!(explanation.sources.len(), 1);

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen[0].contents, "What is work?");
        assert!(seen[0].search_grounding);
        assert!(!seen[0].json_output);
    }

    #[tokio::test]
    async fn blank_explanation_is_absent() {
        let helper = QuizHelper::new(ScriptedGenerator::text("  \n"), false);
        assert_eq!(helper.request_explanation("hmm").await.text, None);
    }
}
