//! Clients for the external text generators.
//!
//! The rest of the bot only sees [`Generator`]: one request in, one block of
//! text (plus any web sources the backend attached) out.

pub mod chatgpt;
mod error;
pub mod gemini;

pub use chatgpt::ChatGptGenerator;
pub use error::LlmError;
pub use gemini::GeminiGenerator;

use async_trait::async_trait;

/// A single-turn generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub contents: String,
    /// Ask the backend to answer with JSON only.
    pub json_output: bool,
    /// Let the backend ground the answer in web search results.
    pub search_grounding: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub sources: Vec<Source>,
}

/// A web page the generator cited.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Source {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

impl Source {
    pub fn new(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: title.into(),
        }
    }

    pub fn is_well_formed(&self) -> bool {
        !self.uri.is_empty() && !self.title.is_empty()
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, LlmError>;

    fn model_id(&self) -> &str;
}
