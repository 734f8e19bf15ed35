//! OpenAI ChatGPT backend

use super::{Generation, GenerationRequest, Generator, LlmError};
use async_trait::async_trait;
use chatgpt::client::ChatGPT;
use chatgpt::config::ChatGPTEngine;
use chatgpt::types::CompletionResponse;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

pub struct ChatGptGenerator {
    chat_gpt: ChatGPT,
    model: String,
}

fn engine_for(model: &str) -> ChatGPTEngine {
    match model {
        "gpt-3.5-turbo" => ChatGPTEngine::Gpt35Turbo,
        "gpt-4" => ChatGPTEngine::Gpt4,
        "gpt-4-32k" => ChatGPTEngine::Gpt4_32k,
        other => {
            log::warn!("Unknown ChatGPT model {other:?}, falling back to {DEFAULT_MODEL}");
            ChatGPTEngine::Gpt35Turbo
        }
    }
}

impl ChatGptGenerator {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, LlmError> {
        let mut chat_gpt = ChatGPT::new(api_key)
            .map_err(|e| LlmError::unknown(format!("Unable to connect with ChatGPT: {e}")))?;

        chat_gpt.config.engine = engine_for(&model);
        chat_gpt.config.timeout = timeout;

        Ok(Self { chat_gpt, model })
    }
}

#[async_trait]
impl Generator for ChatGptGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, LlmError> {
        if request.search_grounding {
            log::debug!("ChatGPT backend has no search grounding, sending plain request");
        }

        // The system instruction already demands JSON when `json_output` is set.
        let mut conversation = self
            .chat_gpt
            .new_conversation_directed(request.system_instruction.clone());

        let response: CompletionResponse = conversation
            .send_message(request.contents.clone())
            .await
            .map_err(|e| LlmError::network(format!("ChatGPT request failed: {e}")))?;
        let text = response.message().clone().content;

        log::debug!("Completion: {:?}", text);

        Ok(Generation {
            text,
            sources: Vec::new(),
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
