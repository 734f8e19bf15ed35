//! Runtime configuration, read from the environment (and `.env`).

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::llm::{self, ChatGptGenerator, GeminiGenerator, Generator, LlmError};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-preview-04-17";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Gemini { api_key: String, base_url: String },
    ChatGpt { api_key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: Backend,
    pub model: String,
    pub timeout: Duration,
    /// Ground tutor answers in web search (Gemini only).
    pub search_grounding: bool,
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend_name = lookup("CONTENT_BACKEND").unwrap_or_else(|| "gemini".to_string());

        let (backend, default_model) = match backend_name.trim().to_lowercase().as_str() {
            "gemini" => {
                let api_key = lookup("GEMINI_API_KEY")
                    .or_else(|| lookup("API_KEY"))
                    .ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;
                let base_url = lookup("GEMINI_BASE_URL")
                    .unwrap_or_else(|| llm::gemini::DEFAULT_BASE_URL.to_string());
                (Backend::Gemini { api_key, base_url }, DEFAULT_GEMINI_MODEL)
            }
            "chatgpt" => {
                let api_key =
                    lookup("CHATGPT_API_KEY").ok_or(ConfigError::Missing("CHATGPT_API_KEY"))?;
                (Backend::ChatGpt { api_key }, llm::chatgpt::DEFAULT_MODEL)
            }
            _ => {
                return Err(ConfigError::Invalid {
                    key: "CONTENT_BACKEND",
                    value: backend_name,
                })
            }
        };

        let model = lookup("CONTENT_MODEL").unwrap_or_else(|| default_model.to_string());

        let timeout = match lookup("CONTENT_TIMEOUT_SECS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    key: "CONTENT_TIMEOUT_SECS",
                    value,
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let search_grounding = match lookup("SEARCH_GROUNDING") {
            Some(value) => parse_bool("SEARCH_GROUNDING", &value)?,
            None => false,
        };

        Ok(Self {
            backend,
            model,
            timeout: Duration::from_secs(timeout),
            search_grounding,
        })
    }

    pub fn build_generator(&self) -> Result<Arc<dyn Generator>, LlmError> {
        let generator: Arc<dyn Generator> = match &self.backend {
            Backend::Gemini { api_key, base_url } => Arc::new(GeminiGenerator::new(
                api_key.clone(),
                self.model.clone(),
                base_url,
                self.timeout,
            )?),
            Backend::ChatGpt { api_key } => Arc::new(ChatGptGenerator::new(
                api_key.clone(),
                self.model.clone(),
                self.timeout,
            )?),
        };
        Ok(generator)
    }
}
