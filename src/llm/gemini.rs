//! Google Gemini `generateContent` client

use super::{Generation, GenerationRequest, Generator, LlmError, Source};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiGenerator {
    pub fn new(
        api_key: String,
        model: String,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            model
        );

        Ok(Self {
            client,
            api_key,
            model,
            endpoint,
        })
    }

    fn translate_request(request: &GenerationRequest) -> GeminiRequest {
        let system_instruction = (!request.system_instruction.is_empty()).then(|| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: request.system_instruction.clone(),
            }],
        });

        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: request.contents.clone(),
                }],
            }],
            system_instruction,
            tools: request
                .search_grounding
                .then(|| vec![GeminiTool { google_search: GoogleSearch {} }]),
            generation_config: request.json_output.then(|| GeminiGenerationConfig {
                response_mime_type: Some("application/json".to_string()),
            }),
        }
    }

    fn normalize_response(resp: GeminiResponse) -> Result<Generation, LlmError> {
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::unknown("No candidates in response"))?;

        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        let sources = candidate
            .grounding_metadata
            .map(|metadata| {
                metadata
                    .grounding_chunks
                    .into_iter()
                    .filter_map(|chunk| chunk.web)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Generation { text, sources })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, LlmError> {
        let gemini_request = Self::translate_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map(|resp| resp.error.message)
                .unwrap_or(body);
            return Err(LlmError::from_status(
                status.as_u16(),
                format!("HTTP {status}: {message}"),
            ));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Self::normalize_response(gemini_response)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    grounding_metadata: Option<GeminiGroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GeminiGroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GeminiGroundingChunk {
    web: Option<Source>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn question_request_asks_for_json() {
        let request = GenerationRequest {
            system_instruction: "be a tutor".to_string(),
            contents: "Generate an MCQ for the subject: Physics".to_string(),
            json_output: true,
            search_grounding: false,
        };

        let body = serde_json::to_value(GeminiGenerator::translate_request(&request)).unwrap();

        assert_eq!(
            body,
            json!({
                "contents": [{"role": "user", "parts": [{"text": "Generate an MCQ for the subject: Physics"}]}],
                "systemInstruction": {"parts": [{"text": "be a tutor"}]},
                "generationConfig": {"responseMimeType": "application/json"}
            })
        );
    }

    #[test]
    fn grounded_request_enables_search() {
        let request = GenerationRequest {
            contents: "why is the sky blue".to_string(),
            search_grounding: true,
            ..Default::default()
        };

        let body = serde_json::to_value(GeminiGenerator::translate_request(&request)).unwrap();

        assert_eq!(body["tools"], json!([{"googleSearch": {}}]));
        assert!(body.get("systemInstruction").is_none());
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn response_text_and_sources() {
        let resp: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Rayleigh "}, {"text": "scattering."}]},
                "finishReason": "STOP",
                "groundingMetadata": {
                    "groundingChunks": [
                        {"web": {"uri": "https://example.org/sky", "title": "Sky"}},
                        {"retrievedContext": {}},
                        {"web": {"uri": "https://example.org/light"}}
                    ]
                }
            }],
            "usageMetadata": {"promptTokenCount": 3}
        }))
        .unwrap();

        let generation = GeminiGenerator::normalize_response(resp).unwrap();

        assert_eq!(generation.text, "Rayleigh scattering.");
        assert_eq!(
            generation.sources,
            vec![
                Source::new("https://example.org/sky", "Sky"),
                Source::new("https://example.org/light", ""),
            ]
        );
    }

    #[test]
    fn no_candidates_is_an_error() {
        let resp: GeminiResponse = serde_json::from_value(json!({})).unwrap();
        assert!(GeminiGenerator::normalize_response(resp).is_err());
    }

    #[test]
    fn endpoint_includes_model() {
        let generator = GeminiGenerator::new(
            "key".to_string(),
            "gemini-test".to_string(),
            "https://example.org/",
            Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(
            generator.endpoint,
            "https://example.org/v1beta/models/gemini-test:generateContent"
        );
        assert_eq!(generator.model_id(), "gemini-test");
    }
}
