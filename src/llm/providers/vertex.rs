//! Vertex AI Gemini provider implementation
//!
//! Calls the `generateContent` endpoint. Document parts are sent as
//! `fileData` references so the model reads PDFs directly from Cloud Storage.

use crate::auth::TokenProvider;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, ContentPart, FinishReason, LlmError, LlmProvider,
    Message, MessageRole, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Vertex AI provider configuration
#[derive(Debug, Clone)]
pub struct VertexConfig {
    pub project: String,
    pub location: String,
    /// Overrides the regional endpoint; `None` derives it from `location`
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl Default for VertexConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            location: "us-central1".to_string(),
            base_url: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl VertexConfig {
    /// Resolved API root, e.g. `https://us-central1-aiplatform.googleapis.com/v1`
    pub fn endpoint(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com/v1", self.location),
        }
    }
}

/// Gemini on Vertex AI
pub struct VertexGeminiProvider {
    config: VertexConfig,
    client: Client,
    tokens: Arc<dyn TokenProvider>,
}

impl VertexGeminiProvider {
    /// Create a new Vertex provider
    pub fn new(config: VertexConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self, LlmError> {
        if config.project.is_empty() {
            return Err(LlmError::NotConfigured(
                "Vertex AI project is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self {
            config,
            client,
            tokens,
        })
    }

    fn generate_url(&self, model: &str) -> String {
        format!(
            "{}/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            self.config.endpoint(),
            self.config.project,
            self.config.location,
            model
        )
    }

    /// Convert completion request to Gemini format (pure function)
    fn convert_request(request: &CompletionRequest) -> GeminiRequest {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();

        for message in &request.messages {
            match message.role {
                MessageRole::System => {
                    system_parts.extend(message.parts.iter().map(Self::convert_part));
                }
                MessageRole::User | MessageRole::Assistant => {
                    contents.push(Self::convert_message(message));
                }
            }
        }

        let generation_config = if request.max_tokens.is_some() || request.temperature.is_some() {
            Some(GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            })
        } else {
            None
        };

        GeminiRequest {
            contents,
            system_instruction: if system_parts.is_empty() {
                None
            } else {
                Some(GeminiContent {
                    role: None,
                    parts: system_parts,
                })
            },
            generation_config,
        }
    }

    fn convert_message(message: &Message) -> GeminiContent {
        GeminiContent {
            role: Some(match message.role {
                MessageRole::Assistant => "model".to_string(),
                _ => "user".to_string(),
            }),
            parts: message.parts.iter().map(Self::convert_part).collect(),
        }
    }

    fn convert_part(part: &ContentPart) -> GeminiPart {
        match part {
            ContentPart::Text { text } => GeminiPart {
                text: Some(text.clone()),
                file_data: None,
            },
            ContentPart::FileUri { mime_type, uri } => GeminiPart {
                text: None,
                file_data: Some(GeminiFileData {
                    mime_type: mime_type.clone(),
                    file_uri: uri.clone(),
                }),
            },
        }
    }

    /// Parse Gemini response (pure function)
    fn parse_response(
        response: GeminiResponse,
        requested_model: &str,
        metadata: std::collections::HashMap<String, String>,
    ) -> Result<CompletionResponse, LlmError> {
        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            LlmError::InvalidResponse("No candidates returned from Vertex AI".to_string())
        })?;

        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|t| !t.is_empty());

        let usage = response
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: text,
            model: response
                .model_version
                .unwrap_or_else(|| requested_model.to_string()),
            usage,
            finish_reason: Self::convert_finish_reason(candidate.finish_reason.as_deref()),
            metadata,
        })
    }

    fn convert_finish_reason(reason: Option<&str>) -> FinishReason {
        match reason {
            Some("STOP") => FinishReason::Stop,
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY") | Some("BLOCKLIST") | Some("PROHIBITED_CONTENT") => {
                FinishReason::ContentFilter
            }
            _ => FinishReason::Error,
        }
    }
}

#[async_trait]
impl LlmProvider for VertexGeminiProvider {
    fn name(&self) -> &str {
        "vertex"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|e| LlmError::AuthenticationFailed(e.to_string()))?;

        let gemini_request = Self::convert_request(&request);
        debug!(
            model = %request.model,
            contents = gemini_request.contents.len(),
            "Vertex generateContent request"
        );

        let response = self
            .client
            .post(self.generate_url(&request.model))
            .bearer_auth(token)
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| {
                warn!("Vertex AI network error: {}", e);
                LlmError::NetworkError(e.to_string())
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::AuthenticationFailed(format!(
                "Vertex AI rejected credentials: {status} - {error_text}"
            )));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "Vertex AI API error - Status: {}, Response: {}",
                status, error_text
            );
            return Err(LlmError::ApiError(format!(
                "Vertex AI API error: {status} - {error_text}"
            )));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let completion = Self::parse_response(gemini_response, &request.model, request.metadata)?;
        debug!(
            "Vertex response: {} tokens used (prompt: {}, completion: {}), finish_reason: {:?}",
            completion.usage.total_tokens,
            completion.usage.prompt_tokens,
            completion.usage.completion_tokens,
            completion.finish_reason
        );
        Ok(completion)
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        self.tokens
            .access_token()
            .await
            .map(|_| ())
            .map_err(|e| LlmError::AuthenticationFailed(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<GeminiFileData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
