//! Gemini API client for document extraction
//!
//! Sends one `generateContent` request carrying the inline document, the
//! prompt and a response schema. Uses a long-lived reqwest::Client for
//! connection pooling.

use crate::config::GeminiConfig;
use crate::encoder::EncodedDocument;
use crate::error::AnalysisError;
use crate::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{error, info};

const ERROR_BODY_EXCERPT: usize = 512;

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
    requests_sent: AtomicU64,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| AnalysisError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            requests_sent: AtomicU64::new(0),
        })
    }

    pub fn has_credential(&self) -> bool {
        self.config.has_credential()
    }

    /// Number of HTTP requests this client has put on the wire.
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent.load(Ordering::SeqCst)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }

    /// Generate a JSON answer for a document. Returns the raw response text.
    pub async fn generate_structured(
        &self,
        document: &EncodedDocument,
        prompt: &str,
        response_schema: serde_json::Value,
    ) -> Result<String> {
        if !self.has_credential() {
            return Err(AnalysisError::MissingCredential);
        }

        let request = build_request(document, prompt, response_schema);

        info!(
            model = %self.config.model,
            media_type = %document.media_type,
            size_bytes = document.size_bytes,
            "Calling Gemini API"
        );

        self.requests_sent.fetch_add(1, Ordering::SeqCst);
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AnalysisError::TransportFailure(format!("Gemini API error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = %status, "Gemini API error response: {}", error_text);
            return Err(AnalysisError::TransportFailure(format!(
                "Gemini API returned {}: {}",
                status,
                excerpt(&error_text)
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AnalysisError::TransportFailure(format!("Gemini response unreadable: {}", e))
        })?;

        if let Some(usage) = &gemini_response.usage_metadata {
            info!(
                prompt_tokens = usage.prompt_token_count,
                candidate_tokens = usage.candidates_token_count,
                "Gemini response received"
            );
        }

        response_text(&gemini_response).ok_or(AnalysisError::EmptyResponse)
    }
}

fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(ERROR_BODY_EXCERPT) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn build_request(
    document: &EncodedDocument,
    prompt: &str,
    response_schema: serde_json::Value,
) -> GeminiRequest {
    GeminiRequest {
        contents: vec![Content {
            parts: vec![
                Part {
                    inline_data: Some(InlineData {
                        mime_type: document.media_type.as_mime().to_string(),
                        data: document.data_base64.clone(),
                    }),
                    text: None,
                },
                Part {
                    inline_data: None,
                    text: Some(prompt.to_string()),
                },
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema,
            temperature: 0.1,
        },
    }
}

/// Concatenated text parts of the first candidate, or `None` when blank.
fn response_text(response: &GeminiResponse) -> Option<String> {
    let candidate = response.candidates.first()?;
    let text: String = candidate
        .content
        .as_ref()?
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    inline_data: Option<InlineData>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i64,
    #[serde(default)]
    candidates_token_count: i64,
}
