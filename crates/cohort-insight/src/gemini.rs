//! Gemini `generateContent` client.

use std::time::Duration;

use cohort_core::config::SummarizerConfig;
use cohort_core::error::CohortError;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::error::GenerateError;
use crate::summarizer::TextGenerator;

/// Text generator backed by the Gemini REST API.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CohortError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CohortError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Build from config. Fails when no API key is configured or exported.
    pub fn from_config(config: &SummarizerConfig) -> Result<Self, CohortError> {
        Self::with_key(config, config.resolve_api_key())
    }

    fn with_key(config: &SummarizerConfig, api_key: Option<String>) -> Result<Self, CohortError> {
        let api_key = api_key.ok_or_else(|| {
            CohortError::Config(
                "summarizer API key missing: set summarizer.api_key or GEMINI_API_KEY".to_string(),
            )
        })?;
        Self::new(
            api_key,
            config.base_url.as_str(),
            config.model.as_str(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The key travels in the `x-goog-api-key` header, never in the URL.
    fn endpoint(&self) -> String {
        let model = self.model.strip_prefix("models/").unwrap_or(&self.model);
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let payload = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerateError::Other("request timed out".to_string())
                } else {
                    GenerateError::Other(format!("HTTP request failed: {}", e.without_url()))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| {
                GenerateError::Other(format!("failed to parse response: {}", e.without_url()))
            })?;
        debug!(model = %self.model, "Gemini response received");
        extract_text(&body)
    }
}

/// Map a non-success HTTP status to a generation error. Only 429 is retryable.
pub fn classify_status(status: StatusCode, body: &str) -> GenerateError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        GenerateError::RateLimited
    } else {
        GenerateError::Other(format!("Gemini API error {status}: {body}"))
    }
}

/// Concatenated text parts of the first candidate.
pub fn extract_text(body: &Value) -> Result<String, GenerateError> {
    let parts = body["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| GenerateError::Other("response has no candidate text".to_string()))?;

    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    let text = text.trim();
    if text.is_empty() {
        return Err(GenerateError::Other("response text is empty".to_string()));
    }
    Ok(text.to_string())
}
