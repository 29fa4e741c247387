//! Gemini Text Generation Client
//!
//! Calls `models/{model}:generateContent` with a single text prompt and a
//! low temperature; the concatenated text parts of the first candidate are
//! returned verbatim. Parsing the structured answer is the strategy's job.

use super::{api_error, build_http_client, TextGenerator};
use crate::types::CollaboratorError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Low temperature keeps extraction answers stable
const TEMPERATURE: f64 = 0.1;

/// Gemini client
pub struct GeminiClient {
    http_client: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Result<Self, CollaboratorError> {
        let model = if model.trim().is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            model.trim().to_string()
        };

        Ok(Self {
            http_client: build_http_client(DEFAULT_TIMEOUT)?,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, CollaboratorError> {
        let url = format!("{}/models/{}:generateContent", GEMINI_API_URL, self.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": TEMPERATURE }
        });

        debug!(model = %self.model, prompt_chars = prompt.len(), "Calling Gemini");

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error("Gemini", response).await);
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Parse(format!("Gemini response: {}", e)))?;

        response_text(parsed)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Concatenated text of the first candidate
pub(crate) fn response_text(response: GenerateResponse) -> Result<String, CollaboratorError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(CollaboratorError::Parse(
            "Gemini returned no text (blocked or empty candidate)".to_string(),
        ));
    }
    Ok(text)
}
