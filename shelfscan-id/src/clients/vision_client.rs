//! Google Cloud Vision Client
//!
//! One `images:annotate` call per image requesting text, logo and label
//! detection. The OCR text is then mined for a candidate product code and a
//! printed price.

use super::{api_error, build_http_client, SignalExtractor};
use crate::types::{CollaboratorError, VisionSignals};
use crate::validators::find_code_in_text;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

const VISION_API_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Label annotations requested per image
const MAX_LABELS: u32 = 10;

/// Google Cloud Vision client
pub struct GoogleVisionClient {
    http_client: Client,
    api_key: String,
}

impl GoogleVisionClient {
    pub fn new(api_key: String) -> Result<Self, CollaboratorError> {
        Ok(Self {
            http_client: build_http_client(DEFAULT_TIMEOUT)?,
            api_key,
        })
    }
}

#[async_trait]
impl SignalExtractor for GoogleVisionClient {
    async fn extract(&self, image: &[u8]) -> Result<VisionSignals, CollaboratorError> {
        let body = json!({
            "requests": [{
                "image": { "content": STANDARD.encode(image) },
                "features": [
                    { "type": "TEXT_DETECTION" },
                    { "type": "LOGO_DETECTION" },
                    { "type": "LABEL_DETECTION", "maxResults": MAX_LABELS }
                ]
            }]
        });

        let response = self
            .http_client
            .post(VISION_API_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error("Vision", response).await);
        }

        let annotations: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Parse(format!("Vision response: {}", e)))?;

        let signals = signals_from_response(annotations)?;
        debug!(
            text_chars = signals.text_len(),
            logos = signals.detected_logos.len(),
            labels = signals.detected_labels.len(),
            candidate_code = ?signals.candidate_code,
            "Vision extraction complete"
        );
        Ok(signals)
    }
}

// ============================================================================
// Response format
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageAnnotations>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageAnnotations {
    #[serde(default)]
    text_annotations: Vec<Annotation>,
    #[serde(default)]
    logo_annotations: Vec<Annotation>,
    #[serde(default)]
    label_annotations: Vec<Annotation>,
    error: Option<AnnotationError>,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct AnnotationError {
    #[serde(default)]
    message: String,
}

/// Convert an annotate response into signals
pub(crate) fn signals_from_response(
    response: AnnotateResponse,
) -> Result<VisionSignals, CollaboratorError> {
    let annotations = response.responses.into_iter().next().unwrap_or_default();

    if let Some(error) = annotations.error {
        return Err(CollaboratorError::Api(format!("Vision: {}", error.message)));
    }

    // First text annotation holds the full text; the rest are individual words
    let raw_text = annotations
        .text_annotations
        .first()
        .map(|a| a.description.trim().to_string())
        .unwrap_or_default();

    let descriptions = |list: Vec<Annotation>| -> Vec<String> {
        list.into_iter()
            .map(|a| a.description.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect()
    };

    Ok(VisionSignals {
        candidate_code: find_code_in_text(&raw_text),
        candidate_price: find_price_in_text(&raw_text),
        detected_logos: descriptions(annotations.logo_annotations),
        detected_labels: descriptions(annotations.label_annotations),
        raw_text,
    })
}

fn price_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?:R\$|\$)\s*(\d{1,3}(?:[.,]\d{3})*[.,]\d{2}|\d+[.,]\d{2})").ok()
        })
        .as_ref()
}

/// First currency amount in the text (R$ 1.234,56 / $1,234.56 / R$9,99)
pub fn find_price_in_text(text: &str) -> Option<f64> {
    let amount = price_pattern()?.captures(text)?.get(1)?.as_str();

    // Last separator is the decimal point; everything before it is grouping
    let split = amount.rfind(|c| c == '.' || c == ',')?;
    let integer: String = amount[..split].chars().filter(|c| c.is_ascii_digit()).collect();
    let decimals = &amount[split + 1..];

    format!("{}.{}", integer, decimals).parse::<f64>().ok()
}
