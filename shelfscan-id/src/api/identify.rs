//! Identification endpoint
//!
//! POST /api/v1/vision/identify

use axum::{extract::State, routing::post, Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult, IdentifyError},
    types::{ProductRecord, Vertical, VisionSignals},
    workflow::IdentifyRequest,
    AppState,
};

/// Largest accepted decoded image
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// POST /api/v1/vision/identify request
#[derive(Debug, Deserialize)]
pub struct IdentifyBody {
    /// `supermarket` or `apparel` (aliases accepted)
    pub vertical: String,
    /// Image bytes, base64 (a `data:image/...;base64,` prefix is allowed)
    #[serde(default)]
    pub image_base64: Option<String>,
    /// Precomputed signals; OCR is skipped when present
    #[serde(default)]
    pub signals: Option<VisionSignals>,
}

/// Whether the record came from the dedup cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifyStatus {
    DuplicateFound,
    NewlyIdentified,
}

/// POST /api/v1/vision/identify response
#[derive(Debug, Serialize)]
pub struct IdentifyResponse {
    pub success: bool,
    pub status: IdentifyStatus,
    pub product: ProductRecord,
    pub image_hash: String,
    pub confidence: f64,
    /// Seconds spent on this request
    pub processing_time: f64,
}

/// POST /api/v1/vision/identify
pub async fn identify_product(
    State(state): State<AppState>,
    Json(body): Json<IdentifyBody>,
) -> ApiResult<Json<IdentifyResponse>> {
    let vertical: Vertical = body.vertical.parse().map_err(IdentifyError::from)?;

    let image = body
        .image_base64
        .as_deref()
        .map(decode_image)
        .transpose()?;

    let request = IdentifyRequest {
        vertical,
        image,
        signals: body.signals,
    };

    let report = match state.pipeline.identify_traced(request).await {
        Ok(report) => report,
        Err(err) => {
            tracing::warn!(error = %err, "Identification request rejected");
            *state.last_error.write().await = Some(err.to_string());
            return Err(err.into());
        }
    };

    let status = if report.cache_hit {
        IdentifyStatus::DuplicateFound
    } else {
        IdentifyStatus::NewlyIdentified
    };

    Ok(Json(IdentifyResponse {
        success: true,
        status,
        image_hash: report.record.image_hash.clone(),
        confidence: report.record.confidence,
        processing_time: report.elapsed_seconds,
        product: report.record,
    }))
}

/// Decode a base64 image, enforcing [`MAX_IMAGE_BYTES`]
pub fn decode_image(encoded: &str) -> ApiResult<Vec<u8>> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    let payload = payload.trim();

    // Base64 expands 3 bytes to 4 characters
    if payload.len() / 4 * 3 > MAX_IMAGE_BYTES + 3 {
        return Err(too_large());
    }

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| ApiError::BadRequest(format!("image_base64 is not valid base64: {}", e)))?;

    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(too_large());
    }
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("image_base64 is empty".to_string()));
    }

    Ok(bytes)
}

fn too_large() -> ApiError {
    ApiError::BadRequest(format!(
        "Image exceeds the {} MiB limit",
        MAX_IMAGE_BYTES / (1024 * 1024)
    ))
}

/// Build identification routes
pub fn identify_routes() -> Router<AppState> {
    Router::new().route("/api/v1/vision/identify", post(identify_product))
}
