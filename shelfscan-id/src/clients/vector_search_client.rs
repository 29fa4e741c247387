//! Vertex AI Vector Client
//!
//! Two calls behind one client:
//! - **embed**: multimodal embedding model `predict` → image embedding
//! - **nearest**: deployed Vector Search index `findNeighbors` → best match
//!
//! The index is built with DOT_PRODUCT distance over unit vectors, so the
//! reported distance already is a similarity (higher = closer). It is
//! clamped to 0.0-1.0 before leaving this module.

use super::{api_error, build_http_client, ImageEmbedder, VectorIndex, VectorMatch};
use crate::types::CollaboratorError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const EMBEDDING_MODEL: &str = "multimodalembedding@001";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Where the deployed index lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorEndpoint {
    pub project: String,
    pub location: String,
    pub index_endpoint: String,
    pub deployed_index_id: String,
    /// Public endpoint domain of the index (e.g. `1234.us-central1-5678.vdb.vertexai.goog`)
    pub public_domain: String,
}

pub struct VertexVectorClient {
    http_client: Client,
    access_token: String,
    endpoint: VectorEndpoint,
}

impl VertexVectorClient {
    pub fn new(access_token: String, endpoint: VectorEndpoint) -> Result<Self, CollaboratorError> {
        Ok(Self {
            http_client: build_http_client(DEFAULT_TIMEOUT)?,
            access_token,
            endpoint,
        })
    }

    fn predict_url(&self) -> String {
        format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}:predict",
            loc = self.endpoint.location,
            project = self.endpoint.project,
            model = EMBEDDING_MODEL,
        )
    }

    fn find_neighbors_url(&self) -> String {
        format!(
            "https://{domain}/v1/projects/{project}/locations/{loc}/indexEndpoints/{endpoint}:findNeighbors",
            domain = self.endpoint.public_domain,
            project = self.endpoint.project,
            loc = self.endpoint.location,
            endpoint = self.endpoint.index_endpoint,
        )
    }

    async fn post_json(
        &self,
        service: &str,
        url: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, CollaboratorError> {
        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(service, response).await);
        }
        Ok(response)
    }
}

#[async_trait]
impl ImageEmbedder for VertexVectorClient {
    async fn embed(&self, image: &[u8]) -> Result<Vec<f32>, CollaboratorError> {
        let body = json!({
            "instances": [{ "image": { "bytesBase64Encoded": STANDARD.encode(image) } }]
        });

        let response = self.post_json("Vertex predict", &self.predict_url(), body).await?;
        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Parse(format!("Vertex predict response: {}", e)))?;

        let embedding = embedding_from_response(parsed)?;
        debug!(dimensions = embedding.len(), "Image embedded");
        Ok(embedding)
    }
}

#[async_trait]
impl VectorIndex for VertexVectorClient {
    async fn nearest(&self, embedding: &[f32]) -> Result<Option<VectorMatch>, CollaboratorError> {
        let body = json!({
            "deployedIndexId": self.endpoint.deployed_index_id,
            "queries": [{
                "datapoint": { "featureVector": embedding },
                "neighborCount": 1
            }],
            "returnFullDatapoint": false
        });

        let response = self
            .post_json("Vertex findNeighbors", &self.find_neighbors_url(), body)
            .await?;
        let parsed: FindNeighborsResponse = response.json().await.map_err(|e| {
            CollaboratorError::Parse(format!("Vertex findNeighbors response: {}", e))
        })?;

        Ok(best_neighbor(parsed))
    }
}

// ============================================================================
// Response formats
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    #[serde(default)]
    image_embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FindNeighborsResponse {
    #[serde(default)]
    nearest_neighbors: Vec<NeighborList>,
}

#[derive(Debug, Deserialize)]
struct NeighborList {
    #[serde(default)]
    neighbors: Vec<Neighbor>,
}

#[derive(Debug, Deserialize)]
struct Neighbor {
    datapoint: Datapoint,
    #[serde(default)]
    distance: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Datapoint {
    datapoint_id: String,
}

pub(crate) fn embedding_from_response(
    response: PredictResponse,
) -> Result<Vec<f32>, CollaboratorError> {
    response
        .predictions
        .into_iter()
        .next()
        .map(|p| p.image_embedding)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| CollaboratorError::Parse("Vertex predict returned no embedding".to_string()))
}

pub(crate) fn best_neighbor(response: FindNeighborsResponse) -> Option<VectorMatch> {
    response
        .nearest_neighbors
        .into_iter()
        .flat_map(|list| list.neighbors)
        .max_by(|a, b| a.distance.total_cmp(&b.distance))
        .map(|n| VectorMatch {
            external_id: n.datapoint.datapoint_id,
            similarity: if n.distance.is_nan() { 0.0 } else { n.distance.clamp(0.0, 1.0) },
        })
}
