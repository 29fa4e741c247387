//! External collaborators
//!
//! Each collaborator sits behind a trait so the cascade can run against
//! real HTTP clients in production and in-memory stubs in tests. Every call
//! returns `Result<_, CollaboratorError>`; strategies decide what a failure
//! means for the cascade.
//!
//! | Trait | Production client | Service |
//! |---|---|---|
//! | [`SignalExtractor`] | [`GoogleVisionClient`] | Google Cloud Vision annotate |
//! | [`CatalogLookup`] | [`CosmosClient`] | Bluesoft Cosmos GTIN catalog |
//! | [`TextGenerator`] | [`GeminiClient`] | Gemini generateContent |
//! | [`WebSearch`] | [`CustomSearchClient`] | Google Custom Search |
//! | [`ImageEmbedder`] + [`VectorIndex`] | [`VertexVectorClient`] | Vertex AI embeddings + Vector Search |

pub mod cosmos_client;
pub mod gemini_client;
pub mod vector_search_client;
pub mod vision_client;
pub mod web_search_client;

pub use cosmos_client::CosmosClient;
pub use gemini_client::GeminiClient;
pub use vector_search_client::VertexVectorClient;
pub use vision_client::GoogleVisionClient;
pub use web_search_client::CustomSearchClient;

use crate::config::ServiceConfig;
use crate::types::{CollaboratorError, TaxCodes, VisionSignals};
use async_trait::async_trait;
use shelfscan_common::config::resolve_secret;
use std::sync::Arc;
use tracing::{info, warn};

/// OCR / logo / label extraction from raw image bytes
#[async_trait]
pub trait SignalExtractor: Send + Sync {
    async fn extract(&self, image: &[u8]) -> Result<VisionSignals, CollaboratorError>;
}

/// Product catalog keyed by validated code
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// `Ok(None)` when the catalog has no entry for `code`
    async fn lookup(&self, code: &str) -> Result<Option<CatalogProduct>, CollaboratorError>;
}

/// Free-form text generation (structured extraction prompts)
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, CollaboratorError>;
}

/// Web search returning ranked result snippets
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CollaboratorError>;
}

/// Image → embedding vector
#[async_trait]
pub trait ImageEmbedder: Send + Sync {
    async fn embed(&self, image: &[u8]) -> Result<Vec<f32>, CollaboratorError>;
}

/// Nearest-neighbor search over stored product embeddings
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Best match, or `Ok(None)` when the index is empty
    async fn nearest(&self, embedding: &[f32]) -> Result<Option<VectorMatch>, CollaboratorError>;
}

/// Catalog entry for one product code
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogProduct {
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub price: Option<f64>,
    pub tax_codes: TaxCodes,
}

/// Nearest stored product for an image embedding
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    /// Stored product id (as indexed)
    pub external_id: String,
    /// Similarity in 0.0-1.0 (higher is closer)
    pub similarity: f64,
}

/// One web search result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

/// Collaborator handles available to the pipeline
///
/// A `None` handle means the collaborator is not configured; the stages
/// that depend on it are skipped.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub signal_extractor: Option<Arc<dyn SignalExtractor>>,
    pub catalog: Option<Arc<dyn CatalogLookup>>,
    pub embedder: Option<Arc<dyn ImageEmbedder>>,
    pub vector_index: Option<Arc<dyn VectorIndex>>,
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub web_search: Option<Arc<dyn WebSearch>>,
}

impl Collaborators {
    /// Build production clients for every collaborator whose credentials resolve
    ///
    /// Secrets are resolved ENV → TOML (see `ServiceConfig`).
    pub fn from_config(config: &ServiceConfig) -> Result<Self, CollaboratorError> {
        let mut collaborators = Collaborators::default();

        let vision_key = resolve_secret(
            "vision",
            "SHELFSCAN_VISION_API_KEY",
            config.vision.api_key.as_deref(),
        );
        match vision_key {
            Some(key) => {
                collaborators.signal_extractor = Some(Arc::new(GoogleVisionClient::new(key)?));
            }
            None => warn!("Vision API key not configured: image requests need precomputed signals"),
        }

        let catalog_key = resolve_secret(
            "catalog",
            "SHELFSCAN_CATALOG_API_KEY",
            config.catalog.api_key.as_deref(),
        );
        match catalog_key {
            Some(key) => {
                collaborators.catalog = Some(Arc::new(CosmosClient::new(
                    key,
                    config.catalog.base_url.clone(),
                    config.catalog.requests_per_second,
                )?));
            }
            None => warn!("Catalog API key not configured: code lookup disabled"),
        }

        let inference_key = resolve_secret(
            "inference",
            "SHELFSCAN_INFERENCE_API_KEY",
            config.inference.api_key.as_deref(),
        );
        match inference_key {
            Some(key) => {
                collaborators.generator = Some(Arc::new(GeminiClient::new(
                    key,
                    config.inference.model.clone(),
                )?));
            }
            None => warn!("Inference API key not configured: inference and enrichment disabled"),
        }

        let search_key = resolve_secret(
            "search",
            "SHELFSCAN_SEARCH_API_KEY",
            config.search.api_key.as_deref(),
        );
        let search_engine = resolve_secret(
            "search engine id",
            "SHELFSCAN_SEARCH_ENGINE_ID",
            config.search.engine_id.as_deref(),
        );
        match (search_key, search_engine) {
            (Some(key), Some(engine_id)) => {
                collaborators.web_search = Some(Arc::new(CustomSearchClient::new(key, engine_id)?));
            }
            _ => warn!("Web search not configured: enrichment disabled"),
        }

        let access_token = resolve_secret(
            "vector access token",
            "SHELFSCAN_VECTOR_ACCESS_TOKEN",
            config.vector.access_token.as_deref(),
        );
        match (access_token, config.vector.endpoint()) {
            (Some(token), Some(endpoint)) => {
                let client = Arc::new(VertexVectorClient::new(token, endpoint)?);
                collaborators.embedder = Some(client.clone());
                collaborators.vector_index = Some(client);
            }
            _ => warn!("Vector search not configured: visual lookup disabled"),
        }

        info!(
            vision = collaborators.signal_extractor.is_some(),
            catalog = collaborators.catalog.is_some(),
            inference = collaborators.generator.is_some(),
            web_search = collaborators.web_search.is_some(),
            vector = collaborators.vector_index.is_some(),
            "Collaborators configured"
        );

        Ok(collaborators)
    }
}

/// Build the shared reqwest client used by every production collaborator
pub(crate) fn build_http_client(
    timeout: std::time::Duration,
) -> Result<reqwest::Client, CollaboratorError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(std::time::Duration::from_secs(5))
        .user_agent(shelfscan_common::config::get_user_agent())
        .build()
        .map_err(|e| CollaboratorError::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Map a non-success HTTP response to an API error, keeping the body for the log
pub(crate) async fn api_error(service: &str, response: reqwest::Response) -> CollaboratorError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    CollaboratorError::Api(format!("{} returned {}: {}", service, status, body))
}
