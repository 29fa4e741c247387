//! Service configuration for shelfscan-id
//!
//! Loaded once at startup from the bootstrap TOML file. Every section is
//! optional; missing keys fall back to the defaults below. API keys are
//! resolved ENV → TOML when collaborators are built
//! (see [`crate::clients::Collaborators::from_config`]).
//!
//! ```toml
//! port = 8080
//! database_path = "/var/lib/shelfscan/shelfscan.db"
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [catalog]
//! requests_per_second = 5
//!
//! [pipeline]
//! inference_timeout_ms = 30000
//! visual_similarity_threshold = 0.8
//! ```

use crate::clients::gemini_client::DEFAULT_MODEL;
use crate::clients::vector_search_client::VectorEndpoint;
use crate::strategies::rag_enrichment::DEFAULT_RESULT_LIMIT;
use crate::strategies::visual_lookup::DEFAULT_SIMILARITY_THRESHOLD;
use crate::workflow::PipelineConfig;
use serde::{Deserialize, Serialize};
use shelfscan_common::config::{default_data_dir, load_toml_config, LoggingConfig};
use shelfscan_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;

/// Database file name inside the data folder
pub const DATABASE_FILE: &str = "shelfscan.db";

/// Top-level service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub port: u16,
    /// SQLite database file (default: `<data dir>/shelfscan.db`)
    pub database_path: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub catalog: CatalogSection,
    pub vision: VisionSection,
    pub inference: InferenceSection,
    pub search: SearchSection,
    pub vector: VectorSection,
    pub pipeline: PipelineSection,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_path: None,
            logging: LoggingConfig::default(),
            catalog: CatalogSection::default(),
            vision: VisionSection::default(),
            inference: InferenceSection::default(),
            search: SearchSection::default(),
            vector: VectorSection::default(),
            pipeline: PipelineSection::default(),
        }
    }
}

/// Product catalog (code lookup)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    pub api_key: Option<String>,
    /// Override for the catalog API root
    pub base_url: Option<String>,
    pub requests_per_second: u32,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            requests_per_second: 5,
        }
    }
}

/// OCR / logo / label detection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSection {
    pub api_key: Option<String>,
}

/// Text generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSection {
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for InferenceSection {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Web search (RAG enrichment and optional inference context)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub api_key: Option<String>,
    pub engine_id: Option<String>,
    pub result_limit: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            api_key: None,
            engine_id: None,
            result_limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

/// Image embedding + vector index (visual lookup)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSection {
    pub project: Option<String>,
    pub location: Option<String>,
    pub index_endpoint: Option<String>,
    pub deployed_index_id: Option<String>,
    pub public_domain: Option<String>,
    pub access_token: Option<String>,
}

impl VectorSection {
    /// Complete endpoint, or `None` while any part is missing
    pub fn endpoint(&self) -> Option<VectorEndpoint> {
        fn part(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        Some(VectorEndpoint {
            project: part(&self.project)?,
            location: part(&self.location)?,
            index_endpoint: part(&self.index_endpoint)?,
            deployed_index_id: part(&self.deployed_index_id)?,
            public_domain: part(&self.public_domain)?,
        })
    }
}

/// Cascade tuning (timeouts in milliseconds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub ocr_timeout_ms: u64,
    pub catalog_timeout_ms: u64,
    pub visual_timeout_ms: u64,
    pub inference_timeout_ms: u64,
    pub rag_timeout_ms: u64,
    pub search_timeout_ms: u64,
    pub visual_similarity_threshold: f64,
    pub search_context_for_inference: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        let defaults = PipelineConfig::default();
        Self {
            ocr_timeout_ms: defaults.ocr_timeout.as_millis() as u64,
            catalog_timeout_ms: defaults.catalog_timeout.as_millis() as u64,
            visual_timeout_ms: defaults.visual_timeout.as_millis() as u64,
            inference_timeout_ms: defaults.inference_timeout.as_millis() as u64,
            rag_timeout_ms: defaults.rag_timeout.as_millis() as u64,
            search_timeout_ms: defaults.search_timeout.as_millis() as u64,
            visual_similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            search_context_for_inference: defaults.search_context_for_inference,
        }
    }
}

impl ServiceConfig {
    /// Load from `path` (defaults when absent) and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: ServiceConfig = load_toml_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let threshold = self.pipeline.visual_similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "pipeline.visual_similarity_threshold must be within 0.0-1.0, got {}",
                threshold
            )));
        }

        let timeouts = [
            ("ocr_timeout_ms", self.pipeline.ocr_timeout_ms),
            ("catalog_timeout_ms", self.pipeline.catalog_timeout_ms),
            ("visual_timeout_ms", self.pipeline.visual_timeout_ms),
            ("inference_timeout_ms", self.pipeline.inference_timeout_ms),
            ("rag_timeout_ms", self.pipeline.rag_timeout_ms),
            ("search_timeout_ms", self.pipeline.search_timeout_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, ms)| *ms == 0) {
            return Err(Error::Config(format!("pipeline.{} must be positive", name)));
        }

        if self.catalog.requests_per_second == 0 {
            return Err(Error::Config(
                "catalog.requests_per_second must be positive".to_string(),
            ));
        }

        if self.search.result_limit == 0 {
            return Err(Error::Config("search.result_limit must be positive".to_string()));
        }

        Ok(())
    }

    /// Database file: CLI override → TOML → data folder default
    pub fn resolve_database_path(&self, cli_override: Option<&Path>) -> PathBuf {
        cli_override
            .map(Path::to_path_buf)
            .or_else(|| self.database_path.clone())
            .unwrap_or_else(|| default_data_dir().join(DATABASE_FILE))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let p = &self.pipeline;
        PipelineConfig {
            ocr_timeout: Duration::from_millis(p.ocr_timeout_ms),
            catalog_timeout: Duration::from_millis(p.catalog_timeout_ms),
            visual_timeout: Duration::from_millis(p.visual_timeout_ms),
            inference_timeout: Duration::from_millis(p.inference_timeout_ms),
            rag_timeout: Duration::from_millis(p.rag_timeout_ms),
            search_timeout: Duration::from_millis(p.search_timeout_ms),
            visual_similarity_threshold: p.visual_similarity_threshold,
            search_result_limit: self.search.result_limit,
            search_context_for_inference: p.search_context_for_inference,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let config = ServiceConfig::load(None).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.inference.model, DEFAULT_MODEL);
        assert!(config.vector.endpoint().is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("shelfscan-id.toml");
        std::fs::write(
            &path,
            "port = 9090\n\n[pipeline]\ninference_timeout_ms = 5000\n\n[search]\nresult_limit = 5\n",
        )
        .unwrap();

        let config = ServiceConfig::load(Some(&path)).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.catalog.requests_per_second, 5);

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.inference_timeout, Duration::from_millis(5000));
        assert_eq!(pipeline.catalog_timeout, PipelineConfig::default().catalog_timeout);
        assert_eq!(pipeline.search_result_limit, 5);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut config = ServiceConfig::default();
        config.pipeline.visual_similarity_threshold = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = ServiceConfig::default();
        config.pipeline.rag_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_database_path_priority() {
        let mut config = ServiceConfig::default();
        assert!(config.resolve_database_path(None).ends_with(DATABASE_FILE));

        config.database_path = Some(PathBuf::from("/srv/from-toml.db"));
        assert_eq!(
            config.resolve_database_path(None),
            PathBuf::from("/srv/from-toml.db")
        );
        assert_eq!(
            config.resolve_database_path(Some(Path::new("/srv/from-cli.db"))),
            PathBuf::from("/srv/from-cli.db")
        );
    }

    #[test]
    fn test_vector_endpoint_requires_every_part() {
        let mut vector = VectorSection {
            project: Some("proj".into()),
            location: Some("us-central1".into()),
            index_endpoint: Some("123".into()),
            deployed_index_id: Some("products".into()),
            public_domain: Some("1.vdb.vertexai.goog".into()),
            access_token: None,
        };
        assert_eq!(vector.endpoint().unwrap().deployed_index_id, "products");

        vector.public_domain = Some("  ".into());
        assert!(vector.endpoint().is_none());
    }
}
