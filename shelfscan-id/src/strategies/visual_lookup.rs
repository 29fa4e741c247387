//! Visual Lookup Strategy
//!
//! Image → embedding → nearest stored product. Only used for apparel, where
//! packaging rarely carries a readable code. A match counts only when its
//! similarity is strictly above the configured threshold; the similarity
//! itself becomes the outcome's confidence. Stored emergency records
//! identify nothing and never count as a match.

use super::{classify, Attempt, AttemptResult, MissReason, StrategyError};
use crate::clients::{ImageEmbedder, VectorIndex};
use crate::db::ProductStore;
use crate::types::{ProductFields, ProductRecord, StrategyOutcome, StrategySource, Title};
use crate::utils::is_placeholder_phrase;
use std::sync::Arc;
use tracing::debug;

/// Default similarity threshold (exclusive)
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

pub struct VisualLookupStrategy {
    embedder: Option<Arc<dyn ImageEmbedder>>,
    index: Option<Arc<dyn VectorIndex>>,
    store: Arc<dyn ProductStore>,
    threshold: f64,
}

impl VisualLookupStrategy {
    pub fn new(
        embedder: Option<Arc<dyn ImageEmbedder>>,
        index: Option<Arc<dyn VectorIndex>>,
        store: Arc<dyn ProductStore>,
        threshold: f64,
    ) -> Self {
        Self {
            embedder,
            index,
            store,
            threshold,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.embedder.is_some() && self.index.is_some()
    }

    pub async fn attempt(&self, image: &[u8]) -> AttemptResult {
        let (Some(embedder), Some(index)) = (&self.embedder, &self.index) else {
            return Ok(Attempt::Miss(MissReason::NotConfigured));
        };
        if image.is_empty() {
            return Ok(Attempt::Miss(MissReason::PreconditionUnmet));
        }

        let embedding = match embedder.embed(image).await {
            Ok(embedding) => embedding,
            Err(err) => return classify(err),
        };

        let best = match index.nearest(&embedding).await {
            Ok(Some(best)) => best,
            Ok(None) => return Ok(Attempt::Miss(MissReason::NotFound)),
            Err(err) => return classify(err),
        };

        if best.similarity <= self.threshold {
            debug!(
                external_id = %best.external_id,
                similarity = best.similarity,
                threshold = self.threshold,
                "Visual match below threshold"
            );
            return Ok(Attempt::Miss(MissReason::BelowThreshold));
        }

        let Ok(id) = best.external_id.trim().parse::<i64>() else {
            debug!(external_id = %best.external_id, "Index returned a non-numeric product id");
            return Ok(Attempt::Miss(MissReason::NotFound));
        };

        // Local storage failure is not a collaborator miss
        let record = self
            .store
            .find_by_id(id)
            .await
            .map_err(|e| StrategyError(format!("Product store lookup failed: {}", e)))?;

        match record {
            Some(record) if record.source_strategy == StrategySource::EmergencyFallback => {
                debug!(id, "Visual match points at an unidentified product");
                Ok(Attempt::Miss(MissReason::NotFound))
            }
            Some(record) => Ok(Attempt::Hit(outcome_from_record(record, best.similarity))),
            None => {
                debug!(id, "Visual match points at a product that no longer exists");
                Ok(Attempt::Miss(MissReason::NotFound))
            }
        }
    }
}

fn outcome_from_record(record: ProductRecord, similarity: f64) -> StrategyOutcome {
    let title = if is_placeholder_phrase(&record.title) {
        Title::Placeholder(record.title)
    } else {
        Title::Identified(record.title)
    };

    let fields = ProductFields {
        code: record.code,
        title: Some(title),
        brand: record.brand,
        category: Some(record.category.as_str().to_string()),
        subcategory: record.subcategory,
        price: record.price,
        tax_codes: record.tax_codes,
    };

    StrategyOutcome::new(StrategySource::VisualLookup, fields, similarity)
        .with_attributes(record.vertical, record.vertical_attributes)
}
