//! Code Lookup Strategy
//!
//! Validated product code → catalog entry. Catalog data is authoritative, so
//! every hit carries a fixed 0.99 confidence.

use super::{classify, Attempt, AttemptResult, MissReason};
use crate::clients::{CatalogLookup, CatalogProduct};
use crate::types::{ProductFields, StrategyOutcome, StrategySource, Title};
use crate::utils::{clean_text, is_placeholder_phrase, round2};
use crate::validators::normalize_code;
use std::sync::Arc;
use tracing::debug;

/// Confidence of catalog-backed outcomes
pub const AUTHORITATIVE_CONFIDENCE: f64 = 0.99;

pub struct CodeLookupStrategy {
    catalog: Option<Arc<dyn CatalogLookup>>,
}

impl CodeLookupStrategy {
    pub fn new(catalog: Option<Arc<dyn CatalogLookup>>) -> Self {
        Self { catalog }
    }

    pub fn is_configured(&self) -> bool {
        self.catalog.is_some()
    }

    /// Look `code` up in the catalog
    ///
    /// Codes that fail checksum validation are never sent.
    pub async fn attempt(&self, code: &str) -> AttemptResult {
        let Some(catalog) = &self.catalog else {
            return Ok(Attempt::Miss(MissReason::NotConfigured));
        };
        let Some(code) = normalize_code(code) else {
            debug!(code = %code, "Code failed checksum validation, skipping catalog");
            return Ok(Attempt::Miss(MissReason::PreconditionUnmet));
        };

        match catalog.lookup(&code).await {
            Ok(Some(product)) => Ok(Attempt::Hit(outcome_from_catalog(code, product))),
            Ok(None) => Ok(Attempt::Miss(MissReason::NotFound)),
            Err(err) => classify(err),
        }
    }
}

/// Map a catalog entry to an outcome for the (already validated) `code`
pub(crate) fn outcome_from_catalog(code: String, product: CatalogProduct) -> StrategyOutcome {
    let title = product
        .description
        .as_deref()
        .filter(|d| !is_placeholder_phrase(d))
        .map(|d| Title::Identified(clean_text(d)));

    let fields = ProductFields {
        code: Some(code),
        title,
        brand: product
            .brand
            .as_deref()
            .filter(|b| !is_placeholder_phrase(b))
            .map(clean_text),
        category: product.category,
        subcategory: product.subcategory,
        price: product.price.map(round2),
        tax_codes: product
            .tax_codes
            .into_iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .collect(),
    };

    StrategyOutcome::new(StrategySource::CodeLookup, fields, AUTHORITATIVE_CONFIDENCE)
}
