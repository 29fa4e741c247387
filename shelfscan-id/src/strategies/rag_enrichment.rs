//! RAG Enrichment Strategy
//!
//! Recovers a product code for an outcome that has an identified title and
//! brand but no validated code:
//!
//! 1. Web search for "{brand} {title}"
//! 2. Ask the text generator to pick the barcode out of the top snippets
//! 3. Validate it and run a catalog lookup
//!
//! A hit is the catalog entry retagged as `rag_enrichment`, so it is as
//! authoritative as a direct code lookup.

use super::code_lookup::CodeLookupStrategy;
use super::inference::{parse_response, string_field};
use super::{classify, Attempt, AttemptResult, MissReason};
use crate::clients::{SearchHit, TextGenerator, WebSearch};
use crate::types::{StrategyOutcome, StrategySource};
use crate::validators::{find_code_in_text, is_valid_code, normalize_code};
use std::sync::Arc;
use tracing::debug;

const CODE_PROMPT: &str = r#"Below are web search results about the product "{product}".

{snippets}

Which 8, 12, 13 or 14 digit barcode (EAN/GTIN) belongs to this exact product?
Answer with one JSON object and nothing else: {"code": "digits"} or {"code": null} if the results do not show it."#;

/// Default number of search results fed to the prompt
pub const DEFAULT_RESULT_LIMIT: usize = 3;

pub struct RagEnrichmentStrategy {
    search: Option<Arc<dyn WebSearch>>,
    generator: Option<Arc<dyn TextGenerator>>,
    code_lookup: Arc<CodeLookupStrategy>,
    result_limit: usize,
}

impl RagEnrichmentStrategy {
    pub fn new(
        search: Option<Arc<dyn WebSearch>>,
        generator: Option<Arc<dyn TextGenerator>>,
        code_lookup: Arc<CodeLookupStrategy>,
        result_limit: usize,
    ) -> Self {
        Self {
            search,
            generator,
            code_lookup,
            result_limit: result_limit.max(1),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.search.is_some() && self.generator.is_some() && self.code_lookup.is_configured()
    }

    /// True when `best` is worth enriching: identified title + brand, no valid code
    pub fn applies_to(best: &StrategyOutcome) -> bool {
        let fields = &best.fields;
        let has_code = fields.code.as_deref().map_or(false, is_valid_code);
        !has_code && fields.has_identified_title() && fields.has_brand()
    }

    pub async fn attempt(&self, best: &StrategyOutcome) -> AttemptResult {
        let (Some(search), Some(generator)) = (&self.search, &self.generator) else {
            return Ok(Attempt::Miss(MissReason::NotConfigured));
        };
        if !Self::applies_to(best) {
            return Ok(Attempt::Miss(MissReason::PreconditionUnmet));
        }

        let query = search_query(best);
        let hits = match search.search(&query, self.result_limit).await {
            Ok(hits) if hits.is_empty() => return Ok(Attempt::Miss(MissReason::NotFound)),
            Ok(hits) => hits,
            Err(err) => return classify(err),
        };

        let prompt = build_code_prompt(&query, &hits);
        let answer = match generator.generate(&prompt).await {
            Ok(answer) => answer,
            Err(err) => return classify(err),
        };

        let Some(code) = code_from_answer(&answer) else {
            debug!(query = %query, "No valid code recovered from search results");
            return Ok(Attempt::Miss(MissReason::NotFound));
        };

        debug!(query = %query, code = %code, "Code recovered, querying catalog");
        match self.code_lookup.attempt(&code).await? {
            Attempt::Hit(mut outcome) => {
                outcome.source = StrategySource::RagEnrichment;
                Ok(Attempt::Hit(outcome))
            }
            miss => Ok(miss),
        }
    }
}

/// "{brand} {title}" (brand omitted when the title already starts with it)
pub fn search_query(best: &StrategyOutcome) -> String {
    let title = best
        .fields
        .title
        .as_ref()
        .map(|t| t.as_str().trim())
        .unwrap_or_default();
    let brand = best.fields.brand.as_deref().map(str::trim).unwrap_or_default();

    if brand.is_empty() || title.to_lowercase().starts_with(&brand.to_lowercase()) {
        title.to_string()
    } else {
        format!("{} {}", brand, title)
    }
}

fn build_code_prompt(product: &str, hits: &[SearchHit]) -> String {
    let snippets: Vec<String> = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| format!("{}. {}\n   {}", i + 1, hit.title, hit.snippet))
        .collect();

    CODE_PROMPT
        .replace("{product}", product)
        .replace("{snippets}", &snippets.join("\n"))
}

/// Valid code from the generator's answer (JSON key, else any digit run)
fn code_from_answer(answer: &str) -> Option<String> {
    if let Some(map) = parse_response(answer) {
        for key in ["code", "gtin", "ean"] {
            if let Some(code) = string_field(&map, key).and_then(|c| normalize_code(&c)) {
                return Some(code);
            }
        }
        return None;
    }
    find_code_in_text(answer)
}
