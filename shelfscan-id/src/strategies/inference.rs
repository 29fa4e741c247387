//! Inference Strategy
//!
//! Builds a vertical-specific extraction prompt from the OCR signals, sends
//! it to the text generator and parses the answer defensively:
//!
//! 1. Strip Markdown code fences
//! 2. Parse the outermost `{...}` block as JSON
//! 3. Failing that, salvage individual `"key": value` pairs
//!
//! An unusable answer still yields an outcome, but with a placeholder title;
//! the cascade treats such an outcome as a miss.

use super::{classify, Attempt, AttemptResult, MissReason};
use crate::clients::{SearchHit, TextGenerator};
use crate::types::{
    AttributeMap, ProductFields, StrategyOutcome, StrategySource, TaxCodes, Title, Vertical,
    VisionSignals,
};
use crate::utils::{clean_text, is_placeholder_phrase, placeholder_title};
use crate::validators::{normalize_code, ConfidenceScorer};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};
use tracing::debug;

const SUPERMARKET_PROMPT: &str = r#"You are a retail catalog specialist. Identify the supermarket product described by the packaging data below.

OCR text:
"""
{ocr_text}
"""
Detected logos: {logos}
Detected labels: {labels}
{context}
Answer with one JSON object and nothing else, using exactly these keys:
{
  "title": "full commercial product name",
  "brand": "brand name or null",
  "category": "product category",
  "subcategory": "product subcategory or null",
  "code": "8, 12, 13 or 14 digit barcode if printed, else null",
  "ncm": "8-digit NCM tax code or null",
  "cest": "7-digit CEST code or null",
  "department": "store department or null",
  "net_content": "net content with unit (e.g. 400g) or null",
  "unit": "sales unit (un, kg, l) or null"
}
Use null for anything you cannot determine. Never invent barcodes."#;

const APPAREL_PROMPT: &str = r#"You are a fashion catalog specialist. Identify the clothing item described by the tag and label data below.

OCR text:
"""
{ocr_text}
"""
Detected logos: {logos}
Detected labels: {labels}
{context}
Answer with one JSON object and nothing else, using exactly these keys:
{
  "title": "commercial product name",
  "brand": "brand name or null",
  "category": "garment category",
  "subcategory": "garment type or null",
  "code": "8, 12, 13 or 14 digit barcode if printed, else null",
  "ncm": "8-digit NCM tax code or null",
  "size": "size or null",
  "color": "main color or null",
  "material": "main material or null",
  "gender": "target gender or null",
  "style": "style or null"
}
Use null for anything you cannot determine. Never invent barcodes."#;

pub struct InferenceStrategy {
    generator: Option<Arc<dyn TextGenerator>>,
    scorer: ConfidenceScorer,
}

impl InferenceStrategy {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self {
            generator,
            scorer: ConfidenceScorer::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    /// Infer product fields from signals, optionally grounded by search results
    ///
    /// `known_code` is a code the caller already validated; it fills in
    /// when the model reports none.
    pub async fn attempt(
        &self,
        signals: &VisionSignals,
        vertical: Vertical,
        known_code: Option<&str>,
        context: &[SearchHit],
    ) -> AttemptResult {
        let Some(generator) = &self.generator else {
            return Ok(Attempt::Miss(MissReason::NotConfigured));
        };
        if signals.is_empty() {
            return Ok(Attempt::Miss(MissReason::PreconditionUnmet));
        }

        let prompt = build_prompt(signals, vertical, context);
        let answer = match generator.generate(&prompt).await {
            Ok(answer) => answer,
            Err(err) => return classify(err),
        };

        let parsed = parse_response(&answer);
        if parsed.is_none() {
            debug!(answer_chars = answer.len(), "Inference answer unparseable");
        }

        let outcome = outcome_from_response(
            parsed.unwrap_or_default(),
            signals,
            vertical,
            known_code,
            &self.scorer,
        );
        Ok(Attempt::Hit(outcome))
    }
}

/// Fill the vertical's template with the request's signals
pub fn build_prompt(signals: &VisionSignals, vertical: Vertical, context: &[SearchHit]) -> String {
    let template = match vertical {
        Vertical::Supermarket => SUPERMARKET_PROMPT,
        Vertical::Apparel => APPAREL_PROMPT,
    };

    let join = |items: &[String]| {
        if items.is_empty() {
            "none".to_string()
        } else {
            items.join(", ")
        }
    };

    let context_block = if context.is_empty() {
        String::new()
    } else {
        let lines: Vec<String> = context
            .iter()
            .map(|hit| format!("- {}: {}", hit.title, hit.snippet))
            .collect();
        format!("Web search results for this product:\n{}\n", lines.join("\n"))
    };

    template
        .replace("{ocr_text}", &signals.raw_text.replace("\"\"\"", "\""))
        .replace("{logos}", &join(&signals.detected_logos))
        .replace("{labels}", &join(&signals.detected_labels))
        .replace("{context}", &context_block)
}

/// Parse a generator answer into a JSON object, tolerating fences and truncation
pub fn parse_response(answer: &str) -> Option<Map<String, Value>> {
    let cleaned = strip_code_fences(answer);

    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            if let Ok(Value::Object(map)) = serde_json::from_str(&cleaned[start..=end]) {
                return Some(map);
            }
        }
    }

    salvage_pairs(cleaned)
}

fn strip_code_fences(answer: &str) -> &str {
    let trimmed = answer.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

fn pair_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r#""([A-Za-z_]+)"\s*:\s*("(?:[^"\\]|\\.)*"|null|true|false|-?\d+(?:\.\d+)?)"#,
            )
            .ok()
        })
        .as_ref()
}

/// Recover complete `"key": value` pairs from a truncated or malformed object
fn salvage_pairs(text: &str) -> Option<Map<String, Value>> {
    let pattern = pair_pattern()?;
    let map: Map<String, Value> = pattern
        .captures_iter(text)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_string();
            let value = serde_json::from_str::<Value>(caps.get(2)?.as_str()).ok()?;
            Some((key, value))
        })
        .collect();

    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

/// Non-placeholder text value (numbers are stringified)
pub(crate) fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match map.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if is_placeholder_phrase(&text) {
        None
    } else {
        Some(text)
    }
}

fn outcome_from_response(
    map: Map<String, Value>,
    signals: &VisionSignals,
    vertical: Vertical,
    known_code: Option<&str>,
    scorer: &ConfidenceScorer,
) -> StrategyOutcome {
    let title = match string_field(&map, "title") {
        Some(title) => Title::Identified(clean_text(&title)),
        None => Title::Placeholder(placeholder_title(&signals.raw_text)),
    };

    // Model-reported code first, then the one OCR found; both must validate
    let code = ["code", "gtin", "ean"]
        .iter()
        .filter_map(|key| string_field(&map, key))
        .chain(known_code.map(str::to_string))
        .find_map(|candidate| normalize_code(&candidate));

    let mut tax_codes = TaxCodes::new();
    for scheme in ["ncm", "cest"] {
        if let Some(value) = string_field(&map, scheme) {
            tax_codes.insert(scheme.to_string(), value);
        }
    }

    let fields = ProductFields {
        code,
        title: Some(title),
        brand: string_field(&map, "brand").map(|b| clean_text(&b)),
        category: string_field(&map, "category"),
        subcategory: string_field(&map, "subcategory"),
        price: signals.candidate_price,
        tax_codes,
    };

    let attributes: AttributeMap = vertical
        .attribute_keys()
        .iter()
        .filter_map(|key| {
            let value = map.get(*key)?;
            let keep = match value {
                Value::Null => false,
                Value::String(s) => !is_placeholder_phrase(s),
                _ => true,
            };
            keep.then(|| (key.to_string(), value.clone()))
        })
        .collect();

    let confidence = scorer.score(&fields, signals.text_len());
    StrategyOutcome::new(StrategySource::Inference, fields, confidence)
        .with_attributes(vertical, attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CollaboratorError;
    use async_trait::async_trait;

    struct CannedGenerator(String);

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, CollaboratorError> {
            Ok(self.0.clone())
        }
    }

    fn signals() -> VisionSignals {
        VisionSignals {
            raw_text: "NESCAU 2.0 achocolatado em pó 400g Nestlé".to_string(),
            detected_logos: vec!["Nescau".to_string()],
            ..Default::default()
        }
    }

    async fn run(answer: &str, vertical: Vertical) -> StrategyOutcome {
        let strategy = InferenceStrategy::new(Some(Arc::new(CannedGenerator(answer.to_string()))));
        match strategy.attempt(&signals(), vertical, None, &[]).await.unwrap() {
            Attempt::Hit(outcome) => outcome,
            Attempt::Miss(reason) => panic!("unexpected miss: {}", reason),
        }
    }

    #[test]
    fn test_parse_fenced_json() {
        let map = parse_response("```json\n{\"title\": \"Nescau\", \"brand\": null}\n```").unwrap();
        assert_eq!(map.get("title"), Some(&Value::String("Nescau".to_string())));
    }

    #[test]
    fn test_parse_json_with_chatter() {
        let map = parse_response("Sure! Here it is: {\"title\": \"Nescau\"} Hope it helps.").unwrap();
        assert_eq!(string_field(&map, "title").as_deref(), Some("Nescau"));
    }

    #[test]
    fn test_salvage_truncated_json() {
        let map = parse_response("{\"title\": \"Nescau 2.0\", \"brand\": \"Nestlé\", \"category\": \"Achoc").unwrap();
        assert_eq!(string_field(&map, "title").as_deref(), Some("Nescau 2.0"));
        assert_eq!(string_field(&map, "brand").as_deref(), Some("Nestlé"));
        assert_eq!(map.get("category"), None);
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_response("I cannot help with that."), None);
        assert_eq!(parse_response(""), None);
    }

    #[test]
    fn test_prompt_selects_template_and_context() {
        let hits = vec![SearchHit {
            title: "Nescau 400g".to_string(),
            snippet: "EAN 7891000315507".to_string(),
            link: String::new(),
        }];
        let prompt = build_prompt(&signals(), Vertical::Supermarket, &hits);
        assert!(prompt.contains("net_content"));
        assert!(prompt.contains("NESCAU 2.0 achocolatado"));
        assert!(prompt.contains("- Nescau 400g: EAN 7891000315507"));

        let prompt = build_prompt(&signals(), Vertical::Apparel, &[]);
        assert!(prompt.contains("\"material\""));
        assert!(!prompt.contains("Web search results"));
    }

    #[tokio::test]
    async fn test_full_answer() {
        let outcome = run(
            r#"{"title": "ACHOCOLATADO NESCAU 2.0", "brand": "Nestlé", "category": "Alimentos",
                "subcategory": "Achocolatados", "code": 7891000315507, "ncm": "18069000",
                "cest": "", "department": "Mercearia", "net_content": "400g", "unit": null,
                "size": "M"}"#,
            Vertical::Supermarket,
        )
        .await;

        assert_eq!(
            outcome.fields.title,
            Some(Title::Identified("Achocolatado Nescau 2.0".to_string()))
        );
        assert_eq!(outcome.fields.code.as_deref(), Some("7891000315507"));
        assert_eq!(outcome.fields.tax_codes.len(), 1);
        assert_eq!(outcome.attribute_set, Some(Vertical::Supermarket));
        assert_eq!(outcome.attributes.len(), 2);
        assert!(!outcome.attributes.contains_key("size"));
        assert_eq!(outcome.confidence, 0.95);
    }

    #[tokio::test]
    async fn test_known_code_fills_missing_model_code() {
        let strategy = InferenceStrategy::new(Some(Arc::new(CannedGenerator(
            r#"{"title": "Achocolatado Nescau", "brand": "Nestlé", "code": null}"#.to_string(),
        ))));
        let outcome = match strategy
            .attempt(&signals(), Vertical::Supermarket, Some("7891000315507"), &[])
            .await
            .unwrap()
        {
            Attempt::Hit(outcome) => outcome,
            Attempt::Miss(reason) => panic!("unexpected miss: {}", reason),
        };

        assert_eq!(outcome.fields.code.as_deref(), Some("7891000315507"));
        assert_eq!(outcome.confidence, 0.95);
    }

    #[tokio::test]
    async fn test_invented_code_dropped() {
        let outcome = run(r#"{"title": "Nescau", "code": "7896006700139"}"#, Vertical::Supermarket).await;
        assert_eq!(outcome.fields.code, None);
    }

    #[tokio::test]
    async fn test_unparseable_answer_gives_placeholder() {
        let outcome = run("no idea", Vertical::Supermarket).await;
        assert!(matches!(outcome.fields.title, Some(Title::Placeholder(_))));
        assert!(!outcome.is_informative());
    }

    #[tokio::test]
    async fn test_placeholder_phrase_title_is_placeholder() {
        let outcome = run(r#"{"title": "Produto Não Identificado"}"#, Vertical::Supermarket).await;
        assert!(matches!(outcome.fields.title, Some(Title::Placeholder(_))));
    }

    #[tokio::test]
    async fn test_not_configured_and_empty_signals() {
        let strategy = InferenceStrategy::new(None);
        assert_eq!(
            strategy.attempt(&signals(), Vertical::Supermarket, None, &[]).await,
            Ok(Attempt::Miss(MissReason::NotConfigured))
        );

        let strategy = InferenceStrategy::new(Some(Arc::new(CannedGenerator("{}".to_string()))));
        assert_eq!(
            strategy
                .attempt(&VisionSignals::default(), Vertical::Supermarket, None, &[])
                .await,
            Ok(Attempt::Miss(MissReason::PreconditionUnmet))
        );
    }
}
