//! FINALIZE: turn the cascade's chosen outcome into a [`ProductRecord`].
//!
//! Pure and infallible. Confidence by source:
//! - code lookup / RAG enrichment: 0.99
//! - visual lookup: the match similarity (or the fused maximum)
//! - inference: the confidence scorer over the final fields
//! - emergency fallback: 0.1

use crate::strategies::code_lookup::AUTHORITATIVE_CONFIDENCE;
use crate::strategies::emergency::EMERGENCY_CONFIDENCE;
use crate::types::{
    clamp_confidence, AttributeMap, Category, ProductFields, ProductRecord, StrategyOutcome,
    StrategySource, Title, Vertical, VisionSignals,
};
use crate::utils::{clean_text, is_placeholder_phrase, placeholder_title, round2};
use crate::validators::{normalize_category, normalize_code, ConfidenceScorer};

pub fn finalize(
    outcome: StrategyOutcome,
    signals: &VisionSignals,
    vertical: Vertical,
    image_hash: &str,
    scorer: &ConfidenceScorer,
) -> ProductRecord {
    let StrategyOutcome {
        fields,
        attributes,
        attribute_set,
        confidence,
        source,
    } = outcome;

    let code = fields.code.as_deref().and_then(normalize_code);

    let title = match &fields.title {
        Some(Title::Identified(t)) if !is_placeholder_phrase(t) => clean_text(t),
        Some(Title::Placeholder(t)) if !t.trim().is_empty() => t.trim().to_string(),
        _ => placeholder_title(&signals.raw_text),
    };

    let brand = fields
        .brand
        .as_deref()
        .filter(|b| !is_placeholder_phrase(b))
        .map(clean_text);

    // Category text first, subcategory as a second chance
    let category = [fields.category.as_deref(), fields.subcategory.as_deref()]
        .into_iter()
        .map(normalize_category)
        .find(|c| *c != Category::Other)
        .unwrap_or(Category::Other);

    let tax_codes = fields
        .tax_codes
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| (k.clone(), v.trim().to_string()))
        .collect();

    let confidence = match source {
        StrategySource::CodeLookup | StrategySource::RagEnrichment => AUTHORITATIVE_CONFIDENCE,
        StrategySource::VisualLookup => confidence,
        StrategySource::Inference => {
            let scored = ProductFields {
                code: code.clone(),
                ..fields.clone()
            };
            scorer.score(&scored, signals.text_len())
        }
        StrategySource::EmergencyFallback => EMERGENCY_CONFIDENCE,
    };

    // Attributes only make sense in the schema of the request's vertical
    let vertical_attributes = if attribute_set == Some(vertical) {
        attributes
    } else {
        AttributeMap::new()
    };

    ProductRecord {
        code,
        title,
        brand,
        category,
        subcategory: fields
            .subcategory
            .as_deref()
            .filter(|s| !is_placeholder_phrase(s))
            .map(|s| s.trim().to_string()),
        price: fields
            .price
            .or(signals.candidate_price)
            .filter(|p| p.is_finite() && *p >= 0.0)
            .map(round2),
        tax_codes,
        vertical_attributes,
        confidence: round2(clamp_confidence(confidence)),
        source_strategy: source,
        vertical,
        image_hash: image_hash.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaxCodes;
    use crate::utils::text::DEFAULT_PLACEHOLDER_TITLE;
    use serde_json::json;

    fn outcome(source: StrategySource, fields: ProductFields, confidence: f64) -> StrategyOutcome {
        StrategyOutcome::new(source, fields, confidence)
    }

    fn run(outcome: StrategyOutcome) -> ProductRecord {
        finalize(
            outcome,
            &VisionSignals::default(),
            Vertical::Supermarket,
            "hash",
            &ConfidenceScorer::new(),
        )
    }

    #[test]
    fn test_code_lookup_forced_confidence() {
        let fields = ProductFields {
            code: Some("7891000315507".to_string()),
            title: Some(Title::Identified("Nescau".to_string())),
            category: Some("Achocolatado".to_string()),
            subcategory: Some("Alimentos".to_string()),
            ..Default::default()
        };
        let record = run(outcome(StrategySource::CodeLookup, fields, 0.4));
        assert_eq!(record.confidence, 0.99);
        assert_eq!(record.category, Category::Food);
        assert_eq!(record.image_hash, "hash");
        assert_eq!(record.source_strategy, StrategySource::CodeLookup);
    }

    #[test]
    fn test_invalid_code_dropped_and_title_guaranteed() {
        let fields = ProductFields {
            code: Some("7896006700139".to_string()),
            title: Some(Title::Identified("   ".to_string())),
            ..Default::default()
        };
        let record = run(outcome(StrategySource::Inference, fields, 0.9));
        assert_eq!(record.code, None);
        assert_eq!(record.title, DEFAULT_PLACEHOLDER_TITLE);
        assert_eq!(record.category, Category::Other);
        // base 0.5, short text -0.2
        assert_eq!(record.confidence, 0.3);
    }

    #[test]
    fn test_emergency_confidence() {
        let record = run(outcome(StrategySource::EmergencyFallback, ProductFields::default(), 0.8));
        assert_eq!(record.confidence, 0.1);
        assert!(!record.title.is_empty());
    }

    #[test]
    fn test_visual_keeps_similarity() {
        let record = run(outcome(StrategySource::VisualLookup, ProductFields::default(), 0.876));
        assert_eq!(record.confidence, 0.88);
    }

    #[test]
    fn test_blank_tax_codes_and_foreign_attributes_dropped() {
        let mut tax_codes = TaxCodes::new();
        tax_codes.insert("ncm".to_string(), " 18069000 ".to_string());
        tax_codes.insert("cest".to_string(), "".to_string());
        let fields = ProductFields {
            tax_codes,
            ..Default::default()
        };
        let mut attrs = AttributeMap::new();
        attrs.insert("size".to_string(), json!("M"));

        let record = run(
            outcome(StrategySource::Inference, fields, 0.5).with_attributes(Vertical::Apparel, attrs),
        );
        assert_eq!(record.tax_codes.len(), 1);
        assert_eq!(record.tax_codes.get("ncm").map(String::as_str), Some("18069000"));
        assert!(record.vertical_attributes.is_empty());
    }

    #[test]
    fn test_signal_price_used_when_fields_have_none() {
        let signals = VisionSignals {
            candidate_price: Some(9.999),
            ..Default::default()
        };
        let record = finalize(
            outcome(StrategySource::EmergencyFallback, ProductFields::default(), 0.1),
            &signals,
            Vertical::Supermarket,
            "h",
            &ConfidenceScorer::new(),
        );
        assert_eq!(record.price, Some(10.0));
    }
}
