//! Confidence Scorer
//!
//! Heuristic confidence for records whose fields came from inference rather
//! than an authoritative catalog.
//!
//! # Scoring Algorithm
//! - Base: 0.5
//! - Validated code: +0.3
//! - Identified (non-placeholder) title: +0.2
//! - Brand present: +0.15
//! - Category other than Other: +0.1
//! - OCR text shorter than 20 characters: -0.2
//!
//! The total is clamped to 0.1-0.95 and rounded to two decimals. Adding
//! fields never lowers the score.

use crate::types::{Category, Confidence, ProductFields};
use crate::utils::round2;
use crate::validators::{is_valid_code, normalize_category};

/// Confidence Scorer
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    base: f64,
    code_bonus: f64,
    title_bonus: f64,
    brand_bonus: f64,
    category_bonus: f64,
    short_text_penalty: f64,
    short_text_threshold: usize,
    floor: f64,
    ceiling: f64,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self {
            base: 0.5,
            code_bonus: 0.3,
            title_bonus: 0.2,
            brand_bonus: 0.15,
            category_bonus: 0.1,
            short_text_penalty: 0.2,
            short_text_threshold: 20,
            floor: 0.1,
            ceiling: 0.95,
        }
    }
}

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score fields given the length of the OCR text they were inferred from
    pub fn score(&self, fields: &ProductFields, ocr_text_len: usize) -> Confidence {
        let mut score = self.base;

        if fields.code.as_deref().map_or(false, is_valid_code) {
            score += self.code_bonus;
        }
        if fields.has_identified_title() {
            score += self.title_bonus;
        }
        if fields.has_brand() {
            score += self.brand_bonus;
        }
        if normalize_category(fields.category.as_deref()) != Category::Other {
            score += self.category_bonus;
        }
        if ocr_text_len < self.short_text_threshold {
            score -= self.short_text_penalty;
        }

        round2(score.clamp(self.floor, self.ceiling))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Title;

    fn full_fields() -> ProductFields {
        ProductFields {
            code: Some("7891000315507".to_string()),
            title: Some(Title::Identified("Nescau 400g".to_string())),
            brand: Some("Nestle".to_string()),
            category: Some("Achocolatado em pó - alimentos".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_fields_short_text() {
        let scorer = ConfidenceScorer::new();
        assert_eq!(scorer.score(&ProductFields::default(), 5), 0.3);
        assert_eq!(scorer.score(&ProductFields::default(), 50), 0.5);
    }

    #[test]
    fn test_full_fields_hit_ceiling() {
        let scorer = ConfidenceScorer::new();
        assert_eq!(scorer.score(&full_fields(), 120), 0.95);
    }

    #[test]
    fn test_invalid_code_earns_nothing() {
        let scorer = ConfidenceScorer::new();
        let fields = ProductFields {
            code: Some("7896006700139".to_string()),
            ..Default::default()
        };
        assert_eq!(scorer.score(&fields, 50), 0.5);
    }

    #[test]
    fn test_placeholder_title_earns_nothing() {
        let scorer = ConfidenceScorer::new();
        let fields = ProductFields {
            title: Some(Title::Placeholder("Unidentified Product".to_string())),
            ..Default::default()
        };
        assert_eq!(scorer.score(&fields, 50), 0.5);
    }

    #[test]
    fn test_monotonic_in_fields() {
        let scorer = ConfidenceScorer::new();
        let mut fields = ProductFields::default();
        let mut previous = scorer.score(&fields, 10);

        fields.brand = Some("Nestle".to_string());
        let next = scorer.score(&fields, 10);
        assert!(next >= previous);
        previous = next;

        fields.title = Some(Title::Identified("Nescau".to_string()));
        let next = scorer.score(&fields, 10);
        assert!(next >= previous);
        previous = next;

        fields.code = Some("7891000315507".to_string());
        let next = scorer.score(&fields, 10);
        assert!(next >= previous);
        previous = next;

        fields.category = Some("Food".to_string());
        assert!(scorer.score(&fields, 10) >= previous);
    }

    #[test]
    fn test_always_within_bounds() {
        let scorer = ConfidenceScorer::new();
        for len in [0, 19, 20, 500] {
            let score = scorer.score(&full_fields(), len);
            assert!((0.1..=0.95).contains(&score));
            let score = scorer.score(&ProductFields::default(), len);
            assert!((0.1..=0.95).contains(&score));
        }
    }
}
