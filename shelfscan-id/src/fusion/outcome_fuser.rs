//! Outcome Fuser
//!
//! # Rules
//! - Every field present in the later outcome overwrites the earlier value
//!   (a placeholder title only fills a gap; it never replaces a real title)
//! - Tax codes overlay per scheme
//! - Attributes are overlaid only by an outcome that asked for the same
//!   vertical's attribute set; otherwise the earlier attributes survive
//! - Confidence is the higher of the two, forced to 0.99 when the later
//!   outcome came from a catalog lookup by code
//! - The fused outcome carries the later outcome's source tag
//!
//! Disagreements on text fields are reported as [`FieldConflict`]s with a
//! normalized Levenshtein similarity, for logging only.

use crate::strategies::code_lookup::AUTHORITATIVE_CONFIDENCE;
use crate::types::{StrategyOutcome, Title};
use serde::Serialize;
use tracing::{debug, warn};

/// Two strategies disagreeing on a text field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldConflict {
    pub field: String,
    pub earlier: String,
    pub later: String,
    /// Normalized Levenshtein similarity (1.0 = identical ignoring case)
    pub similarity: f64,
}

/// Fused outcome plus the conflicts found while fusing
#[derive(Debug, Clone, PartialEq)]
pub struct FusionResult {
    pub outcome: StrategyOutcome,
    pub conflicts: Vec<FieldConflict>,
}

/// Overlay `later` onto `earlier`
pub fn fuse(earlier: StrategyOutcome, later: StrategyOutcome) -> FusionResult {
    let mut conflicts = Vec::new();
    let mut fields = earlier.fields;
    let overlay = later.fields;

    fields.title = match (fields.title, overlay.title) {
        (Some(Title::Identified(base)), Some(Title::Identified(new))) => {
            record_conflict(&mut conflicts, "title", &base, &new);
            Some(Title::Identified(new))
        }
        (Some(base @ Title::Identified(_)), Some(Title::Placeholder(_))) => Some(base),
        (base, new) => new.or(base),
    };

    fields.code = overlay_text(&mut conflicts, "code", fields.code, overlay.code);
    fields.brand = overlay_text(&mut conflicts, "brand", fields.brand, overlay.brand);
    fields.category = overlay_text(&mut conflicts, "category", fields.category, overlay.category);
    fields.subcategory = overlay_text(
        &mut conflicts,
        "subcategory",
        fields.subcategory,
        overlay.subcategory,
    );
    fields.price = overlay.price.or(fields.price);

    for (scheme, code) in overlay.tax_codes {
        if let Some(previous) = fields.tax_codes.get(&scheme) {
            record_conflict(&mut conflicts, &scheme, previous, &code);
        }
        fields.tax_codes.insert(scheme, code);
    }

    let mut attributes = earlier.attributes;
    let mut attribute_set = earlier.attribute_set;
    match (attribute_set, later.attribute_set) {
        (Some(base), Some(new)) if base == new => attributes.extend(later.attributes),
        (None, Some(new)) => {
            attribute_set = Some(new);
            attributes = later.attributes;
        }
        _ => {}
    }

    let confidence = if later.source.is_code_authority() {
        AUTHORITATIVE_CONFIDENCE
    } else {
        earlier.confidence.max(later.confidence)
    };

    if !conflicts.is_empty() {
        warn!(
            conflicts = conflicts.len(),
            earlier = %earlier.source,
            later = %later.source,
            "Strategies disagree, later outcome wins"
        );
    }
    debug!(
        earlier = %earlier.source,
        later = %later.source,
        confidence,
        "Outcomes fused"
    );

    let mut outcome = StrategyOutcome::new(later.source, fields, confidence);
    outcome.attributes = attributes;
    outcome.attribute_set = attribute_set;

    FusionResult { outcome, conflicts }
}

/// Fuse a non-empty list in overlay order (least authoritative first)
///
/// Returns `None` for an empty list. Ties keep cascade order.
pub fn fuse_all(mut outcomes: Vec<StrategyOutcome>) -> Option<FusionResult> {
    outcomes.sort_by_key(|o| o.source.authority_rank());

    let mut iter = outcomes.into_iter();
    let first = iter.next()?;

    let initial = FusionResult {
        outcome: first,
        conflicts: Vec::new(),
    };
    Some(iter.fold(initial, |acc, next| {
        let mut fused = fuse(acc.outcome, next);
        let mut conflicts = acc.conflicts;
        conflicts.append(&mut fused.conflicts);
        FusionResult {
            outcome: fused.outcome,
            conflicts,
        }
    }))
}

fn overlay_text(
    conflicts: &mut Vec<FieldConflict>,
    field: &str,
    base: Option<String>,
    new: Option<String>,
) -> Option<String> {
    match (base, new) {
        (Some(base), Some(new)) => {
            record_conflict(conflicts, field, &base, &new);
            Some(new)
        }
        (base, new) => new.or(base),
    }
}

fn record_conflict(conflicts: &mut Vec<FieldConflict>, field: &str, earlier: &str, later: &str) {
    let a = earlier.trim().to_lowercase();
    let b = later.trim().to_lowercase();
    if a == b {
        return;
    }

    conflicts.push(FieldConflict {
        field: field.to_string(),
        earlier: earlier.to_string(),
        later: later.to_string(),
        similarity: strsim::normalized_levenshtein(&a, &b),
    });
}
