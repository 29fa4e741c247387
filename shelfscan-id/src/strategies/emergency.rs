//! Emergency fallback: the strategy of last resort.
//!
//! Never fails and never calls a collaborator. The result is a placeholder
//! built from whatever OCR text exists, with confidence pinned at 0.1.

use crate::types::{ProductFields, StrategyOutcome, StrategySource, Title, VisionSignals};
use crate::utils::placeholder_title;

pub const EMERGENCY_CONFIDENCE: f64 = 0.1;

pub fn emergency_outcome(signals: &VisionSignals) -> StrategyOutcome {
    let fields = ProductFields {
        title: Some(Title::Placeholder(placeholder_title(&signals.raw_text))),
        brand: signals.primary_logo().map(str::to_string),
        price: signals.candidate_price,
        ..Default::default()
    };

    StrategyOutcome::new(StrategySource::EmergencyFallback, fields, EMERGENCY_CONFIDENCE)
}
