//! Validation layer
//!
//! Pure functions and scorers applied to strategy outcomes:
//! 1. **code_validator** - mod-10 checksum for 8/12/13/14-digit product codes
//! 2. **category_normalizer** - free text → closed category taxonomy
//! 3. **confidence_scorer** - heuristic confidence for inferred records
//! 4. **sufficiency_gate** - "good enough to stop the cascade?"

pub mod category_normalizer;
pub mod code_validator;
pub mod confidence_scorer;
pub mod sufficiency_gate;

pub use category_normalizer::normalize_category;
pub use code_validator::{find_code_in_text, is_valid_code, normalize_code};
pub use confidence_scorer::ConfidenceScorer;
pub use sufficiency_gate::is_sufficient;
