//! Sufficiency gate: decides whether a strategy outcome lets the cascade stop.
//!
//! Sufficient = a validated code, or an identified title together with a
//! non-empty brand.

use crate::types::StrategyOutcome;
use crate::validators::is_valid_code;

pub fn is_sufficient(outcome: Option<&StrategyOutcome>) -> bool {
    let Some(outcome) = outcome else {
        return false;
    };

    let fields = &outcome.fields;
    let has_code = fields.code.as_deref().map_or(false, is_valid_code);

    has_code || (fields.has_identified_title() && fields.has_brand())
}
