//! Identification strategies
//!
//! Each strategy wraps one or more collaborators and answers with an
//! [`Attempt`]: a normalized [`StrategyOutcome`] on a hit, or the reason it
//! missed. Ordinary collaborator failures (timeouts, 404s, bad payloads,
//! missing configuration) become misses so the cascade can move on; only
//! unexpected internal failures surface as [`StrategyError`].
//!
//! # Strategies (cascade order)
//! 1. **code_lookup** - validated code → product catalog (authoritative)
//! 2. **visual_lookup** - image embedding → nearest stored product (apparel)
//! 3. **inference** - OCR text → text generation prompt → structured fields
//! 4. **rag_enrichment** - web search + generation to recover a code, then catalog
//! 5. **emergency** - placeholder record from OCR text (always succeeds)

pub mod code_lookup;
pub mod emergency;
pub mod inference;
pub mod rag_enrichment;
pub mod visual_lookup;

pub use code_lookup::CodeLookupStrategy;
pub use emergency::emergency_outcome;
pub use inference::InferenceStrategy;
pub use rag_enrichment::RagEnrichmentStrategy;
pub use visual_lookup::VisualLookupStrategy;

use crate::types::{CollaboratorError, StrategyOutcome};
use std::fmt;
use thiserror::Error;

/// Result of one strategy invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Hit(StrategyOutcome),
    Miss(MissReason),
}

/// Why a strategy produced nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
    /// Collaborator not configured
    NotConfigured,
    /// Inputs the strategy needs are absent (no code, no image, wrong vertical)
    PreconditionUnmet,
    /// Collaborator answered but had nothing for this product
    NotFound,
    /// Best visual match below the similarity threshold
    BelowThreshold,
    /// Stage exceeded its time budget
    Timeout,
    /// Ordinary collaborator failure
    Failed(String),
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissReason::NotConfigured => f.write_str("not configured"),
            MissReason::PreconditionUnmet => f.write_str("precondition unmet"),
            MissReason::NotFound => f.write_str("not found"),
            MissReason::BelowThreshold => f.write_str("below similarity threshold"),
            MissReason::Timeout => f.write_str("timed out"),
            MissReason::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

/// Unhandled failure inside a strategy; the cascade routes it to FAIL
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct StrategyError(pub String);

pub type AttemptResult = Result<Attempt, StrategyError>;

/// Downgrade ordinary collaborator errors to misses
pub(crate) fn classify(err: CollaboratorError) -> AttemptResult {
    if !err.is_ordinary() {
        return Err(StrategyError(err.to_string()));
    }

    let reason = match err {
        CollaboratorError::Timeout(_) => MissReason::Timeout,
        CollaboratorError::NotFound(_) => MissReason::NotFound,
        CollaboratorError::NotConfigured(_) => MissReason::NotConfigured,
        other => MissReason::Failed(other.to_string()),
    };
    Ok(Attempt::Miss(reason))
}
