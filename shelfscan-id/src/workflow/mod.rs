//! Identification workflow
//!
//! One request runs through a fixed cascade of stages:
//!
//! ```text
//! START → CACHE_CHECK → CODE_LOOKUP → VISUAL_LOOKUP → INFERENCE → RAG_ENRICHMENT → FUSE → FINALIZE → DONE
//!                  └──────────── hit ────────────────────────────────────────────────────────────→ DONE
//! any cascade stage ── unhandled error ──→ FAIL → EMERGENCY_FALLBACK → FINALIZE
//! ```
//!
//! Code and visual lookup are skipped when their inputs are missing; a
//! sufficient authoritative hit jumps straight to FINALIZE.

pub mod dedup_gate;
pub mod finalize;
pub mod pipeline;

pub use dedup_gate::DedupGate;
pub use finalize::finalize;
pub use pipeline::{Pipeline, PipelineConfig};

use crate::fusion::FieldConflict;
use crate::types::{ProductRecord, Vertical, VisionSignals};
use serde::Serialize;

/// Cascade stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Start,
    CacheCheck,
    CodeLookup,
    VisualLookup,
    Inference,
    RagEnrichment,
    Fuse,
    Finalize,
    Fail,
    EmergencyFallback,
    Done,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done)
    }

    /// Legal edges of the cascade
    pub fn can_transition_to(&self, next: Stage) -> bool {
        use Stage::*;

        // Unhandled errors may abort any strategy stage
        if next == Fail {
            return matches!(
                self,
                CodeLookup | VisualLookup | Inference | RagEnrichment
            );
        }

        match self {
            Start => next == CacheCheck,
            CacheCheck => matches!(next, CodeLookup | VisualLookup | Inference | Done),
            CodeLookup => matches!(next, VisualLookup | Inference | Finalize),
            VisualLookup => matches!(next, Inference | Finalize),
            Inference => matches!(next, RagEnrichment | Fuse | Finalize | EmergencyFallback),
            RagEnrichment => matches!(next, Fuse | Finalize),
            Fuse => next == Finalize,
            Fail => next == EmergencyFallback,
            EmergencyFallback => next == Finalize,
            Finalize => next == Done,
            Done => false,
        }
    }
}

/// A stage change (old → new)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTransition {
    pub old_stage: Stage,
    pub new_stage: Stage,
}

/// Current stage plus every stage visited so far
#[derive(Debug, Clone)]
pub struct StageTracker {
    current: Stage,
    visited: Vec<Stage>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self {
            current: Stage::Start,
            visited: vec![Stage::Start],
        }
    }
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Stage {
        self.current
    }

    /// Move to `new_stage`
    pub fn transition_to(&mut self, new_stage: Stage) -> StageTransition {
        debug_assert!(
            self.current.can_transition_to(new_stage),
            "illegal stage transition {:?} → {:?}",
            self.current,
            new_stage
        );

        let transition = StageTransition {
            old_stage: self.current,
            new_stage,
        };
        self.current = new_stage;
        self.visited.push(new_stage);
        transition
    }

    pub fn into_visited(self) -> Vec<Stage> {
        self.visited
    }
}

/// Identification request
#[derive(Debug, Clone)]
pub struct IdentifyRequest {
    pub vertical: Vertical,
    /// Raw image bytes (needed for OCR and visual lookup)
    pub image: Option<Vec<u8>>,
    /// Precomputed signals (skip OCR)
    pub signals: Option<VisionSignals>,
}

impl IdentifyRequest {
    pub fn from_image(image: Vec<u8>, vertical: Vertical) -> Self {
        Self {
            vertical,
            image: Some(image),
            signals: None,
        }
    }

    pub fn from_signals(signals: VisionSignals, vertical: Vertical) -> Self {
        Self {
            vertical,
            image: None,
            signals: Some(signals),
        }
    }

    /// Attach precomputed signals to an image request
    pub fn with_signals(mut self, signals: VisionSignals) -> Self {
        self.signals = Some(signals);
        self
    }
}

/// Final record plus how the cascade reached it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentificationReport {
    pub record: ProductRecord,
    /// Stages in visit order, starting at START and ending at DONE
    pub stages: Vec<Stage>,
    /// Record came from the dedup cache
    pub cache_hit: bool,
    /// Field disagreements found while fusing
    pub conflicts: Vec<FieldConflict>,
    pub elapsed_seconds: f64,
}
