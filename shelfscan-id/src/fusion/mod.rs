//! Fusion layer
//!
//! Merges the outcomes of strategies that both produced data. The earlier,
//! richer outcome is the base; the later, more authoritative one overlays it
//! field by field.

pub mod outcome_fuser;

pub use outcome_fuser::{fuse, fuse_all, FieldConflict, FusionResult};
