//! Test Helper Utilities
//!
//! Shared utilities for testing shelfscan-id

#![allow(dead_code)]

pub mod collaborators;
pub mod db_utils;

pub use collaborators::{
    StubCatalog, StubEmbedder, StubExtractor, StubGenerator, StubSearch, StubVectorIndex,
};
pub use db_utils::{create_test_db, memory_store};

/// Valid EAN-13
pub const VALID_EAN13: &str = "7891000315507";

/// Valid UPC-12
pub const VALID_UPC12: &str = "036000291452";

/// 13 digits, wrong check digit
pub const INVALID_EAN13: &str = "7896006700139";
