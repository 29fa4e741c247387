//! # ShelfScan Common Library
//!
//! Shared code for ShelfScan services:
//! - Common error type
//! - Bootstrap TOML configuration and secret resolution
//! - Tracing initialization

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
