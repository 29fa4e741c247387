//! Utility modules for shelfscan-id

pub mod text;

pub use text::{clean_text, is_placeholder_phrase, placeholder_title, round2};
