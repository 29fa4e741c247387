//! Dedup Cache Gate
//!
//! Content-addressed cache in front of the cascade. Images are keyed by the
//! SHA-256 of their bytes; signal-only requests by the SHA-256 of their
//! canonical JSON plus the vertical.
//!
//! Storage problems never fail a request: a lookup error is a cache miss and
//! a write error only costs the next request a recomputation.

use crate::db::{InsertOutcome, ProductStore};
use crate::types::{ProcessingOutcome, ProductRecord, Vertical, VisionSignals};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct DedupGate {
    store: Arc<dyn ProductStore>,
}

impl DedupGate {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }

    /// SHA-256 hex of raw image bytes
    pub fn hash_image(bytes: &[u8]) -> String {
        format!("{:x}", Sha256::digest(bytes))
    }

    /// SHA-256 hex of signals (canonical JSON) and vertical
    pub fn hash_signals(signals: &VisionSignals, vertical: Vertical) -> String {
        let mut hasher = Sha256::new();
        // Struct fields serialize in declaration order, so the JSON is stable
        match serde_json::to_vec(signals) {
            Ok(json) => hasher.update(&json),
            Err(_) => hasher.update(signals.raw_text.as_bytes()),
        }
        hasher.update(b"|");
        hasher.update(vertical.as_str().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Stored record for `image_hash`, if any
    pub async fn check(&self, image_hash: &str) -> Option<ProductRecord> {
        match self.store.find_by_image_hash(image_hash).await {
            Ok(found) => {
                debug!(image_hash = %image_hash, hit = found.is_some(), "Dedup cache checked");
                found
            }
            Err(e) => {
                warn!(image_hash = %image_hash, error = %e, "Dedup cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Persist `record`, returning the record callers should see
    ///
    /// If another request stored the same image hash first, that record wins.
    pub async fn commit(&self, record: ProductRecord) -> ProductRecord {
        match self.store.insert(&record).await {
            Ok(InsertOutcome::Inserted(id)) => {
                debug!(id, image_hash = %record.image_hash, "Product stored");
                record
            }
            Ok(InsertOutcome::UniqueConflict) => {
                match self.store.find_by_image_hash(&record.image_hash).await {
                    Ok(Some(existing)) => {
                        debug!(image_hash = %record.image_hash, "Concurrent request stored first, returning its record");
                        existing
                    }
                    Ok(None) => record,
                    Err(e) => {
                        warn!(error = %e, "Failed to load concurrently stored record");
                        record
                    }
                }
            }
            Err(e) => {
                warn!(image_hash = %record.image_hash, error = %e, "Failed to store product");
                record
            }
        }
    }

    /// Append to the processing log (best effort)
    pub async fn log(&self, outcome: &ProcessingOutcome) {
        if let Err(e) = self.store.log_processing(outcome).await {
            warn!(image_hash = %outcome.image_hash, error = %e, "Failed to write processing log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_image_known_value() {
        assert_eq!(
            DedupGate::hash_image(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_signals_depends_on_vertical_and_content() {
        let signals = VisionSignals {
            raw_text: "Nescau".to_string(),
            ..Default::default()
        };
        let a = DedupGate::hash_signals(&signals, Vertical::Supermarket);
        let b = DedupGate::hash_signals(&signals, Vertical::Apparel);
        assert_ne!(a, b);
        assert_eq!(a, DedupGate::hash_signals(&signals.clone(), Vertical::Supermarket));

        let other = VisionSignals {
            raw_text: "Nescau 2.0".to_string(),
            ..Default::default()
        };
        assert_ne!(a, DedupGate::hash_signals(&other, Vertical::Supermarket));
        assert_eq!(a.len(), 64);
    }
}
