//! Anonymous per-browser fingerprint
//!
//! Sent with every vote so the server can refuse a second vote from the same
//! browser. Created once and never regenerated while storage holds it.

use chrono::Utc;
use tracing::debug;

use crate::storage::{SharedStore, FINGERPRINT_KEY};

/// Generate a new fingerprint from the current time plus 64 random bits
pub fn generate() -> String {
    format!(
        "fp-{}-{:016x}",
        Utc::now().timestamp_millis(),
        rand::random::<u64>()
    )
}

/// Durable fingerprint holder
pub struct FingerprintStore {
    store: SharedStore,
}

impl FingerprintStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Return the stored fingerprint, creating and persisting one on first use
    ///
    /// When storage is unavailable a fresh, non-persisted value is returned
    /// on every call.
    pub fn get_or_create(&self) -> String {
        match self.store.get(FINGERPRINT_KEY) {
            Ok(Some(existing)) if !existing.trim().is_empty() => return existing,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "Fingerprint storage unavailable, using ephemeral value");
                return generate();
            }
        }

        let fingerprint = generate();
        if let Err(e) = self.store.set(FINGERPRINT_KEY, &fingerprint) {
            debug!(error = %e, "Fingerprint not persisted");
        }
        fingerprint
    }
}
