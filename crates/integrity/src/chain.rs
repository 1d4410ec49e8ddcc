//! Before/after DOM-structure hash chain.

use page_port::PagePort;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::IntegrityError;
use crate::hash::HashService;
use crate::signature::{dom_signature, SignatureOptions};

/// The hashes attached to a finished capture. `integrity_verified` holds
/// exactly when the restored-state hash matches the original-state hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityHashes {
    pub original_state_hash: String,
    pub captured_image_hash: String,
    pub restored_state_hash: String,
    pub integrity_verified: bool,
}

/// Takes the original-state snapshot before any mutation and the
/// restored-state snapshot once restoration has finished, then folds both
/// into the final [`IntegrityHashes`].
///
/// A mismatch is not an engine failure: it signals that the live page
/// diverged from its pre-capture state (independent page activity), so it
/// is logged and surfaced, never fatal.
pub struct IntegrityHashChain {
    hasher: HashService,
    options: SignatureOptions,
    original: Option<String>,
    restored: Option<String>,
}

impl IntegrityHashChain {
    pub fn new(hasher: HashService, options: SignatureOptions) -> Self {
        Self {
            hasher,
            options,
            original: None,
            restored: None,
        }
    }

    /// Snapshot the page structure before any mutation.
    pub async fn snapshot_before(&mut self, port: &dyn PagePort) -> Result<String, IntegrityError> {
        let signature = dom_signature(port, &self.options).await?;
        let hash = self.hasher.hash_dom_signature(&signature).await?;
        debug!(target: "integrity-chain", hash = %hash, "original state snapshot");
        self.original = Some(hash.clone());
        Ok(hash)
    }

    /// Snapshot the page structure after restoration has finished.
    pub async fn snapshot_after(&mut self, port: &dyn PagePort) -> Result<String, IntegrityError> {
        let signature = dom_signature(port, &self.options).await?;
        let hash = self.hasher.hash_dom_signature(&signature).await?;
        debug!(target: "integrity-chain", hash = %hash, "restored state snapshot");
        self.restored = Some(hash.clone());
        Ok(hash)
    }

    /// Fold both snapshots and the stitched-image hash into the final
    /// record. Requires both snapshots to have been taken.
    pub fn finalize(&self, captured_image_hash: String) -> Result<IntegrityHashes, IntegrityError> {
        let original = self
            .original
            .clone()
            .ok_or(IntegrityError::MissingSnapshot("original"))?;
        let restored = self
            .restored
            .clone()
            .ok_or(IntegrityError::MissingSnapshot("restored"))?;
        let verified = original == restored;
        if !verified {
            warn!(
                target: "integrity-chain",
                original = %original,
                restored = %restored,
                "page structure diverged from its pre-capture state"
            );
        }
        Ok(IntegrityHashes {
            original_state_hash: original,
            captured_image_hash,
            restored_state_hash: restored,
            integrity_verified: verified,
        })
    }
}
