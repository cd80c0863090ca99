//! Content digests for flushed batches.

use sha2::{Digest, Sha256};

use crate::model::PlacementUpdate;

/// Returns a stable digest of a batch, for correlating retries in logs.
///
/// The same updates in the same order always yield the same digest.
#[must_use]
pub fn batch_digest(updates: &[PlacementUpdate]) -> String {
    let mut hasher = Sha256::new();
    for update in updates {
        hasher.update(update.contact_id.as_bytes());
        hasher.update([0]);
        hasher.update(update.pipeline_id.as_bytes());
        hasher.update([0]);
        hasher.update(update.stage_id.as_bytes());
        hasher.update([0]);
        hasher.update(update.order.to_be_bytes());
        hasher.update(update.agent_id.as_deref().unwrap_or_default().as_bytes());
        hasher.update([0xff]);
    }
    let result = hasher.finalize();
    format!("batch:{}", hex::encode(&result[..16]))
}
