use sha2::{Digest, Sha256};

/// `SHA-256` hex digest of a serialized payload.
///
/// Audit records store this hash instead of raw payloads so a decision can
/// be verified offline against the utterance and policy snapshot without
/// retaining spoken text longer than retention policy allows.
#[must_use]
pub fn payload_hash(payload: &serde_json::Value) -> String {
    let canonical = serde_json::to_string(payload).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}
