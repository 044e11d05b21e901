use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use carelink_core::Intent;

use crate::error::IntentError;

/// One request to the intent endpoint.
///
/// Carries the domain vocabulary hash and a session summary fingerprint so
/// replay tests can reproduce classifications exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRequest {
    /// Version tag of the system prompt in force.
    pub system_prompt_version: String,
    /// The utterance text, verbatim.
    pub user_text: String,
    /// Rolling summary of the session's recent utterances.
    pub session_summary: String,
    /// Fingerprint of the device/action/target vocabulary.
    pub domain_vocabulary_hash: String,
}

/// Trait for turning free text into a typed intent.
#[async_trait]
pub trait IntentResolver: Send + Sync + std::fmt::Debug {
    /// Resolve one request into a schema-valid intent.
    async fn resolve(&self, request: &IntentRequest) -> Result<Intent, IntentError>;
}
