use async_trait::async_trait;

use crate::error::AuditError;
use crate::record::{AuditQuery, AuditRecord};

/// Trait for audit record storage backends.
///
/// Implementations must be `Send + Sync`; records arrive pre-sequenced from
/// the [`AuditSink`](crate::AuditSink) and are append-only.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append one record.
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError>;

    /// Query records with filters, newest first.
    async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>, AuditError>;
}
