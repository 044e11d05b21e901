use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::AuditError;
use crate::record::{AuditQuery, AuditRecord};
use crate::store::AuditStore;

/// In-memory audit store. Suitable for tests, dry runs, and development.
#[derive(Default)]
pub struct MemoryAuditStore {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records appended.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no records have been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.records.write().push(record);
        Ok(())
    }

    async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>, AuditError> {
        let records = self.records.read();
        let mut hits: Vec<AuditRecord> = records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        hits.sort_by_key(|r| std::cmp::Reverse(r.seq));
        hits.truncate(query.effective_limit());
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AuditStage;
    use carelink_core::SessionId;
    use chrono::Utc;

    fn record(seq: u64, outcome: &str) -> AuditRecord {
        AuditRecord {
            id: format!("r-{seq}"),
            seq,
            incident_seq: None,
            session: SessionId::new("s-1"),
            utterance: None,
            incident: None,
            stage: AuditStage::Rules,
            outcome: outcome.into(),
            details: serde_json::Value::Null,
            payload_hash: None,
            duration_ms: None,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_and_query_newest_first() {
        let store = MemoryAuditStore::new();
        store.append(record(1, "allow")).await.unwrap();
        store.append(record(2, "deny")).await.unwrap();

        let hits = store.query(&AuditQuery::default()).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].seq, 2);
    }

    #[tokio::test]
    async fn query_respects_outcome_filter() {
        let store = MemoryAuditStore::new();
        store.append(record(1, "allow")).await.unwrap();
        store.append(record(2, "deny")).await.unwrap();

        let q = AuditQuery {
            outcome: Some("deny".into()),
            ..AuditQuery::default()
        };
        let hits = store.query(&q).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].outcome, "deny");
    }
}
