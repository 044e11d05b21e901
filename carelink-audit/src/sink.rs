use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tracing::{error, trace};
use uuid::Uuid;

use carelink_core::IncidentId;

use crate::record::{AuditDraft, AuditRecord};
use crate::store::AuditStore;

/// The single logical audit writer.
///
/// `emit` assigns sequence numbers synchronously (so ordering is decided at
/// the decision point, not at write time) and hands the record to one
/// writer task that serializes appends to the backing store. Per-incident
/// sequences are gap-free and strictly increasing.
pub struct AuditSink {
    tx: parking_lot::RwLock<Option<mpsc::UnboundedSender<AuditRecord>>>,
    global_seq: AtomicU64,
    incident_seqs: DashMap<IncidentId, u64>,
    writer: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl AuditSink {
    /// Spawn the writer task over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditRecord>();
        let writer = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(err) = store.append(record).await {
                    error!(error = %err, "audit append failed");
                }
            }
        });
        Self {
            tx: parking_lot::RwLock::new(Some(tx)),
            global_seq: AtomicU64::new(0),
            incident_seqs: DashMap::new(),
            writer: Mutex::new(Some(writer)),
        }
    }

    /// Sequence and enqueue one record. Returns the record id.
    pub fn emit(&self, draft: AuditDraft) -> String {
        let seq = self.global_seq.fetch_add(1, Ordering::SeqCst);
        let incident_seq = draft.incident.as_ref().map(|incident| {
            let mut counter = self.incident_seqs.entry(incident.clone()).or_insert(0);
            let current = *counter;
            *counter += 1;
            current
        });

        let record = AuditRecord {
            id: Uuid::now_v7().to_string(),
            seq,
            incident_seq,
            session: draft.session,
            utterance: draft.utterance,
            incident: draft.incident,
            stage: draft.stage,
            outcome: draft.outcome,
            details: draft.details,
            payload_hash: draft.payload_hash,
            duration_ms: draft.duration_ms,
            recorded_at: Utc::now(),
        };
        let id = record.id.clone();
        trace!(seq, stage = %record.stage, outcome = %record.outcome, "audit emit");

        // Records emitted after shutdown are dropped deliberately.
        if let Some(tx) = self.tx.read().as_ref() {
            let _ = tx.send(record);
        }
        id
    }

    /// Flush the queue and stop the writer. Idempotent; records emitted
    /// afterwards are dropped.
    pub async fn shutdown(&self) {
        self.tx.write().take();
        let handle = self.writer.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
