use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::AuditError;
use crate::record::{AuditQuery, AuditRecord};
use crate::store::AuditStore;

/// Default segment size cap: 64 MiB.
const DEFAULT_MAX_SEGMENT_BYTES: u64 = 64 * 1024 * 1024;

struct Segment {
    date: NaiveDate,
    index: u32,
    path: PathBuf,
    bytes: u64,
}

/// Append-only segmented file store.
///
/// One JSONL segment per day (`audit-YYYY-MM-DD.jsonl`), rotated within a
/// day by size (`audit-YYYY-MM-DD.N.jsonl`). Segments are never rewritten.
pub struct FileAuditStore {
    dir: PathBuf,
    max_segment_bytes: u64,
    current: Mutex<Option<Segment>>,
}

impl FileAuditStore {
    /// Open (or create) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, AuditError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_segment_bytes: DEFAULT_MAX_SEGMENT_BYTES,
            current: Mutex::new(None),
        })
    }

    /// Override the per-segment size cap.
    #[must_use]
    pub fn with_max_segment_bytes(mut self, bytes: u64) -> Self {
        self.max_segment_bytes = bytes;
        self
    }

    fn segment_path(&self, date: NaiveDate, index: u32) -> PathBuf {
        let name = if index == 0 {
            format!("audit-{date}.jsonl")
        } else {
            format!("audit-{date}.{index}.jsonl")
        };
        self.dir.join(name)
    }

    fn rotate_if_needed(&self, segment: &mut Option<Segment>, line_len: u64) {
        let today = Utc::now().date_naive();
        let needs_new = match segment {
            None => true,
            Some(seg) => {
                seg.date != today || seg.bytes + line_len > self.max_segment_bytes
            }
        };
        if needs_new {
            let index = match segment {
                Some(seg) if seg.date == today => seg.index + 1,
                _ => 0,
            };
            let path = self.segment_path(today, index);
            info!(path = %path.display(), "rotating audit segment");
            *segment = Some(Segment {
                date: today,
                index,
                path,
                bytes: 0,
            });
        }
    }

    /// All segment paths, oldest first.
    fn segment_paths(&self) -> Result<Vec<PathBuf>, AuditError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("audit-") && n.ends_with(".jsonl"))
            })
            .collect();
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl AuditStore for FileAuditStore {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut guard = self.current.lock().await;
        self.rotate_if_needed(&mut guard, line.len() as u64);
        let segment = guard.as_mut().ok_or(AuditError::Closed)?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&segment.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        segment.bytes += line.len() as u64;
        Ok(())
    }

    async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>, AuditError> {
        let mut hits = Vec::new();
        for path in self.segment_paths()? {
            let content = tokio::fs::read_to_string(&path).await?;
            for line in content.lines() {
                if line.is_empty() {
                    continue;
                }
                let record: AuditRecord = serde_json::from_str(line)?;
                if query.matches(&record) {
                    hits.push(record);
                }
            }
        }
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

    fn record(seq: u64) -> AuditRecord {
        AuditRecord {
            id: format!("r-{seq}"),
            seq,
            incident_seq: None,
            session: SessionId::new("s-1"),
            utterance: None,
            incident: None,
            stage: AuditStage::Dispatch,
            outcome: "executed".into(),
            details: serde_json::json!({"seq": seq}),
            payload_hash: None,
            duration_ms: None,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_then_query() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAuditStore::open(dir.path()).unwrap();
        store.append(record(1)).await.unwrap();
        store.append(record(2)).await.unwrap();

        let hits = store.query(&AuditQuery::default()).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].seq, 2);
    }

    #[tokio::test]
    async fn rotates_by_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAuditStore::open(dir.path())
            .unwrap()
            .with_max_segment_bytes(64);
        for seq in 0..4 {
            store.append(record(seq)).await.unwrap();
        }

        let segments = store.segment_paths().unwrap();
        assert!(segments.len() > 1, "expected rotation, got {segments:?}");

        // Rotation must not lose records.
        let hits = store.query(&AuditQuery::default()).await.unwrap();
        assert_eq!(hits.len(), 4);
    }
}
