use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::PolicyError;
use crate::snapshot::PolicySnapshot;

/// Holds the currently-published policy snapshot.
///
/// Readers take an `Arc` clone and keep it for the duration of an utterance;
/// `reload` swaps the pointer atomically so a reader observes either the old
/// or the new snapshot, never a mix. A failed reload keeps the old snapshot
/// in force.
pub struct PolicyStore {
    path: PathBuf,
    current: RwLock<Arc<PolicySnapshot>>,
}

impl PolicyStore {
    /// Load the policy file and publish the initial snapshot.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = PolicySnapshot::load(&path)?;
        info!(version = snapshot.version, path = %path.display(), "policy loaded");
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Build a store from an already-compiled snapshot (tests, dry runs).
    #[must_use]
    pub fn from_snapshot(snapshot: PolicySnapshot) -> Self {
        Self {
            path: PathBuf::new(),
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The snapshot currently in force.
    #[must_use]
    pub fn current(&self) -> Arc<PolicySnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Re-read the policy file and publish a new snapshot.
    ///
    /// Returns the new version on success. On failure the previous snapshot
    /// stays published and the error is returned.
    pub fn reload(&self) -> Result<u32, PolicyError> {
        match PolicySnapshot::load(&self.path) {
            Ok(snapshot) => {
                let version = snapshot.version;
                *self.current.write() = Arc::new(snapshot);
                info!(version, "policy reloaded");
                Ok(version)
            }
            Err(err) => {
                warn!(error = %err, "policy reload failed, keeping previous snapshot");
                Err(err)
            }
        }
    }

    /// Path the store reloads from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::testing::sample_yaml;

    fn write_policy(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn open_and_read_current() {
        let file = write_policy(sample_yaml());
        let store = PolicyStore::open(file.path()).unwrap();
        assert_eq!(store.current().version, 3);
    }

    #[test]
    fn reload_swaps_snapshot() {
        let file = write_policy(sample_yaml());
        let store = PolicyStore::open(file.path()).unwrap();
        let before = store.current();

        let bumped = sample_yaml().replace("version: 3", "version: 4");
        std::fs::write(file.path(), bumped).unwrap();
        assert_eq!(store.reload().unwrap(), 4);

        // The old Arc is still valid for in-flight readers.
        assert_eq!(before.version, 3);
        assert_eq!(store.current().version, 4);
    }

    #[test]
    fn failed_reload_keeps_old_snapshot() {
        let file = write_policy(sample_yaml());
        let store = PolicyStore::open(file.path()).unwrap();

        std::fs::write(file.path(), "not: [valid").unwrap();
        assert!(store.reload().is_err());
        assert_eq!(store.current().version, 3);
    }

    #[test]
    fn invalid_policy_fails_open() {
        let file = write_policy("version: 1\n");
        assert!(PolicyStore::open(file.path()).is_err());
    }
}
