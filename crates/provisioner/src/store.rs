//! Status record persistence.
//!
//! One JSON document per host under the status directory. Every save
//! replaces the whole document; there is no append log.

use std::fmt::Write as _;
use std::path::PathBuf;

use tracing::debug;

use crate::error::PersistenceError;
use crate::status::StatusRecord;

/// Persists and retrieves status records keyed by host address.
///
/// Implementations must tolerate concurrent saves for distinct hosts.
pub trait StatusStore: Send + Sync {
    /// Replace the stored record for `record.host`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the record cannot be written.
    fn save(&self, record: &StatusRecord) -> Result<(), PersistenceError>;

    /// Load the stored record for `host`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] if no record exists.
    fn load(&self, host: &str) -> Result<StatusRecord, PersistenceError>;
}

/// Encode a host address as a file name stem.
///
/// Bytes outside `[A-Za-z0-9._-]` are percent-encoded, so distinct hosts
/// always map to distinct names and IPv4 addresses stay readable.
#[must_use]
pub fn file_stem(host: &str) -> String {
    let mut stem = String::with_capacity(host.len());
    for byte in host.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            stem.push(char::from(byte));
        } else {
            let _ = write!(stem, "%{byte:02X}");
        }
    }
    stem
}

/// Stores records as `<dir>/<encoded host>.json`.
#[derive(Debug, Clone)]
pub struct FileStatusStore {
    dir: PathBuf,
}

impl FileStatusStore {
    /// Store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the record file for `host`.
    #[must_use]
    pub fn record_path(&self, host: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(host)))
    }
}

impl StatusStore for FileStatusStore {
    fn save(&self, record: &StatusRecord) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| PersistenceError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.record_path(&record.host);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(record)?;

        std::fs::write(&tmp, content).map_err(|source| PersistenceError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| PersistenceError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(host = %record.host, path = %path.display(), state = %record.state, "Saved status");
        Ok(())
    }

    fn load(&self, host: &str) -> Result<StatusRecord, PersistenceError> {
        let path = self.record_path(host);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound(host.to_string()));
            }
            Err(source) => return Err(PersistenceError::Io { path, source }),
        };

        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::phase::PhaseKind;

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("192.168.1.10"), "192.168.1.10");
        assert_eq!(file_stem("node-1.example.com"), "node-1.example.com");
        assert_eq!(file_stem("fe80::1"), "fe80%3A%3A1");
        assert_eq!(file_stem("../etc/passwd"), "..%2Fetc%2Fpasswd");
        assert_ne!(file_stem("a:b"), file_stem("a_b"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = FileStatusStore::new(dir.path().join("status"));

        let mut record = StatusRecord::new("10.0.0.1");
        record.complete_phase(PhaseKind::RequirementCheck);
        store.save(&record).unwrap();

        assert_eq!(store.load("10.0.0.1").unwrap(), record);
        assert!(store.record_path("10.0.0.1").ends_with("status/10.0.0.1.json"));
    }

    #[test]
    fn test_save_is_idempotent_and_replaces() {
        let dir = TempDir::new().unwrap();
        let store = FileStatusStore::new(dir.path());
        let mut record = StatusRecord::new("10.0.0.2");

        store.save(&record).unwrap();
        let first = std::fs::read_to_string(store.record_path("10.0.0.2")).unwrap();
        store.save(&record).unwrap();
        let second = std::fs::read_to_string(store.record_path("10.0.0.2")).unwrap();
        assert_eq!(first, second);

        record.fail("boom");
        store.save(&record).unwrap();
        let third = std::fs::read_to_string(store.record_path("10.0.0.2")).unwrap();
        let parsed: StatusRecord = serde_json::from_str(&third).unwrap();
        assert_eq!(parsed, record);
        assert!(!dir.path().join("10.0.0.2.json.tmp").exists());
    }

    #[test]
    fn test_load_missing_host() {
        let dir = TempDir::new().unwrap();
        let store = FileStatusStore::new(dir.path());
        assert!(matches!(
            store.load("10.9.9.9"),
            Err(PersistenceError::NotFound(host)) if host == "10.9.9.9"
        ));
    }

    #[test]
    fn test_save_into_unwritable_location() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = FileStatusStore::new(blocker.join("status"));
        let err = store.save(&StatusRecord::new("h")).unwrap_err();
        assert!(matches!(err, PersistenceError::Io { .. }));
    }
}
