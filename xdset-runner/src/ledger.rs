//! Durable record of which input files have been processed.
//!
//! The ledger lives in memory on the writer thread and is persisted as a
//! whole-file snapshot replaced atomically (see [`crate::fsio`]). A success
//! entry is only recorded after the record it stands for has been synced to
//! the dataset, so after any interruption the ledger can lag the dataset but
//! never lead it.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use xdset_core::FileKey;

use crate::fsio;

/// Snapshot format version.
pub const LEDGER_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("corrupt ledger snapshot {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("unsupported ledger version {found} (max supported: {max})", max = LEDGER_VERSION)]
    UnsupportedVersion { found: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub status: Outcome,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: BTreeMap<FileKey, LedgerEntry>,
}

/// In-memory ledger bound to its snapshot path.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: BTreeMap<FileKey, LedgerEntry>,
    dirty: bool,
}

impl Ledger {
    /// Load the snapshot at `path`, or start empty when none exists.
    ///
    /// A leftover temp file from an interrupted snapshot is discarded; the
    /// previous snapshot is still intact. An unreadable snapshot is fatal.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let io_err = |source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        };

        if fsio::remove_stale_tmp(path).map_err(io_err)? {
            warn!(path = %path.display(), "discarded interrupted ledger snapshot");
        }

        let entries = match std::fs::read(path) {
            Ok(bytes) => {
                let snapshot: Snapshot =
                    serde_json::from_slice(&bytes).map_err(|source| LedgerError::Corrupt {
                        path: path.to_path_buf(),
                        source,
                    })?;
                if snapshot.version > LEDGER_VERSION {
                    return Err(LedgerError::UnsupportedVersion {
                        found: snapshot.version,
                    });
                }
                snapshot.entries
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(io_err(e)),
        };

        debug!(path = %path.display(), entries = entries.len(), "ledger loaded");
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        })
    }

    pub fn get(&self, key: &FileKey) -> Option<&LedgerEntry> {
        self.entries.get(key)
    }

    /// Whether `key` already has a success entry.
    pub fn is_done(&self, key: &FileKey) -> bool {
        self.get(key).is_some_and(|e| e.status == Outcome::Success)
    }

    pub fn record_success(&mut self, key: FileKey) {
        self.record(key, Outcome::Success);
    }

    pub fn record_failure(&mut self, key: FileKey) {
        self.record(key, Outcome::Failure);
    }

    /// A repeated failure keeps its first timestamp, so re-failing an
    /// unchanged file leaves the snapshot byte-identical.
    fn record(&mut self, key: FileKey, status: Outcome) {
        if status == Outcome::Failure
            && self.get(&key).is_some_and(|e| e.status == Outcome::Failure)
        {
            return;
        }
        self.entries.insert(
            key,
            LedgerEntry {
                status,
                timestamp: Utc::now(),
            },
        );
        self.dirty = true;
    }

    /// Unsaved changes since the last snapshot or load.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Atomically replace the on-disk snapshot with the current state.
    pub fn snapshot(&mut self) -> Result<(), LedgerError> {
        let body = SnapshotRef {
            version: LEDGER_VERSION,
            entries: &self.entries,
        };
        let mut bytes = serde_json::to_vec_pretty(&body).map_err(|e| LedgerError::Io {
            path: self.path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
        bytes.push(b'\n');
        fsio::write_atomic(&self.path, &bytes).map_err(|source| LedgerError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.dirty = false;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, status: Outcome) -> usize {
        self.entries.values().filter(|e| e.status == status).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FileKey, &LedgerEntry)> {
        self.entries.iter()
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    entries: &'a BTreeMap<FileKey, LedgerEntry>,
}
