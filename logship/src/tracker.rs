use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
struct OffsetEntry {
    /// Bytes of the file already appended to its destination.
    offset: u64,
    /// File size observed when the offset was last committed.
    size: u64,
}

/// Process-wide bookkeeping of how much of each source file has been shipped.
///
/// The map is shared across all jobs and keyed by the file path alone, so two
/// jobs that reference the same physical file share one offset. That keeps a
/// racing second shipper from re-appending the same byte range, at the cost
/// that two jobs shipping one file to *different* destinations advance a
/// common offset. Entries for a file are only dropped once no remaining job's
/// file set still contains the path.
///
/// The mutex is an async lock on purpose: the transfer engine holds the guard
/// across one file's read+append so per-file transfers are linearized.
#[derive(Debug, Default)]
pub struct OffsetTracker {
    entries: Mutex<HashMap<PathBuf, OffsetEntry>>,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> OffsetGuard<'_> {
        OffsetGuard {
            entries: self.entries.lock().await,
        }
    }

    /// Drop the entry for `path`, if any. Used when the source file vanished
    /// mid-flight so the next sighting starts from offset zero.
    pub async fn forget(&self, path: &Path) {
        self.entries.lock().await.remove(path);
    }

    /// Remove entries for `candidates` that no remaining job references.
    /// Called when a job is unregistered, with the stopped job's last file
    /// set as candidates.
    pub async fn prune(&self, candidates: &HashSet<PathBuf>, referenced: &HashSet<PathBuf>) {
        let mut entries = self.entries.lock().await;
        for path in candidates {
            if !referenced.contains(path) {
                entries.remove(path);
            }
        }
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

/// Exclusive view of the offset map for the duration of one transfer.
pub struct OffsetGuard<'a> {
    entries: MutexGuard<'a, HashMap<PathBuf, OffsetEntry>>,
}

impl OffsetGuard<'_> {
    /// Decide where the next append for `path` starts, given the file's
    /// current size. A file smaller than last seen was rotated or truncated
    /// and restarts from zero; an offset beyond the current size is reset
    /// defensively the same way.
    pub fn start_offset(&mut self, path: &Path, current_size: u64) -> u64 {
        let entry = self.entries.entry(path.to_path_buf()).or_default();
        if current_size < entry.size {
            debug!(
                file = %path.display(),
                last_size = entry.size,
                current_size,
                "file shrank since last transfer; treating as rotation"
            );
            entry.offset = 0;
            entry.size = current_size;
        }
        if entry.offset > current_size {
            entry.offset = 0;
        }
        entry.offset
    }

    /// Record a completed append: the whole file up to `size` is shipped.
    pub fn commit(&mut self, path: &Path, size: u64) {
        self.entries.insert(
            path.to_path_buf(),
            OffsetEntry {
                offset: size,
                size,
            },
        );
    }
}
