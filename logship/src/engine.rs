use crate::tracker::OffsetTracker;
use anyhow::{Context, Result};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tracing::{debug, info, warn};

const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Appends the not-yet-shipped tail of a source file to its destination,
/// consulting the shared [`OffsetTracker`] to decide where the tail starts.
pub struct TransferEngine {
    tracker: Arc<OffsetTracker>,
    chunk_size: usize,
}

impl TransferEngine {
    pub fn new(tracker: Arc<OffsetTracker>) -> Self {
        Self {
            tracker,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn tracker(&self) -> &Arc<OffsetTracker> {
        &self.tracker
    }

    /// Copy the byte range appended to `source` since its last transfer onto
    /// the end of `dest`, returning the number of bytes shipped.
    ///
    /// A missing destination is a skip, not an error: this engine only
    /// appends to destinations that already exist (establishing them is a
    /// one-time setup step outside steady-state transfer). A source that
    /// cannot be stat'ed is treated as "nothing to do" and its tracked
    /// offset is dropped. The tracker entry is only advanced after the
    /// append fully succeeds, so a failed attempt retries the same range.
    ///
    /// The offset map stays locked for the duration of the append; a
    /// concurrent transfer of the same file serializes behind it and then
    /// observes an up-to-date offset.
    pub async fn copy_increment(&self, source: &Path, dest: &Path) -> Result<u64> {
        if !fs::try_exists(dest)
            .await
            .with_context(|| format!("failed to check destination {}", dest.display()))?
        {
            debug!(
                dest = %dest.display(),
                "destination does not exist; skipping incremental append"
            );
            return Ok(0);
        }

        let metadata = match fs::metadata(source).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(
                    file = %source.display(),
                    "source unreadable, dropping tracked offset: {e}"
                );
                self.tracker.forget(source).await;
                return Ok(0);
            }
        };
        let current_size = metadata.len();

        let mut offsets = self.tracker.lock().await;
        let start = offsets.start_offset(source, current_size);
        if start == current_size {
            return Ok(0);
        }

        let mut input = fs::File::open(source)
            .await
            .with_context(|| format!("failed to open source {}", source.display()))?;
        input
            .seek(SeekFrom::Start(start))
            .await
            .with_context(|| format!("failed to seek {} to {start}", source.display()))?;
        let mut output = fs::OpenOptions::new()
            .append(true)
            .open(dest)
            .await
            .with_context(|| format!("failed to open destination {}", dest.display()))?;

        let mut remaining = current_size - start;
        let mut copied = 0u64;
        let mut buffer = vec![0u8; self.chunk_size];
        while remaining > 0 {
            let want = remaining.min(buffer.len() as u64) as usize;
            let n = input
                .read(&mut buffer[..want])
                .await
                .with_context(|| format!("failed to read {}", source.display()))?;
            if n == 0 {
                // Source shrank while reading; the next cycle sees the
                // rotation and restarts from zero.
                break;
            }
            output
                .write_all(&buffer[..n])
                .await
                .with_context(|| format!("failed to append to {}", dest.display()))?;
            copied += n as u64;
            remaining -= n as u64;
        }
        output
            .flush()
            .await
            .with_context(|| format!("failed to flush {}", dest.display()))?;

        offsets.commit(source, current_size);
        info!(
            file = %source.display(),
            dest = %dest.display(),
            bytes = copied,
            "shipped incremental range"
        );
        Ok(copied)
    }
}

/// Run `attempt` up to `max_retries + 1` times, sleeping `delay` between
/// failures. The final failure is returned to the caller, which logs it as a
/// permanent per-file failure for the cycle.
pub async fn retrying<T, F, Fut>(max_retries: u32, delay: Duration, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = max_retries + 1;
    let mut last_error = None;
    for n in 1..=attempts {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if n < attempts {
                    warn!(attempt = n, attempts, "attempt failed, retrying: {e:#}");
                    tokio::time::sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("retry loop made no attempts")))
}
