use crate::discovery;
use crate::engine::{self, TransferEngine};
use crate::job::JobSpec;
use crate::registry::OperationRegistry;
use anyhow::Result;
use std::sync::Arc;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Per-job background loop: run a cycle, then wait for the configured
/// interval or for cancellation, whichever fires first. A failed cycle is
/// logged and never terminates the loop.
pub(crate) async fn worker_loop(
    spec: JobSpec,
    registry: Arc<OperationRegistry>,
    engine: Arc<TransferEngine>,
    cancel: CancellationToken,
) {
    debug!(job = %spec.name, "worker started");
    while !cancel.is_cancelled() {
        if let Err(e) = run_cycle(&spec, &registry, &engine).await {
            error!(job = %spec.name, "shipping cycle failed: {e:#}");
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(spec.interval) => {}
        }
    }
    debug!(job = %spec.name, "worker stopped");
}

/// One shipping cycle: discover files, warn about cross-job overlap, then
/// transfer each file with per-file retry. Also the body of a manual
/// trigger, which runs it on the caller's task against the stored spec.
pub(crate) async fn run_cycle(
    spec: &JobSpec,
    registry: &OperationRegistry,
    engine: &TransferEngine,
) -> Result<()> {
    let files = discovery::discover_files(&spec.patterns);

    let overlaps = registry.update_snapshot(&spec.name, &files).await;
    for overlap in &overlaps {
        warn!(
            job = %spec.name,
            other_job = %overlap.other_job,
            count = overlap.files.len(),
            "jobs are shipping overlapping files: {:?}",
            overlap.files
        );
    }

    if files.is_empty() {
        debug!(job = %spec.name, "no files matched this cycle");
        return Ok(());
    }

    let mut sources: Vec<_> = files.into_iter().collect();
    sources.sort();
    for source in &sources {
        let dest = spec.destination_for(source);

        if spec.create_dest_dirs {
            if let Some(parent) = dest.parent() {
                if let Err(e) = fs::create_dir_all(parent).await {
                    warn!(
                        job = %spec.name,
                        dir = %parent.display(),
                        "failed to create destination directory: {e}"
                    );
                }
            }
        }

        let attempt = engine::retrying(spec.max_retries, spec.retry_delay, || {
            engine.copy_increment(source, &dest)
        })
        .await;
        if let Err(e) = attempt {
            error!(
                job = %spec.name,
                file = %source.display(),
                attempts = spec.max_retries + 1,
                "giving up on file for this cycle: {e:#}"
            );
        }
    }
    Ok(())
}
