use crate::engine::TransferEngine;
use crate::error::ShipResult;
use crate::job::JobSpec;
use crate::registry::{JobInfo, OperationRegistry};
use crate::tracker::OffsetTracker;
use crate::worker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Name of the process-environment flag gating whether this node ships at
/// all. Unset means enabled; non-leader nodes in a cluster set it to `0`.
pub const ENABLED_ENV: &str = "LOGSHIP_ENABLED";

pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(60);

/// Facade over the whole shipping engine: job lifecycle, manual triggering,
/// and the idempotent shutdown sequence. Cheap to clone; all clones share
/// one registry and one offset tracker.
#[derive(Clone)]
pub struct Shipper {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Arc<OperationRegistry>,
    engine: Arc<TransferEngine>,
    copy_enabled: bool,
    cleanup_done: AtomicBool,
}

impl Shipper {
    /// `copy_enabled == false` turns every `start` into a logged no-op while
    /// all other operations keep working against the (empty) registry.
    pub fn new(copy_enabled: bool) -> Self {
        let tracker = Arc::new(OffsetTracker::new());
        let registry = Arc::new(OperationRegistry::new(Arc::clone(&tracker)));
        let engine = Arc::new(TransferEngine::new(tracker));
        Self {
            inner: Arc::new(Inner {
                registry,
                engine,
                copy_enabled,
                cleanup_done: AtomicBool::new(false),
            }),
        }
    }

    /// Read the enablement flag from [`ENABLED_ENV`] once, at construction.
    pub fn from_env() -> Self {
        let enabled = std::env::var(ENABLED_ENV)
            .map(|value| {
                matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "1" | "true" | "yes" | "on"
                )
            })
            .unwrap_or(true);
        Self::new(enabled)
    }

    /// Validate and register a shipping job and spawn its worker. Raises on
    /// any validation failure with no state change; a disabled shipper
    /// validates and then does nothing.
    pub async fn start(&self, spec: JobSpec) -> ShipResult<()> {
        Arc::clone(&self.inner.registry)
            .start_job(spec, Arc::clone(&self.inner.engine), self.inner.copy_enabled)
            .await
    }

    /// Signal `name`'s worker and wait up to `timeout` for it to exit; see
    /// [`OperationRegistry::stop_job`] for the `false` semantics.
    pub async fn stop(&self, name: &str, timeout: Duration) -> ShipResult<bool> {
        self.inner.registry.stop_job(name, timeout).await
    }

    /// Stop every job; returns the names that failed to stop in time.
    pub async fn stop_all(&self, timeout: Duration, verbose: bool) -> Vec<String> {
        self.inner.registry.stop_all(timeout, verbose).await
    }

    pub async fn list(&self) -> Vec<JobInfo> {
        self.inner.registry.list().await
    }

    /// Synchronously run one shipping cycle for the named jobs (all jobs
    /// when `names` is `None`), on the calling task, using each job's stored
    /// parameters. Every name is validated before anything runs; one job's
    /// cycle failure is logged and does not stop the rest. Triggering with
    /// nothing registered is a logged no-op.
    pub async fn trigger_now(&self, names: Option<&[String]>) -> ShipResult<()> {
        let specs = match names {
            Some(names) => self.inner.registry.specs_for(names).await?,
            None => {
                let specs = self.inner.registry.all_specs().await;
                if specs.is_empty() {
                    info!("no shipping jobs registered; nothing to trigger");
                    return Ok(());
                }
                specs
            }
        };

        for spec in &specs {
            debug!(job = %spec.name, "manually triggering shipping cycle");
            if let Err(e) = worker::run_cycle(spec, &self.inner.registry, &self.inner.engine).await
            {
                error!(job = %spec.name, "manual trigger failed: {e:#}");
            }
        }
        Ok(())
    }

    /// Idempotent shutdown: flush every job once, stop all workers, drop all
    /// job and offset bookkeeping, and permanently refuse new jobs. The
    /// second and later calls return immediately. Also invoked from the
    /// termination-signal path.
    pub async fn cleanup(&self, timeout: Duration) {
        if self.inner.cleanup_done.swap(true, Ordering::SeqCst) {
            debug!("cleanup already performed; nothing to do");
            return;
        }
        info!("shutting down shipping engine");

        if !self.inner.registry.is_empty().await {
            if let Err(e) = self.trigger_now(None).await {
                error!("final flush before shutdown failed: {e:#}");
            }
        }

        let failed = self.inner.registry.stop_all(timeout, true).await;
        if !failed.is_empty() {
            error!("jobs failed to stop before shutdown: {failed:?}");
        }

        self.inner.registry.clear().await;
        self.inner.engine.tracker().clear().await;
        self.inner.registry.begin_shutdown();
        info!("shipping engine shut down");
    }
}
