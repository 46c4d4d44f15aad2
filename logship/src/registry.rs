use crate::duplicates::{self, Overlap};
use crate::engine::TransferEngine;
use crate::error::{ShipError, ShipResult};
use crate::job::JobSpec;
use crate::tracker::OffsetTracker;
use crate::worker;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct JobEntry {
    spec: JobSpec,
    cancel: CancellationToken,
    /// Taken while a stop is joining the worker; put back if the join times
    /// out so the caller can retry.
    handle: Option<JoinHandle<()>>,
    worker_id: u64,
    /// Snapshot of the files this job shipped last cycle. Consulted for
    /// duplicate detection and for deciding which offsets are still
    /// referenced when the job stops.
    files: HashSet<PathBuf>,
}

/// Introspection row returned by [`OperationRegistry::list`].
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub name: String,
    pub worker_id: u64,
    pub is_alive: bool,
    /// Workers are detached daemon-style tasks; they never keep the process
    /// alive on their own.
    pub is_background: bool,
}

/// Thread-safe table of running shipping jobs.
///
/// Owns, per job, the stored parameters, the worker task handle, the
/// cancellation token, and the last file-set snapshot. The one-way shutdown
/// flag makes `start` fail for the remainder of the process lifetime once
/// cleanup has run.
pub struct OperationRegistry {
    jobs: RwLock<HashMap<String, JobEntry>>,
    tracker: Arc<OffsetTracker>,
    shutdown: AtomicBool,
    next_worker_id: AtomicU64,
}

impl OperationRegistry {
    pub fn new(tracker: Arc<OffsetTracker>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            tracker,
            shutdown: AtomicBool::new(false),
            next_worker_id: AtomicU64::new(1),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Permanently refuse new jobs. Never unset.
    pub fn begin_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Validate, register, and spawn the worker for `spec`.
    ///
    /// With `enabled == false` the call validates and then deliberately does
    /// nothing, so callers may issue start requests unconditionally on nodes
    /// where shipping is administratively off.
    pub async fn start_job(
        self: Arc<Self>,
        spec: JobSpec,
        engine: Arc<TransferEngine>,
        enabled: bool,
    ) -> ShipResult<()> {
        // Validation order, first failure wins: empty name, duplicate name,
        // shutdown flag, then the remaining shape checks.
        if spec.name.is_empty() {
            return Err(ShipError::EmptyName);
        }
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&spec.name) {
            return Err(ShipError::JobAlreadyExists {
                name: spec.name.clone(),
            });
        }
        if self.is_shutting_down() {
            return Err(ShipError::ShutdownInProgress);
        }
        spec.validate()?;
        if !enabled {
            info!(
                job = %spec.name,
                "file shipping is disabled on this node; ignoring start request"
            );
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let worker_id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let handle = tokio::spawn(worker::worker_loop(
            spec.clone(),
            Arc::clone(&self),
            engine,
            cancel.clone(),
        ));
        info!(
            job = %spec.name,
            worker_id,
            interval = ?spec.interval,
            "started shipping job"
        );
        jobs.insert(
            spec.name.clone(),
            JobEntry {
                spec,
                cancel,
                handle: Some(handle),
                worker_id,
                files: HashSet::new(),
            },
        );
        Ok(())
    }

    /// Cancel `name`'s worker and wait up to `timeout` for it to exit.
    ///
    /// Returns `Ok(true)` once the worker has terminated and the job plus
    /// its now-unreferenced offsets were removed. Returns `Ok(false)` if the
    /// worker did not exit in time; all bookkeeping stays intact so the
    /// caller may retry or inspect.
    pub async fn stop_job(&self, name: &str, timeout: Duration) -> ShipResult<bool> {
        let handle = {
            let mut jobs = self.jobs.write().await;
            let entry = jobs.get_mut(name).ok_or_else(|| ShipError::JobNotFound {
                name: name.to_string(),
            })?;
            entry.cancel.cancel();
            entry.handle.take()
        };

        let Some(mut handle) = handle else {
            debug!(job = %name, "another stop is already joining this worker");
            return Ok(false);
        };

        // Join without holding the operations lock.
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(join_result) => {
                if let Err(e) = join_result {
                    warn!(job = %name, "worker task ended abnormally: {e}");
                }
            }
            Err(_) => {
                let mut jobs = self.jobs.write().await;
                match jobs.get_mut(name) {
                    Some(entry) => entry.handle = Some(handle),
                    None => drop(handle),
                }
                return Ok(false);
            }
        }

        let mut jobs = self.jobs.write().await;
        if let Some(removed) = jobs.remove(name) {
            let referenced: HashSet<PathBuf> = jobs
                .values()
                .flat_map(|entry| entry.files.iter().cloned())
                .collect();
            drop(jobs);
            self.tracker.prune(&removed.files, &referenced).await;
            info!(job = %name, "stopped shipping job");
        }
        Ok(true)
    }

    /// Stop every registered job, each with its own `timeout`. One job's
    /// timeout does not block another's attempt; the names that failed to
    /// stop in time are returned.
    pub async fn stop_all(&self, timeout: Duration, verbose: bool) -> Vec<String> {
        let names: Vec<String> = self.jobs.read().await.keys().cloned().collect();
        let results =
            futures::future::join_all(names.iter().map(|name| self.stop_job(name, timeout))).await;

        let mut failed = Vec::new();
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(true) => {
                    if verbose {
                        info!(job = %name, "worker stopped cleanly");
                    }
                }
                Ok(false) => {
                    if verbose {
                        warn!(job = %name, "worker did not stop within the timeout");
                    }
                    failed.push(name);
                }
                // The job disappeared between listing and stopping; fine.
                Err(_) => debug!(job = %name, "job already gone during stop-all"),
            }
        }
        failed
    }

    pub async fn list(&self) -> Vec<JobInfo> {
        let jobs = self.jobs.read().await;
        let mut infos: Vec<JobInfo> = jobs
            .values()
            .map(|entry| JobInfo {
                name: entry.spec.name.clone(),
                worker_id: entry.worker_id,
                is_alive: entry
                    .handle
                    .as_ref()
                    .map_or(false, |handle| !handle.is_finished()),
                is_background: true,
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Replace `name`'s file-set snapshot with `files` and report which
    /// other jobs' snapshots it overlaps. The snapshot is replaced even when
    /// `files` is empty. A job that vanished mid-cycle reports no overlaps.
    pub async fn update_snapshot(&self, name: &str, files: &HashSet<PathBuf>) -> Vec<Overlap> {
        let mut jobs = self.jobs.write().await;
        if !jobs.contains_key(name) {
            return Vec::new();
        }
        let overlaps = duplicates::find_overlaps(
            files,
            jobs.iter()
                .filter(|(other, _)| other.as_str() != name)
                .map(|(other, entry)| (other.as_str(), &entry.files)),
        );
        if let Some(entry) = jobs.get_mut(name) {
            entry.files = files.clone();
        }
        overlaps
    }

    /// Stored parameters for the named jobs; fails atomically if any name is
    /// unknown, before anything is triggered.
    pub async fn specs_for(&self, names: &[String]) -> ShipResult<Vec<JobSpec>> {
        let jobs = self.jobs.read().await;
        let mut specs = Vec::with_capacity(names.len());
        for name in names {
            let entry = jobs.get(name).ok_or_else(|| ShipError::JobNotFound {
                name: name.clone(),
            })?;
            specs.push(entry.spec.clone());
        }
        Ok(specs)
    }

    pub async fn all_specs(&self) -> Vec<JobSpec> {
        let jobs = self.jobs.read().await;
        let mut specs: Vec<JobSpec> = jobs.values().map(|entry| entry.spec.clone()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Drop all per-job bookkeeping. Workers that survived a timed-out stop
    /// keep their cancellation token set and wind down detached.
    pub async fn clear(&self) {
        let mut jobs = self.jobs.write().await;
        for entry in jobs.values() {
            entry.cancel.cancel();
        }
        jobs.clear();
    }
}
