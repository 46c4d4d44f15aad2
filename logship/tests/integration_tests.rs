use logship::{JobSpec, OffsetTracker, OperationRegistry, ShipError, Shipper, TransferEngine};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

fn quiet_spec(dir: &TempDir, name: &str) -> JobSpec {
    // A long interval keeps the worker from cycling during assertions;
    // the first cycle still runs immediately after start.
    let mut spec = JobSpec::new(
        name,
        vec![format!("{}/*.log", dir.path().display())],
        dir.path().join("dest"),
    );
    spec.interval = Duration::from_secs(3600);
    spec.retry_delay = Duration::from_millis(10);
    spec
}

async fn wait_until<F: Fn() -> bool>(what: &str, cond: F) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for: {what}");
}

#[tokio::test]
async fn test_start_then_list_shows_running_job() {
    let dir = TempDir::new().unwrap();
    let shipper = Shipper::new(true);

    shipper.start(quiet_spec(&dir, "app")).await.unwrap();

    let jobs = shipper.list().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].name, "app");
    assert!(jobs[0].is_alive);
    assert!(jobs[0].is_background);

    shipper.cleanup(STOP_TIMEOUT).await;
}

#[tokio::test]
async fn test_duplicate_name_rejected_while_first_is_running() {
    let dir = TempDir::new().unwrap();
    let shipper = Shipper::new(true);

    shipper.start(quiet_spec(&dir, "app")).await.unwrap();
    let second = shipper.start(quiet_spec(&dir, "app")).await;
    assert!(matches!(second, Err(ShipError::JobAlreadyExists { .. })));
    assert_eq!(shipper.list().await.len(), 1);

    shipper.cleanup(STOP_TIMEOUT).await;
}

#[tokio::test]
async fn test_validation_failures_register_nothing() {
    let dir = TempDir::new().unwrap();
    let shipper = Shipper::new(true);

    let mut no_root = quiet_spec(&dir, "structured");
    no_root.preserve_structure = true;
    assert!(matches!(
        shipper.start(no_root).await,
        Err(ShipError::MissingRootDir { .. })
    ));

    let mut no_patterns = quiet_spec(&dir, "empty");
    no_patterns.patterns.clear();
    assert!(matches!(
        shipper.start(no_patterns).await,
        Err(ShipError::EmptyPatterns { .. })
    ));

    assert!(shipper.list().await.is_empty());
}

#[tokio::test]
async fn test_disabled_shipper_start_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let shipper = Shipper::new(false);

    shipper.start(quiet_spec(&dir, "app")).await.unwrap();
    assert!(shipper.list().await.is_empty());

    // Validation still applies even when disabled.
    let mut bad = quiet_spec(&dir, "");
    bad.name.clear();
    assert!(matches!(
        shipper.start(bad).await,
        Err(ShipError::EmptyName)
    ));
}

#[tokio::test]
async fn test_stop_frees_the_name_for_reuse() {
    let dir = TempDir::new().unwrap();
    let shipper = Shipper::new(true);

    shipper.start(quiet_spec(&dir, "app")).await.unwrap();
    assert!(shipper.stop("app", STOP_TIMEOUT).await.unwrap());
    assert!(shipper.list().await.is_empty());

    shipper.start(quiet_spec(&dir, "app")).await.unwrap();
    assert_eq!(shipper.list().await.len(), 1);

    shipper.cleanup(STOP_TIMEOUT).await;
}

#[tokio::test]
async fn test_stop_unknown_name_errors() {
    let shipper = Shipper::new(true);
    assert!(matches!(
        shipper.stop("ghost", STOP_TIMEOUT).await,
        Err(ShipError::JobNotFound { .. })
    ));
}

#[tokio::test]
async fn test_stop_all_stops_every_worker() {
    let dir = TempDir::new().unwrap();
    let shipper = Shipper::new(true);

    for name in ["one", "two", "three"] {
        shipper.start(quiet_spec(&dir, name)).await.unwrap();
    }
    assert_eq!(shipper.list().await.len(), 3);

    let failed = shipper.stop_all(STOP_TIMEOUT, false).await;
    assert!(failed.is_empty());
    assert!(shipper.list().await.is_empty());
}

#[tokio::test]
async fn test_trigger_unknown_name_has_no_side_effects() {
    let dir = TempDir::new().unwrap();
    let shipper = Shipper::new(true);

    shipper.start(quiet_spec(&dir, "app")).await.unwrap();
    let result = shipper
        .trigger_now(Some(&["app".to_string(), "ghost".to_string()]))
        .await;
    assert!(matches!(result, Err(ShipError::JobNotFound { .. })));
    assert_eq!(shipper.list().await.len(), 1);

    shipper.cleanup(STOP_TIMEOUT).await;
}

#[tokio::test]
async fn test_trigger_with_no_jobs_is_a_noop() {
    let shipper = Shipper::new(true);
    shipper.trigger_now(None).await.unwrap();
}

#[tokio::test]
async fn test_cleanup_is_idempotent_and_blocks_new_starts() {
    let dir = TempDir::new().unwrap();
    let shipper = Shipper::new(true);

    shipper.start(quiet_spec(&dir, "app")).await.unwrap();
    shipper.cleanup(STOP_TIMEOUT).await;
    assert!(shipper.list().await.is_empty());

    // Second call performs no work and does not hang or panic.
    shipper.cleanup(STOP_TIMEOUT).await;

    assert!(matches!(
        shipper.start(quiet_spec(&dir, "late")).await,
        Err(ShipError::ShutdownInProgress)
    ));
}

#[tokio::test]
async fn test_end_to_end_incremental_shipping() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("app.log");
    let dest_root = dir.path().join("dest");
    let dest_file = dest_root.join("app.log");

    std::fs::create_dir_all(&dest_root).unwrap();
    std::fs::write(&source, vec![b'x'; 100]).unwrap();
    // The engine only appends to destinations that already exist.
    std::fs::write(&dest_file, b"").unwrap();

    let shipper = Shipper::new(true);
    let mut spec = JobSpec::new(
        "logs",
        vec![source.to_string_lossy().to_string()],
        &dest_root,
    );
    spec.interval = Duration::from_secs(3600);
    shipper.start(spec).await.unwrap();

    // First cycle runs right after start and ships the initial 100 bytes.
    wait_until("first 100 bytes shipped", || {
        file_len(&dest_file) == Some(100)
    })
    .await;

    // Append 50 bytes and force a cycle; only the tail moves.
    let mut contents = std::fs::read(&source).unwrap();
    contents.extend_from_slice(&[b'y'; 50]);
    std::fs::write(&source, &contents).unwrap();
    shipper
        .trigger_now(Some(&["logs".to_string()]))
        .await
        .unwrap();

    wait_until("tail shipped", || file_len(&dest_file) == Some(150)).await;
    assert_eq!(std::fs::read(&dest_file).unwrap(), contents);

    shipper.cleanup(STOP_TIMEOUT).await;
}

#[tokio::test]
async fn test_overlapping_jobs_are_detected() {
    let dir = TempDir::new().unwrap();
    let shared = dir.path().join("shared.log");
    std::fs::write(&shared, b"x").unwrap();

    let tracker = Arc::new(OffsetTracker::new());
    let registry = Arc::new(OperationRegistry::new(Arc::clone(&tracker)));
    let engine = Arc::new(TransferEngine::new(tracker));

    for name in ["a", "b"] {
        let mut spec = quiet_spec(&dir, name);
        spec.patterns = vec![shared.to_string_lossy().to_string()];
        Arc::clone(&registry)
            .start_job(spec, Arc::clone(&engine), true)
            .await
            .unwrap();
    }

    let files: HashSet<PathBuf> = [shared.clone()].into_iter().collect();
    registry.update_snapshot("a", &files).await;
    let overlaps = registry.update_snapshot("b", &files).await;
    assert_eq!(overlaps.len(), 1);
    assert_eq!(overlaps[0].other_job, "a");
    assert_eq!(overlaps[0].files, vec![shared.clone()]);

    // Disjoint sets: no overlap reported.
    let other = dir.path().join("other.log");
    std::fs::write(&other, b"y").unwrap();
    let disjoint: HashSet<PathBuf> = [other].into_iter().collect();
    let overlaps = registry.update_snapshot("b", &disjoint).await;
    assert!(overlaps.is_empty());

    registry.stop_all(STOP_TIMEOUT, false).await;
}

fn file_len(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}
