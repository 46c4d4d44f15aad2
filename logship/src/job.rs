use crate::error::{ShipError, ShipResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Parameters of one named shipping job.
///
/// A job incrementally appends every file matched by `patterns` to a path
/// under `destination`, once per `interval`. The spec is validated when the
/// job is started and stored in the registry for the job's lifetime; manual
/// triggers always run against the stored copy.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    /// Literal paths or glob patterns (recursive `**` allowed).
    pub patterns: Vec<String>,
    /// Destination root the shipped files are appended under.
    pub destination: PathBuf,
    pub interval: Duration,
    /// Create missing destination directories before each transfer.
    pub create_dest_dirs: bool,
    /// Mirror the source path relative to `root_dir` under the destination
    /// instead of flattening to the file's base name.
    pub preserve_structure: bool,
    pub root_dir: Option<PathBuf>,
    /// Additional attempts after the first failure, per file per cycle.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl JobSpec {
    pub fn new(
        name: impl Into<String>,
        patterns: Vec<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            patterns,
            destination: destination.into(),
            interval: Duration::from_secs(60),
            create_dest_dirs: true,
            preserve_structure: false,
            root_dir: None,
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }

    /// Shape validation, first failure wins. Registration-state checks
    /// (duplicate name, shutdown flag) live in the registry where the table
    /// lock makes them atomic.
    pub fn validate(&self) -> ShipResult<()> {
        if self.name.is_empty() {
            return Err(ShipError::EmptyName);
        }
        if self.patterns.is_empty() {
            return Err(ShipError::EmptyPatterns {
                name: self.name.clone(),
            });
        }
        if self.destination.as_os_str().is_empty() {
            return Err(ShipError::EmptyDestination {
                name: self.name.clone(),
            });
        }
        if self.interval.is_zero() {
            return Err(ShipError::ZeroInterval {
                name: self.name.clone(),
            });
        }
        if self.preserve_structure
            && self
                .root_dir
                .as_ref()
                .map_or(true, |d| d.as_os_str().is_empty())
        {
            return Err(ShipError::MissingRootDir {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Compute where `source` lands under the destination root.
    ///
    /// With `preserve_structure` the source path relative to `root_dir` is
    /// mirrored; a file outside `root_dir` falls back to its base name. The
    /// flat layout always uses the base name.
    pub fn destination_for(&self, source: &Path) -> PathBuf {
        if self.preserve_structure {
            if let Some(root) = &self.root_dir {
                if let Ok(relative) = source.strip_prefix(root) {
                    return self.destination.join(relative);
                }
                tracing::warn!(
                    job = %self.name,
                    file = %source.display(),
                    root = %root.display(),
                    "file is outside the job's root dir; flattening to base name"
                );
            }
        }
        match source.file_name() {
            Some(base) => self.destination.join(base),
            None => self.destination.clone(),
        }
    }
}
