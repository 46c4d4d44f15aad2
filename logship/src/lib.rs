//! Background log/file shipping engine.
//!
//! Named jobs continuously append the growing tails of local files (for
//! example rotating log files) to a destination tree. Each job runs on its
//! own background worker with a configurable interval; transfers are
//! incremental (offset-tracked, rotation-aware, at-least-once), transient
//! failures are retried per file, and shutdown flushes every job before
//! stopping the workers.
//!
//! The [`Shipper`] facade is the whole public surface:
//!
//! ```no_run
//! use logship::{JobSpec, Shipper};
//! use std::time::Duration;
//!
//! # async fn demo() -> logship::ShipResult<()> {
//! let shipper = Shipper::from_env();
//! shipper
//!     .start(JobSpec::new(
//!         "app-logs",
//!         vec!["/var/log/app/*.log".to_string()],
//!         "/mnt/shipped/app",
//!     ))
//!     .await?;
//! // ... later ...
//! shipper.cleanup(Duration::from_secs(60)).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod discovery;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod job;
pub mod registry;
pub mod shipper;
pub mod signals;
pub mod tracker;

mod worker;

pub use config::{Config, JobConfig};
pub use engine::TransferEngine;
pub use error::{ShipError, ShipResult};
pub use job::JobSpec;
pub use registry::{JobInfo, OperationRegistry};
pub use shipper::{Shipper, DEFAULT_STOP_TIMEOUT, ENABLED_ENV};
pub use tracker::OffsetTracker;
