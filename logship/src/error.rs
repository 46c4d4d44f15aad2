use thiserror::Error;

/// Errors surfaced synchronously from the shipping API.
///
/// Everything in this enum is a validation-class failure: it is raised from
/// the API call itself and implies no state change. Transient I/O problems
/// during transfers never show up here; they are retried and, on exhaustion,
/// logged as per-file failures inside the worker cycle.
#[derive(Error, Debug)]
pub enum ShipError {
    #[error("job name must not be empty")]
    EmptyName,

    #[error("shipping job '{name}' is already registered")]
    JobAlreadyExists { name: String },

    #[error("shipping job '{name}' is not registered")]
    JobNotFound { name: String },

    #[error("shipping engine is shutting down; new jobs are not accepted")]
    ShutdownInProgress,

    #[error("job '{name}' has no path patterns")]
    EmptyPatterns { name: String },

    #[error("job '{name}' has an empty destination")]
    EmptyDestination { name: String },

    #[error("job '{name}' has a zero-length interval")]
    ZeroInterval { name: String },

    #[error("job '{name}' preserves directory structure but has no root dir")]
    MissingRootDir { name: String },
}

pub type ShipResult<T> = Result<T, ShipError>;
