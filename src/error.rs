//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, for the entire
//! application. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the different failure classes the DAQ can hit:
//!
//! - **`Config`**: wraps errors from the `config` crate, typically file or
//!   format issues in the configuration file.
//! - **`Setup`**: semantic configuration errors caught while building the
//!   channel registry (unsupported instrument/quantity/protocol combination,
//!   device-open failure). Always fatal and always raised before the
//!   acquisition loop starts.
//! - **`Read`**: a single failed instrument read. Recoverable; the scheduler
//!   retries it up to the per-channel ceiling.
//! - **`RetryExhausted`**: the retry ceiling was reached on one channel
//!   within one cycle. Aborts the entire run.
//! - **`Storage`**: failures in the tabular output sink.
//! - **`FeatureNotEnabled`**: a transport was requested that was not compiled
//!   in, with a clear message on how to enable it.
//!
//! By using `#[from]`, `DaqError` can be seamlessly created from underlying
//! error types, simplifying error handling throughout the application with
//! the `?` operator.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// The application-wide error type.
#[derive(Error, Debug)]
pub enum DaqError {
    /// Configuration file could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Semantic configuration error caught during registry construction.
    #[error("Setup error: {0}")]
    Setup(String),

    /// Generic I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// One failed instrument read; recoverable by retry.
    #[error("Instrument read failed: {0}")]
    Read(String),

    /// A channel failed too many consecutive reads within one cycle.
    #[error("Channel '{channel}' failed {attempts} consecutive reads")]
    RetryExhausted {
        /// Display name of the channel that exhausted its retries.
        channel: String,
        /// Number of consecutive failed attempts.
        attempts: u32,
    },

    /// Failure in the tabular output sink.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A transport was requested that is not compiled in.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl DaqError {
    /// Whether the error is recoverable by an immediate retry.
    ///
    /// Only single-read failures qualify; everything else either happens
    /// before the loop starts or terminates the run.
    pub fn is_transient(&self) -> bool {
        matches!(self, DaqError::Read(_))
    }
}
