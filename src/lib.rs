//! # slowdaq
//!
//! A continuous slow-control data acquisition logger. The engine polls a
//! configured, ordered set of measurement channels — each bound to a
//! physical or simulated instrument — at a fixed cadence, absorbs transient
//! read failures with bounded per-channel retry, and appends one
//! time-stamped row per cycle to a CSV file, flushed after every row. It
//! runs unattended for a bounded or unbounded duration and stops cleanly on
//! SIGINT/SIGTERM.
//!
//! ## Crate structure
//!
//! - **`config`**: run configuration loaded from a TOML file (cadence
//!   parameters plus the ordered measurement list).
//! - **`error`**: the central `DaqError` enum.
//! - **`instrument`**: the `Instrument` trait, the closed enums for the
//!   instrument/quantity/protocol dimensions, the thin SCPI driver and the
//!   simulated source.
//! - **`channel`**: one bound measurement source with its scale and display
//!   metadata.
//! - **`registry`**: builds the ordered channel list from the
//!   configuration, failing fast on anything unsupported.
//! - **`recorder`**: the durable tabular sink (CSV, flushed per row).
//! - **`shutdown`**: the stop token and the signal handlers that set it.
//! - **`progress`**: adaptive decile / 5-minute progress messages.
//! - **`scheduler`**: the acquisition loop itself.

pub mod channel;
pub mod config;
pub mod error;
pub mod instrument;
pub mod progress;
pub mod recorder;
pub mod registry;
pub mod scheduler;
pub mod shutdown;

pub use channel::Channel;
pub use config::Settings;
pub use error::{AppResult, DaqError};
pub use recorder::{CsvRecorder, Recorder};
pub use scheduler::{RetryPolicy, RunOutcome, Scheduler};
pub use shutdown::ShutdownToken;
