//! Durable tabular output sinks.
//!
//! The acquisition loop hands the recorder one complete row per cycle and
//! expects it to be on disk before the next cycle starts: every append is
//! followed by a flush, so a crash mid-run loses at most the in-flight row.

use crate::error::{AppResult, DaqError};
use log::info;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Capability consumed by the scheduler: append one row, then close.
pub trait Recorder: Send {
    /// Appends one sample row (elapsed seconds plus one reading per channel)
    /// and flushes it to durable storage.
    fn append(&mut self, elapsed_secs: f64, readings: &[f64]) -> AppResult<()>;

    /// Flushes and closes the sink. Idempotent.
    fn close(&mut self) -> AppResult<()>;
}

/// A CSV file recorder.
pub struct CsvRecorder {
    writer: Option<csv::Writer<File>>,
}

impl CsvRecorder {
    /// Creates the output file (and its parent directory) and writes the
    /// header row: `time` followed by one column per channel.
    pub fn create(path: &Path, headers: &[String]) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DaqError::Storage(e.to_string()))?;
            }
        }
        let file =
            File::create(path).map_err(|e| {
                DaqError::Storage(format!("failed to create '{}': {e}", path.display()))
            })?;
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record(headers)
            .and_then(|()| writer.flush().map_err(csv::Error::from))
            .map_err(|e| DaqError::Storage(e.to_string()))?;
        info!("Recording columns: [{}]", headers.join(","));
        Ok(Self {
            writer: Some(writer),
        })
    }
}

impl Recorder for CsvRecorder {
    fn append(&mut self, elapsed_secs: f64, readings: &[f64]) -> AppResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| DaqError::Storage("recorder already closed".into()))?;
        let mut record = Vec::with_capacity(1 + readings.len());
        record.push(elapsed_secs.to_string());
        record.extend(readings.iter().map(|v| v.to_string()));
        writer
            .write_record(&record)
            .and_then(|()| writer.flush().map_err(csv::Error::from))
            .map_err(|e| DaqError::Storage(e.to_string()))
    }

    fn close(&mut self) -> AppResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| DaqError::Storage(e.to_string()))?;
            info!("Closed DAQ output file");
        }
        Ok(())
    }
}

/// An in-memory recorder for tests and dry runs.
///
/// Clones share the same row buffer, so a test can keep a handle while the
/// scheduler owns the other.
#[derive(Default, Clone)]
pub struct MemoryRecorder {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    rows: Vec<(f64, Vec<f64>)>,
    closed: bool,
}

impl MemoryRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded rows, in append order.
    pub fn rows(&self) -> Vec<(f64, Vec<f64>)> {
        self.lock().rows.clone()
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Recorder for MemoryRecorder {
    fn append(&mut self, elapsed_secs: f64, readings: &[f64]) -> AppResult<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(DaqError::Storage("recorder already closed".into()));
        }
        state.rows.push((elapsed_secs, readings.to_vec()));
        Ok(())
    }

    fn close(&mut self) -> AppResult<()> {
        self.lock().closed = true;
        Ok(())
    }
}
