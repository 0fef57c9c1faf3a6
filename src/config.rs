//! Configuration management.
//!
//! A run is described by one TOML document: global cadence parameters plus
//! an ordered list of measurement specifications. The list order matters —
//! it defines the column order of every output row — which is why the
//! measurements are an array of tables rather than a name-keyed map.

use crate::error::{AppResult, DaqError};
use crate::instrument::{InstrumentKind, Protocol, Quantity};
use config::Config;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Total acquisition duration; absent or zero means run until stopped.
    #[serde(default, with = "humantime_serde")]
    pub sampling_time: Option<Duration>,
    /// Pause between consecutive cycles; absent or zero means no pause.
    #[serde(default, with = "humantime_serde")]
    pub refresh_rate: Option<Duration>,
    /// Stem of the output file name (written as `data/<output_name>.csv`).
    pub output_name: String,
    /// Ordered channel specifications; order defines column order.
    #[serde(default)]
    pub measurements: Vec<MeasurementConfig>,
}

/// One measurement channel specification.
#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementConfig {
    /// Instrument family.
    pub instrument: InstrumentKind,
    /// Quantity to measure.
    pub quantity: Quantity,
    /// Transport protocol.
    pub protocol: Protocol,
    /// Device path (serial port, USB-TMC file, or a label for virtual sources).
    #[serde(default)]
    pub device: String,
    /// Serial baud rate; defaults to 9600 when omitted.
    pub baud: Option<u32>,
    /// GPIB bus address.
    pub port: Option<u8>,
    /// Instrument model hint for the GPIB adapter (informational).
    pub model: Option<String>,
    /// Constant value returned by a virtual source.
    #[serde(default)]
    pub value: f64,
    /// Uniform noise amplitude for a virtual source.
    #[serde(default)]
    pub noise: f64,
    /// Multiplier applied to every raw reading.
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Display name, used in the output header.
    pub name: String,
    /// Display unit, used in the output header.
    pub unit: String,
}

fn default_scale() -> f64 {
    1.0
}

impl Settings {
    /// Loads the configuration from a file, defaulting to `config/default`.
    pub fn new(config_path: Option<&str>) -> AppResult<Self> {
        let path = config_path.unwrap_or("config/default");
        let s = Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .map_err(DaqError::Config)?;
        let settings: Settings = s.try_deserialize().map_err(DaqError::Config)?;
        Ok(settings.normalized())
    }

    /// Collapses zero durations to `None` so the scheduler has a single
    /// representation for "unbounded" and "unthrottled".
    pub fn normalized(mut self) -> Self {
        if matches!(self.sampling_time, Some(d) if d.is_zero()) {
            self.sampling_time = None;
        }
        if matches!(self.refresh_rate, Some(d) if d.is_zero()) {
            self.refresh_rate = None;
        }
        self
    }

    /// Applies command-line overrides for the cadence parameters, given in
    /// seconds. Zero means unbounded/unthrottled, negative is rejected.
    pub fn apply_overrides(
        &mut self,
        sampling_secs: Option<f64>,
        refresh_secs: Option<f64>,
    ) -> AppResult<()> {
        if let Some(secs) = sampling_secs {
            self.sampling_time = duration_from_secs(secs, "sampling time")?;
        }
        if let Some(secs) = refresh_secs {
            self.refresh_rate = duration_from_secs(secs, "refresh rate")?;
        }
        Ok(())
    }

    /// Semantic checks that deserialization cannot express.
    pub fn validate(&self) -> AppResult<()> {
        if self.output_name.is_empty() {
            return Err(DaqError::Setup("output_name must not be empty".into()));
        }
        if self.measurements.is_empty() {
            return Err(DaqError::Setup(
                "at least one measurement must be configured".into(),
            ));
        }
        Ok(())
    }

    /// Default output location derived from `output_name`.
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from("data").join(format!("{}.csv", self.output_name))
    }
}

fn duration_from_secs(secs: f64, what: &str) -> AppResult<Option<Duration>> {
    if secs < 0.0 || !secs.is_finite() {
        return Err(DaqError::Setup(format!(
            "{what} must be a non-negative number of seconds, got {secs}"
        )));
    }
    if secs == 0.0 {
        Ok(None)
    } else {
        Ok(Some(Duration::from_secs_f64(secs)))
    }
}
