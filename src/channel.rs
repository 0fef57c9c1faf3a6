//! One configured measurement channel.

use crate::error::AppResult;
use crate::instrument::{Instrument, Quantity};

/// A bound measurement source plus display metadata.
///
/// Immutable once constructed: the instrument handle is exclusively owned,
/// and the quantity, scale, name and unit never change for the lifetime of
/// the run.
pub struct Channel {
    instrument: Box<dyn Instrument>,
    quantity: Quantity,
    scale: f64,
    name: String,
    unit: String,
}

impl Channel {
    /// Binds an instrument to a quantity with display metadata.
    pub fn new(
        instrument: Box<dyn Instrument>,
        quantity: Quantity,
        scale: f64,
        name: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            instrument,
            quantity,
            scale,
            name: name.into(),
            unit: unit.into(),
        }
    }

    /// Display name of the channel.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column header for the output file, `name [unit]`.
    pub fn header(&self) -> String {
        format!("{} [{}]", self.name, self.unit)
    }

    /// Takes one scaled reading from the bound instrument.
    pub async fn read(&mut self) -> AppResult<f64> {
        let raw = self.instrument.measure(self.quantity).await?;
        Ok(self.scale * raw)
    }
}
