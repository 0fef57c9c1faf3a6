//! A simulated instrument that generates synthetic data.
//!
//! Useful for exercising the full acquisition path without hardware: the
//! source returns a configured constant, optionally jittered by uniform
//! noise, and never fails.

use crate::error::AppResult;
use crate::instrument::{Instrument, Quantity};
use async_trait::async_trait;
use rand::Rng;

/// An in-process measurement source.
pub struct VirtualInstrument {
    device: String,
    value: f64,
    noise: f64,
}

impl VirtualInstrument {
    /// Creates a source that reads `value` ± uniform noise of amplitude
    /// `noise` (pass 0.0 for a deterministic constant).
    pub fn new(device: impl Into<String>, value: f64, noise: f64) -> Self {
        Self {
            device: device.into(),
            value,
            noise,
        }
    }
}

#[async_trait]
impl Instrument for VirtualInstrument {
    fn name(&self) -> &str {
        &self.device
    }

    async fn measure(&mut self, _quantity: Quantity) -> AppResult<f64> {
        if self.noise > 0.0 {
            let jitter = rand::thread_rng().gen_range(-self.noise..=self.noise);
            Ok(self.value + jitter)
        } else {
            Ok(self.value)
        }
    }
}
