//! Instrument abstraction and the closed set of supported devices.
//!
//! The acquisition core only ever consumes one capability from an
//! instrument: read a scalar for a given measurement quantity. Everything
//! protocol-specific lives behind the [`Instrument`] trait; the scheduler
//! never sees transports or command strings.
//!
//! The three configuration dimensions (instrument family, quantity,
//! transport protocol) are each a closed enum, so an unsupported value is
//! rejected while deserializing the configuration, long before the loop
//! starts.

pub mod scpi;
pub mod sim;

use crate::error::AppResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;

/// The measurement mode requested from an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantity {
    /// DC current.
    Current,
    /// DC voltage.
    Voltage,
    /// Temperature.
    Temperature,
    /// Synthetic default mode for simulated sources.
    Virtual,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Quantity::Current => "current",
            Quantity::Voltage => "voltage",
            Quantity::Temperature => "temperature",
            Quantity::Virtual => "virtual",
        };
        f.write_str(s)
    }
}

/// The supported instrument families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    /// Keithley DMM6500 bench multimeter.
    Dmm6500,
    /// Keithley 485 picoammeter.
    Keithley485,
    /// Fluke 3000 FC multimeter.
    Fluke3000,
    /// In-process simulated source.
    Virtual,
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstrumentKind::Dmm6500 => "dmm6500",
            InstrumentKind::Keithley485 => "keithley485",
            InstrumentKind::Fluke3000 => "fluke3000",
            InstrumentKind::Virtual => "virtual",
        };
        f.write_str(s)
    }
}

/// The supported transport protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// USB-TMC device file.
    Usbtmc,
    /// Direct serial port.
    Serial,
    /// GPIB bus behind a USB adapter.
    Gpib,
    /// No transport; in-process source.
    Virtual,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Protocol::Usbtmc => "usbtmc",
            Protocol::Serial => "serial",
            Protocol::Gpib => "gpib",
            Protocol::Virtual => "virtual",
        };
        f.write_str(s)
    }
}

/// Trait for any scalar-reading instrument.
///
/// This is the only capability the acquisition core consumes. A read may
/// block for driver-defined I/O and may fail transiently; the scheduler
/// owns the retry policy.
#[async_trait]
pub trait Instrument: Send {
    /// Returns a short identifier for the instrument, used in log messages.
    fn name(&self) -> &str;

    /// Reads one raw scalar value for the given quantity.
    async fn measure(&mut self, quantity: Quantity) -> AppResult<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_tags_deserialize_from_lowercase() {
        #[derive(Deserialize)]
        struct Probe {
            instrument: InstrumentKind,
            quantity: Quantity,
            protocol: Protocol,
        }

        let probe: Probe = toml::from_str(
            r#"
            instrument = "keithley485"
            quantity = "current"
            protocol = "gpib"
            "#,
        )
        .expect("valid tags must parse");
        assert_eq!(probe.instrument, InstrumentKind::Keithley485);
        assert_eq!(probe.quantity, Quantity::Current);
        assert_eq!(probe.protocol, Protocol::Gpib);
    }

    #[test]
    fn unknown_tags_are_rejected() {
        #[derive(Deserialize)]
        struct Probe {
            #[allow(dead_code)]
            quantity: Quantity,
        }

        assert!(toml::from_str::<Probe>(r#"quantity = "pressure""#).is_err());
        assert!(toml::from_str::<Probe>(r#"quantity = "Voltage""#).is_err());
    }
}
