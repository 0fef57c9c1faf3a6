//! Thin SCPI-style driver for the supported hardware families.
//!
//! The driver deliberately knows almost nothing about the instruments: one
//! query string per family and quantity, one scalar response parsed to
//! `f64`. Anything richer (ranging, triggering, configuration) is out of
//! scope for a slow logger.
//!
//! Three transports are supported:
//! - **USB-TMC**: the kernel exposes the instrument as a device file that
//!   accepts writes and answers reads.
//! - **Serial**: a direct RS-232 link (`serialport`, behind the
//!   `instrument_serial` feature).
//! - **GPIB**: a Prologix-style USB adapter on a serial port; the bus
//!   address is selected with `++addr` before each query.

use crate::error::{AppResult, DaqError};
use crate::instrument::{Instrument, InstrumentKind, Quantity};
use async_trait::async_trait;
use log::trace;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};

#[cfg(feature = "instrument_serial")]
use serialport::SerialPort;
#[cfg(feature = "instrument_serial")]
use std::time::Duration;

/// Timeout applied to serial transports at open time.
#[cfg(feature = "instrument_serial")]
const SERIAL_TIMEOUT: Duration = Duration::from_secs(2);

/// Returns the query string for one family and quantity, or a setup error
/// when the family cannot measure that quantity. The registry calls this at
/// configuration time so the loop never meets an unsupported pair.
pub(crate) fn command_for(kind: InstrumentKind, quantity: Quantity) -> AppResult<&'static str> {
    let cmd = match (kind, quantity) {
        (InstrumentKind::Dmm6500, Quantity::Current) => ":MEAS:CURR:DC?",
        (InstrumentKind::Dmm6500, Quantity::Voltage) => ":MEAS:VOLT:DC?",
        (InstrumentKind::Dmm6500, Quantity::Temperature) => ":MEAS:TEMP?",
        // The 485 is a picoammeter; "X" triggers one reading.
        (InstrumentKind::Keithley485, Quantity::Current) => "X",
        (InstrumentKind::Fluke3000, Quantity::Voltage) => "QM 1",
        (InstrumentKind::Fluke3000, Quantity::Current) => "QM 2",
        (InstrumentKind::Fluke3000, Quantity::Temperature) => "QM 3",
        (kind, quantity) => {
            return Err(DaqError::Setup(format!(
                "instrument '{kind}' does not support '{quantity}' measurements"
            )))
        }
    };
    Ok(cmd)
}

/// Extracts a scalar from an instrument response.
///
/// Handles plain SCPI floats (`+1.2345E-03`), prefixed readings like the
/// Keithley 485's `NDCA+1.2345E-9`, and comma-separated tails by taking the
/// first field and stripping status letters.
fn parse_reading(raw: &str) -> Option<f64> {
    let field = raw.trim().split(',').next()?.trim();
    let cleaned: String = field
        .chars()
        .filter(|c| matches!(c, '0'..='9' | '+' | '-' | '.' | 'e' | 'E'))
        .collect();
    cleaned.parse::<f64>().ok()
}

/// The wire side of an SCPI instrument.
enum Transport {
    UsbTmc(File),
    #[cfg(feature = "instrument_serial")]
    Serial(Box<dyn SerialPort>),
    #[cfg(feature = "instrument_serial")]
    Gpib {
        port: Box<dyn SerialPort>,
        address: u8,
    },
}

impl Transport {
    /// Sends one command and reads back one response line.
    fn query(&mut self, command: &str) -> AppResult<String> {
        trace!("query: '{}'", command.escape_default());
        match self {
            Transport::UsbTmc(file) => {
                file.write_all(command.as_bytes())
                    .and_then(|()| file.write_all(b"\n"))
                    .and_then(|()| file.flush())
                    .map_err(|e| DaqError::Read(e.to_string()))?;
                let mut buf = [0u8; 256];
                let n = file.read(&mut buf).map_err(|e| DaqError::Read(e.to_string()))?;
                Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
            }
            #[cfg(feature = "instrument_serial")]
            Transport::Serial(port) => {
                write_line(port, command).map_err(|e| DaqError::Read(e.to_string()))?;
                read_response(port).map_err(|e| DaqError::Read(e.to_string()))
            }
            #[cfg(feature = "instrument_serial")]
            Transport::Gpib { port, address } => {
                // Select the bus address before every query; the adapter is
                // shared state and another process may have moved it.
                let select = format!("++addr {address}");
                write_line(port, &select)
                    .and_then(|()| write_line(port, command))
                    .map_err(|e| DaqError::Read(e.to_string()))?;
                read_response(port).map_err(|e| DaqError::Read(e.to_string()))
            }
        }
    }
}

/// Writes a command with a newline terminator.
#[cfg(feature = "instrument_serial")]
fn write_line(port: &mut Box<dyn SerialPort>, line: &str) -> std::io::Result<()> {
    port.write_all(line.as_bytes())?;
    port.write_all(b"\n")
}

/// Reads until a line terminator or the port timeout.
#[cfg(feature = "instrument_serial")]
fn read_response(port: &mut Box<dyn SerialPort>) -> std::io::Result<String> {
    let mut buf = [0u8; 256];
    let mut response = String::new();
    loop {
        match port.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                response.push_str(&String::from_utf8_lossy(&buf[..n]));
                if response.contains('\n') || response.contains('\r') {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
            Err(e) => return Err(e),
        }
    }
    Ok(response)
}

/// An SCPI instrument bound to one transport.
pub struct ScpiInstrument {
    kind: InstrumentKind,
    transport: Transport,
    label: String,
}

impl ScpiInstrument {
    /// Opens an instrument behind a USB-TMC device file.
    pub fn open_usbtmc(kind: InstrumentKind, device: &str) -> AppResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .map_err(|e| DaqError::Setup(format!("failed to open device '{device}': {e}")))?;
        Ok(Self {
            kind,
            transport: Transport::UsbTmc(file),
            label: device.to_string(),
        })
    }

    /// Opens an instrument on a direct serial port.
    #[cfg(feature = "instrument_serial")]
    pub fn open_serial(kind: InstrumentKind, device: &str, baud: u32) -> AppResult<Self> {
        let port = serialport::new(device, baud)
            .timeout(SERIAL_TIMEOUT)
            .open()
            .map_err(|e| DaqError::Setup(format!("failed to open serial port '{device}': {e}")))?;
        Ok(Self {
            kind,
            transport: Transport::Serial(port),
            label: device.to_string(),
        })
    }

    /// Serial support was not compiled in.
    #[cfg(not(feature = "instrument_serial"))]
    pub fn open_serial(_kind: InstrumentKind, _device: &str, _baud: u32) -> AppResult<Self> {
        Err(DaqError::FeatureNotEnabled("instrument_serial".to_string()))
    }

    /// Opens an instrument behind a Prologix-style GPIB-USB adapter.
    #[cfg(feature = "instrument_serial")]
    pub fn open_gpib(kind: InstrumentKind, device: &str, address: u8) -> AppResult<Self> {
        let mut port = serialport::new(device, 9600)
            .timeout(SERIAL_TIMEOUT)
            .open()
            .map_err(|e| DaqError::Setup(format!("failed to open GPIB adapter '{device}': {e}")))?;
        // Controller mode with automatic read-after-write.
        write_line(&mut port, "++mode 1")
            .and_then(|()| write_line(&mut port, "++auto 1"))
            .map_err(|e| DaqError::Setup(format!("failed to configure GPIB adapter: {e}")))?;
        Ok(Self {
            kind,
            transport: Transport::Gpib { port, address },
            label: format!("{device}:{address}"),
        })
    }

    /// GPIB support requires the serial feature.
    #[cfg(not(feature = "instrument_serial"))]
    pub fn open_gpib(_kind: InstrumentKind, _device: &str, _address: u8) -> AppResult<Self> {
        Err(DaqError::FeatureNotEnabled("instrument_serial".to_string()))
    }
}

#[async_trait]
impl Instrument for ScpiInstrument {
    fn name(&self) -> &str {
        &self.label
    }

    async fn measure(&mut self, quantity: Quantity) -> AppResult<f64> {
        let command = command_for(self.kind, quantity)?;
        let raw = self.transport.query(command)?;
        parse_reading(&raw).ok_or_else(|| {
            DaqError::Read(format!(
                "unparseable response from '{}': {:?}",
                self.label, raw
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_scpi_float() {
        assert_eq!(parse_reading("+1.2345E-03\n"), Some(1.2345e-3));
    }

    #[test]
    fn parses_prefixed_picoammeter_reading() {
        assert_eq!(parse_reading("NDCA+1.2345E-9\r\n"), Some(1.2345e-9));
    }

    #[test]
    fn takes_first_comma_separated_field() {
        assert_eq!(parse_reading("+4.2E+00,+0.0E+00\n"), Some(4.2));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_reading(""), None);
        assert_eq!(parse_reading("ERROR\n"), None);
    }

    #[test]
    fn multimeter_supports_all_three_quantities() {
        for q in [Quantity::Current, Quantity::Voltage, Quantity::Temperature] {
            assert!(command_for(InstrumentKind::Dmm6500, q).is_ok());
        }
    }

    #[test]
    fn picoammeter_rejects_voltage() {
        let err = command_for(InstrumentKind::Keithley485, Quantity::Voltage);
        assert!(matches!(err, Err(DaqError::Setup(_))));
    }

    #[test]
    fn hardware_families_reject_virtual_quantity() {
        for kind in [
            InstrumentKind::Dmm6500,
            InstrumentKind::Keithley485,
            InstrumentKind::Fluke3000,
        ] {
            assert!(command_for(kind, Quantity::Virtual).is_err());
        }
    }
}
