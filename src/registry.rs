//! Builds the ordered channel list from the configuration.
//!
//! All validation happens here, before the acquisition loop starts: an
//! unsupported combination of instrument family, quantity and protocol, or
//! a device that fails to open, aborts the run with a setup error rather
//! than surfacing mid-acquisition.

use crate::channel::Channel;
use crate::config::MeasurementConfig;
use crate::error::{AppResult, DaqError};
use crate::instrument::scpi::{self, ScpiInstrument};
use crate::instrument::sim::VirtualInstrument;
use crate::instrument::{Instrument, InstrumentKind, Protocol, Quantity};
use log::info;

const DEFAULT_BAUD: u32 = 9600;

/// Resolves every measurement specification into a live channel.
///
/// Output order equals input order; this order defines the column order of
/// every output row.
pub fn build_channels(measurements: &[MeasurementConfig]) -> AppResult<Vec<Channel>> {
    let mut channels = Vec::with_capacity(measurements.len());
    for spec in measurements {
        channels.push(build_channel(spec)?);
    }
    Ok(channels)
}

fn build_channel(spec: &MeasurementConfig) -> AppResult<Channel> {
    info!("Setting up instrument '{}'", spec.instrument);
    info!("Setting up '{}' measurement", spec.quantity);

    let instrument = open_instrument(spec)?;

    Ok(Channel::new(
        instrument,
        spec.quantity,
        spec.scale,
        spec.name.clone(),
        spec.unit.clone(),
    ))
}

fn open_instrument(spec: &MeasurementConfig) -> AppResult<Box<dyn Instrument>> {
    match spec.instrument {
        InstrumentKind::Virtual => {
            if spec.protocol != Protocol::Virtual || spec.quantity != Quantity::Virtual {
                return Err(DaqError::Setup(format!(
                    "channel '{}': the virtual instrument requires quantity and protocol 'virtual'",
                    spec.name
                )));
            }
            let label = if spec.device.is_empty() {
                "virtual"
            } else {
                spec.device.as_str()
            };
            info!("Initializing virtual source '{label}'");
            Ok(Box::new(VirtualInstrument::new(label, spec.value, spec.noise)))
        }
        kind => {
            if spec.quantity == Quantity::Virtual {
                return Err(DaqError::Setup(format!(
                    "channel '{}': quantity 'virtual' is only valid for the virtual instrument",
                    spec.name
                )));
            }
            // Reject unsupported family x quantity pairs now, not mid-run.
            scpi::command_for(kind, spec.quantity).map_err(|_| {
                DaqError::Setup(format!(
                    "channel '{}': instrument '{}' does not support '{}' measurements",
                    spec.name, kind, spec.quantity
                ))
            })?;
            if spec.device.is_empty() {
                return Err(DaqError::Setup(format!(
                    "channel '{}': a device path is required for protocol '{}'",
                    spec.name, spec.protocol
                )));
            }
            info!(
                "Initializing device '{}' with protocol '{}'",
                spec.device, spec.protocol
            );
            let instrument = match spec.protocol {
                Protocol::Usbtmc => ScpiInstrument::open_usbtmc(kind, &spec.device)?,
                Protocol::Serial => {
                    let baud = spec.baud.unwrap_or(DEFAULT_BAUD);
                    ScpiInstrument::open_serial(kind, &spec.device, baud)?
                }
                Protocol::Gpib => {
                    let address = spec.port.ok_or_else(|| {
                        DaqError::Setup(format!(
                            "channel '{}': protocol 'gpib' requires a bus address in 'port'",
                            spec.name
                        ))
                    })?;
                    if let Some(model) = &spec.model {
                        info!("GPIB device model: {model}");
                    }
                    ScpiInstrument::open_gpib(kind, &spec.device, address)?
                }
                Protocol::Virtual => {
                    return Err(DaqError::Setup(format!(
                        "channel '{}': protocol 'virtual' is only valid for the virtual instrument",
                        spec.name
                    )))
                }
            };
            Ok(Box::new(instrument))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn virtual_spec(name: &str, value: f64) -> MeasurementConfig {
        MeasurementConfig {
            instrument: InstrumentKind::Virtual,
            quantity: Quantity::Virtual,
            protocol: Protocol::Virtual,
            device: format!("sim-{name}"),
            baud: None,
            port: None,
            model: None,
            value,
            noise: 0.0,
            scale: 1.0,
            name: name.to_string(),
            unit: "V".to_string(),
        }
    }

    #[test]
    fn builds_channels_in_input_order() {
        let specs = vec![virtual_spec("a", 1.0), virtual_spec("b", 2.0), virtual_spec("c", 3.0)];
        let channels = build_channels(&specs).expect("virtual channels always build");
        let names: Vec<_> = channels.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn virtual_instrument_requires_virtual_protocol() {
        let mut spec = virtual_spec("a", 0.0);
        spec.protocol = Protocol::Serial;
        assert!(matches!(
            build_channels(&[spec]),
            Err(DaqError::Setup(_))
        ));
    }

    #[test]
    fn hardware_rejects_virtual_quantity() {
        let mut spec = virtual_spec("a", 0.0);
        spec.instrument = InstrumentKind::Dmm6500;
        spec.protocol = Protocol::Usbtmc;
        assert!(matches!(
            build_channels(&[spec]),
            Err(DaqError::Setup(_))
        ));
    }

    #[test]
    fn unsupported_family_quantity_pair_is_a_setup_error() {
        let mut spec = virtual_spec("a", 0.0);
        spec.instrument = InstrumentKind::Keithley485;
        spec.quantity = Quantity::Temperature;
        spec.protocol = Protocol::Gpib;
        spec.port = Some(22);
        assert!(matches!(
            build_channels(&[spec]),
            Err(DaqError::Setup(_))
        ));
    }

    #[test]
    fn gpib_without_address_is_a_setup_error() {
        let mut spec = virtual_spec("a", 0.0);
        spec.instrument = InstrumentKind::Keithley485;
        spec.quantity = Quantity::Current;
        spec.protocol = Protocol::Gpib;
        spec.port = None;
        assert!(matches!(
            build_channels(&[spec]),
            Err(DaqError::Setup(_))
        ));
    }

    #[test]
    fn missing_device_path_is_a_setup_error() {
        let mut spec = virtual_spec("a", 0.0);
        spec.instrument = InstrumentKind::Dmm6500;
        spec.quantity = Quantity::Voltage;
        spec.protocol = Protocol::Usbtmc;
        spec.device = String::new();
        assert!(matches!(
            build_channels(&[spec]),
            Err(DaqError::Setup(_))
        ));
    }

    #[test]
    fn one_bad_spec_fails_the_whole_registry() {
        let mut bad = virtual_spec("bad", 0.0);
        bad.protocol = Protocol::Gpib;
        let specs = vec![virtual_spec("good", 1.0), bad];
        assert!(build_channels(&specs).is_err());
    }
}
