//! Adaptive progress reporting.
//!
//! Emits a bounded number of human-readable progress messages instead of
//! one per cycle. For a bounded run the cadence is every 10% of the total
//! duration; for an unbounded run it is every 5 minutes of wall time. Both
//! use the same marker-comparison technique so the cadence is independent
//! of the refresh rate. The reporter is purely observational: it never
//! affects control flow or stored data.

use std::time::Duration;

/// Five-minute window used for unbounded runs.
const UNBOUNDED_WINDOW_SECS: u64 = 300;

/// Derives progress messages from elapsed time and cycle count.
pub struct ProgressReporter {
    sampling_time: Option<Duration>,
    marker: u64,
}

impl ProgressReporter {
    /// Creates a reporter; `sampling_time` decides bounded vs unbounded
    /// cadence.
    pub fn new(sampling_time: Option<Duration>) -> Self {
        Self {
            sampling_time,
            marker: 0,
        }
    }

    /// Returns a message the first time a new decile (bounded) or 5-minute
    /// window (unbounded) is crossed, otherwise `None`.
    pub fn update(&mut self, elapsed: Duration, cycles: u64) -> Option<String> {
        match self.sampling_time {
            Some(total) => {
                let ratio = elapsed.as_secs_f64() / total.as_secs_f64();
                // Integer millisecond arithmetic; float division truncates
                // deciles one short near exact crossings.
                let decile = (10 * elapsed.as_millis() / total.as_millis().max(1)) as u64;
                if decile > self.marker {
                    self.marker = decile;
                    let percent = (100.0 * ratio).min(100.0);
                    Some(format!(
                        "DAQ running for {} ({:.0}%, {} cycles)",
                        format_hms(elapsed),
                        percent,
                        cycles
                    ))
                } else {
                    None
                }
            }
            None => {
                let window = elapsed.as_secs() / UNBOUNDED_WINDOW_SECS;
                if window > self.marker {
                    self.marker = window;
                    Some(format!(
                        "DAQ running for {} ({} cycles)",
                        format_hms(elapsed),
                        cycles
                    ))
                } else {
                    None
                }
            }
        }
    }
}

/// Formats a duration as `H:MM:SS`.
fn format_hms(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
