//! The acquisition scheduler.
//!
//! One cooperative loop drives the whole run: read every channel in order
//! (with bounded per-channel retry), hand one complete row to the recorder,
//! sleep until the next cycle, report progress, and decide whether to stop.
//! There is no parallelism anywhere — the only shared state with the
//! outside world is the stop token, written by the signal task and read
//! here between cycles.
//!
//! Failure semantics: a single failed read is retried immediately, up to
//! the policy ceiling of consecutive failures for that channel within that
//! cycle. Reaching the ceiling aborts the entire run — a row must have a
//! value for every channel, so partial-channel continuation is not
//! attempted. The recorder is closed on every exit path.

use crate::channel::Channel;
use crate::error::{AppResult, DaqError};
use crate::progress::ProgressReporter;
use crate::recorder::Recorder;
use crate::shutdown::ShutdownToken;
use log::{error, info};
use std::time::{Duration, Instant};

/// Bounded immediate-retry policy for one channel within one cycle.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum consecutive failed reads tolerated before the run aborts.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// How a run ended, when it ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The configured sampling time elapsed.
    DurationElapsed,
    /// An external stop was requested.
    StopRequested,
}

/// Drives the acquisition loop until a terminal condition.
pub struct Scheduler<R: Recorder> {
    channels: Vec<Channel>,
    recorder: R,
    policy: RetryPolicy,
    sampling_time: Option<Duration>,
    refresh_rate: Option<Duration>,
    token: ShutdownToken,
}

impl<R: Recorder> Scheduler<R> {
    /// Assembles a scheduler over an ordered channel list.
    pub fn new(
        channels: Vec<Channel>,
        recorder: R,
        policy: RetryPolicy,
        sampling_time: Option<Duration>,
        refresh_rate: Option<Duration>,
        token: ShutdownToken,
    ) -> Self {
        Self {
            channels,
            recorder,
            policy,
            sampling_time,
            refresh_rate,
            token,
        }
    }

    /// Runs the loop to completion.
    ///
    /// Returns the normal outcome, or `RetryExhausted` when one channel
    /// failed too many consecutive reads; the recorder is closed either
    /// way. The stop token and the sampling deadline are only checked
    /// between cycles, so worst-case shutdown latency is one full cycle
    /// including its retry budget.
    pub async fn run(mut self) -> AppResult<RunOutcome> {
        info!("Starting DAQ...");
        match self.sampling_time {
            Some(t) => info!("DAQ sampling time: {} s", t.as_secs_f64()),
            None => info!("DAQ sampling time: unconstrained"),
        }
        match self.refresh_rate {
            Some(r) => info!("DAQ refresh rate: {} s", r.as_secs_f64()),
            None => info!("DAQ refresh rate: unthrottled"),
        }

        let start = Instant::now();
        let mut cycles: u64 = 0;
        let mut progress = ProgressReporter::new(self.sampling_time);

        let outcome = loop {
            if self.token.is_stopped() {
                break RunOutcome::StopRequested;
            }
            if let Some(total) = self.sampling_time {
                if start.elapsed() >= total {
                    break RunOutcome::DurationElapsed;
                }
            }

            if let Err(err) = self.acquire_row(start).await {
                // Close before surfacing so the file stays consistent.
                if let Err(close_err) = self.recorder.close() {
                    error!("Failed to close output after abort: {close_err}");
                }
                error!("Aborting DAQ: {err}");
                return Err(err);
            }

            if let Some(delay) = self.refresh_rate {
                tokio::time::sleep(delay).await;
            }

            cycles += 1;
            if let Some(message) = progress.update(start.elapsed(), cycles) {
                info!("{message}");
            }
        };

        self.recorder.close()?;
        match outcome {
            RunOutcome::DurationElapsed => info!("DAQ finished: sampling time elapsed"),
            RunOutcome::StopRequested => info!("DAQ finished: stop requested"),
        }
        Ok(outcome)
    }

    /// Reads every channel once (with retry) and appends one row.
    async fn acquire_row(&mut self, start: Instant) -> AppResult<()> {
        let mut readings = Vec::with_capacity(self.channels.len());
        for channel in &mut self.channels {
            let mut fails: u32 = 0;
            let value = loop {
                match channel.read().await {
                    Ok(value) => break value,
                    Err(err) => {
                        fails += 1;
                        error!("Failed to read '{}', retrying... ({err})", channel.name());
                        if fails >= self.policy.max_attempts {
                            error!(
                                "Too many consecutive failures on '{}', killing DAQ",
                                channel.name()
                            );
                            return Err(DaqError::RetryExhausted {
                                channel: channel.name().to_string(),
                                attempts: fails,
                            });
                        }
                    }
                }
            };
            readings.push(value);
        }
        self.recorder
            .append(start.elapsed().as_secs_f64(), &readings)
    }
}
