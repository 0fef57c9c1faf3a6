//! Cooperative shutdown handling.
//!
//! A single cancellation token is created at startup and threaded into both
//! the signal installer and the scheduler. The signal task does nothing but
//! set the flag — no I/O, no cleanup — and the loop observes it between
//! cycles, so an in-flight read is never preempted.

use crate::error::AppResult;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable stop flag shared between the signal path and the loop.
///
/// The flag is monotonic: once set it stays set, and setting it again is a
/// no-op.
#[derive(Clone, Debug, Default)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
}

impl ShutdownToken {
    /// Creates a token in the "running" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop. Idempotent.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Installs handlers for SIGINT and SIGTERM that trigger the token.
///
/// The spawned task stays alive for the whole run so repeated signals are
/// absorbed instead of falling back to the default (killing) disposition.
pub fn install_signal_handlers(token: &ShutdownToken) -> AppResult<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let token = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = interrupt.recv() => {}
                    _ = terminate.recv() => {}
                }
                info!("Termination signal received, stopping after the current cycle");
                token.trigger();
            }
        });
    }
    #[cfg(not(unix))]
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, stopping after the current cycle");
                token.trigger();
            }
        });
    }
    Ok(())
}
