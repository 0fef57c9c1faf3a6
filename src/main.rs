//! CLI entry point for slowdaq.
//!
//! Wires the components together: parse the command line, load and override
//! the configuration, build the channel registry, open the output file,
//! install the signal handlers and hand control to the scheduler. The
//! process exits successfully on a clean stop (duration elapsed or signal)
//! and with a failure status when a channel exhausts its retries.

use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use slowdaq::config::Settings;
use slowdaq::recorder::CsvRecorder;
use slowdaq::registry;
use slowdaq::scheduler::{RetryPolicy, Scheduler};
use slowdaq::shutdown::{self, ShutdownToken};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "slowdaq")]
#[command(about = "Continuous slow-control data acquisition logger", long_about = None)]
struct Cli {
    /// Sets the config file
    #[arg(long)]
    config: Option<String>,

    /// Sets the output file name
    #[arg(long)]
    outfile: Option<PathBuf>,

    /// Sets the amount of time the DAQ runs for, in seconds
    #[arg(long)]
    sampling: Option<f64>,

    /// Sets the pause between acquisition cycles, in seconds
    #[arg(long)]
    refresh: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut settings = Settings::new(cli.config.as_deref())?;
    settings.apply_overrides(cli.sampling, cli.refresh)?;
    settings.validate()?;
    info!(
        "Running DAQ with configuration '{}'",
        cli.config.as_deref().unwrap_or("config/default")
    );

    let channels = registry::build_channels(&settings.measurements)?;

    let mut headers = Vec::with_capacity(1 + channels.len());
    headers.push("time".to_string());
    headers.extend(channels.iter().map(|c| c.header()));

    let output_path = cli.outfile.unwrap_or_else(|| settings.output_path());
    let recorder = CsvRecorder::create(&output_path, &headers)?;
    info!("Created DAQ output file '{}'", output_path.display());

    let token = ShutdownToken::new();
    shutdown::install_signal_handlers(&token)?;

    let scheduler = Scheduler::new(
        channels,
        recorder,
        RetryPolicy::default(),
        settings.sampling_time,
        settings.refresh_rate,
        token,
    );

    match scheduler.run().await {
        Ok(_outcome) => Ok(()),
        Err(err) => {
            error!("DAQ aborted: {err}");
            std::process::exit(1);
        }
    }
}
