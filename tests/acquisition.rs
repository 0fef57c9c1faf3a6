//! End-to-end acquisition scenarios against the real CSV sink.
//!
//! Durations are scaled down to milliseconds so the suite stays fast; the
//! cadence logic only ever sees `Duration`s and does not care.

use async_trait::async_trait;
use slowdaq::channel::Channel;
use slowdaq::config::Settings;
use slowdaq::error::{AppResult, DaqError};
use slowdaq::instrument::sim::VirtualInstrument;
use slowdaq::instrument::{Instrument, Quantity};
use slowdaq::recorder::CsvRecorder;
use slowdaq::registry;
use slowdaq::scheduler::{RetryPolicy, RunOutcome, Scheduler};
use slowdaq::shutdown::ShutdownToken;
use std::path::Path;
use std::time::Duration;

/// Fails a fixed number of times before every successful read.
struct FlakyInstrument {
    fails_per_read: u32,
    failed: u32,
    value: f64,
}

#[async_trait]
impl Instrument for FlakyInstrument {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn measure(&mut self, _quantity: Quantity) -> AppResult<f64> {
        if self.failed < self.fails_per_read {
            self.failed += 1;
            Err(DaqError::Read("simulated glitch".into()))
        } else {
            self.failed = 0;
            Ok(self.value)
        }
    }
}

/// Succeeds for a fixed number of reads, then fails forever.
struct DyingInstrument {
    reads_before_death: u32,
    reads: u32,
}

#[async_trait]
impl Instrument for DyingInstrument {
    fn name(&self) -> &str {
        "dying"
    }

    async fn measure(&mut self, _quantity: Quantity) -> AppResult<f64> {
        if self.reads < self.reads_before_death {
            self.reads += 1;
            Ok(1.0)
        } else {
            Err(DaqError::Read("device gone".into()))
        }
    }
}

fn virtual_channel(name: &str, value: f64) -> Channel {
    Channel::new(
        Box::new(VirtualInstrument::new(name, value, 0.0)),
        Quantity::Virtual,
        1.0,
        name,
        "V",
    )
}

fn recorder_for(path: &Path, channels: &[Channel]) -> CsvRecorder {
    let mut headers = vec!["time".to_string()];
    headers.extend(channels.iter().map(Channel::header));
    CsvRecorder::create(path, &headers).expect("recorder creation")
}

/// Parses the output file into (header fields, data rows).
fn read_output(path: &Path) -> (Vec<String>, Vec<Vec<f64>>) {
    let content = std::fs::read_to_string(path).expect("output readable");
    let mut lines = content.lines();
    let header: Vec<String> = lines
        .next()
        .expect("header present")
        .split(',')
        .map(str::to_string)
        .collect();
    let rows: Vec<Vec<f64>> = lines
        .map(|line| {
            line.split(',')
                .map(|field| field.parse::<f64>().expect("numeric field"))
                .collect()
        })
        .collect();
    (header, rows)
}

fn ms(n: u64) -> Option<Duration> {
    Some(Duration::from_millis(n))
}

// Scenario A: bounded run over a constant virtual channel.
#[tokio::test]
async fn scenario_a_constant_channel_bounded_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("a.csv");
    let channels = vec![virtual_channel("reference", 5.0)];
    let recorder = recorder_for(&path, &channels);

    let scheduler = Scheduler::new(
        channels,
        recorder,
        RetryPolicy::default(),
        ms(200),
        ms(20),
        ShutdownToken::new(),
    );
    let outcome = scheduler.run().await.expect("clean run");
    assert_eq!(outcome, RunOutcome::DurationElapsed);

    let (header, rows) = read_output(&path);
    assert_eq!(header, ["time", "reference [V]"]);
    // ~10 cycles at a 20 ms cadence over 200 ms; allow scheduling slack.
    assert!(
        (5..=15).contains(&rows.len()),
        "unexpected row count {}",
        rows.len()
    );
    for row in &rows {
        assert_eq!(row.len(), 2);
        assert_eq!(row[1], 5.0);
    }
    // Elapsed starts near zero and never decreases.
    assert!(rows[0][0] < 0.05, "first elapsed was {}", rows[0][0]);
    for pair in rows.windows(2) {
        assert!(pair[1][0] >= pair[0][0]);
    }
}

// Scenario B: transient failures below the ceiling are absorbed.
#[tokio::test]
async fn scenario_b_retries_are_absorbed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("b.csv");
    let channels = vec![Channel::new(
        Box::new(FlakyInstrument {
            fails_per_read: 3,
            failed: 0,
            value: 5.0,
        }),
        Quantity::Virtual,
        1.0,
        "reference",
        "V",
    )];
    let recorder = recorder_for(&path, &channels);

    let scheduler = Scheduler::new(
        channels,
        recorder,
        RetryPolicy::default(),
        ms(200),
        ms(20),
        ShutdownToken::new(),
    );
    let outcome = scheduler.run().await.expect("retries absorbed");
    assert_eq!(outcome, RunOutcome::DurationElapsed);

    let (_, rows) = read_output(&path);
    assert!(!rows.is_empty());
    for row in &rows {
        assert_eq!(row[1], 5.0);
    }
}

// Scenario C: five consecutive failures abort the run with a failure, but
// the file keeps every row written before the failing cycle.
#[tokio::test]
async fn scenario_c_retry_exhaustion_aborts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("c.csv");
    let channels = vec![Channel::new(
        Box::new(DyingInstrument {
            reads_before_death: 3,
            reads: 0,
        }),
        Quantity::Virtual,
        1.0,
        "dying",
        "V",
    )];
    let recorder = recorder_for(&path, &channels);

    let scheduler = Scheduler::new(
        channels,
        recorder,
        RetryPolicy::default(),
        ms(1000),
        ms(10),
        ShutdownToken::new(),
    );
    let err = scheduler.run().await.expect_err("must abort");
    assert!(matches!(err, DaqError::RetryExhausted { .. }));

    let (header, rows) = read_output(&path);
    assert_eq!(header.len(), 2);
    assert_eq!(rows.len(), 3, "only the successful cycles are on disk");
    for row in &rows {
        assert_eq!(row.len(), 2, "no partial row may survive");
    }
}

// Scenario D: unbounded run stopped by an external request.
#[tokio::test]
async fn scenario_d_external_stop_on_unbounded_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("d.csv");
    let channels = vec![virtual_channel("reference", 5.0)];
    let recorder = recorder_for(&path, &channels);

    let token = ShutdownToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(70)).await;
        trigger.trigger();
    });

    let scheduler = Scheduler::new(
        channels,
        recorder,
        RetryPolicy::default(),
        None,
        ms(20),
        token,
    );
    let outcome = scheduler.run().await.expect("clean stop");
    assert_eq!(outcome, RunOutcome::StopRequested);

    let (header, rows) = read_output(&path);
    assert_eq!(header, ["time", "reference [V]"]);
    assert!(!rows.is_empty());
    // Every row on disk is whole.
    for row in &rows {
        assert_eq!(row.len(), 2);
    }
}

// Column order in the file equals the configured measurement order.
#[tokio::test]
async fn header_order_follows_configuration_order() {
    let settings: Settings = toml::from_str(
        r#"
        sampling_time = "100ms"
        refresh_rate = "20ms"
        output_name = "ordered"

        [[measurements]]
        instrument = "virtual"
        quantity = "virtual"
        protocol = "virtual"
        device = "sim0"
        value = 1.0
        name = "first"
        unit = "V"

        [[measurements]]
        instrument = "virtual"
        quantity = "virtual"
        protocol = "virtual"
        device = "sim1"
        value = 2.0
        name = "second"
        unit = "K"

        [[measurements]]
        instrument = "virtual"
        quantity = "virtual"
        protocol = "virtual"
        device = "sim2"
        value = 3.0
        name = "third"
        unit = "nA"
        "#,
    )
    .expect("valid settings");

    let channels = registry::build_channels(&settings.measurements).expect("registry builds");
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ordered.csv");
    let recorder = recorder_for(&path, &channels);

    let scheduler = Scheduler::new(
        channels,
        recorder,
        RetryPolicy::default(),
        settings.sampling_time,
        settings.refresh_rate,
        ShutdownToken::new(),
    );
    scheduler.run().await.expect("clean run");

    let (header, rows) = read_output(&path);
    assert_eq!(header, ["time", "first [V]", "second [K]", "third [nA]"]);
    for row in &rows {
        assert_eq!(&row[1..], [1.0, 2.0, 3.0]);
    }
}

// A stop requested before the first cycle leaves a header-only file.
#[tokio::test]
async fn stop_before_first_cycle_leaves_header_only_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("empty.csv");
    let channels = vec![virtual_channel("reference", 5.0)];
    let recorder = recorder_for(&path, &channels);

    let token = ShutdownToken::new();
    token.trigger();

    let scheduler = Scheduler::new(
        channels,
        recorder,
        RetryPolicy::default(),
        None,
        None,
        token,
    );
    let outcome = scheduler.run().await.expect("clean stop");
    assert_eq!(outcome, RunOutcome::StopRequested);

    let (header, rows) = read_output(&path);
    assert_eq!(header, ["time", "reference [V]"]);
    assert!(rows.is_empty());
}
