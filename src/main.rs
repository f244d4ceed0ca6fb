//! packet-sentinel entrypoint. Every command runs once and exits; Ctrl+C ends
//! an active capture early and the records gathered so far are still flushed.

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Args, Command};
use packet_sentinel::{
    capture::{CancelToken, CaptureSession, PcapSource},
    logging::StructuredLogger,
    model::ClassifierAdapter,
    pipeline::{self, Pipeline, TriggerStatus},
    storage::ArtifactStore,
    SentinelConfig,
};
use std::time::Duration;
use tracing::{info, warn};

fn cancel_on_ctrlc() -> CancelToken {
    let cancel = CancelToken::new();
    let handle = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handle.cancel()) {
        warn!(error = %e, "could not install Ctrl+C handler");
    }
    cancel
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    StructuredLogger::emit_json(value, &mut std::io::stdout().lock())?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = SentinelConfig::load(&args.config);
    StructuredLogger::init(&config.log, args.verbose).context("installing log subscriber")?;

    info!(config = %args.config.display(), data_dir = %config.data_dir.display(), "packet-sentinel starting");

    match args.command {
        Command::Run { capture } => {
            capture.apply(&mut config);
            let report = pipeline::trigger(&config, &cancel_on_ctrlc());
            print_json(&report)?;
            if report.status == TriggerStatus::Failed {
                bail!("cycle failed: {}", report.message);
            }
        }
        Command::Capture { capture } => {
            capture.apply(&mut config);
            let store = ArtifactStore::open(&config.data_dir)?;
            store.clear_stale()?;
            let mut source = PcapSource::open(&config.capture)?;
            let session = CaptureSession::new(Duration::from_secs(config.capture.duration_secs));
            let flushed = session
                .run(&mut source, &cancel_on_ctrlc())?
                .flush(&store)?;
            match &flushed.path {
                Some(path) => println!(
                    "{} records from {} packets written to {}",
                    flushed.records.len(),
                    flushed.packets_seen,
                    path.display()
                ),
                None => println!("No packets captured."),
            }
        }
        Command::Classify => {
            let pipeline = Pipeline::from_config(&config)?;
            let adapter = ClassifierAdapter::load(&config.artifact)
                .context("loading classifier artifact")?;
            match pipeline.classify_capture(&adapter)? {
                Some(classification) => print_json(&classification)?,
                None if pipeline.store().capture_path().exists() => {
                    println!("No records with payload to classify.")
                }
                None => bail!(
                    "capture table {} not found; run a capture first",
                    pipeline.store().capture_path().display()
                ),
            }
        }
        Command::Latest => {
            let store = ArtifactStore::open(&config.data_dir)?;
            match pipeline::latest_alert(&store)? {
                Some(alert) => print_json(&alert)?,
                None => println!("No predictions available yet. Run detection first."),
            }
        }
        Command::Logs => {
            let store = ArtifactStore::open(&config.data_dir)?;
            for alert in pipeline::all_alerts(&store)?.unwrap_or_default() {
                print_json(&alert)?;
            }
        }
        Command::Devices => {
            for name in PcapSource::list_devices()? {
                println!("{}", name);
            }
        }
    }

    Ok(())
}
