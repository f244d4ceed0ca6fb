use clap::{Args as ClapArgs, Parser, Subcommand};
use packet_sentinel::SentinelConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "packet-sentinel")]
#[command(about = "Capture packets for a bounded window, score them and flag intrusions")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file
    #[arg(short, long, env = "SENTINEL_CONFIG_PATH", default_value = "config.json")]
    pub config: PathBuf,

    /// Verbose logging (debug level)
    #[arg(short, long)]
    pub verbose: bool,
}

/// Overrides for the capture section of the configuration.
#[derive(ClapArgs, Debug, Default)]
pub struct CaptureArgs {
    /// Capture window in seconds
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Interface to capture on
    #[arg(short = 'i', long)]
    pub device: Option<String>,

    /// Read packets from a pcap file instead of an interface
    #[arg(long)]
    pub pcap: Option<PathBuf>,
}

impl CaptureArgs {
    pub fn apply(&self, config: &mut SentinelConfig) {
        if let Some(secs) = self.duration {
            config.capture.duration_secs = secs;
        }
        if let Some(device) = &self.device {
            config.capture.device = Some(device.clone());
        }
        if let Some(pcap) = &self.pcap {
            config.capture.pcap_file = Some(pcap.clone());
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Capture, classify and report one cycle
    Run {
        #[command(flatten)]
        capture: CaptureArgs,
    },

    /// Capture only and write the raw-capture table
    Capture {
        #[command(flatten)]
        capture: CaptureArgs,
    },

    /// Classify the capture table already on disk
    Classify,

    /// Show the most recent classification as an alert
    Latest,

    /// Show every classification as alerts, one JSON object per line
    Logs,

    /// List capture devices
    Devices,
}
