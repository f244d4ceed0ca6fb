//! Sentinel configuration. Loaded from JSON; every section has defaults so a
//! missing file yields a runnable setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    /// Directory holding the capture and prediction tables
    pub data_dir: PathBuf,
    /// Packet capture parameters
    pub capture: CaptureConfig,
    /// Trained model + scaler locations
    pub artifact: ArtifactConfig,
    pub scoring: ScoringConfig,
    /// Decision thresholds and override rule
    pub decision: DecisionConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Interface name; `None` picks the default capture device
    pub device: Option<String>,
    /// Capture window (seconds)
    pub duration_secs: u64,
    pub promiscuous: bool,
    pub snaplen: i32,
    /// Read timeout; bounds how long an interrupt can go unobserved
    pub read_timeout_ms: i32,
    /// Replay a pcap file instead of a live interface
    pub pcap_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// `.json` decision tree or `.onnx` classifier
    pub model_path: PathBuf,
    pub scaler_path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Drop records carrying no payload in either direction before scoring
    pub skip_empty_payloads: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Probability at or above which a record is an intrusion
    pub intrusion_threshold: f64,
    /// Probability at or above which a record is uncertain
    pub uncertain_threshold: f64,
    /// One-way packets below this many source bytes are forced to normal
    /// unless the model reaches `intrusion_threshold`
    pub override_max_src_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            capture: CaptureConfig::default(),
            artifact: ArtifactConfig::default(),
            scoring: ScoringConfig::default(),
            decision: DecisionConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            duration_secs: 10,
            promiscuous: true,
            snaplen: 65535,
            read_timeout_ms: 250,
            pcap_file: None,
        }
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("data/decision_tree_model.json"),
            scaler_path: PathBuf::from("data/scaler.json"),
        }
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            intrusion_threshold: 0.999,
            uncertain_threshold: 0.85,
            override_max_src_bytes: 500,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl SentinelConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(data) => match serde_json::from_str::<SentinelConfig>(&data) {
                    Ok(c) => return c,
                    Err(e) => {
                        eprintln!("ignoring invalid config {}: {}", path.display(), e)
                    }
                },
                Err(e) => eprintln!("cannot read config {}: {}", path.display(), e),
            }
        }
        Self::default()
    }
}
