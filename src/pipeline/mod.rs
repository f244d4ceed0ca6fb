//! Capture → score → decide, in process.
//!
//! The capture session runs on its own thread and is handed back through
//! `join` once it has ended; scoring only starts after the capture has been
//! flushed. Results are written with an atomic replace, and stale tables are
//! removed up front, so a failed cycle never leaves output that looks fresh.

pub mod alerts;

use crate::capture::{CancelToken, CaptureSession, PacketSource, PcapSource, Termination};
use crate::config::{ScoringConfig, SentinelConfig};
use crate::decision::{BatchSummary, DecisionEngine};
use crate::error::{PipelineError, Result, Stage};
use crate::features::PacketRecord;
use crate::model::ClassifierAdapter;
use crate::storage::ArtifactStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub use alerts::{all_alerts, latest_alert, Alert, AlertKind, Severity};

/// Where a scoring pass left its output.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub results_path: PathBuf,
    pub summary: BatchSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Nothing was captured; no tables were written.
    EmptyCapture {
        termination: Termination,
        packets_seen: u64,
    },
    /// Records were captured but the payload filter removed all of them;
    /// no results table was written.
    NothingScoreable {
        termination: Termination,
        packets_seen: u64,
        capture_path: PathBuf,
    },
    Classified {
        termination: Termination,
        packets_seen: u64,
        capture_path: PathBuf,
        classification: Classification,
    },
}

pub struct Pipeline {
    store: ArtifactStore,
    engine: DecisionEngine,
    scoring: ScoringConfig,
    duration: Duration,
}

impl Pipeline {
    pub fn new(
        store: ArtifactStore,
        engine: DecisionEngine,
        scoring: ScoringConfig,
        duration: Duration,
    ) -> Self {
        Self {
            store,
            engine,
            scoring,
            duration,
        }
    }

    pub fn from_config(config: &SentinelConfig) -> Result<Self> {
        Ok(Self::new(
            ArtifactStore::open(&config.data_dir)?,
            DecisionEngine::new(config.decision.clone()),
            config.scoring.clone(),
            Duration::from_secs(config.capture.duration_secs),
        ))
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// One full cycle over `source`. The session moves onto a `capture`
    /// thread and its completed records move back on join.
    pub fn run_cycle<S>(
        &self,
        adapter: &ClassifierAdapter,
        source: S,
        cancel: &CancelToken,
    ) -> Result<CycleOutcome>
    where
        S: PacketSource + Send + 'static,
    {
        self.store.clear_stale()?;

        let session = CaptureSession::new(self.duration);
        let token = cancel.clone();
        let handle = thread::Builder::new()
            .name("capture".into())
            .spawn(move || {
                let mut source = source;
                session.run(&mut source, &token)
            })?;
        let completed = handle
            .join()
            .map_err(|_| PipelineError::CaptureRead("capture thread panicked".into()))??;

        let flushed = completed.flush(&self.store)?;
        let capture_path = match flushed.path {
            Some(path) => path,
            None => {
                return Ok(CycleOutcome::EmptyCapture {
                    termination: flushed.termination,
                    packets_seen: flushed.packets_seen,
                })
            }
        };

        Ok(match self.score_and_store(adapter, flushed.records)? {
            Some(classification) => CycleOutcome::Classified {
                termination: flushed.termination,
                packets_seen: flushed.packets_seen,
                capture_path,
                classification,
            },
            None => CycleOutcome::NothingScoreable {
                termination: flushed.termination,
                packets_seen: flushed.packets_seen,
                capture_path,
            },
        })
    }

    /// Score the capture table already on disk. `None` when there is no
    /// table or nothing in it survives the payload filter.
    pub fn classify_capture(&self, adapter: &ClassifierAdapter) -> Result<Option<Classification>> {
        self.store.clear_results()?;
        match self.store.read_capture()? {
            Some(records) => self.score_and_store(adapter, records),
            None => {
                info!(path = %self.store.capture_path().display(), "no capture table to classify");
                Ok(None)
            }
        }
    }

    fn score_and_store(
        &self,
        adapter: &ClassifierAdapter,
        mut records: Vec<PacketRecord>,
    ) -> Result<Option<Classification>> {
        if self.scoring.skip_empty_payloads {
            let before = records.len();
            records.retain(PacketRecord::has_payload);
            info!(dropped = before - records.len(), "skipped records without payload");
            if records.is_empty() {
                warn!(before, "no records left to score after the payload filter");
                return Ok(None);
            }
        }

        let probabilities = adapter.score(&records)?;
        let results = self.engine.classify(records, &probabilities);
        let summary = BatchSummary::from_results(&results);
        let results_path = self.store.write_results(&results)?;

        info!(
            normal = summary.normal,
            uncertain = summary.uncertain,
            intrusion = summary.intrusion,
            mean_probability = summary.mean_probability,
            verdict = %summary.verdict,
            path = %results_path.display(),
            "classification complete"
        );
        Ok(Some(Classification {
            results_path,
            summary,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    Success,
    /// Cycle ran but captured or kept nothing to score
    Empty,
    Failed,
}

/// What the trigger layer reports for one capture+classify cycle.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub status: TriggerStatus,
    /// Stage that failed, when `status` is `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<BatchSummary>,
}

fn cycle_from_config(config: &SentinelConfig, cancel: &CancelToken) -> Result<CycleOutcome> {
    let pipeline = Pipeline::from_config(config)?;
    // Nothing from an earlier cycle may survive a failure below.
    pipeline.store().clear_stale()?;
    let adapter = ClassifierAdapter::load(&config.artifact)?;
    let source = PcapSource::open(&config.capture)?;
    info!(source = source.name(), "capture source opened");
    pipeline.run_cycle(&adapter, source, cancel)
}

/// Run one cycle from configuration and report how it went.
pub fn trigger(config: &SentinelConfig, cancel: &CancelToken) -> TriggerReport {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    info!(%run_id, "capture cycle triggered");

    let mut report = TriggerReport {
        run_id,
        started_at,
        status: TriggerStatus::Failed,
        stage: None,
        message: String::new(),
        results_path: None,
        summary: None,
    };

    match cycle_from_config(config, cancel) {
        Ok(CycleOutcome::EmptyCapture { packets_seen, .. }) => {
            report.status = TriggerStatus::Empty;
            report.message = format!("no packets captured ({} seen)", packets_seen);
        }
        Ok(CycleOutcome::NothingScoreable { packets_seen, .. }) => {
            report.status = TriggerStatus::Empty;
            report.message = format!(
                "no records with payload to score ({} packets seen)",
                packets_seen
            );
        }
        Ok(CycleOutcome::Classified { classification, .. }) => {
            report.status = TriggerStatus::Success;
            report.message = classification.summary.verdict.to_string();
            report.results_path = Some(classification.results_path);
            report.summary = Some(classification.summary);
        }
        Err(e) => {
            warn!(%run_id, stage = ?e.stage(), error = %e, "capture cycle failed");
            if let Ok(store) = ArtifactStore::open(&config.data_dir) {
                if let Err(clear) = store.clear_results() {
                    warn!(error = %clear, "could not remove results after failure");
                }
            }
            report.stage = Some(e.stage());
            report.message = e.to_string();
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ReplaySource;
    use crate::config::DecisionConfig;
    use crate::features::LinkLayer;
    use crate::model::{ClassifierArtifact, DecisionTreeModel, FeatureScaler};
    use std::collections::BTreeMap;

    fn adapter() -> ClassifierAdapter {
        let tree = DecisionTreeModel {
            n_features: 1,
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![0, -2, -2],
            threshold: vec![500.0, -2.0, -2.0],
            value: vec![vec![1.0, 1.0], vec![1.0, 0.0], vec![0.0, 1.0]],
        };
        let scaler = FeatureScaler {
            feature_names_in: vec!["src_bytes".into()],
            mean: vec![0.0],
            scale: vec![1.0],
            categories: BTreeMap::new(),
        };
        ClassifierAdapter::new(ClassifierArtifact::from_parts(Box::new(tree), scaler)).unwrap()
    }

    fn pipeline(dir: &std::path::Path, scoring: ScoringConfig) -> Pipeline {
        Pipeline::new(
            ArtifactStore::open(dir).unwrap(),
            DecisionEngine::new(DecisionConfig::default()),
            scoring,
            Duration::from_secs(10),
        )
    }

    #[test]
    fn empty_source_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path(), ScoringConfig::default());
        let outcome = p
            .run_cycle(&adapter(), ReplaySource::default(), &CancelToken::new())
            .unwrap();
        assert!(matches!(
            outcome,
            CycleOutcome::EmptyCapture {
                termination: Termination::Exhausted,
                packets_seen: 0
            }
        ));
        assert!(!p.store().capture_path().exists());
        assert!(!p.store().results_path().exists());
    }

    #[test]
    fn classify_without_capture_is_not_available() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path(), ScoringConfig::default());
        assert!(p.classify_capture(&adapter()).unwrap().is_none());
    }

    #[test]
    fn skip_empty_payloads_drops_bare_headers() {
        use crate::storage::RecordSink;
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            dir.path(),
            ScoringConfig {
                skip_empty_payloads: true,
            },
        );
        let bare = PacketRecord::default();
        let loaded = PacketRecord {
            src_bytes: 900,
            ..PacketRecord::default()
        };
        p.store().persist_capture(&[bare, loaded]).unwrap();

        let c = p.classify_capture(&adapter()).unwrap().unwrap();
        assert_eq!(c.summary.total(), 1);
        assert_eq!(c.summary.intrusion, 1);
    }

    #[test]
    fn all_bare_headers_leave_no_results_table() {
        use crate::storage::RecordSink;
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            dir.path(),
            ScoringConfig {
                skip_empty_payloads: true,
            },
        );
        p.store().write_results(&[]).unwrap();
        p.store()
            .persist_capture(&[PacketRecord::default(), PacketRecord::default()])
            .unwrap();

        assert!(p.classify_capture(&adapter()).unwrap().is_none());
        assert!(!p.store().results_path().exists());
        assert!(alerts::latest_alert(p.store()).unwrap().is_none());
        assert!(alerts::all_alerts(p.store()).unwrap().is_none());
    }

    #[test]
    fn unsupported_link_frames_count_but_do_not_record() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path(), ScoringConfig::default());
        let source = ReplaySource::from_frames(
            LinkLayer::Unsupported(147),
            [(Duration::from_secs(1), vec![0u8; 40])],
        );
        let outcome = p.run_cycle(&adapter(), source, &CancelToken::new()).unwrap();
        assert!(matches!(
            outcome,
            CycleOutcome::EmptyCapture { packets_seen: 1, .. }
        ));
    }
}
