//! CSV-backed store. Every table is written to a temp file in the data
//! directory and renamed into place, so readers see either the previous
//! table or the complete new one.

use super::RecordSink;
use crate::decision::{ClassificationResult, PredictedClass};
use crate::error::{PipelineError, Result};
use crate::features::{schema, PacketRecord};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub const CAPTURE_FILE: &str = "live_data.csv";
pub const RESULTS_FILE: &str = "live_predictions.csv";

const PROB_COLUMN: &str = "intrusion_prob";
const CLASS_COLUMN: &str = "predicted_class";

#[derive(Deserialize)]
struct ScoreColumns {
    intrusion_prob: f64,
    predicted_class: PredictedClass,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

fn remove_if_present(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl ArtifactStore {
    /// Open (creating if needed) the data directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn capture_path(&self) -> PathBuf {
        self.dir.join(CAPTURE_FILE)
    }

    pub fn results_path(&self) -> PathBuf {
        self.dir.join(RESULTS_FILE)
    }

    /// Remove tables left by an earlier cycle so they cannot pass for fresh output.
    pub fn clear_stale(&self) -> Result<()> {
        for path in [self.capture_path(), self.results_path()] {
            if remove_if_present(&path)? {
                debug!(path = %path.display(), "removed stale table");
            }
        }
        Ok(())
    }

    pub fn clear_results(&self) -> Result<()> {
        remove_if_present(&self.results_path()).map(|_| ())
    }

    fn write_atomic<F>(&self, target: &Path, fill: F) -> Result<PathBuf>
    where
        F: FnOnce(&mut csv::Writer<&File>) -> Result<()>,
    {
        let tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file());
            fill(&mut writer)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(target)
            .map_err(|e| PipelineError::Storage(format!("{}: {}", target.display(), e.error)))?;
        Ok(target.to_path_buf())
    }

    /// Load the raw-capture table; `None` if no capture has been flushed.
    pub fn read_capture(&self) -> Result<Option<Vec<PacketRecord>>> {
        let path = self.capture_path();
        if !path.exists() {
            return Ok(None);
        }
        let mut reader = csv::Reader::from_path(&path)?;
        let records = reader
            .deserialize::<PacketRecord>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Some(records))
    }

    /// Write the capture table extended with probability and class columns.
    pub fn write_results(&self, results: &[ClassificationResult]) -> Result<PathBuf> {
        let path = self.results_path();
        self.write_atomic(&path, |w| {
            let header = schema::column_names().chain([PROB_COLUMN, CLASS_COLUMN]);
            w.write_record(header)?;
            for r in results {
                let mut row: Vec<String> = r
                    .record
                    .values()
                    .into_iter()
                    .map(|(_, v)| v.to_string())
                    .collect();
                row.push(r.intrusion_probability.to_string());
                row.push(r.predicted_class.code().to_string());
                w.write_record(&row)?;
            }
            Ok(())
        })
    }

    /// Load the results table; `None` until a cycle has produced one.
    pub fn read_results(&self) -> Result<Option<Vec<ClassificationResult>>> {
        let path = self.results_path();
        if !path.exists() {
            return Ok(None);
        }
        let mut reader = csv::Reader::from_path(&path)?;
        let headers = reader.headers()?.clone();
        let mut out = Vec::new();
        for row in reader.records() {
            let row = row?;
            let record: PacketRecord = row.deserialize(Some(&headers))?;
            let scores: ScoreColumns = row.deserialize(Some(&headers))?;
            out.push(ClassificationResult {
                record,
                intrusion_probability: scores.intrusion_prob,
                predicted_class: scores.predicted_class,
            });
        }
        Ok(Some(out))
    }

    /// When the results table was last replaced.
    pub fn results_modified(&self) -> Result<Option<DateTime<Utc>>> {
        match std::fs::metadata(self.results_path()) {
            Ok(meta) => Ok(Some(meta.modified()?.into())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl RecordSink for ArtifactStore {
    fn persist_capture(&self, records: &[PacketRecord]) -> Result<PathBuf> {
        let path = self.capture_path();
        self.write_atomic(&path, |w| {
            for r in records {
                w.serialize(r)?;
            }
            Ok(())
        })
    }
}
