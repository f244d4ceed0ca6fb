//! Scores packet records with a loaded classifier artifact.
//!
//! Records are reindexed to the scaler's feature list (unknown columns
//! dropped, columns the schema lacks defaulted to 0.0), categoricals are
//! encoded, every column is scaled, and the model is run on the batch.

use super::{DecisionTreeModel, FeatureScaler, OnnxModel, ProbabilityModel};
use crate::config::ArtifactConfig;
use crate::error::{PipelineError, Result};
use crate::features::{schema, FeatureKind, FeatureValue, PacketRecord};
use ndarray::Array2;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Trained model plus fitted scaler, immutable once loaded.
pub struct ClassifierArtifact {
    model: Box<dyn ProbabilityModel>,
    scaler: FeatureScaler,
    model_digest: Option<String>,
}

fn file_digest(path: &Path) -> Result<String> {
    let data = std::fs::read(path).map_err(|e| PipelineError::artifact_load(path, e))?;
    let mut h = Sha256::new();
    h.update(&data);
    Ok(format!("{:x}", h.finalize()))
}

fn load_model(path: &Path) -> Result<Box<dyn ProbabilityModel>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(Box::new(DecisionTreeModel::load(path)?)),
        Some("onnx") => Ok(Box::new(OnnxModel::load(path)?)),
        _ => Err(PipelineError::artifact_load(
            path,
            "unsupported model format (expected .json or .onnx)",
        )),
    }
}

impl ClassifierArtifact {
    pub fn load(config: &ArtifactConfig) -> Result<Self> {
        let scaler = FeatureScaler::load(&config.scaler_path)?;
        let model = load_model(&config.model_path)?;
        let model_digest = file_digest(&config.model_path)?;
        let scaler_digest = file_digest(&config.scaler_path)?;

        info!(
            model = %config.model_path.display(),
            kind = model.kind(),
            model_sha256 = %model_digest,
            scaler_sha256 = %scaler_digest,
            features = scaler.n_features(),
            "classifier artifact loaded"
        );

        Ok(Self {
            model,
            scaler,
            model_digest: Some(model_digest),
        })
    }

    /// Assemble an artifact from in-memory parts (no digests).
    pub fn from_parts(model: Box<dyn ProbabilityModel>, scaler: FeatureScaler) -> Self {
        Self {
            model,
            scaler,
            model_digest: None,
        }
    }

    pub fn scaler(&self) -> &FeatureScaler {
        &self.scaler
    }

    pub fn model_kind(&self) -> &'static str {
        self.model.kind()
    }

    pub fn model_digest(&self) -> Option<&str> {
        self.model_digest.as_deref()
    }
}

pub struct ClassifierAdapter {
    artifact: ClassifierArtifact,
    /// Kind of each scaler column in the record schema; `None` = defaulted to 0.0
    columns: Vec<Option<FeatureKind>>,
}

impl ClassifierAdapter {
    pub fn load(config: &ArtifactConfig) -> Result<Self> {
        Self::new(ClassifierArtifact::load(config)?)
    }

    pub fn new(artifact: ClassifierArtifact) -> Result<Self> {
        let scaler = &artifact.scaler;
        if let Some(width) = artifact.model.input_width() {
            if width != scaler.n_features() {
                return Err(PipelineError::SchemaMismatch(format!(
                    "model takes {} features, scaler lists {}",
                    width,
                    scaler.n_features()
                )));
            }
        }

        let columns: Vec<Option<FeatureKind>> = scaler
            .feature_names()
            .iter()
            .map(|name| schema::kind_of(name))
            .collect();
        if columns.iter().all(Option::is_none) {
            return Err(PipelineError::SchemaMismatch(
                "none of the scaler's features exist in the capture schema".into(),
            ));
        }

        let missing: Vec<&str> = scaler
            .feature_names()
            .iter()
            .zip(&columns)
            .filter(|(_, kind)| kind.is_none())
            .map(|(name, _)| name.as_str())
            .collect();
        if !missing.is_empty() {
            warn!(?missing, "scaler features absent from capture schema; defaulting to 0.0");
        }

        Ok(Self { artifact, columns })
    }

    pub fn artifact(&self) -> &ClassifierArtifact {
        &self.artifact
    }

    /// Encode and scale `records` into the model's input matrix.
    pub fn prepare(&self, records: &[PacketRecord]) -> Result<Array2<f32>> {
        let scaler = &self.artifact.scaler;
        let mut batch = Array2::<f32>::zeros((records.len(), scaler.n_features()));

        for (j, (name, kind)) in scaler.feature_names().iter().zip(&self.columns).enumerate() {
            let raw = match kind {
                None => vec![0.0; records.len()],
                Some(FeatureKind::Numeric) => numeric_column(records, name)?,
                Some(FeatureKind::Categorical) => {
                    categorical_column(records, name, scaler.category_table(name))?
                }
            };
            for (i, v) in raw.into_iter().enumerate() {
                batch[[i, j]] = scaler.scale_value(j, v) as f32;
            }
        }
        Ok(batch)
    }

    /// One intrusion probability in [0, 1] per record, in record order.
    pub fn score(&self, records: &[PacketRecord]) -> Result<Vec<f64>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let batch = self.prepare(records)?;
        let probs = self.artifact.model.predict_proba(&batch)?;

        if probs.len() != records.len() {
            return Err(PipelineError::Inference(format!(
                "{} probabilities for {} records",
                probs.len(),
                records.len()
            )));
        }
        if let Some(i) = probs.iter().position(|p| !p.is_finite()) {
            return Err(PipelineError::Inference(format!(
                "non-finite probability for record {}",
                i
            )));
        }

        debug!(records = records.len(), model = self.artifact.model.kind(), "batch scored");
        Ok(probs.into_iter().map(|p| p.clamp(0.0, 1.0)).collect())
    }
}

fn column_value(record: &PacketRecord, name: &str) -> Result<FeatureValue> {
    record
        .feature(name)
        .ok_or_else(|| PipelineError::SchemaMismatch(format!("record has no feature {}", name)))
}

fn numeric_column(records: &[PacketRecord], name: &str) -> Result<Vec<f64>> {
    records
        .iter()
        .map(|r| match column_value(r, name)? {
            FeatureValue::Numeric(v) => Ok(v),
            FeatureValue::Categorical(_) => Err(PipelineError::SchemaMismatch(format!(
                "{} is categorical, expected numeric",
                name
            ))),
        })
        .collect()
}

/// Codes come from the persisted table when there is one (unknown -> -1),
/// otherwise from first appearance within this batch.
fn categorical_column(
    records: &[PacketRecord],
    name: &str,
    table: Option<&[String]>,
) -> Result<Vec<f64>> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    records
        .iter()
        .map(|r| {
            let label = column_value(r, name)?.to_string();
            let code = match table {
                Some(t) => t
                    .iter()
                    .position(|c| *c == label)
                    .map_or(-1.0, |p| p as f64),
                None => {
                    let next = seen.len();
                    *seen.entry(label).or_insert(next) as f64
                }
            };
            Ok(code)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{ConnFlag, Protocol};
    use std::collections::BTreeMap;

    fn scaler(names: &[&str]) -> FeatureScaler {
        FeatureScaler {
            feature_names_in: names.iter().map(|s| s.to_string()).collect(),
            mean: vec![0.0; names.len()],
            scale: vec![1.0; names.len()],
            categories: BTreeMap::new(),
        }
    }

    /// Intrusion leaf when feature 0 > 500.
    fn bytes_tree(n_features: usize) -> DecisionTreeModel {
        DecisionTreeModel {
            n_features,
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![0, -2, -2],
            threshold: vec![500.0, -2.0, -2.0],
            value: vec![vec![5.0, 5.0], vec![4.0, 1.0], vec![0.0, 5.0]],
        }
    }

    fn record(src_bytes: u64, flag: ConnFlag) -> PacketRecord {
        PacketRecord {
            protocol_type: Protocol::Tcp,
            service: Protocol::Tcp,
            flag,
            src_bytes,
            ..PacketRecord::default()
        }
    }

    fn adapter(names: &[&str]) -> ClassifierAdapter {
        let artifact =
            ClassifierArtifact::from_parts(Box::new(bytes_tree(names.len())), scaler(names));
        ClassifierAdapter::new(artifact).unwrap()
    }

    #[test]
    fn scores_in_order_and_is_idempotent() {
        let a = adapter(&["src_bytes", "flag", "not_in_schema"]);
        let batch = vec![record(1000, ConnFlag::S1), record(10, ConnFlag::S0)];
        let first = a.score(&batch).unwrap();
        assert_eq!(first, vec![1.0, 0.2]);
        assert_eq!(a.score(&batch).unwrap(), first);
        assert!(a.score(&[]).unwrap().is_empty());
    }

    #[test]
    fn factorizes_categoricals_by_first_appearance() {
        let a = adapter(&["src_bytes", "flag", "not_in_schema"]);
        let batch = vec![
            record(1, ConnFlag::SF),
            record(1, ConnFlag::S0),
            record(1, ConnFlag::SF),
        ];
        let m = a.prepare(&batch).unwrap();
        assert_eq!(m.column(1).to_vec(), vec![0.0, 1.0, 0.0]);
        assert_eq!(m.column(2).to_vec(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn persisted_categories_override_factorization() {
        let mut s = scaler(&["src_bytes", "flag"]);
        s.categories
            .insert("flag".into(), vec!["S0".into(), "SF".into()]);
        s.mean[1] = 1.0;
        let a = ClassifierAdapter::new(ClassifierArtifact::from_parts(
            Box::new(bytes_tree(2)),
            s,
        ))
        .unwrap();
        let m = a
            .prepare(&[record(1, ConnFlag::SF), record(1, ConnFlag::REJ)])
            .unwrap();
        assert_eq!(m.column(1).to_vec(), vec![0.0, -2.0]);
    }

    #[test]
    fn width_and_overlap_mismatches_are_schema_errors() {
        let artifact =
            ClassifierArtifact::from_parts(Box::new(bytes_tree(3)), scaler(&["src_bytes"]));
        assert!(matches!(
            ClassifierAdapter::new(artifact),
            Err(PipelineError::SchemaMismatch(_))
        ));

        let artifact =
            ClassifierArtifact::from_parts(Box::new(bytes_tree(1)), scaler(&["bogus"]));
        assert!(matches!(
            ClassifierAdapter::new(artifact),
            Err(PipelineError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn load_picks_format_by_extension_and_digests() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        let scaler_path = dir.path().join("scaler.json");
        std::fs::write(&model_path, serde_json::to_string(&bytes_tree(1)).unwrap()).unwrap();
        std::fs::write(&scaler_path, serde_json::to_string(&scaler(&["src_bytes"])).unwrap())
            .unwrap();

        let config = ArtifactConfig {
            model_path: model_path.clone(),
            scaler_path: scaler_path.clone(),
        };
        let a = ClassifierAdapter::load(&config).unwrap();
        assert_eq!(a.artifact().model_kind(), "decision_tree");
        assert_eq!(a.artifact().model_digest().unwrap().len(), 64);

        let pickle = dir.path().join("model.pkl");
        std::fs::write(&pickle, b"\x80\x04").unwrap();
        let config = ArtifactConfig {
            model_path: pickle,
            scaler_path,
        };
        assert!(matches!(
            ClassifierAdapter::load(&config),
            Err(PipelineError::ArtifactLoad { .. })
        ));
    }
}
