//! Fitted standard scaler: per-feature mean and scale, plus the feature list
//! the classifier was trained on.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureScaler {
    /// Expected columns, in model input order
    pub feature_names_in: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    /// Category → code tables fixed at training time. Columns without a
    /// table are factorized per scoring batch.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub categories: BTreeMap<String, Vec<String>>,
}

impl FeatureScaler {
    pub fn load(path: &Path) -> Result<Self> {
        let data =
            std::fs::read_to_string(path).map_err(|e| PipelineError::artifact_load(path, e))?;
        let scaler: FeatureScaler =
            serde_json::from_str(&data).map_err(|e| PipelineError::artifact_load(path, e))?;
        scaler
            .validate()
            .map_err(|e| PipelineError::artifact_load(path, e))?;
        Ok(scaler)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let n = self.feature_names_in.len();
        if n == 0 {
            return Err("scaler has no features".into());
        }
        if self.mean.len() != n || self.scale.len() != n {
            return Err(format!(
                "scaler shape mismatch: {} names, {} means, {} scales",
                n,
                self.mean.len(),
                self.scale.len()
            ));
        }
        let mut seen = HashSet::new();
        for name in &self.feature_names_in {
            if !seen.insert(name.as_str()) {
                return Err(format!("duplicate feature {}", name));
            }
        }
        if self.mean.iter().chain(&self.scale).any(|v| !v.is_finite()) {
            return Err("scaler holds non-finite parameters".into());
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.feature_names_in.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names_in
    }

    pub fn category_table(&self, feature: &str) -> Option<&[String]> {
        self.categories.get(feature).map(Vec::as_slice)
    }

    /// `(value - mean) / scale` for column `j`; a zero scale counts as 1.
    pub fn scale_value(&self, j: usize, value: f64) -> f64 {
        let scale = if self.scale[j] == 0.0 { 1.0 } else { self.scale[j] };
        (value - self.mean[j]) / scale
    }
}
