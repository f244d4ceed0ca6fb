//! ONNX Runtime classifier. Input: `[N, n_features]` f32. Output: the
//! probability tensor, either `[N, 2]` (class-1 column used) or `[N]`.
//! A missing or unreadable model is an artifact error, never a silent no-op.

use super::ProbabilityModel;
use crate::error::{PipelineError, Result};
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Output name converters give the probability tensor of a classifier.
const PROBABILITY_OUTPUT: &str = "probabilities";

pub struct OnnxModel {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxModel {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::artifact_load(path, "model file not found"));
        }

        let session = Session::builder()
            .map_err(|e| PipelineError::artifact_load(path, e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| PipelineError::artifact_load(path, e))?
            .commit_from_file(path)
            .map_err(|e| PipelineError::artifact_load(path, e))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| PipelineError::artifact_load(path, "model declares no inputs"))?;

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name == PROBABILITY_OUTPUT)
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .ok_or_else(|| PipelineError::artifact_load(path, "model declares no outputs"))?;

        info!(path = %path.display(), input = %input_name, output = %output_name, "onnx model loaded");

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }
}

/// Reduce a flat probability buffer to one class-1 probability per row.
fn positive_column(values: &[f32], rows: usize) -> Result<Vec<f64>> {
    if rows == 0 {
        return Ok(Vec::new());
    }
    if values.len() == rows {
        Ok(values.iter().copied().map(f64::from).collect())
    } else if values.len() == rows * 2 {
        Ok(values.chunks_exact(2).map(|pair| f64::from(pair[1])).collect())
    } else {
        Err(PipelineError::Inference(format!(
            "model returned {} values for {} rows",
            values.len(),
            rows
        )))
    }
}

impl ProbabilityModel for OnnxModel {
    fn kind(&self) -> &'static str {
        "onnx"
    }

    fn input_width(&self) -> Option<usize> {
        None
    }

    fn predict_proba(&self, batch: &Array2<f32>) -> Result<Vec<f64>> {
        let rows = batch.nrows();
        let input = Tensor::from_array(batch.to_owned())
            .map_err(|e| PipelineError::Inference(format!("tensor error: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PipelineError::Inference("ONNX session lock poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| PipelineError::Inference(e.to_string()))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            PipelineError::Inference(format!("missing output {}", self.output_name))
        })?;
        let (_, values) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::Inference(format!("extract error: {}", e)))?;

        positive_column(values, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_an_artifact_error() {
        let err = OnnxModel::load(Path::new("nonexistent.onnx")).err().unwrap();
        assert!(matches!(err, PipelineError::ArtifactLoad { .. }));
    }

    #[test]
    fn picks_positive_class_column() {
        assert_eq!(
            positive_column(&[0.9, 0.1, 0.2, 0.8], 2).unwrap(),
            vec![f64::from(0.1f32), f64::from(0.8f32)]
        );
        assert_eq!(positive_column(&[0.25, 0.75], 2).unwrap(), vec![0.25, 0.75]);
        assert!(positive_column(&[0.3, 0.7, 0.1], 2).is_err());
        assert!(positive_column(&[], 0).unwrap().is_empty());
    }
}
