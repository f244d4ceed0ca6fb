//! Classifier artifacts and the adapter that scores packet records.

mod adapter;
mod onnx;
mod scaler;
mod tree;

pub use adapter::{ClassifierAdapter, ClassifierArtifact};
pub use onnx::OnnxModel;
pub use scaler::FeatureScaler;
pub use tree::DecisionTreeModel;

use crate::error::Result;
use ndarray::Array2;

/// A binary classifier over scaled feature rows.
pub trait ProbabilityModel: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Fixed input width, when the model declares one.
    fn input_width(&self) -> Option<usize>;

    /// Probability of the intrusion class for every row of `batch`.
    fn predict_proba(&self, batch: &Array2<f32>) -> Result<Vec<f64>>;
}
