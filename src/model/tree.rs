//! Binary decision tree stored as flat node arrays (the layout a fitted tree
//! classifier exposes). Node `i` is a leaf when `children_left[i] == -1`;
//! otherwise rows go left when `x[feature[i]] <= threshold[i]`.

use super::ProbabilityModel;
use crate::error::{PipelineError, Result};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::path::Path;

const LEAF: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeModel {
    pub n_features: usize,
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class weights `[normal, intrusion]`
    pub value: Vec<Vec<f64>>,
}

impl DecisionTreeModel {
    pub fn load(path: &Path) -> Result<Self> {
        let data =
            std::fs::read_to_string(path).map_err(|e| PipelineError::artifact_load(path, e))?;
        let tree: DecisionTreeModel =
            serde_json::from_str(&data).map_err(|e| PipelineError::artifact_load(path, e))?;
        tree.validate()
            .map_err(|e| PipelineError::artifact_load(path, e))?;
        Ok(tree)
    }

    /// Children always sit after their parent, so traversal terminates.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let n = self.children_left.len();
        if n == 0 {
            return Err("tree has no nodes".into());
        }
        if self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
            || self.value.len() != n
        {
            return Err("tree arrays differ in length".into());
        }
        for i in 0..n {
            let (l, r) = (self.children_left[i], self.children_right[i]);
            if l == LEAF {
                if r != LEAF {
                    return Err(format!("node {} has a right child but no left child", i));
                }
                let v = &self.value[i];
                if v.len() < 2 || v.iter().any(|w| !w.is_finite() || *w < 0.0) {
                    return Err(format!("leaf {} needs two non-negative class weights", i));
                }
                if v.iter().sum::<f64>() <= 0.0 {
                    return Err(format!("leaf {} has zero total weight", i));
                }
                continue;
            }
            for child in [l, r] {
                if child <= i as i64 || child >= n as i64 {
                    return Err(format!("node {} has out-of-order child {}", i, child));
                }
            }
            let f = self.feature[i];
            if f < 0 || f as usize >= self.n_features {
                return Err(format!("node {} splits on unknown feature {}", i, f));
            }
            if self.threshold[i].is_nan() {
                return Err(format!("node {} has a NaN threshold", i));
            }
        }
        Ok(())
    }

    fn leaf_for(&self, row: ArrayView1<f32>) -> usize {
        let mut node = 0usize;
        while self.children_left[node] != LEAF {
            let x = f64::from(row[self.feature[node] as usize]);
            node = if x <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        node
    }

    fn positive_probability(&self, leaf: usize) -> f64 {
        let v = &self.value[leaf];
        v[1] / v.iter().sum::<f64>()
    }
}

impl ProbabilityModel for DecisionTreeModel {
    fn kind(&self) -> &'static str {
        "decision_tree"
    }

    fn input_width(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn predict_proba(&self, batch: &Array2<f32>) -> Result<Vec<f64>> {
        if batch.ncols() != self.n_features {
            return Err(PipelineError::SchemaMismatch(format!(
                "tree expects {} features, batch has {}",
                self.n_features,
                batch.ncols()
            )));
        }
        Ok(batch
            .rows()
            .into_iter()
            .map(|row| self.positive_probability(self.leaf_for(row)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Root splits feature 0 at 0.5; right child splits feature 1 at 0.0.
    fn stump() -> DecisionTreeModel {
        DecisionTreeModel {
            n_features: 2,
            children_left: vec![1, -1, 3, -1, -1],
            children_right: vec![2, -1, 4, -1, -1],
            feature: vec![0, -2, 1, -2, -2],
            threshold: vec![0.5, -2.0, 0.0, -2.0, -2.0],
            value: vec![
                vec![10.0, 10.0],
                vec![9.0, 1.0],
                vec![1.0, 9.0],
                vec![0.0, 4.0],
                vec![1.0, 3.0],
            ],
        }
    }

    #[test]
    fn walks_to_leaves() {
        let t = stump();
        t.validate().unwrap();
        let batch = array![[0.0f32, 0.0], [0.5, 9.0], [1.0, -1.0], [1.0, 1.0]];
        let p = t.predict_proba(&batch).unwrap();
        assert_eq!(p, vec![0.1, 0.1, 1.0, 0.75]);
    }

    #[test]
    fn rejects_cycles_and_bad_features() {
        let mut t = stump();
        t.children_left[2] = 1;
        assert!(t.validate().is_err());

        let mut t = stump();
        t.feature[0] = 7;
        assert!(t.validate().is_err());

        let mut t = stump();
        t.value[1] = vec![0.0, 0.0];
        assert!(t.validate().is_err());
    }

    #[test]
    fn leaf_probability_keeps_double_precision() {
        let mut t = stump();
        t.value[3] = vec![1.000_000_1, 999.0];
        let p = t.predict_proba(&array![[1.0f32, -1.0]]).unwrap()[0];
        assert!(p < 0.999);
        assert!(p > 0.998_999_9);
    }

    #[test]
    fn width_mismatch_is_schema_error() {
        let batch = array![[0.0f32, 0.0, 0.0]];
        assert!(matches!(
            stump().predict_proba(&batch),
            Err(PipelineError::SchemaMismatch(_))
        ));
    }
}
