//! Final labelling of scored records and batch-level verdicts.

mod engine;

pub use engine::{BatchSummary, ClassificationResult, DecisionEngine, PredictedClass, Verdict};
