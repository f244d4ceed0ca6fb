//! Two-stage decision: probability thresholds, then the small one-way packet
//! override. Stateless per record.

use crate::config::DecisionConfig;
use crate::features::PacketRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum PredictedClass {
    Normal,
    Uncertain,
    Intrusion,
}

impl PredictedClass {
    pub fn code(self) -> i8 {
        match self {
            PredictedClass::Normal => 0,
            PredictedClass::Uncertain => -1,
            PredictedClass::Intrusion => 1,
        }
    }

    /// Threshold stage only.
    pub fn from_probability(probability: f64, config: &DecisionConfig) -> Self {
        if probability >= config.intrusion_threshold {
            PredictedClass::Intrusion
        } else if probability >= config.uncertain_threshold {
            PredictedClass::Uncertain
        } else {
            PredictedClass::Normal
        }
    }
}

impl From<PredictedClass> for i8 {
    fn from(c: PredictedClass) -> i8 {
        c.code()
    }
}

impl TryFrom<i8> for PredictedClass {
    type Error = String;

    fn try_from(code: i8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(PredictedClass::Normal),
            -1 => Ok(PredictedClass::Uncertain),
            1 => Ok(PredictedClass::Intrusion),
            other => Err(format!("unknown predicted class code {}", other)),
        }
    }
}

/// A record with its score and final label. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub record: PacketRecord,
    pub intrusion_probability: f64,
    pub predicted_class: PredictedClass,
}

pub struct DecisionEngine {
    config: DecisionConfig,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }

    /// Small outbound-only packets are normal unless the model is near-certain.
    pub fn override_applies(&self, record: &PacketRecord, probability: f64) -> bool {
        record.dst_bytes == 0
            && record.src_bytes < self.config.override_max_src_bytes
            && probability < self.config.intrusion_threshold
    }

    pub fn decide(&self, record: &PacketRecord, probability: f64) -> PredictedClass {
        let class = PredictedClass::from_probability(probability, &self.config);
        if self.override_applies(record, probability) {
            PredictedClass::Normal
        } else {
            class
        }
    }

    /// Pair records with their probabilities (same order, same length).
    pub fn classify(
        &self,
        records: Vec<PacketRecord>,
        probabilities: &[f64],
    ) -> Vec<ClassificationResult> {
        debug_assert_eq!(records.len(), probabilities.len());
        records
            .into_iter()
            .zip(probabilities.iter().copied())
            .map(|(record, p)| {
                let predicted_class = self.decide(&record, p);
                ClassificationResult {
                    record,
                    intrusion_probability: p,
                    predicted_class,
                }
            })
            .collect()
    }
}

/// Batch-level reading of a set of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    HighConfidenceIntrusion,
    LowConfidenceIntrusionFlags,
    UncertainReviewAdvised,
    AllNormal,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::HighConfidenceIntrusion => "high-confidence intrusion detected",
            Verdict::LowConfidenceIntrusionFlags => {
                "some packets flagged as intrusion, but average confidence is low"
            }
            Verdict::UncertainReviewAdvised => "some traffic is uncertain, review advised",
            Verdict::AllNormal => "all traffic appears normal",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub normal: usize,
    pub uncertain: usize,
    pub intrusion: usize,
    pub mean_probability: f64,
    pub verdict: Verdict,
}

impl BatchSummary {
    pub fn from_results(results: &[ClassificationResult]) -> Self {
        let mut s = BatchSummary {
            normal: 0,
            uncertain: 0,
            intrusion: 0,
            mean_probability: 0.0,
            verdict: Verdict::AllNormal,
        };
        for r in results {
            match r.predicted_class {
                PredictedClass::Normal => s.normal += 1,
                PredictedClass::Uncertain => s.uncertain += 1,
                PredictedClass::Intrusion => s.intrusion += 1,
            }
        }
        if !results.is_empty() {
            let sum: f64 = results.iter().map(|r| r.intrusion_probability).sum();
            s.mean_probability = sum / results.len() as f64;
        }
        s.verdict = if s.intrusion > 0 && s.mean_probability >= 0.5 {
            Verdict::HighConfidenceIntrusion
        } else if s.intrusion > 0 {
            Verdict::LowConfidenceIntrusionFlags
        } else if s.uncertain > 0 {
            Verdict::UncertainReviewAdvised
        } else {
            Verdict::AllNormal
        };
        s
    }

    pub fn total(&self) -> usize {
        self.normal + self.uncertain + self.intrusion
    }
}
