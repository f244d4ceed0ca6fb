//! Read side of the results table: the latest result or every result, shaped
//! as alerts. `None` means no cycle has produced results yet.
//!
//! The two views label intrusions differently: the latest-alert view says
//! "Anomaly Detected" with a probability line, the log view says "Anomaly"
//! and also carries the raw class code.

use crate::decision::{ClassificationResult, PredictedClass};
use crate::error::Result;
use crate::storage::ArtifactStore;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertKind {
    #[serde(rename = "Anomaly Detected")]
    AnomalyDetected,
    /// Log-view label for an intrusion
    Anomaly,
    Uncertain,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    /// Row index in the results table
    pub id: String,
    /// When the results table was written
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: Severity,
    pub source_ip: String,
    pub details: String,
}

#[derive(Clone, Copy)]
enum View {
    Latest,
    Log,
}

impl Alert {
    fn from_result(
        index: usize,
        result: &ClassificationResult,
        timestamp: DateTime<Utc>,
        view: View,
    ) -> Self {
        let (kind, severity) = match (result.predicted_class, view) {
            (PredictedClass::Intrusion, View::Latest) => (AlertKind::AnomalyDetected, Severity::High),
            (PredictedClass::Intrusion, View::Log) => (AlertKind::Anomaly, Severity::High),
            (PredictedClass::Uncertain, _) => (AlertKind::Uncertain, Severity::Medium),
            (PredictedClass::Normal, _) => (AlertKind::Normal, Severity::Low),
        };
        let details = match view {
            View::Latest => format!("Intrusion probability: {:.2}", result.intrusion_probability),
            View::Log => format!(
                "Prob: {:.2}, Raw Class: {}",
                result.intrusion_probability,
                result.predicted_class.code()
            ),
        };
        Self {
            id: index.to_string(),
            timestamp,
            kind,
            severity,
            source_ip: result.record.src_ip.to_string(),
            details,
        }
    }
}

fn load(store: &ArtifactStore) -> Result<Option<(Vec<ClassificationResult>, DateTime<Utc>)>> {
    let Some(results) = store.read_results()? else {
        return Ok(None);
    };
    let written = store.results_modified()?.unwrap_or_else(Utc::now);
    Ok(Some((results, written)))
}

/// Most recent result; `None` when there is no table or it has no rows.
pub fn latest_alert(store: &ArtifactStore) -> Result<Option<Alert>> {
    Ok(load(store)?.and_then(|(results, ts)| {
        let last = results.len().checked_sub(1)?;
        Some(Alert::from_result(last, &results[last], ts, View::Latest))
    }))
}

/// Every result in table order; `None` when no results table exists.
pub fn all_alerts(store: &ArtifactStore) -> Result<Option<Vec<Alert>>> {
    Ok(load(store)?.map(|(results, ts)| {
        results
            .iter()
            .enumerate()
            .map(|(i, r)| Alert::from_result(i, r, ts, View::Log))
            .collect()
    }))
}
