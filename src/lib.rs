//! Packet Sentinel: bounded live capture, per-packet feature extraction,
//! classifier scoring and a rule-based decision override.
//!
//! Modules, leaf first:
//! - [`features`]: raw-capture schema and the per-packet extractor
//! - [`capture`]: packet sources and the time-bounded capture session
//! - [`model`]: scaler, probability models and the classifier adapter
//! - [`decision`]: threshold + override decision engine and batch summary
//! - [`storage`]: CSV capture and results tables
//! - [`pipeline`]: capture → score → decide coordinator and alert views
//! - [`logging`]: structured logging

pub mod capture;
pub mod config;
pub mod decision;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod storage;

pub use capture::{CancelToken, CaptureSession, PacketSource};
pub use config::SentinelConfig;
pub use decision::{BatchSummary, DecisionEngine, PredictedClass};
pub use error::{PipelineError, Stage};
pub use features::{PacketFeatureExtractor, PacketRecord};
pub use logging::StructuredLogger;
pub use model::ClassifierAdapter;
pub use pipeline::{Pipeline, TriggerReport};
pub use storage::ArtifactStore;
