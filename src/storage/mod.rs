//! Durable CSV tables for captures and classification results.

mod tables;

pub use tables::{ArtifactStore, CAPTURE_FILE, RESULTS_FILE};

use crate::error::Result;
use crate::features::PacketRecord;
use std::path::PathBuf;

/// Destination for a flushed capture.
pub trait RecordSink {
    /// Persist a non-empty record set, returning where it went.
    fn persist_capture(&self, records: &[PacketRecord]) -> Result<PathBuf>;
}
