//! Per-packet feature extraction into the raw-capture schema.

pub mod schema;
mod record;
mod extractor;

pub use extractor::{conn_flag, ExtractionSkip, LinkLayer, PacketFeatureExtractor};
pub use record::{ConnFlag, FeatureValue, PacketRecord, Protocol};
pub use schema::{FeatureKind, FeatureSpec, RAW_CAPTURE_SCHEMA};
