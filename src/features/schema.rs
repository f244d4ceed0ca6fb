//! Raw-capture feature schema: the ordered columns every packet record carries.
//!
//! Two blocks of the schema are placeholders. The content block (login and
//! shell counters) cannot be observed from headers at all, and the traffic
//! block (connection/host rates) needs multi-packet aggregation that a
//! single-packet extractor does not do. Both are kept as explicit columns
//! with fixed defaults so the table stays compatible with the intrusion
//! feature set the classifier was trained on. A session/host aggregation
//! component would replace the traffic defaults.

/// How a column is fed to the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Numeric,
    /// Encoded to integer codes before scaling
    Categorical,
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub kind: FeatureKind,
}

const fn num(name: &'static str) -> FeatureSpec {
    FeatureSpec {
        name,
        kind: FeatureKind::Numeric,
    }
}

const fn cat(name: &'static str) -> FeatureSpec {
    FeatureSpec {
        name,
        kind: FeatureKind::Categorical,
    }
}

pub const RAW_FEATURE_COUNT: usize = 41;

/// Content-derived counters; always zero for header-only extraction.
pub const CONTENT_PLACEHOLDERS: [&str; 15] = [
    "wrong_fragment",
    "urgent",
    "hot",
    "num_failed_logins",
    "logged_in",
    "num_compromised",
    "root_shell",
    "su_attempted",
    "num_root",
    "num_file_creations",
    "num_shells",
    "num_access_files",
    "num_outbound_cmds",
    "is_host_login",
    "is_guest_login",
];

/// Session/host rate statistics with the value a lone packet is given.
pub const TRAFFIC_PLACEHOLDERS: [(&str, f64); 15] = [
    ("count", 1.0),
    ("srv_count", 1.0),
    ("same_srv_rate", 1.0),
    ("diff_srv_rate", 0.0),
    ("srv_diff_host_rate", 0.0),
    ("dst_host_count", 1.0),
    ("dst_host_srv_count", 1.0),
    ("dst_host_same_srv_rate", 1.0),
    ("dst_host_diff_srv_rate", 0.0),
    ("dst_host_same_src_port_rate", 0.0),
    ("dst_host_srv_diff_host_rate", 0.0),
    ("dst_host_serror_rate", 0.0),
    ("dst_host_srv_serror_rate", 0.0),
    ("dst_host_rerror_rate", 0.0),
    ("dst_host_srv_rerror_rate", 0.0),
];

pub const RAW_CAPTURE_SCHEMA: [FeatureSpec; RAW_FEATURE_COUNT] = [
    num("duration"),
    cat("protocol_type"),
    cat("service"),
    cat("flag"),
    num("src_bytes"),
    num("dst_bytes"),
    num("land"),
    num("wrong_fragment"),
    num("urgent"),
    num("hot"),
    num("num_failed_logins"),
    num("logged_in"),
    num("num_compromised"),
    num("root_shell"),
    num("su_attempted"),
    num("num_root"),
    num("num_file_creations"),
    num("num_shells"),
    num("num_access_files"),
    num("num_outbound_cmds"),
    num("is_host_login"),
    num("is_guest_login"),
    num("count"),
    num("srv_count"),
    num("same_srv_rate"),
    num("diff_srv_rate"),
    num("srv_diff_host_rate"),
    num("dst_host_count"),
    num("dst_host_srv_count"),
    num("dst_host_same_srv_rate"),
    num("dst_host_diff_srv_rate"),
    num("dst_host_same_src_port_rate"),
    num("dst_host_srv_diff_host_rate"),
    num("dst_host_serror_rate"),
    num("dst_host_srv_serror_rate"),
    num("dst_host_rerror_rate"),
    num("dst_host_srv_rerror_rate"),
    cat("src_ip"),
    cat("dst_ip"),
    num("src_port"),
    num("dst_port"),
];

/// Column names in schema order.
pub fn column_names() -> impl Iterator<Item = &'static str> {
    RAW_CAPTURE_SCHEMA.iter().map(|s| s.name)
}

pub fn kind_of(name: &str) -> Option<FeatureKind> {
    RAW_CAPTURE_SCHEMA
        .iter()
        .find(|s| s.name == name)
        .map(|s| s.kind)
}
