//! One captured packet reduced to the raw-capture schema.

use super::schema::{self, TRAFFIC_PLACEHOLDERS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// Transport label written to `protocol_type` and `service`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Other,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Other => "other",
        }
    }
}

/// Connection flag code derived from TCP control bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnFlag {
    S0,
    S1,
    S2,
    SF,
    REJ,
    RSTO,
    OTH,
}

impl ConnFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnFlag::S0 => "S0",
            ConnFlag::S1 => "S1",
            ConnFlag::S2 => "S2",
            ConnFlag::SF => "SF",
            ConnFlag::REJ => "REJ",
            ConnFlag::RSTO => "RSTO",
            ConnFlag::OTH => "OTH",
        }
    }
}

/// A single column value as seen by the classifier.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Numeric(f64),
    Categorical(String),
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Numeric(v) => write!(f, "{}", v),
            FeatureValue::Categorical(s) => f.write_str(s),
        }
    }
}

/// Field order is the CSV column order and must match
/// [`schema::RAW_CAPTURE_SCHEMA`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketRecord {
    /// Seconds since the capture session started
    pub duration: f64,
    pub protocol_type: Protocol,
    pub service: Protocol,
    pub flag: ConnFlag,
    pub src_bytes: u64,
    /// Always 0: only one capture direction is observed
    pub dst_bytes: u64,
    pub land: u8,

    pub wrong_fragment: u8,
    pub urgent: u8,
    pub hot: u8,
    pub num_failed_logins: u8,
    pub logged_in: u8,
    pub num_compromised: u8,
    pub root_shell: u8,
    pub su_attempted: u8,
    pub num_root: u8,
    pub num_file_creations: u8,
    pub num_shells: u8,
    pub num_access_files: u8,
    pub num_outbound_cmds: u8,
    pub is_host_login: u8,
    pub is_guest_login: u8,

    pub count: u32,
    pub srv_count: u32,
    pub same_srv_rate: f64,
    pub diff_srv_rate: f64,
    pub srv_diff_host_rate: f64,
    pub dst_host_count: u32,
    pub dst_host_srv_count: u32,
    pub dst_host_same_srv_rate: f64,
    pub dst_host_diff_srv_rate: f64,
    pub dst_host_same_src_port_rate: f64,
    pub dst_host_srv_diff_host_rate: f64,
    pub dst_host_serror_rate: f64,
    pub dst_host_srv_serror_rate: f64,
    pub dst_host_rerror_rate: f64,
    pub dst_host_srv_rerror_rate: f64,

    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
}

impl Default for PacketRecord {
    /// Placeholder blocks at their schema defaults; endpoint fields zeroed.
    fn default() -> Self {
        let traffic = |name: &str| {
            TRAFFIC_PLACEHOLDERS
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| *v)
                .unwrap_or(0.0)
        };
        Self {
            duration: 0.0,
            protocol_type: Protocol::Other,
            service: Protocol::Other,
            flag: ConnFlag::OTH,
            src_bytes: 0,
            dst_bytes: 0,
            land: 0,
            wrong_fragment: 0,
            urgent: 0,
            hot: 0,
            num_failed_logins: 0,
            logged_in: 0,
            num_compromised: 0,
            root_shell: 0,
            su_attempted: 0,
            num_root: 0,
            num_file_creations: 0,
            num_shells: 0,
            num_access_files: 0,
            num_outbound_cmds: 0,
            is_host_login: 0,
            is_guest_login: 0,
            count: traffic("count") as u32,
            srv_count: traffic("srv_count") as u32,
            same_srv_rate: traffic("same_srv_rate"),
            diff_srv_rate: traffic("diff_srv_rate"),
            srv_diff_host_rate: traffic("srv_diff_host_rate"),
            dst_host_count: traffic("dst_host_count") as u32,
            dst_host_srv_count: traffic("dst_host_srv_count") as u32,
            dst_host_same_srv_rate: traffic("dst_host_same_srv_rate"),
            dst_host_diff_srv_rate: traffic("dst_host_diff_srv_rate"),
            dst_host_same_src_port_rate: traffic("dst_host_same_src_port_rate"),
            dst_host_srv_diff_host_rate: traffic("dst_host_srv_diff_host_rate"),
            dst_host_serror_rate: traffic("dst_host_serror_rate"),
            dst_host_srv_serror_rate: traffic("dst_host_srv_serror_rate"),
            dst_host_rerror_rate: traffic("dst_host_rerror_rate"),
            dst_host_srv_rerror_rate: traffic("dst_host_srv_rerror_rate"),
            src_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            dst_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            src_port: 0,
            dst_port: 0,
        }
    }
}

impl PacketRecord {
    /// Look up a column by schema name.
    pub fn feature(&self, name: &str) -> Option<FeatureValue> {
        use FeatureValue::{Categorical as C, Numeric as N};
        let v = match name {
            "duration" => N(self.duration),
            "protocol_type" => C(self.protocol_type.as_str().to_string()),
            "service" => C(self.service.as_str().to_string()),
            "flag" => C(self.flag.as_str().to_string()),
            "src_bytes" => N(self.src_bytes as f64),
            "dst_bytes" => N(self.dst_bytes as f64),
            "land" => N(self.land.into()),
            "wrong_fragment" => N(self.wrong_fragment.into()),
            "urgent" => N(self.urgent.into()),
            "hot" => N(self.hot.into()),
            "num_failed_logins" => N(self.num_failed_logins.into()),
            "logged_in" => N(self.logged_in.into()),
            "num_compromised" => N(self.num_compromised.into()),
            "root_shell" => N(self.root_shell.into()),
            "su_attempted" => N(self.su_attempted.into()),
            "num_root" => N(self.num_root.into()),
            "num_file_creations" => N(self.num_file_creations.into()),
            "num_shells" => N(self.num_shells.into()),
            "num_access_files" => N(self.num_access_files.into()),
            "num_outbound_cmds" => N(self.num_outbound_cmds.into()),
            "is_host_login" => N(self.is_host_login.into()),
            "is_guest_login" => N(self.is_guest_login.into()),
            "count" => N(self.count.into()),
            "srv_count" => N(self.srv_count.into()),
            "same_srv_rate" => N(self.same_srv_rate),
            "diff_srv_rate" => N(self.diff_srv_rate),
            "srv_diff_host_rate" => N(self.srv_diff_host_rate),
            "dst_host_count" => N(self.dst_host_count.into()),
            "dst_host_srv_count" => N(self.dst_host_srv_count.into()),
            "dst_host_same_srv_rate" => N(self.dst_host_same_srv_rate),
            "dst_host_diff_srv_rate" => N(self.dst_host_diff_srv_rate),
            "dst_host_same_src_port_rate" => N(self.dst_host_same_src_port_rate),
            "dst_host_srv_diff_host_rate" => N(self.dst_host_srv_diff_host_rate),
            "dst_host_serror_rate" => N(self.dst_host_serror_rate),
            "dst_host_srv_serror_rate" => N(self.dst_host_srv_serror_rate),
            "dst_host_rerror_rate" => N(self.dst_host_rerror_rate),
            "dst_host_srv_rerror_rate" => N(self.dst_host_srv_rerror_rate),
            "src_ip" => C(self.src_ip.to_string()),
            "dst_ip" => C(self.dst_ip.to_string()),
            "src_port" => N(self.src_port.into()),
            "dst_port" => N(self.dst_port.into()),
            _ => return None,
        };
        Some(v)
    }

    /// All columns in schema order.
    pub fn values(&self) -> Vec<(&'static str, FeatureValue)> {
        schema::column_names()
            .filter_map(|name| self.feature(name).map(|v| (name, v)))
            .collect()
    }

    /// Whether any payload was seen in either direction.
    pub fn has_payload(&self) -> bool {
        self.src_bytes > 0 || self.dst_bytes > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::schema::{FeatureKind, RAW_CAPTURE_SCHEMA};

    #[test]
    fn csv_header_follows_schema_order() {
        let mut w = csv::Writer::from_writer(vec![]);
        w.serialize(PacketRecord::default()).unwrap();
        let out = String::from_utf8(w.into_inner().unwrap()).unwrap();
        let header = out.lines().next().unwrap();
        let expected: Vec<&str> = schema::column_names().collect();
        assert_eq!(header, expected.join(","));
    }

    #[test]
    fn every_schema_column_resolves_with_its_kind() {
        let r = PacketRecord::default();
        for spec in RAW_CAPTURE_SCHEMA.iter() {
            let v = r.feature(spec.name).expect(spec.name);
            match (spec.kind, v) {
                (FeatureKind::Numeric, FeatureValue::Numeric(_)) => {}
                (FeatureKind::Categorical, FeatureValue::Categorical(_)) => {}
                (k, v) => panic!("{}: {:?} vs {:?}", spec.name, k, v),
            }
        }
        assert_eq!(r.values().len(), schema::RAW_FEATURE_COUNT);
    }

    #[test]
    fn defaults_carry_placeholder_values() {
        let r = PacketRecord::default();
        assert_eq!(r.count, 1);
        assert_eq!(r.srv_count, 1);
        assert_eq!(r.same_srv_rate, 1.0);
        assert_eq!(r.dst_host_same_srv_rate, 1.0);
        assert_eq!(r.dst_host_rerror_rate, 0.0);
        assert_eq!(r.hot, 0);
    }

    #[test]
    fn csv_row_reads_back() {
        let r = PacketRecord {
            duration: 1.25,
            protocol_type: Protocol::Tcp,
            service: Protocol::Tcp,
            flag: ConnFlag::S1,
            src_bytes: 1000,
            src_ip: "10.0.0.1".parse().unwrap(),
            dst_ip: "10.0.0.2".parse().unwrap(),
            src_port: 443,
            dst_port: 51000,
            ..PacketRecord::default()
        };
        let mut w = csv::Writer::from_writer(vec![]);
        w.serialize(&r).unwrap();
        let data = w.into_inner().unwrap();
        let mut rd = csv::Reader::from_reader(data.as_slice());
        let back: PacketRecord = rd.deserialize().next().unwrap().unwrap();
        assert_eq!(back, r);
    }
}
