//! Single-packet feature extraction: one frame + elapsed time → one record.
//! Pure: no clock reads, no I/O.

use super::record::{ConnFlag, PacketRecord, Protocol};
use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use std::net::IpAddr;
use std::time::Duration;

const TCP_FIN: u8 = 0x01;
const TCP_SYN: u8 = 0x02;
const TCP_RST: u8 = 0x04;
const TCP_PSH: u8 = 0x08;
const TCP_ACK: u8 = 0x10;

const SLL_HEADER_LEN: usize = 16;
const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86dd;

/// Link-layer framing of captured bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet,
    /// Bare IPv4/IPv6 datagrams
    RawIp,
    /// Linux cooked capture (the `any` pseudo-device)
    LinuxSll,
    Unsupported(i32),
}

impl LinkLayer {
    /// Map a libpcap DLT value.
    pub fn from_dlt(dlt: i32) -> Self {
        match dlt {
            1 => LinkLayer::Ethernet,
            12 | 14 | 101 | 228 | 229 => LinkLayer::RawIp,
            113 => LinkLayer::LinuxSll,
            other => LinkLayer::Unsupported(other),
        }
    }
}

/// Why a frame produced no record. Not an error: capture carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSkip {
    NotIp,
    Malformed,
    UnsupportedLink,
}

impl ExtractionSkip {
    pub fn reason(&self) -> &'static str {
        match self {
            ExtractionSkip::NotIp => "no IP layer",
            ExtractionSkip::Malformed => "malformed frame",
            ExtractionSkip::UnsupportedLink => "unsupported link layer",
        }
    }
}

/// First matching bit combination wins, in this order.
pub fn conn_flag(bits: u8) -> ConnFlag {
    if bits & TCP_SYN != 0 {
        if bits & TCP_ACK != 0 {
            ConnFlag::S1
        } else {
            ConnFlag::S0
        }
    } else if bits & TCP_FIN != 0 {
        ConnFlag::SF
    } else if bits & TCP_RST != 0 {
        ConnFlag::REJ
    } else if bits & TCP_ACK != 0 {
        ConnFlag::S2
    } else if bits & TCP_PSH != 0 {
        ConnFlag::RSTO
    } else {
        ConnFlag::OTH
    }
}

fn round4(secs: f64) -> f64 {
    (secs * 10_000.0).round() / 10_000.0
}

fn slice(link: LinkLayer, data: &[u8]) -> Result<SlicedPacket<'_>, ExtractionSkip> {
    match link {
        LinkLayer::Ethernet => {
            SlicedPacket::from_ethernet(data).map_err(|_| ExtractionSkip::Malformed)
        }
        LinkLayer::RawIp => SlicedPacket::from_ip(data).map_err(|_| ExtractionSkip::Malformed),
        LinkLayer::LinuxSll => {
            if data.len() < SLL_HEADER_LEN {
                return Err(ExtractionSkip::Malformed);
            }
            match u16::from_be_bytes([data[14], data[15]]) {
                ETHERTYPE_IPV4 | ETHERTYPE_IPV6 => SlicedPacket::from_ip(&data[SLL_HEADER_LEN..])
                    .map_err(|_| ExtractionSkip::Malformed),
                _ => Err(ExtractionSkip::NotIp),
            }
        }
        LinkLayer::Unsupported(_) => Err(ExtractionSkip::UnsupportedLink),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PacketFeatureExtractor;

impl PacketFeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Reduce one frame to a record. `elapsed` is time since session start.
    pub fn extract(
        &self,
        link: LinkLayer,
        data: &[u8],
        elapsed: Duration,
    ) -> Result<PacketRecord, ExtractionSkip> {
        let sliced = slice(link, data)?;

        let (src_ip, dst_ip): (IpAddr, IpAddr) = match &sliced.net {
            Some(NetSlice::Ipv4(ipv4)) => {
                let h = ipv4.header();
                (h.source_addr().into(), h.destination_addr().into())
            }
            Some(NetSlice::Ipv6(ipv6)) => {
                let h = ipv6.header();
                (h.source_addr().into(), h.destination_addr().into())
            }
            #[allow(unreachable_patterns)]
            _ => return Err(ExtractionSkip::NotIp),
        };

        let (protocol, flag, src_port, dst_port, src_bytes) = match &sliced.transport {
            Some(TransportSlice::Tcp(tcp)) => {
                let mut bits = 0u8;
                if tcp.fin() {
                    bits |= TCP_FIN;
                }
                if tcp.syn() {
                    bits |= TCP_SYN;
                }
                if tcp.rst() {
                    bits |= TCP_RST;
                }
                if tcp.psh() {
                    bits |= TCP_PSH;
                }
                if tcp.ack() {
                    bits |= TCP_ACK;
                }
                (
                    Protocol::Tcp,
                    conn_flag(bits),
                    tcp.source_port(),
                    tcp.destination_port(),
                    tcp.payload().len() as u64,
                )
            }
            Some(TransportSlice::Udp(udp)) => (
                Protocol::Udp,
                ConnFlag::OTH,
                udp.source_port(),
                udp.destination_port(),
                udp.payload().len() as u64,
            ),
            _ => (Protocol::Other, ConnFlag::OTH, 0, 0, 0),
        };

        let land = u8::from(src_ip == dst_ip && src_port == dst_port);

        Ok(PacketRecord {
            duration: round4(elapsed.as_secs_f64()),
            protocol_type: protocol,
            service: protocol,
            flag,
            src_bytes,
            dst_bytes: 0,
            land,
            src_ip,
            dst_ip,
            src_port,
            dst_port,
            ..PacketRecord::default()
        })
    }
}
