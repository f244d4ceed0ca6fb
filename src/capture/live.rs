//! libpcap-backed packet source: a live interface or an offline pcap file.

use super::{wall_clock, CapturedPacket, PacketSource, SourceEvent};
use crate::config::CaptureConfig;
use crate::error::{PipelineError, Result};
use crate::features::LinkLayer;
use pcap::{Activated, Capture, Device};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub struct PcapSource {
    cap: Capture<dyn Activated>,
    link: LinkLayer,
    name: String,
}

#[cfg(unix)]
fn is_privileged() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_privileged() -> bool {
    true
}

fn startup_error(device: &str, err: pcap::Error) -> PipelineError {
    let hint = if is_privileged() {
        ""
    } else {
        " (live capture usually needs root or CAP_NET_RAW)"
    };
    PipelineError::capture_startup(device, format!("{}{}", err, hint))
}

fn timestamp(secs: i64, micros: i64) -> Duration {
    let micros = micros.clamp(0, 999_999) as u32;
    Duration::new(secs.max(0) as u64, micros * 1_000)
}

impl PcapSource {
    /// Open whatever the config asks for: a pcap file if set, else a device.
    pub fn open(config: &CaptureConfig) -> Result<Self> {
        match &config.pcap_file {
            Some(path) => Self::open_file(path),
            None => Self::open_device(config.device.as_deref(), config),
        }
    }

    /// Open a live interface. Fails fast if the device cannot be activated.
    pub fn open_device(device: Option<&str>, config: &CaptureConfig) -> Result<Self> {
        let name = match device {
            Some(d) => d.to_string(),
            None => Device::lookup()
                .map_err(|e| startup_error("<default>", e))?
                .map(|d| d.name)
                .ok_or_else(|| {
                    PipelineError::capture_startup("<default>", "no capture device available")
                })?,
        };

        let cap = Capture::from_device(name.as_str())
            .map_err(|e| startup_error(&name, e))?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .timeout(config.read_timeout_ms)
            .open()
            .map_err(|e| startup_error(&name, e))?;

        let link = LinkLayer::from_dlt(cap.get_datalink().0);
        if let LinkLayer::Unsupported(dlt) = link {
            warn!(device = %name, dlt, "unsupported link layer; every packet will be skipped");
        }
        info!(device = %name, link = ?link, "live capture opened");
        Ok(Self {
            cap: cap.into(),
            link,
            name,
        })
    }

    pub fn open_file(path: &Path) -> Result<Self> {
        let name = path.display().to_string();
        let cap = Capture::from_file(path).map_err(|e| startup_error(&name, e))?;
        let link = LinkLayer::from_dlt(cap.get_datalink().0);
        info!(file = %name, link = ?link, "offline capture opened");
        Ok(Self {
            cap: cap.into(),
            link,
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of interfaces libpcap can open.
    pub fn list_devices() -> Result<Vec<String>> {
        let devices =
            Device::list().map_err(|e| PipelineError::capture_startup("<list>", e))?;
        Ok(devices.into_iter().map(|d| d.name).collect())
    }
}

impl PacketSource for PcapSource {
    fn next_event(&mut self) -> Result<SourceEvent> {
        match self.cap.next_packet() {
            Ok(packet) => Ok(SourceEvent::Packet(CapturedPacket {
                ts: timestamp(packet.header.ts.tv_sec as i64, packet.header.ts.tv_usec as i64),
                link: self.link,
                data: packet.data.to_vec(),
            })),
            Err(pcap::Error::TimeoutExpired) => Ok(SourceEvent::Idle { now: wall_clock() }),
            Err(pcap::Error::NoMorePackets) => Ok(SourceEvent::Closed),
            Err(e) => Err(PipelineError::CaptureRead(format!("{}: {}", self.name, e))),
        }
    }
}
