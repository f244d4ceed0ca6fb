//! Time-bounded packet capture. A [`PacketSource`] delivers frames one at a
//! time; a [`CaptureSession`] turns them into records until its budget runs
//! out or it is cancelled.

mod live;
mod replay;
mod session;

use crate::error::Result;
use crate::features::LinkLayer;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub use live::PcapSource;
pub use replay::ReplaySource;
pub use session::{
    CancelToken, CaptureSession, CompletedCapture, FlushedCapture, SessionState, Termination,
};

/// One frame as handed over by the capture mechanism.
#[derive(Debug, Clone)]
pub struct CapturedPacket {
    /// Capture timestamp, as time since the Unix epoch
    pub ts: Duration,
    pub link: LinkLayer,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum SourceEvent {
    Packet(CapturedPacket),
    /// Read timed out with nothing to deliver; `now` lets the session check its budget
    Idle { now: Duration },
    /// Finite source ran dry
    Closed,
}

/// Sequential packet stream consumed by a capture session.
pub trait PacketSource {
    fn next_event(&mut self) -> Result<SourceEvent>;
}

impl<S: PacketSource + ?Sized> PacketSource for Box<S> {
    fn next_event(&mut self) -> Result<SourceEvent> {
        (**self).next_event()
    }
}

pub(crate) fn wall_clock() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}
