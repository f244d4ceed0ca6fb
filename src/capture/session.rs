//! Capture session state machine.
//!
//! `Idle → Capturing → {TimedOut | Interrupted | Exhausted} → Flushed`
//!
//! `run` consumes the session and hands back a [`CompletedCapture`];
//! `flush` consumes that in turn, so a capture can be persisted at most once.

use super::{CapturedPacket, PacketSource, SourceEvent};
use crate::error::Result;
use crate::features::{PacketFeatureExtractor, PacketRecord};
use crate::storage::RecordSink;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

const PROGRESS_EVERY: usize = 10;

/// Cooperative cancellation observed by the capture loop between packets.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Capturing,
    TimedOut,
    Interrupted,
    Exhausted,
    Flushed,
}

/// How capturing ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    TimedOut,
    Interrupted,
    /// Source closed before the budget ran out (pcap file, replay)
    Exhausted,
}

impl From<Termination> for SessionState {
    fn from(t: Termination) -> Self {
        match t {
            Termination::TimedOut => SessionState::TimedOut,
            Termination::Interrupted => SessionState::Interrupted,
            Termination::Exhausted => SessionState::Exhausted,
        }
    }
}

pub struct CaptureSession {
    budget: Duration,
    state: SessionState,
    /// First event of any kind; bounds an interface that never delivers a packet
    opened_at: Option<Duration>,
    /// First packet; elapsed time is measured from here
    started_at: Option<Duration>,
    records: Vec<PacketRecord>,
    packets_seen: u64,
    skipped: u64,
    extractor: PacketFeatureExtractor,
}

impl CaptureSession {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            state: SessionState::Idle,
            opened_at: None,
            started_at: None,
            records: Vec::new(),
            packets_seen: 0,
            skipped: 0,
            extractor: PacketFeatureExtractor::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn records(&self) -> &[PacketRecord] {
        &self.records
    }

    pub fn packets_seen(&self) -> u64 {
        self.packets_seen
    }

    fn observe(&mut self, packet: &CapturedPacket) -> ControlFlow<Termination> {
        let started = *self.started_at.get_or_insert(packet.ts);
        if self.state == SessionState::Idle {
            self.state = SessionState::Capturing;
            debug!("first packet seen; capture clock started");
        }

        let elapsed = packet.ts.saturating_sub(started);
        if elapsed > self.budget {
            return ControlFlow::Break(Termination::TimedOut);
        }

        self.packets_seen += 1;
        match self.extractor.extract(packet.link, &packet.data, elapsed) {
            Ok(record) => {
                self.records.push(record);
                if self.records.len() % PROGRESS_EVERY == 0 {
                    debug!(
                        records = self.records.len(),
                        elapsed_secs = elapsed.as_secs(),
                        budget_secs = self.budget.as_secs(),
                        "capture progress"
                    );
                }
            }
            Err(skip) => {
                self.skipped += 1;
                trace!(reason = skip.reason(), "packet skipped");
            }
        }
        ControlFlow::Continue(())
    }

    fn tick(&self, now: Duration) -> ControlFlow<Termination> {
        let Some(reference) = self.started_at.or(self.opened_at) else {
            return ControlFlow::Continue(());
        };
        if now.saturating_sub(reference) > self.budget {
            ControlFlow::Break(Termination::TimedOut)
        } else {
            ControlFlow::Continue(())
        }
    }

    /// Drive the source until timeout, cancellation or end of stream.
    /// A source read error aborts the session without a flush.
    pub fn run<S>(mut self, source: &mut S, cancel: &CancelToken) -> Result<CompletedCapture>
    where
        S: PacketSource + ?Sized,
    {
        info!(budget_secs = self.budget.as_secs_f64(), "capture session starting");

        let termination = loop {
            if cancel.is_cancelled() {
                break Termination::Interrupted;
            }
            let flow = match source.next_event()? {
                SourceEvent::Packet(packet) => {
                    self.opened_at.get_or_insert(packet.ts);
                    self.observe(&packet)
                }
                SourceEvent::Idle { now } => {
                    self.opened_at.get_or_insert(now);
                    self.tick(now)
                }
                SourceEvent::Closed => ControlFlow::Break(Termination::Exhausted),
            };
            if let ControlFlow::Break(t) = flow {
                break t;
            }
        };
        self.state = termination.into();

        info!(
            termination = ?termination,
            packets = self.packets_seen,
            records = self.records.len(),
            skipped = self.skipped,
            "capture session ended"
        );

        Ok(CompletedCapture {
            termination,
            records: self.records,
            packets_seen: self.packets_seen,
            skipped: self.skipped,
        })
    }
}

/// Records accumulated by a finished session, not yet persisted.
#[derive(Debug)]
pub struct CompletedCapture {
    pub termination: Termination,
    pub records: Vec<PacketRecord>,
    pub packets_seen: u64,
    pub skipped: u64,
}

impl CompletedCapture {
    pub fn state(&self) -> SessionState {
        self.termination.into()
    }

    /// Persist the records once. An empty capture writes nothing.
    pub fn flush<K>(self, sink: &K) -> Result<FlushedCapture>
    where
        K: RecordSink + ?Sized,
    {
        let path = if self.records.is_empty() {
            info!("no packets captured; nothing to flush");
            None
        } else {
            let path = sink.persist_capture(&self.records)?;
            info!(records = self.records.len(), path = %path.display(), "capture flushed");
            Some(path)
        };
        Ok(FlushedCapture {
            termination: self.termination,
            records: self.records,
            packets_seen: self.packets_seen,
            path,
        })
    }
}

/// Immutable result of a flushed capture.
#[derive(Debug)]
pub struct FlushedCapture {
    pub termination: Termination,
    pub records: Vec<PacketRecord>,
    pub packets_seen: u64,
    /// `None` when nothing was captured
    pub path: Option<PathBuf>,
}

impl FlushedCapture {
    pub fn state(&self) -> SessionState {
        SessionState::Flushed
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ReplaySource;
    use crate::features::LinkLayer;
    use etherparse::PacketBuilder;

    fn frame() -> Vec<u8> {
        let b = PacketBuilder::ipv4([10, 1, 1, 1], [10, 1, 1, 2], 64).udp(4000, 53);
        let mut out = Vec::new();
        b.write(&mut out, &[0u8; 20]).unwrap();
        out
    }

    fn packet(at_ms: u64) -> SourceEvent {
        SourceEvent::Packet(CapturedPacket {
            ts: Duration::from_millis(1_700_000_000_000 + at_ms),
            link: LinkLayer::RawIp,
            data: frame(),
        })
    }

    #[test]
    fn clock_starts_on_first_packet() {
        let mut s = CaptureSession::new(Duration::from_secs(2));
        assert_eq!(s.state(), SessionState::Idle);
        let SourceEvent::Packet(p) = packet(5_000) else { unreachable!() };
        assert!(s.observe(&p).is_continue());
        assert_eq!(s.state(), SessionState::Capturing);
        assert_eq!(s.records()[0].duration, 0.0);
        assert_eq!(s.packets_seen(), 1);
    }

    #[test]
    fn idle_ticks_time_out_an_empty_interface() {
        let mut src = ReplaySource::new(vec![
            SourceEvent::Idle { now: Duration::from_secs(100) },
            SourceEvent::Idle { now: Duration::from_secs(101) },
            SourceEvent::Idle { now: Duration::from_secs(103) },
            packet(0),
        ]);
        let done = CaptureSession::new(Duration::from_secs(2))
            .run(&mut src, &CancelToken::new())
            .unwrap();
        assert_eq!(done.termination, Termination::TimedOut);
        assert!(done.records.is_empty());
    }

    fn raw(at_ms: u64, link: LinkLayer, data: Vec<u8>) -> SourceEvent {
        SourceEvent::Packet(CapturedPacket {
            ts: Duration::from_millis(1_700_000_000_000 + at_ms),
            link,
            data,
        })
    }

    fn arp() -> Vec<u8> {
        let mut out = vec![0xffu8; 12];
        out.extend_from_slice(&[0x08, 0x06]);
        out.extend_from_slice(&[0u8; 28]);
        out
    }

    #[test]
    fn non_ip_frames_count_inside_the_window() {
        let mut src = ReplaySource::new(vec![
            packet(0),
            raw(500, LinkLayer::Ethernet, arp()),
            raw(900, LinkLayer::Unsupported(147), frame()),
        ]);
        let done = CaptureSession::new(Duration::from_secs(2))
            .run(&mut src, &CancelToken::new())
            .unwrap();
        assert_eq!(done.termination, Termination::Exhausted);
        assert_eq!(done.records.len(), 1);
        assert_eq!(done.packets_seen, 3);
        assert_eq!(done.skipped, 2);
    }

    #[test]
    fn late_non_ip_frame_times_out_without_a_record() {
        let late_frames = [
            raw(3_000, LinkLayer::Ethernet, arp()),
            raw(3_000, LinkLayer::Unsupported(147), frame()),
        ];
        for late in late_frames {
            let mut src = ReplaySource::new(vec![packet(0), late, packet(3_100)]);
            let done = CaptureSession::new(Duration::from_secs(2))
                .run(&mut src, &CancelToken::new())
                .unwrap();
            assert_eq!(done.termination, Termination::TimedOut);
            assert_eq!(done.records.len(), 1);
            assert_eq!(done.packets_seen, 1);
            assert_eq!(done.skipped, 0);
        }
    }

    #[test]
    fn pre_cancelled_token_interrupts_immediately() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut src = ReplaySource::new(vec![packet(0)]);
        let done = CaptureSession::new(Duration::from_secs(10))
            .run(&mut src, &cancel)
            .unwrap();
        assert_eq!(done.termination, Termination::Interrupted);
        assert_eq!(done.state(), SessionState::Interrupted);
        assert_eq!(done.packets_seen, 0);
    }
}
