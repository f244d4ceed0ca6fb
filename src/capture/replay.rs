//! In-memory packet source replaying prerecorded events in order.

use super::{CapturedPacket, PacketSource, SourceEvent};
use crate::error::Result;
use crate::features::LinkLayer;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    events: VecDeque<SourceEvent>,
}

impl ReplaySource {
    pub fn new(events: impl IntoIterator<Item = SourceEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }

    /// Frames of one link type, each stamped with its capture time.
    pub fn from_frames(link: LinkLayer, frames: impl IntoIterator<Item = (Duration, Vec<u8>)>) -> Self {
        Self::new(frames.into_iter().map(|(ts, data)| {
            SourceEvent::Packet(CapturedPacket { ts, link, data })
        }))
    }
}

impl PacketSource for ReplaySource {
    fn next_event(&mut self) -> Result<SourceEvent> {
        Ok(self.events.pop_front().unwrap_or(SourceEvent::Closed))
    }
}
