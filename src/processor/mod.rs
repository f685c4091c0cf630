//! Datagram-to-analyzer glue: 188-byte framing, capture-time clock and
//! bitrate sampling.

use std::time::Instant;

use crate::constants::{SYSTEM_CLOCK_FREQ, TS_PACKET_SIZE};
use crate::packet::TsPacket;
use crate::stats::BitrateEstimator;
use crate::tr101::Tr101Analyzer;

pub struct StreamProcessor {
    analyzer: Tr101Analyzer,
    bitrate: BitrateEstimator,
    start: Instant,
    sync_errors: u64,
}

impl StreamProcessor {
    pub fn new() -> Self {
        Self {
            analyzer: Tr101Analyzer::new(),
            bitrate: BitrateEstimator::new(),
            start: Instant::now(),
            sync_errors: 0,
        }
    }

    /// Monotonic capture clock in 27 MHz ticks since the processor started.
    fn now_ticks(&self) -> u64 {
        (self.start.elapsed().as_nanos() * SYSTEM_CLOCK_FREQ as u128 / 1_000_000_000) as u64
    }

    /// Splits a received datagram into 188-byte packets and feeds each to
    /// the analyzer. Packets with a corrupted sync byte are counted and
    /// skipped; a trailing partial packet is dropped.
    pub fn process_datagram(&mut self, buf: &[u8]) {
        for chunk in buf.chunks_exact(TS_PACKET_SIZE) {
            let now = self.now_ticks();
            match TsPacket::parse(chunk) {
                Ok(pkt) => {
                    let rate = self.bitrate.on_packet(now, TS_PACKET_SIZE);
                    self.analyzer.feed_packet(&pkt, now, rate);
                }
                Err(_) => self.sync_errors += 1,
            }
        }
    }

    pub fn analyzer(&self) -> &Tr101Analyzer {
        &self.analyzer
    }

    pub fn analyzer_mut(&mut self) -> &mut Tr101Analyzer {
        &mut self.analyzer
    }

    pub fn sync_errors(&self) -> u64 {
        self.sync_errors
    }
}

impl Default for StreamProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_sync_errors_and_keeps_going() {
        let mut processor = StreamProcessor::new();
        let mut buf = vec![0u8; TS_PACKET_SIZE * 2];
        buf[0] = 0x12; // bad sync
        buf[TS_PACKET_SIZE] = 0x47;
        buf[TS_PACKET_SIZE + 1] = 0x1F;
        buf[TS_PACKET_SIZE + 2] = 0xFF; // null packet
        buf[TS_PACKET_SIZE + 3] = 0x10;
        processor.process_datagram(&buf);
        assert_eq!(processor.sync_errors(), 1);
        assert_eq!(processor.analyzer().packet_count(), 1);
    }
}
