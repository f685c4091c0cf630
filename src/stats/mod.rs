//! Rolling bitrate estimation for the received transport stream.

use crate::constants::{INVALID_TS, SYSTEM_CLOCK_FREQ};

/// Estimates the stream bitrate over a sliding one-second window, in the
/// same 27 MHz tick domain the analyzer runs on. Reports 0 until the first
/// window completes; the analyzer treats that as "skip accuracy checks".
pub struct BitrateEstimator {
    window_start: u64,
    window_bits: u64,
    current: u64,
}

impl BitrateEstimator {
    pub fn new() -> Self {
        Self { window_start: INVALID_TS, window_bits: 0, current: 0 }
    }

    /// Accounts one received packet; returns the current estimate in bits/s.
    pub fn on_packet(&mut self, now: u64, bytes: usize) -> u64 {
        if self.window_start == INVALID_TS {
            self.window_start = now;
        }
        self.window_bits += bytes as u64 * 8;

        let elapsed = now.saturating_sub(self.window_start);
        if elapsed >= SYSTEM_CLOCK_FREQ {
            self.current = self.window_bits * SYSTEM_CLOCK_FREQ / elapsed;
            self.window_bits = 0;
            self.window_start = now;
        }
        self.current
    }

    pub fn bitrate(&self) -> u64 {
        self.current
    }
}

impl Default for BitrateEstimator {
    fn default() -> Self {
        Self::new()
    }
}
