//! Constants for MPEG-TS processing and TR 101 290 conformance checks

/// MPEG-TS packet constants
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_SYNC_BYTE: u8 = 0x47;
pub const PKT_SIZE_BITS: u64 = TS_PACKET_SIZE as u64 * 8;

/// System clock: 27 000 000 ticks / second. All analyzer timestamps and
/// intervals are counted in this domain.
pub const SYSTEM_CLOCK_FREQ: u64 = 27_000_000;

/// Sentinel for "timestamp not yet available".
pub const INVALID_TS: u64 = u64::MAX;

/// Continuity counter wraps modulo 16.
pub const CC_MAX: u8 = 16;

/// Reserved PIDs
pub const PID_PAT: u16 = 0x0000;
pub const PID_CAT: u16 = 0x0001;
pub const PID_NIT: u16 = 0x0010;
pub const PID_SDT: u16 = 0x0011;
pub const PID_EIT: u16 = 0x0012;
pub const PID_TOT: u16 = 0x0014;
pub const PID_NULL: u16 = 0x1FFF;

/// Table ids
pub const TID_PAT: u8 = 0x00;
pub const TID_CAT: u8 = 0x01;
pub const TID_PMT: u8 = 0x02;

/// TR 101 290 Section 5.2.1: PID 0x0000 must carry a PAT at least every 0.5 s.
pub const PAT_INTERVAL: u64 = 500 * SYSTEM_CLOCK_FREQ / 1000;

/// TR 101 290 Section 5.2.1: each referenced PMT PID at least every 0.5 s.
pub const PMT_INTERVAL: u64 = 500 * SYSTEM_CLOCK_FREQ / 1000;

/// TR 101 290 Section 5.2.2: PTS repetition period at most 700 ms.
pub const PTS_REPETITION_INTERVAL: u64 = 700 * SYSTEM_CLOCK_FREQ / 1000;

/// TR 101 290 Section 5.2.2: PCR gap / delta bound, 100 ms.
pub const PCR_DISCONTINUITY_LIMIT: u64 = 100 * SYSTEM_CLOCK_FREQ / 1000;
pub const PCR_REPETITION_LIMIT: u64 = 100 * SYSTEM_CLOCK_FREQ / 1000;

/// TR 101 290 Section 5.2.2: PCR accuracy within +-500 ns.
pub const PCR_ACCURACY_LIMIT_NS: i64 = 500;

/// No transmission interval is specified for the CAT; scrambled packets are
/// flagged when no valid CAT was seen within this window.
pub const CAT_VALID_INTERVAL: u64 = 10 * SYSTEM_CLOCK_FREQ;

/// An indicator with no update for this long and no errors renders as N/A.
pub const INDICATOR_VALUE_TIMEOUT: u64 = 5 * SYSTEM_CLOCK_FREQ;
