//! One named TR 101 290 error counter/timer.

use crate::constants::INVALID_TS;
use crate::tr101::stat::{DisplayUnit, IndicatorStat};

pub struct Indicator {
    name: &'static str,
    show_value: bool,
    enabled: bool,
    value_timeout: u64,
    prev_ts: u64,
    stat: IndicatorStat,
    in_timeout: bool,
    err_count: u64,
}

impl Indicator {
    pub fn new(name: &'static str, show_value: bool, unit: DisplayUnit, value_timeout: u64) -> Self {
        Self {
            name,
            show_value,
            enabled: false,
            value_timeout,
            prev_ts: INVALID_TS,
            stat: IndicatorStat::new(unit),
            in_timeout: false,
            err_count: 0,
        }
    }

    /// Records an observation at `now`; counts it when `in_error`. A fresh
    /// observation always ends a running timeout episode. Returns `in_error`
    /// so callers can chain logging decisions.
    pub fn update(&mut self, now: u64, in_error: bool) -> bool {
        self.prev_ts = now;
        if in_error {
            self.err_count += 1;
        }
        self.in_timeout = false;
        in_error
    }

    /// Same as [`update`](Self::update), additionally recording a tick-domain
    /// delta in the embedded stat. The value is pushed unconditionally: CURR
    /// reflects the latest measurement, faulty or not.
    pub fn update_value(&mut self, now: u64, in_error: bool, ticks: i64) -> bool {
        self.stat.push_sys_clock(ticks);
        self.update(now, in_error)
    }

    /// Latching timeout transition: only the false->true edge counts.
    pub fn timeout(&mut self, flag: bool) -> bool {
        if flag && !self.in_timeout {
            self.err_count += 1;
        }
        self.in_timeout = flag;
        flag
    }

    /// Latches a timeout when the last observation is older than `max_interval`.
    pub fn timeout_after(&mut self, now: u64, max_interval: u64) -> bool {
        if self.prev_ts != INVALID_TS && now.saturating_sub(self.prev_ts) > max_interval {
            self.timeout(true)
        } else {
            false
        }
    }

    /// Display suppression only: a stale indicator renders as N/A, but any
    /// recorded error keeps it visible forever (until `clear`).
    pub fn is_outdated(&self, now: u64) -> bool {
        self.err_count == 0
            && (self.prev_ts == INVALID_TS || now.saturating_sub(self.prev_ts) > self.value_timeout)
    }

    /// Resets counts, not configuration or history.
    pub fn clear(&mut self) {
        self.err_count = 0;
        self.in_timeout = false;
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn show_value(&self) -> bool {
        self.show_value
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn err_count(&self) -> u64 {
        self.err_count
    }

    pub fn stat(&self) -> &IndicatorStat {
        &self.stat
    }
}
