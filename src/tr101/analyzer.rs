//! Real-time ETSI TR 101 290 conformance analyzer.
//!
//! Single pass, bounded per-packet work: every packet updates one PID's
//! context, then goes through the section demux whose events (tables,
//! sections, CRC failures) drive the role state machine and the
//! section-level checks before `feed_packet` returns.

use std::collections::{BTreeMap, HashMap, HashSet};

use bytes::Bytes;

use crate::constants::{
    CAT_VALID_INTERVAL, CC_MAX, INVALID_TS, PAT_INTERVAL, PCR_ACCURACY_LIMIT_NS,
    PCR_DISCONTINUITY_LIMIT, PCR_REPETITION_LIMIT, PID_CAT, PID_EIT, PID_NIT, PID_NULL, PID_PAT,
    PID_SDT, PID_TOT, PKT_SIZE_BITS, PMT_INTERVAL, PTS_REPETITION_INTERVAL, SYSTEM_CLOCK_FREQ,
    TID_CAT, TID_PAT, TID_PMT,
};
use crate::demux::{DemuxEvent, InvalidSectionStatus, SectionDemux};
use crate::packet::TsPacket;
use crate::psi::{parse_pat, parse_pmt};
use crate::tr101::context::{IndicatorKind, ServiceContext, ServiceType};

use IndicatorKind::*;

pub struct Tr101Analyzer {
    demux: SectionDemux,
    services: BTreeMap<u16, ServiceContext>,
    current_ts: u64,
    bitrate: u64,
    last_cat_ts: u64,
    packet_count: u64,
}

impl Tr101Analyzer {
    pub fn new() -> Self {
        let mut services = BTreeMap::new();
        services.insert(PID_PAT, ServiceContext::new(PID_PAT, ServiceType::Pat));
        let mut demux = SectionDemux::new();
        demux.add_pid(PID_PAT);
        for pid in [PID_CAT, PID_NIT, PID_SDT, PID_EIT, PID_TOT] {
            services.insert(pid, ServiceContext::new_system_table(pid));
            demux.add_pid(pid);
        }
        Self {
            demux,
            services,
            current_ts: INVALID_TS,
            bitrate: 0,
            last_cat_ts: INVALID_TS,
            packet_count: 0,
        }
    }

    /// Feeds one packet with its capture timestamp (27 MHz ticks) and the
    /// live bitrate estimate (bits/s). Synchronous and run-to-completion:
    /// all demux events raised by this packet are handled before returning.
    pub fn feed_packet(&mut self, pkt: &TsPacket, timestamp: u64, bitrate: u64) {
        self.current_ts = timestamp;
        self.bitrate = bitrate;
        self.packet_count += 1;

        let last_cat_ts = self.last_cat_ts;
        let ctx = self
            .services
            .entry(pkt.pid)
            .or_insert_with(|| ServiceContext::new(pkt.pid, ServiceType::Unassigned));
        process_timeouts(ctx, timestamp);
        process_packet(ctx, pkt, timestamp, bitrate, last_cat_ts);

        for event in self.demux.push(pkt) {
            match event {
                DemuxEvent::Section { pid, table_id, section_number } => {
                    self.handle_section(pid, table_id, section_number);
                }
                DemuxEvent::Table { pid, table_id, sections } => {
                    self.handle_table(pid, table_id, &sections);
                }
                DemuxEvent::Invalid { pid, status } => {
                    self.handle_invalid_section(pid, status);
                }
            }
        }
    }

    /// Clears every indicator of every known context. Roles, PID set and
    /// decoding state survive; only the counters restart.
    pub fn reset(&mut self) {
        for ctx in self.services.values_mut() {
            ctx.clear();
        }
    }

    pub fn services(&self) -> &BTreeMap<u16, ServiceContext> {
        &self.services
    }

    pub fn service(&self, pid: u16) -> Option<&ServiceContext> {
        self.services.get(&pid)
    }

    pub fn current_timestamp(&self) -> u64 {
        self.current_ts
    }

    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    fn service_mut(&mut self, pid: u16) -> &mut ServiceContext {
        self.services
            .entry(pid)
            .or_insert_with(|| ServiceContext::new(pid, ServiceType::Unassigned))
    }

    /// Section-level timing: only section number 0 of a table drives the
    /// repetition windows; later segments are ignored.
    fn handle_section(&mut self, pid: u16, table_id: u8, section_number: u8) {
        if section_number != 0 {
            return;
        }
        let now = self.current_ts;

        if pid == PID_CAT {
            if table_id == TID_CAT {
                self.last_cat_ts = now;
            } else {
                // table_id other than 0x01 on PID 0x0001
                self.service_mut(pid).ind_mut(CatError).update(now, true);
            }
            return;
        }

        let ctx = self.service_mut(pid);
        if pid == PID_PAT {
            // PID 0x0000 must only carry PAT sections
            let wrong_table = table_id != TID_PAT;
            ctx.ind_mut(PatError).update(now, wrong_table);
            ctx.ind_mut(PatError2).update(now, wrong_table);

            if !wrong_table {
                if ctx.last_table_ts != INVALID_TS {
                    let diff = now.saturating_sub(ctx.last_table_ts) as i64;
                    ctx.ind_mut(PatError).update_value(now, false, diff);
                    ctx.ind_mut(PatError2).update_value(now, false, diff);
                }
                ctx.last_table_ts = now;
            }
        } else if ctx.service_type() == ServiceType::Pmt && table_id == TID_PMT {
            if ctx.last_table_ts != INVALID_TS {
                let diff = now.saturating_sub(ctx.last_table_ts) as i64;
                ctx.ind_mut(PmtError).update_value(now, false, diff);
                ctx.ind_mut(PmtError2).update_value(now, false, diff);
            }
            ctx.last_table_ts = now;
        }
    }

    fn handle_invalid_section(&mut self, pid: u16, status: InvalidSectionStatus) {
        let now = self.current_ts;
        let ctx = self.service_mut(pid);
        ctx.ind_mut(CrcError).update(now, status == InvalidSectionStatus::BadCrc);

        if pid == PID_PAT {
            // an undecodable section on PID 0x0000 is always a PAT failure
            ctx.ind_mut(PatError).update(now, true);
            ctx.ind_mut(PatError2).update(now, true);
        }
    }

    fn handle_table(&mut self, pid: u16, table_id: u8, sections: &[Bytes]) {
        if table_id == TID_PAT && self.service_mut(pid).service_type() == ServiceType::Pat {
            self.apply_pat(sections);
        } else if table_id == TID_PMT && self.service_mut(pid).service_type() == ServiceType::Pmt {
            self.apply_pmt(pid, sections);
        }
    }

    /// Promote the PMT PIDs the new PAT names; demote PMT contexts whose
    /// service vanished from it.
    fn apply_pat(&mut self, sections: &[Bytes]) {
        let mut pmts: HashMap<u16, u16> = HashMap::new();
        for sec in sections {
            if let Ok(pat) = parse_pat(sec) {
                for entry in pat.programs {
                    pmts.insert(entry.program_number, entry.pmt_pid);
                }
            }
        }

        for (&service_id, &pmt_pid) in &pmts {
            let ctx = self.service_mut(pmt_pid);
            ctx.set_type(ServiceType::Pmt);
            ctx.pmt_service_id = Some(service_id);
            self.demux.add_pid(pmt_pid);
        }

        let stale: Vec<u16> = self
            .services
            .iter()
            .filter(|&(&pid, ref ctx)| {
                ctx.service_type() == ServiceType::Pmt
                    && !ctx.pmt_service_id.is_some_and(|sid| pmts.get(&sid) == Some(&pid))
            })
            .map(|(&pid, _)| pid)
            .collect();
        for pid in stale {
            if let Some(ctx) = self.services.get_mut(&pid) {
                ctx.set_type(ServiceType::Unassigned);
            }
            self.demux.remove_pid(pid);
        }
    }

    /// Assign the elementary PIDs the PMT lists to its service; demote PIDs
    /// of the same service that are no longer listed.
    fn apply_pmt(&mut self, pmt_pid: u16, sections: &[Bytes]) {
        let service_id = match self.services.get(&pmt_pid) {
            Some(ctx) => ctx.pmt_service_id,
            None => return,
        };

        let mut es_pids: HashSet<u16> = HashSet::new();
        for sec in sections {
            if let Ok(pmt) = parse_pmt(sec) {
                for stream in pmt.streams {
                    es_pids.insert(stream.elementary_pid);
                }
            }
        }

        for &es_pid in &es_pids {
            let ctx = self.service_mut(es_pid);
            ctx.set_type(ServiceType::Assigned);
            ctx.pmt_service_id = service_id;
        }

        let stale: Vec<u16> = self
            .services
            .iter()
            .filter(|&(&pid, ref ctx)| {
                ctx.service_type() == ServiceType::Assigned
                    && ctx.pmt_service_id == service_id
                    && !es_pids.contains(&pid)
            })
            .map(|(&pid, _)| pid)
            .collect();
        for pid in stale {
            if let Some(ctx) = self.services.get_mut(&pid) {
                ctx.set_type(ServiceType::Unassigned);
            }
        }
    }
}

impl Default for Tr101Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-evaluates the time-bounded indicators of one context. Runs once per
/// packet for the packet's own PID.
fn process_timeouts(ctx: &mut ServiceContext, now: u64) {
    // PID 0x0000 / referenced PMT PIDs must recur within 0.5 s
    ctx.ind_mut(PatError).timeout_after(now, PAT_INTERVAL);
    ctx.ind_mut(PatError2).timeout_after(now, PAT_INTERVAL);
    ctx.ind_mut(PmtError).timeout_after(now, PMT_INTERVAL);
    ctx.ind_mut(PmtError2).timeout_after(now, PMT_INTERVAL);

    ctx.ind_mut(PidError).timeout_after(now, PMT_INTERVAL);

    // PCR gap limits are suspended while a signaled discontinuity is open
    if !ctx.has_discontinuity {
        ctx.ind_mut(PcrError).timeout_after(now, PCR_REPETITION_LIMIT);
    }
    ctx.ind_mut(PcrRepetitionError).timeout_after(now, PCR_REPETITION_LIMIT);

    ctx.ind_mut(PtsError).timeout_after(now, PTS_REPETITION_INTERVAL);
}

/// Packet-level checks against one context.
fn process_packet(ctx: &mut ServiceContext, pkt: &TsPacket, now: u64, bitrate: u64, last_cat_ts: u64) {
    // Scrambling_control_field must be 00 on PID 0x0000
    if pkt.pid == PID_PAT && pkt.scrambling != 0 {
        ctx.ind_mut(PatError).update(now, true);
        ctx.ind_mut(PatError2).update(now, true);
    }

    if pkt.discontinuity {
        ctx.has_discontinuity = true;
    }

    // Continuity counter. Undefined on the null PID; exempt while the
    // discontinuity indicator is set; needs a prior value to compare.
    let mut repeat = false;
    if !pkt.discontinuity && pkt.pid != PID_NULL {
        if let Some(last_cc) = ctx.last_cc {
            let mut expected_cc = last_cc;
            if pkt.has_payload {
                // One duplicate of the previous packet is legal; the CC must
                // not increment. A second repeat is an error again.
                if pkt.continuity_counter == expected_cc && !ctx.last_repeat {
                    repeat = true;
                } else {
                    expected_cc = (expected_cc + 1) % CC_MAX;
                }
            }
            if expected_cc != pkt.continuity_counter {
                ctx.ind_mut(CcError).update(now, true);
            }
        }
    }
    ctx.last_cc = Some(pkt.continuity_counter);
    ctx.last_repeat = repeat;

    // Presence is what PID_error measures; the timeout sweep does the work.
    ctx.ind_mut(PidError).update(now, false);

    ctx.ind_mut(TransportError).update(now, pkt.transport_error);

    if let Some(pcr_val) = pkt.pcr {
        ctx.enable_pcr_indicators();

        // Arrival gap between consecutive PCRs, bounded at 100 ms
        if ctx.last_pcr_ts != INVALID_TS && !ctx.has_discontinuity {
            let gap = now.saturating_sub(ctx.last_pcr_ts) as i64;
            ctx.ind_mut(PcrError).update_value(now, gap > PCR_DISCONTINUITY_LIMIT as i64, gap);
        }

        ctx.ind_mut(PcrRepetitionError).update(now, false);

        // Value delta between consecutive PCRs: 0..100 ms without a
        // discontinuity indicator
        if ctx.last_pcr_val != INVALID_TS && !ctx.has_discontinuity {
            let delta = pcr_val as i64 - ctx.last_pcr_val as i64;
            ctx.ind_mut(PcrDiscontinuityIndicatorError).update_value(
                now,
                delta > PCR_DISCONTINUITY_LIMIT as i64 || delta < 0,
                delta,
            );
        }

        // Jitter against the PCR extrapolated from elapsed time and bitrate.
        // A zero bitrate would divide by zero: skip this packet's check.
        if ctx.last_pcr_val != INVALID_TS && ctx.last_pcr_ts != INVALID_TS && bitrate > 0 {
            let actual = pcr_val as i64 - ctx.last_pcr_val as i64;
            let elapsed = now.saturating_sub(ctx.last_pcr_ts);
            let expected = (elapsed as i128 * PKT_SIZE_BITS as i128 * SYSTEM_CLOCK_FREQ as i128
                / bitrate as i128) as i64;
            let jitter = actual - expected;
            let jitter_ns = (jitter as i128 * 1_000_000_000 / SYSTEM_CLOCK_FREQ as i128) as i64;
            ctx.ind_mut(PcrAccuracyError).update_value(
                now,
                jitter_ns.abs() > PCR_ACCURACY_LIMIT_NS,
                jitter,
            );
        }

        ctx.last_pcr_ts = now;
        ctx.last_pcr_val = pcr_val;
        ctx.has_discontinuity = false;
    }

    if pkt.pts.is_some() {
        // PTS repetition period at most 700 ms
        if ctx.last_pts_ts != INVALID_TS {
            let gap = now.saturating_sub(ctx.last_pts_ts) as i64;
            ctx.ind_mut(PtsError).update_value(now, gap > PTS_REPETITION_INTERVAL as i64, gap);
        }
        ctx.last_pts_ts = now;
    }

    // Scrambled content without a valid CAT in the last 10 s
    let cat_missing =
        last_cat_ts == INVALID_TS || now.saturating_sub(last_cat_ts) > CAT_VALID_INTERVAL;
    ctx.ind_mut(CatError).update(now, pkt.scrambling != 0 && cat_missing);
}
