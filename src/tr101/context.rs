//! Per-PID bookkeeping: role state machine plus the full indicator set.

use crate::constants::{INDICATOR_VALUE_TIMEOUT, INVALID_TS};
use crate::tr101::indicator::Indicator;
use crate::tr101::stat::DisplayUnit;

/// Role of a PID, driven by PAT/PMT content as the stream evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    /// PID 0x0000.
    Pat,
    /// Referenced as a PMT PID by the current PAT.
    Pmt,
    /// Elementary stream of a known service.
    Assigned,
    /// Everything else: not (or no longer) referenced.
    Unassigned,
}

/// The 14 indicator kinds, in report order. Priority 1 first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorKind {
    PatError,
    PatError2,
    CcError,
    PmtError,
    PmtError2,
    PidError,
    TransportError,
    CrcError,
    PcrError,
    PcrRepetitionError,
    PcrDiscontinuityIndicatorError,
    PcrAccuracyError,
    PtsError,
    CatError,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 14] = [
        IndicatorKind::PatError,
        IndicatorKind::PatError2,
        IndicatorKind::CcError,
        IndicatorKind::PmtError,
        IndicatorKind::PmtError2,
        IndicatorKind::PidError,
        IndicatorKind::TransportError,
        IndicatorKind::CrcError,
        IndicatorKind::PcrError,
        IndicatorKind::PcrRepetitionError,
        IndicatorKind::PcrDiscontinuityIndicatorError,
        IndicatorKind::PcrAccuracyError,
        IndicatorKind::PtsError,
        IndicatorKind::CatError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IndicatorKind::PatError => "PAT_error",
            IndicatorKind::PatError2 => "PAT_error_2",
            IndicatorKind::CcError => "Continuity_count_error",
            IndicatorKind::PmtError => "PMT_error",
            IndicatorKind::PmtError2 => "PMT_error_2",
            IndicatorKind::PidError => "PID_error",
            IndicatorKind::TransportError => "Transport_error",
            IndicatorKind::CrcError => "CRC_error",
            IndicatorKind::PcrError => "PCR_error",
            IndicatorKind::PcrRepetitionError => "PCR_repetition_error",
            IndicatorKind::PcrDiscontinuityIndicatorError => "PCR_discontinuity_indicator_error",
            IndicatorKind::PcrAccuracyError => "PCR_accuracy_error",
            IndicatorKind::PtsError => "PTS_error",
            IndicatorKind::CatError => "CAT_error",
        }
    }

    /// ETSI TR 101 290 priority class (section 5.2.1 vs 5.2.2).
    pub fn priority(self) -> u8 {
        match self {
            IndicatorKind::PatError
            | IndicatorKind::PatError2
            | IndicatorKind::CcError
            | IndicatorKind::PmtError
            | IndicatorKind::PmtError2
            | IndicatorKind::PidError => 1,
            _ => 2,
        }
    }

    fn show_value(self) -> bool {
        !matches!(
            self,
            IndicatorKind::CcError
                | IndicatorKind::TransportError
                | IndicatorKind::CrcError
                | IndicatorKind::CatError
        )
    }

    fn unit(self) -> DisplayUnit {
        // Accuracy jitter lives on the +-500 ns scale; everything else is an
        // interval in the tens-to-hundreds of milliseconds.
        if self == IndicatorKind::PcrAccuracyError {
            DisplayUnit::Nanoseconds
        } else {
            DisplayUnit::Milliseconds
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

pub struct ServiceContext {
    pub pid: u16,
    service_type: ServiceType,
    system_table: bool,
    pub pmt_service_id: Option<u16>,
    pub last_repeat: bool,
    pub has_discontinuity: bool,
    pub last_pts_ts: u64,
    pub last_pcr_ts: u64,
    pub last_pcr_val: u64,
    pub last_table_ts: u64,
    pub last_cc: Option<u8>,
    indicators: [Indicator; 14],
}

impl ServiceContext {
    pub fn new(pid: u16, service_type: ServiceType) -> Self {
        let indicators = IndicatorKind::ALL.map(|kind| {
            Indicator::new(kind.name(), kind.show_value(), kind.unit(), INDICATOR_VALUE_TIMEOUT)
        });
        let mut ctx = Self {
            pid,
            service_type,
            system_table: false,
            pmt_service_id: None,
            last_repeat: false,
            has_discontinuity: false,
            last_pts_ts: INVALID_TS,
            last_pcr_ts: INVALID_TS,
            last_pcr_val: INVALID_TS,
            last_table_ts: INVALID_TS,
            last_cc: None,
            indicators,
        };
        ctx.apply_type_gates();
        ctx
    }

    /// For the seeded CAT/NIT/SDT/EIT/TOT PIDs: unassigned role, but CRC
    /// checked and no PTS expectation.
    pub fn new_system_table(pid: u16) -> Self {
        let mut ctx = Self::new(pid, ServiceType::Unassigned);
        ctx.system_table = true;
        ctx.apply_type_gates();
        ctx
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn is_system_table(&self) -> bool {
        self.system_table
    }

    /// Role change: atomically recomputes every type-gated enabled flag.
    pub fn set_type(&mut self, service_type: ServiceType) {
        self.service_type = service_type;
        self.apply_type_gates();
    }

    fn apply_type_gates(&mut self) {
        use IndicatorKind::*;
        let t = self.service_type;
        let is_pat = t == ServiceType::Pat;
        let is_pmt = t == ServiceType::Pmt;
        let generic = !is_pat && !is_pmt;
        let system_table = self.system_table;

        self.ind_mut(PatError).set_enabled(is_pat);
        self.ind_mut(PatError2).set_enabled(is_pat);
        self.ind_mut(PmtError).set_enabled(is_pmt);
        self.ind_mut(PmtError2).set_enabled(is_pmt);
        self.ind_mut(PidError).set_enabled(generic);
        self.ind_mut(CcError).set_enabled(true);
        self.ind_mut(TransportError).set_enabled(true);
        self.ind_mut(CatError).set_enabled(true);
        self.ind_mut(CrcError).set_enabled(is_pat || is_pmt || system_table);
        self.ind_mut(PtsError).set_enabled(generic && !system_table);
        // PCR-family indicators are gated by PCR presence, not role.
    }

    /// Called on the first packet carrying a PCR; stays enabled afterwards.
    pub fn enable_pcr_indicators(&mut self) {
        use IndicatorKind::*;
        for kind in [PcrError, PcrRepetitionError, PcrDiscontinuityIndicatorError, PcrAccuracyError]
        {
            self.ind_mut(kind).set_enabled(true);
        }
    }

    pub fn ind(&self, kind: IndicatorKind) -> &Indicator {
        &self.indicators[kind.index()]
    }

    pub fn ind_mut(&mut self, kind: IndicatorKind) -> &mut Indicator {
        &mut self.indicators[kind.index()]
    }

    /// Clears all indicator counts; identity, role and decoding state stay.
    pub fn clear(&mut self) {
        for ind in &mut self.indicators {
            ind.clear();
        }
    }
}
