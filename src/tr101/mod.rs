//! ETSI TR 101 290 conformance analysis: per-PID indicators, the role state
//! machine and the orchestrating analyzer.

pub mod analyzer;
pub mod context;
pub mod indicator;
pub mod report;
pub mod stat;

pub use analyzer::Tr101Analyzer;
pub use context::{IndicatorKind, ServiceContext, ServiceType};
pub use indicator::Indicator;
pub use report::ReportOptions;
pub use stat::{DisplayUnit, IndicatorStat};
