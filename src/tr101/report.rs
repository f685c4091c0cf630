//! Report rendering: plain text and JSON walks over all contexts.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::tr101::analyzer::Tr101Analyzer;
use crate::tr101::context::IndicatorKind;
use crate::tr101::indicator::Indicator;

const ERR: &str = "[ERR] ";
const OK: &str = "[OK]  ";
const NA: &str = "[N/A] ";

/// Report configuration loaded from the CLI.
pub struct ReportOptions {
    /// Emit periodic reports as JSON instead of plain text.
    pub json: bool,
    /// Print a final plain-text report on exit. Defaults to on unless JSON
    /// output is selected; `--show-report` forces it back on.
    pub show_report: bool,
}

impl ReportOptions {
    pub fn from_flags(json: bool, show_report: bool) -> Self {
        Self { json, show_report: !json || show_report }
    }
}

/// Per-(PID, indicator) JSON fields; min/max only after the first sample.
#[derive(Serialize)]
struct IndicatorJson {
    count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    curr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
}

impl IndicatorJson {
    fn from_indicator(ind: &Indicator) -> Self {
        let stat = ind.stat();
        Self {
            count: ind.err_count(),
            curr: ind.show_value().then_some(stat.curr_ns() as f64 / 1e9),
            min: ind.show_value().then(|| stat.min_ns()).flatten().map(|v| v as f64 / 1e9),
            max: ind.show_value().then(|| stat.max_ns()).flatten().map(|v| v as f64 / 1e9),
        }
    }
}

impl Tr101Analyzer {
    /// Total error count for one indicator kind across all enabled contexts.
    fn aggregate(&self, kind: IndicatorKind) -> u64 {
        self.services()
            .values()
            .filter(|ctx| ctx.ind(kind).enabled())
            .map(|ctx| ctx.ind(kind).err_count())
            .sum()
    }

    /// Plain-text report: a summary line per indicator kind, then one line
    /// per PID carrying that indicator. Stale indicators render as N/A.
    pub fn report(&self) -> String {
        let now = self.current_timestamp();
        let mut out = String::new();
        let mut priority = 0;

        for kind in IndicatorKind::ALL {
            if kind.priority() != priority {
                if priority != 0 {
                    out.push('\n');
                }
                priority = kind.priority();
                let _ = writeln!(out, "Priority {priority} Errors:");
            }

            let total = self.aggregate(kind);
            let _ = writeln!(out, "{}{}: {}", if total == 0 { OK } else { ERR }, kind.name(), total);

            for (pid, ctx) in self.services() {
                let ind = ctx.ind(kind);
                if !ind.enabled() {
                    continue;
                }
                if ind.is_outdated(now) {
                    let _ = writeln!(out, "\t{NA}PID 0x{pid:X} ({pid}): 0");
                } else {
                    let marker = if ind.err_count() == 0 { OK } else { ERR };
                    let _ = write!(out, "\t{}PID 0x{:X} ({}): {}", marker, pid, pid, ind.err_count());
                    if ind.show_value() {
                        let _ = write!(out, "{}", ind.stat());
                    }
                    out.push('\n');
                }
            }
        }
        out
    }

    /// JSON report: one object per indicator kind holding the aggregate
    /// count and the per-PID breakdown, wrapped under a `tr101` root key.
    pub fn report_json(&self, title: Option<&str>) -> Value {
        let now = self.current_timestamp();
        let mut tr101 = Map::new();

        for kind in IndicatorKind::ALL {
            let mut pids = Map::new();
            for (pid, ctx) in self.services() {
                let ind = ctx.ind(kind);
                if !ind.enabled() || ind.is_outdated(now) {
                    continue;
                }
                let mut by_name = Map::new();
                by_name.insert(kind.name().into(), json!(IndicatorJson::from_indicator(ind)));
                pids.insert(pid.to_string(), Value::Object(by_name));
            }
            tr101.insert(
                kind.name().into(),
                json!({ "count": self.aggregate(kind), "pids": Value::Object(pids) }),
            );
        }

        let mut root = Map::new();
        if let Some(title) = title {
            root.insert("title".into(), json!(title));
        }
        root.insert("tr101".into(), Value::Object(tr101));
        Value::Object(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_show_report_follows_json() {
        assert!(ReportOptions::from_flags(false, false).show_report);
        assert!(!ReportOptions::from_flags(true, false).show_report);
        assert!(ReportOptions::from_flags(true, true).show_report);
    }

    #[test]
    fn empty_analyzer_report_shape() {
        let analyzer = Tr101Analyzer::new();
        let text = analyzer.report();
        assert!(text.starts_with("Priority 1 Errors:\n"));
        assert!(text.contains("\nPriority 2 Errors:\n"));
        assert!(text.contains("[OK]  PAT_error: 0"));
        assert!(text.contains("[OK]  CAT_error: 0"));
        // seeded PAT context, never updated: suppressed as N/A
        assert!(text.contains("\t[N/A] PID 0x0 (0): 0"));
    }

    #[test]
    fn json_report_shape() {
        let analyzer = Tr101Analyzer::new();
        let report = analyzer.report_json(Some("probe"));
        assert_eq!(report["title"], "probe");
        let tr101 = report["tr101"].as_object().unwrap();
        assert_eq!(tr101.len(), 14);
        assert_eq!(tr101["PAT_error"]["count"], 0);
        assert!(tr101["PAT_error"]["pids"].as_object().unwrap().is_empty());
    }
}
