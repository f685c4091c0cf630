use clap::Parser;
use tr101_monitor::monitor::{Options, ReportOptions, run};

#[derive(Parser)]
struct Opt {
    /// UDP socket to bind + listen (IPv4)
    #[clap(long, default_value = "239.1.1.2:1234")]
    addr: String,

    /// Refresh interval for the periodic report, in seconds
    #[clap(long, default_value_t = 2)]
    refresh: u64,

    /// Emit the periodic report as JSON instead of plain text
    #[clap(long, default_value_t = false)]
    json: bool,

    /// Show a final TR 101 290 report on exit. Default on, unless JSON is set.
    #[clap(long, default_value_t = false)]
    show_report: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();

    run(Options {
        addr: opt.addr.parse()?,
        refresh_secs: opt.refresh,
        report: ReportOptions::from_flags(opt.json, opt.show_report),
    })
    .await
}
