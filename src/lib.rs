// src/lib.rs
pub mod monitor {
    use std::net::SocketAddr;

    pub use crate::tr101::ReportOptions;

    pub struct Options {
        pub addr: SocketAddr,
        pub refresh_secs: u64,
        pub report: ReportOptions,
    }

    /// Async entry-point; returns when stopped (Ctrl-C or socket error)
    pub async fn run(opts: Options) -> anyhow::Result<()> {
        crate::core::run(opts).await
    }
}

pub mod constants;
pub mod demux;
pub mod packet;
pub mod processor;
pub mod psi;
pub mod stats;
pub mod tr101;

mod core;
mod network;
