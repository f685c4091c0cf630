use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tokio::net::UdpSocket;

use crate::monitor::Options;
use crate::processor::StreamProcessor;

pub async fn run(opts: Options) -> anyhow::Result<()> {
    let socket = crate::network::create_udp_socket(&opts.addr.to_string())?;
    let sock = UdpSocket::from_std(socket.into())?;

    let mut processor = StreamProcessor::new();
    let mut buf = [0u8; 2048];
    let mut last_print = Instant::now();

    loop {
        tokio::select! {
            received = sock.recv(&mut buf) => {
                let n = received?;
                if n == 0 {
                    continue;
                }
                processor.process_datagram(&buf[..n]);

                if last_print.elapsed() >= Duration::from_secs(opts.refresh_secs) {
                    emit_report(&processor, opts.report.json);
                    last_print = Instant::now();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if opts.report.show_report {
                    println!("{}", processor.analyzer().report());
                }
                return Ok(());
            }
        }
    }
}

fn emit_report(processor: &StreamProcessor, as_json: bool) {
    if as_json {
        let mut report = processor.analyzer().report_json(None);
        if let Value::Object(root) = &mut report {
            root.insert("ts_time".into(), json!(chrono::Utc::now().to_rfc3339()));
        }
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(err) => eprintln!("report serialization failed: {err}"),
        }
    } else {
        println!("{}", processor.analyzer().report());
    }
}
