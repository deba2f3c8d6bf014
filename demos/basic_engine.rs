//! Drives an engine through a skewed workload, a θ update from the
//! controller and three report periods, then prints the Prometheus text.
//!
//! Run with `RUST_LOG=tinyslru=debug cargo run --example basic_engine`.

use std::io;
use std::time::Duration;

use tinyslru::codec::{ThetaUpdate, encode_theta_updates};
use tinyslru::engine::Engine;
use tinyslru::metrics::exporter::PrometheusTextExporter;
use tinyslru::metrics::traits::{MetricsExporter, MetricsSnapshotProvider};
use tinyslru::report::{AccessReport, DestinationFilter, ManualScheduler};
use tinyslru::Name;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut engine: Engine<Vec<u8>> = Engine::builder()
        .capacities(8, 24)
        .report_interval(Duration::from_secs(10))
        .build();
    let mut scheduler = ManualScheduler::new();
    let mut timer = engine.report_timer();
    let mut outbox: Vec<AccessReport> = Vec::new();
    timer.start(&mut scheduler);

    // The controller favours the hot prefix and disables the cold one.
    let mut instructions = Vec::new();
    for i in 0..8 {
        instructions.push(ThetaUpdate::new(Name::from(format!("/hot/{}", i)), 1.0));
    }
    instructions.push(ThetaUpdate::new(Name::from("/cold/0"), 0.0));
    engine.route_response(
        Name::from("/fog/instruction/1"),
        encode_theta_updates(&instructions),
    );

    for period in 1..=3u64 {
        for i in 0..200u64 {
            let key = if i % 3 == 0 {
                Name::from(format!("/hot/{}", i % 8))
            } else {
                Name::from(format!("/cold/{}", (i * 31 + period) % 97))
            };
            if engine.on_request(&key).is_none() {
                let payload = format!("content of {}", key).into_bytes();
                engine.route_response(key, payload);
            }
        }
        timer.run_until(
            Duration::from_secs(10 * period),
            &mut scheduler,
            &mut engine,
            &mut outbox,
        );
    }
    timer.shutdown(&mut scheduler);

    let faces = ["udp4://192.0.2.1:6363", "internal://", "appFace://17"];
    let destinations = DestinationFilter::default().select(faces);
    for report in &outbox {
        println!(
            "{} ({} records, {} bytes) -> {:?}",
            report.name,
            report.records,
            report.payload.len(),
            destinations
        );
    }

    let exporter = PrometheusTextExporter::new("tinyslru", io::stdout());
    exporter.export(&engine.snapshot());
}
