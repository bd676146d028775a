//! Benchmarks for the per-sample telemetry trigger path
//!
//! Telemetry arrives at high rate for every car, so these run per sample:
//! - RefuelCheck over a stop with noisy fuel and a real refuel
//! - TelemetryTriggers start detection over a launch from the pits

use chrono::Duration;
use criterion::{Criterion, criterion_group, criterion_main};
use pitwall_range::test_utils::{stint, t0, telemetry};
use pitwall_range::triggers::{RefuelCheck, TelemetryTriggers};
use std::hint::black_box;

const SPEED: u32 = 1;
const FUEL: u32 = 2;

fn bench_refuel_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("refuel_check");

    // Ten minutes of 10 Hz samples: running, stopped with noise, refuelling
    let samples: Vec<_> = (0..6000i64)
        .map(|i| {
            let at = t0() + Duration::milliseconds(i * 100);
            let (speed, fuel) = match i {
                0..2000 => (140.0, 12.0 - i as f64 * 0.001),
                2000..3000 => (0.0, 10.0 + ((i % 5) as f64 - 2.0) * 0.1),
                3000..4000 => (0.0, 10.0 + (i - 3000) as f64 * 0.01),
                _ => (120.0, 20.0),
            };
            (speed, fuel, at)
        })
        .collect();

    group.bench_function("ten_minutes_10hz", |b| {
        b.iter(|| {
            let mut check = RefuelCheck::new();
            let mut triggers = 0;
            for (speed, fuel, at) in &samples {
                if check.check(black_box(*speed), black_box(*fuel), *at) {
                    triggers += 1;
                }
            }
            black_box(triggers)
        })
    });

    group.finish();
}

fn bench_telemetry_triggers(c: &mut Criterion) {
    let mut group = c.benchmark_group("telemetry_triggers");

    let launch: Vec<_> = (0..600i64)
        .map(|i| telemetry(70, t0() + Duration::milliseconds(i * 100), (SPEED, (i as f64 * 0.1).min(60.0)), (FUEL, 18.0)))
        .collect();
    let running: Vec<_> = (0..600i64)
        .map(|i| telemetry(70, t0() + Duration::milliseconds(i * 100), (SPEED, 150.0), (FUEL, 18.0 - i as f64 * 0.001)))
        .collect();
    let open = stint("7", t0(), None);

    group.bench_function("start_detection", |b| {
        b.iter(|| {
            let mut triggers = TelemetryTriggers::new(Some(SPEED), Some(FUEL));
            for data in &launch {
                black_box(triggers.process(black_box(data), None, data.timestamp));
            }
        })
    });

    group.bench_function("open_stint_refuel_watch", |b| {
        b.iter(|| {
            let mut triggers = TelemetryTriggers::new(Some(SPEED), Some(FUEL));
            for data in &running {
                black_box(triggers.process(black_box(data), Some(&open), data.timestamp));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_refuel_check, bench_telemetry_triggers);
criterion_main!(benches);
