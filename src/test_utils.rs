//! Fixture builders shared by unit tests and benches
//!
//! Timing fixtures are synthetic: laps are laid end to end from [`t0`], so a
//! lap's timestamp is always the previous lap's timestamp plus its own time.

#![cfg(any(test, feature = "benchmark"))]

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::types::{ChannelDataSet, ChannelId, Lap, Stint, TrackFlag};

/// Reference instant used by all fixtures (race start).
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().unwrap_or_default()
}

/// Single green lap completing at `t0 + current * secs`.
pub fn lap(car_number: &str, current_lap: i32, last_pit_lap: i32, secs: f64) -> Lap {
    let millis = (f64::from(current_lap.max(1)) * secs * 1000.0).round() as i64;
    Lap {
        car_number: car_number.to_string(),
        class_name: "GTD".to_string(),
        event_id: 1,
        run_id: 1,
        current_lap,
        last_lap_time_seconds: secs,
        last_pit_lap,
        position_in_run: 1,
        timestamp: t0() + Duration::milliseconds(millis),
        flag: TrackFlag::Green,
    }
}

/// Stint with identity fields filled for car `car_number` in event 1 run 1.
pub fn stint(car_number: &str, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Stint {
    Stint {
        id: Uuid::new_v4(),
        car_number: car_number.to_string(),
        event_id: 1,
        run_id: 1,
        tenant_id: "tenant".to_string(),
        start,
        end,
        note: String::new(),
        starting_fuel_gallons: 18.0,
        yellow_duration_minutes: 0.0,
        red_duration_minutes: 0.0,
        start_override: None,
        end_override: None,
        fuel_override: None,
    }
}

/// One lap row of a [`race_laps`] script: (lap time, is pit lap).
pub type LapScript = (f64, bool);

/// Build a lap history from a script, chaining timestamps and pit markers.
///
/// `last_pit_lap` carries forward from the most recent scripted pit lap.
pub fn race_laps(car_number: &str, script: &[LapScript]) -> Vec<Lap> {
    let mut laps = Vec::with_capacity(script.len());
    let mut at = t0();
    let mut last_pit = 0;
    for (index, (secs, pit)) in script.iter().enumerate() {
        let current = index as i32 + 1;
        if *pit {
            last_pit = current;
        }
        at += Duration::milliseconds((secs * 1000.0).round() as i64);
        laps.push(Lap {
            car_number: car_number.to_string(),
            class_name: "GTD".to_string(),
            event_id: 1,
            run_id: 1,
            current_lap: current,
            last_lap_time_seconds: *secs,
            last_pit_lap: last_pit,
            position_in_run: 1,
            timestamp: at,
            flag: TrackFlag::Green,
        });
    }
    laps
}

/// Long race with a pit stop every `stint_laps` laps, for benches.
pub fn endurance_laps(car_number: &str, total_laps: usize, stint_laps: usize) -> Vec<Lap> {
    let stint_laps = stint_laps.max(2);
    let script: Vec<LapScript> = (1..=total_laps)
        .map(|lap| {
            let pit = lap % stint_laps == 0;
            let secs = if pit { 150.0 } else { 90.0 + (lap % 7) as f64 * 0.35 };
            (secs, pit)
        })
        .collect();
    race_laps(car_number, &script)
}

/// Telemetry data set with speed and fuel samples.
pub fn telemetry(
    device_id: u32,
    at: DateTime<Utc>,
    speed: (ChannelId, f64),
    fuel: (ChannelId, f64),
) -> ChannelDataSet {
    ChannelDataSet::new(device_id, at).with_sample(speed.0, speed.1).with_sample(fuel.0, fuel.1)
}
