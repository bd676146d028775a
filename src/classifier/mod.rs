//! Lap classification into stints and pit stops.
//!
//! Classification is a pure function of a car's lap history: [`classify`]
//! walks every lap from scratch on each call, so the result never depends on
//! the order batches arrived in. The pit lap correction needs the whole
//! history to be visible, which is why there is no incremental path.
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use pitwall_range::classifier::classify;
//! use pitwall_range::{Lap, TrackFlag};
//!
//! let start = Utc::now();
//! let lap = |current: i32, last_pit: i32, secs: f64| Lap {
//!     car_number: "7".into(),
//!     class_name: "GTD".into(),
//!     event_id: 1,
//!     run_id: 1,
//!     current_lap: current,
//!     last_lap_time_seconds: secs,
//!     last_pit_lap: last_pit,
//!     position_in_run: 1,
//!     timestamp: start + Duration::seconds(i64::from(current) * 100),
//!     flag: TrackFlag::Green,
//! };
//!
//! let strategy = classify(&[lap(1, 0, 90.0), lap(2, 2, 150.0), lap(3, 2, 91.0)]);
//! assert_eq!(strategy.stints.len(), 2);
//! assert_eq!(strategy.pit_stops[0].estimated_duration_secs, Some(59.0));
//! ```

mod history;
mod stats;

pub use history::{CarLapHistory, LapClassifier};
pub use stats::{StrategyStats, Summary};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Lap;

/// Laps between two pit stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedStint {
    pub number: u32,
    pub first_lap: i32,
    pub last_lap: i32,
    pub lap_count: usize,
    pub lap_times: Vec<f64>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_secs: f64,
    /// Ended by a pit stop or a terminal flag.
    pub completed: bool,
}

/// One or more consecutive pit-flagged laps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedPitStop {
    pub number: u32,
    pub laps: Vec<i32>,
    pub lap_time_secs: f64,
    pub reference_lap_time_secs: Option<f64>,
    pub estimated_duration_secs: Option<f64>,
    pub completed_at: DateTime<Utc>,
    pub comments: Vec<String>,
}

/// Full classification of one car's race.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct CarStrategy {
    pub car_number: String,
    pub stints: Vec<ClassifiedStint>,
    pub pit_stops: Vec<ClassifiedPitStop>,
    pub stats: StrategyStats,
}

impl CarStrategy {
    pub fn total_laps(&self) -> usize {
        self.stints.iter().map(|s| s.lap_count).sum::<usize>()
            + self.pit_stops.iter().map(|p| p.laps.len()).sum::<usize>()
    }
}

#[derive(Debug, Default)]
struct PitBuilder {
    laps: Vec<Lap>,
    reference: Option<f64>,
    comments: Vec<String>,
}

impl PitBuilder {
    fn last_lap_number(&self) -> i32 {
        self.laps.last().map_or(0, |l| l.current_lap)
    }

    fn lap(&self, number: i32) -> Option<&Lap> {
        self.laps.iter().find(|l| l.current_lap == number)
    }

    fn finish(self, number: u32) -> Option<ClassifiedPitStop> {
        let completed_at = self.laps.last()?.timestamp;
        let lap_time_secs: f64 = self.laps.iter().map(|l| l.last_lap_time_seconds).sum();
        let estimated_duration_secs = self.reference.map(|reference| {
            let estimate = lap_time_secs - reference;
            if estimate < 0.0 { lap_time_secs } else { estimate }
        });
        Some(ClassifiedPitStop {
            number,
            laps: self.laps.iter().map(|l| l.current_lap).collect(),
            lap_time_secs,
            reference_lap_time_secs: self.reference,
            estimated_duration_secs,
            completed_at,
            comments: self.comments,
        })
    }
}

fn finish_stint(laps: Vec<Lap>, number: u32, completed: bool) -> Option<ClassifiedStint> {
    let first = laps.first()?;
    let last = laps.last()?;
    let lap_times: Vec<f64> = laps.iter().map(|l| l.last_lap_time_seconds).collect();
    Some(ClassifiedStint {
        number,
        first_lap: first.current_lap,
        last_lap: last.current_lap,
        lap_count: laps.len(),
        duration_secs: lap_times.iter().sum(),
        lap_times,
        start: first.start_time(),
        end: last.timestamp,
        completed,
    })
}

/// Classify a car's laps into stints and pit stops and compute statistics.
///
/// Laps without a positive lap time are dropped. When a lap number appears
/// more than once the last occurrence wins.
pub fn classify(laps: &[Lap]) -> CarStrategy {
    let mut ordered: Vec<&Lap> = laps.iter().filter(|l| l.has_valid_time()).collect();
    ordered.sort_by_key(|l| l.current_lap);
    // Stable sort keeps arrival order within a lap number; keep the latest
    let mut unique: Vec<&Lap> = Vec::with_capacity(ordered.len());
    for lap in ordered {
        if unique.last().is_some_and(|prev| prev.current_lap == lap.current_lap) {
            unique.pop();
        }
        unique.push(lap);
    }

    let car_number = unique.first().map(|l| l.car_number.clone()).unwrap_or_default();
    let mut closed_stints: Vec<Vec<Lap>> = Vec::new();
    let mut current: Vec<Lap> = Vec::new();
    let mut pits: Vec<PitBuilder> = Vec::new();

    for lap in unique {
        if lap.is_pit_lap() {
            let adjacent = current.is_empty()
                && pits.last().is_some_and(|p| p.last_lap_number() + 1 == lap.current_lap);
            if adjacent {
                if let Some(pit) = pits.last_mut() {
                    pit.laps.push(lap.clone());
                }
            } else {
                pits.push(PitBuilder { laps: vec![lap.clone()], ..Default::default() });
            }
            if !current.is_empty() {
                closed_stints.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some(pit) = pits.last_mut() {
            if lap.last_pit_lap + 1 == lap.current_lap {
                let slower = pit
                    .lap(lap.last_pit_lap)
                    .is_some_and(|pit_lap| lap.last_lap_time_seconds > pit_lap.last_lap_time_seconds);
                if slower && pit.reference.is_none() {
                    debug!(
                        car = %lap.car_number,
                        from = lap.last_pit_lap,
                        to = lap.current_lap,
                        "Moving pit stop to slower following lap"
                    );
                    let displaced = std::mem::replace(&mut pit.laps, vec![lap.clone()]);
                    pit.comments.push(format!(
                        "Pit moved from lap {} to lap {} (longer lap time).",
                        lap.last_pit_lap, lap.current_lap
                    ));
                    // The displaced lap was the last racing lap of the previous stint
                    match closed_stints.last_mut() {
                        Some(previous) => previous.extend(displaced),
                        None => closed_stints.push(displaced),
                    }
                    continue;
                }
            }
            if pit.reference.is_none() && lap.current_lap > pit.last_lap_number() {
                pit.reference = Some(lap.last_lap_time_seconds);
            }
        }
        current.push(lap.clone());
    }

    let finished = current.last().is_some_and(|l| l.flag.is_terminal());
    let mut stints: Vec<ClassifiedStint> = Vec::with_capacity(closed_stints.len() + 1);
    for laps in closed_stints {
        let number = stints.len() as u32 + 1;
        stints.extend(finish_stint(laps, number, true));
    }
    let number = stints.len() as u32 + 1;
    stints.extend(finish_stint(current, number, finished));

    let pit_stops: Vec<ClassifiedPitStop> = pits
        .into_iter()
        .enumerate()
        .filter_map(|(index, pit)| pit.finish(index as u32 + 1))
        .collect();

    let now = stints
        .iter()
        .map(|s| s.end)
        .chain(pit_stops.iter().map(|p| p.completed_at))
        .max();
    let stats = stats::compute(&stints, &pit_stops, now);

    CarStrategy { car_number, stints, pit_stops, stats }
}
