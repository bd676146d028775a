//! Descriptive statistics and pit window projection

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{ClassifiedPitStop, ClassifiedStint};

/// Population statistics over a set of positive values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

impl Summary {
    /// Summarise the strictly positive entries of `values`.
    ///
    /// Returns `None` when nothing positive remains.
    pub fn of_positive(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let positive: Vec<f64> = values.into_iter().filter(|v| *v > 0.0 && v.is_finite()).collect();
        if positive.is_empty() {
            return None;
        }
        let min = positive.iter().copied().fold(f64::INFINITY, f64::min);
        let max = positive.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            count: positive.len(),
            mean: statistical::mean(&positive),
            median: statistical::median(&positive),
            min,
            max,
            std_dev: statistical::population_standard_deviation(&positive, None),
        })
    }
}

/// Race strategy figures for one car.
///
/// Projections are `None` whenever an input is missing or zero, never a
/// guess from partial data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct StrategyStats {
    pub lap_times: Option<Summary>,
    pub pit_durations: Option<Summary>,
    pub stint_seconds: Option<Summary>,
    pub stint_laps: Option<Summary>,
    pub last_stop_time: Option<DateTime<Utc>>,
    pub next_pit_time: Option<DateTime<Utc>>,
    pub minutes_remaining: Option<f64>,
    pub laps_remaining: Option<f64>,
}

impl StrategyStats {
    pub fn median_lap_secs(&self) -> Option<f64> {
        self.lap_times.map(|s| s.median)
    }

    pub fn max_stint_secs(&self) -> Option<f64> {
        self.stint_seconds.map(|s| s.max)
    }
}

/// Compute statistics for a classified history. `now` is the time of the
/// latest lap so the result stays a pure function of the laps.
pub fn compute(
    stints: &[ClassifiedStint],
    pit_stops: &[ClassifiedPitStop],
    now: Option<DateTime<Utc>>,
) -> StrategyStats {
    let lap_times = Summary::of_positive(stints.iter().flat_map(|s| s.lap_times.iter().copied()));
    let pit_durations = Summary::of_positive(pit_stops.iter().filter_map(|p| p.estimated_duration_secs));

    // Only finished stints say anything about how far a tank goes
    let completed: Vec<&ClassifiedStint> = stints.iter().filter(|s| s.completed).collect();
    let stint_seconds = Summary::of_positive(completed.iter().map(|s| s.duration_secs));
    let stint_laps = Summary::of_positive(completed.iter().map(|s| s.lap_count as f64));

    let last_stop_time = pit_stops.last().map(|p| p.completed_at);

    let mut stats = StrategyStats {
        lap_times,
        pit_durations,
        stint_seconds,
        stint_laps,
        last_stop_time,
        ..Default::default()
    };

    let (Some(max_range), Some(last_stop), Some(median_lap), Some(now)) =
        (stats.max_stint_secs(), last_stop_time, stats.median_lap_secs(), now)
    else {
        return stats;
    };
    if max_range <= 0.0 || median_lap <= 0.0 {
        return stats;
    }

    let next_pit = last_stop + Duration::milliseconds((max_range * 1000.0).round() as i64);
    let remaining_secs = ((next_pit - now).num_milliseconds() as f64 / 1000.0).max(0.0);
    stats.next_pit_time = Some(next_pit);
    stats.minutes_remaining = Some(remaining_secs / 60.0);
    stats.laps_remaining = Some(remaining_secs / median_lap);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_ignores_non_positive_entries() {
        let summary = Summary::of_positive([0.0, -4.0, 2.0, 4.0, 6.0]).unwrap();
        assert_eq!(summary.count, 3);
        assert!((summary.mean - 4.0).abs() < 1e-9);
        assert!((summary.median - 4.0).abs() < 1e-9);
        assert_eq!(summary.min, 2.0);
        assert_eq!(summary.max, 6.0);
        // Population standard deviation of 2, 4, 6
        assert!((summary.std_dev - (8.0f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn summary_of_nothing_is_none() {
        assert!(Summary::of_positive([0.0, -1.0]).is_none());
        assert!(Summary::of_positive(Vec::new()).is_none());
    }

    #[test]
    fn projection_requires_every_input() {
        let stats = compute(&[], &[], None);
        assert_eq!(stats, StrategyStats::default());
        assert!(stats.next_pit_time.is_none());
        assert!(stats.minutes_remaining.is_none());
        assert!(stats.laps_remaining.is_none());
    }
}
