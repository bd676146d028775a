//! Per-lap fuel consumption and range estimation
//!
//! Each completed lap compares the fuel level against the level at the
//! previous lap. A drop gives a raw single-lap range; green-flag laps also
//! feed a short rolling window whose average gives the filtered range.
//! Caution laps are excluded from the window because drivers save fuel under
//! yellow and the figures would overstate range.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace};

use crate::types::{CarRangeSettings, ChannelDataSet, Lap, TrackFlag};

/// Number of green laps averaged for the filtered range.
pub const HISTORY_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
struct LapConsumption {
    lap_time_secs: f64,
    consumption: f64,
}

/// Range figures derived at one lap. Unavailable values are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct RangeEstimate {
    pub range_laps: Option<f64>,
    pub range_minutes: Option<f64>,
    pub filtered_range_laps: Option<f64>,
    pub filtered_range_minutes: Option<f64>,
    /// Average fuel used per lap over the rolling window.
    pub consumption: Option<f64>,
}

impl RangeEstimate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Consumption state for one car.
#[derive(Debug, Clone, Default)]
pub struct CarConsumption {
    fuel_level: Option<f64>,
    fuel_at_last_lap: Option<f64>,
    last_lap: i32,
    history: VecDeque<LapConsumption>,
}

impl CarConsumption {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_fuel(&mut self, level: f64) {
        self.fuel_level = Some(level);
    }

    pub fn fuel_level(&self) -> Option<f64> {
        self.fuel_level
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Estimate range at the end of `lap`.
    ///
    /// Returns `None` for laps already processed and when no fuel level has
    /// been seen yet.
    pub fn process_lap(&mut self, lap: &Lap) -> Option<RangeEstimate> {
        if lap.current_lap <= self.last_lap {
            trace!(car = %lap.car_number, lap = lap.current_lap, "Lap already processed");
            return None;
        }
        let fuel = self.fuel_level?;
        self.last_lap = lap.current_lap;
        let previous = self.fuel_at_last_lap.replace(fuel);

        let mut estimate = RangeEstimate::default();
        let diff = previous.map(|p| p - fuel).unwrap_or_default();
        let lap_time = lap.last_lap_time_seconds;

        if diff > 0.0 {
            let range_laps = (fuel / diff).max(0.0);
            let range_secs = (lap_time * range_laps).max(0.0);
            estimate.range_laps = Some(range_laps.floor());
            estimate.range_minutes = Some(round_to(range_secs / 60.0, 1));

            if lap.flag == TrackFlag::Green && lap.has_valid_time() {
                self.history.push_back(LapConsumption { lap_time_secs: lap_time, consumption: diff });
                while self.history.len() > HISTORY_LEN {
                    self.history.pop_front();
                }
            } else {
                debug!(
                    car = %lap.car_number,
                    lap = lap.current_lap,
                    flag = %lap.flag,
                    "Lap excluded from consumption history"
                );
            }
        }

        if !self.history.is_empty() {
            let consumptions: Vec<f64> = self.history.iter().map(|h| h.consumption).collect();
            let lap_times: Vec<f64> = self.history.iter().map(|h| h.lap_time_secs).collect();
            let consumption = statistical::mean(&consumptions);
            let lap_time = statistical::mean(&lap_times);
            if consumption > 0.0 {
                let range_laps = (fuel / consumption).max(0.0);
                estimate.filtered_range_laps = Some(range_laps.floor());
                estimate.filtered_range_minutes = Some(round_to(lap_time * range_laps / 60.0, 1));
                estimate.consumption = Some(round_to(consumption, 3));
            }
        }

        Some(estimate)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Forget lap bookkeeping after the lap counter restarts. The latest
    /// fuel level is still the car's current level and is kept.
    pub fn restart_laps(&mut self) {
        *self = Self { fuel_level: self.fuel_level, ..Self::default() };
    }
}

/// Consumption tracking for one car, publishing to its mapped output
/// channels.
#[derive(Debug)]
pub struct ConsumptionProcessor {
    settings: CarRangeSettings,
    state: Mutex<CarConsumption>,
}

impl ConsumptionProcessor {
    pub fn new(settings: CarRangeSettings) -> Self {
        Self { settings, state: Mutex::new(CarConsumption::new()) }
    }

    pub fn settings(&self) -> &CarRangeSettings {
        &self.settings
    }

    /// Record the latest fuel level from a telemetry data set.
    ///
    /// Returns whether the data set carried a fuel sample.
    pub fn update_fuel(&self, data: &ChannelDataSet) -> bool {
        if data.is_virtual {
            return false;
        }
        let Some(level) = self.settings.channels.fuel_level.and_then(|ch| data.value_of(ch)) else {
            return false;
        };
        self.state.lock().update_fuel(level);
        true
    }

    pub fn estimate(&self, lap: &Lap) -> Option<RangeEstimate> {
        self.state.lock().process_lap(lap)
    }

    /// Process a lap and build the derived channel data set.
    ///
    /// Returns `None` when nothing is mapped or nothing could be estimated.
    pub fn process_lap(&self, lap: &Lap) -> Option<ChannelDataSet> {
        let channels = &self.settings.channels;
        if !channels.has_outputs() {
            return None;
        }
        let estimate = self.estimate(lap)?;
        self.to_data_set(&estimate, lap.timestamp)
    }

    fn to_data_set(&self, estimate: &RangeEstimate, at: DateTime<Utc>) -> Option<ChannelDataSet> {
        let channels = &self.settings.channels;
        let mut data = ChannelDataSet::new_virtual(self.settings.device_id, at);
        let outputs = [
            (channels.range_laps, estimate.range_laps),
            (channels.range_minutes, estimate.range_minutes),
            (channels.filtered_range_laps, estimate.filtered_range_laps),
            (channels.filtered_range_minutes, estimate.filtered_range_minutes),
            (channels.consumption, estimate.consumption),
        ];
        for (channel, value) in outputs {
            if let (Some(channel), Some(value)) = (channel, value) {
                data.push(channel, value);
            }
        }
        (!data.is_empty()).then_some(data)
    }

    pub fn reset(&self) {
        self.state.lock().reset();
    }

    pub fn restart_laps(&self) {
        self.state.lock().restart_laps();
    }
}
