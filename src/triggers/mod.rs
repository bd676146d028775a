//! Stint trigger sources and the rule that arbitrates between them.
//!
//! Two independent sources propose stint starts and ends:
//!
//! - [`TelemetryTriggers`]: sustained speed opens a stint, refuelling closes it
//! - [`LapDataTriggers`]: lap records open on the out lap and close on the pit
//!   lap or a finish/stop flag
//!
//! [`TriggerPreference`] decides, per call, which source a car trusts.

mod lap_data;
mod refuel;
mod telemetry;

pub use lap_data::LapDataTriggers;
pub use refuel::{RefuelCheck, RefuelThresholds};
pub use telemetry::{
    END_NOTE as TELEMETRY_END_NOTE, START_MIN_AVG_SPEED, START_MIN_SAMPLES, START_NOTE as TELEMETRY_START_NOTE,
    START_WINDOW_SECS, TELEMETRY_STALE_SECS, TelemetryTriggers,
};

use serde::{Deserialize, Serialize};

/// Which trigger source a car currently trusts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum TriggerPreference {
    PreferTelemetry,
    PreferLapData,
}

impl TriggerPreference {
    /// Telemetry wins only when the car is configured for it and it is fresh.
    pub fn resolve(use_telemetry: bool, telemetry_available: bool) -> Self {
        if use_telemetry && telemetry_available {
            TriggerPreference::PreferTelemetry
        } else {
            TriggerPreference::PreferLapData
        }
    }

    /// Whether a lap-derived delta should be applied.
    ///
    /// Finish and stop flags always apply: the timing feed is authoritative for
    /// the end of the race.
    pub fn accepts_lap_delta(self, terminal_end: bool) -> bool {
        terminal_end || self == TriggerPreference::PreferLapData
    }
}
