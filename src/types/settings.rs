//! Per-car range settings and channel mappings

use serde::{Deserialize, Serialize};

use super::ChannelId;

/// Channel identifiers resolved for one car.
///
/// Input channels drive the triggers and consumption; output channels receive
/// derived values. Any of them may be unmapped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(default)]
pub struct ChannelMapping {
    pub speed: Option<ChannelId>,
    pub fuel_level: Option<ChannelId>,
    pub range_laps: Option<ChannelId>,
    pub range_minutes: Option<ChannelId>,
    pub filtered_range_laps: Option<ChannelId>,
    pub filtered_range_minutes: Option<ChannelId>,
    pub consumption: Option<ChannelId>,
}

impl ChannelMapping {
    pub fn has_outputs(&self) -> bool {
        self.range_laps.is_some()
            || self.range_minutes.is_some()
            || self.filtered_range_laps.is_some()
            || self.filtered_range_minutes.is_some()
            || self.consumption.is_some()
    }
}

/// Range configuration for one car. Read-only to the processing core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct CarRangeSettings {
    pub car_number: String,
    pub device_id: u32,
    #[serde(default)]
    pub tenant_id: String,
    pub capacity_gallons: f64,
    /// Accept stint triggers derived from the timing feed.
    #[serde(default = "default_true")]
    pub use_race_hero_trigger: bool,
    /// Prefer stint triggers derived from speed and fuel telemetry.
    #[serde(default = "default_true")]
    pub use_telemetry: bool,
    /// Minutes after a telemetry refuel during which another is ignored.
    #[serde(default = "default_refuel_cooldown_minutes")]
    pub refuel_cooldown_minutes: u32,
    #[serde(default)]
    pub channels: ChannelMapping,
}

fn default_true() -> bool {
    true
}

fn default_refuel_cooldown_minutes() -> u32 {
    15
}

impl CarRangeSettings {
    /// Settings with both trigger sources enabled and no channels mapped.
    pub fn new(car_number: impl Into<String>, device_id: u32, capacity_gallons: f64) -> Self {
        Self {
            car_number: car_number.into(),
            device_id,
            tenant_id: String::new(),
            capacity_gallons,
            use_race_hero_trigger: true,
            use_telemetry: true,
            refuel_cooldown_minutes: default_refuel_cooldown_minutes(),
            channels: ChannelMapping::default(),
        }
    }
}
