//! Lap timing records from the timing provider

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Track condition reported with each lap and flag interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum TrackFlag {
    #[default]
    Unknown,
    Green,
    Yellow,
    Red,
    White,
    Finish,
    Stop,
}

impl TrackFlag {
    /// Flags that end the session for every car.
    pub fn is_terminal(self) -> bool {
        matches!(self, TrackFlag::Finish | TrackFlag::Stop)
    }
}

impl fmt::Display for TrackFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackFlag::Unknown => "Unknown",
            TrackFlag::Green => "Green",
            TrackFlag::Yellow => "Yellow",
            TrackFlag::Red => "Red",
            TrackFlag::White => "White",
            TrackFlag::Finish => "Finish",
            TrackFlag::Stop => "Stop",
        };
        f.write_str(name)
    }
}

impl FromStr for TrackFlag {
    type Err = std::convert::Infallible;

    /// Timing feeds disagree on casing and sometimes send "Checkered"; anything
    /// unrecognised maps to `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let flag = match s.trim().to_ascii_lowercase().as_str() {
            "green" => TrackFlag::Green,
            "yellow" | "caution" => TrackFlag::Yellow,
            "red" => TrackFlag::Red,
            "white" => TrackFlag::White,
            "finish" | "checkered" => TrackFlag::Finish,
            "stop" => TrackFlag::Stop,
            _ => TrackFlag::Unknown,
        };
        Ok(flag)
    }
}

/// One completed lap for one car as reported by the timing provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct Lap {
    pub car_number: String,
    pub class_name: String,
    pub event_id: i64,
    pub run_id: i64,
    pub current_lap: i32,
    pub last_lap_time_seconds: f64,
    pub last_pit_lap: i32,
    pub position_in_run: i32,
    pub timestamp: DateTime<Utc>,
    pub flag: TrackFlag,
}

impl Lap {
    /// Instant the lap started, derived from its completion time.
    ///
    /// Lap times too large to subtract fall back to the completion time.
    pub fn start_time(&self) -> DateTime<Utc> {
        let millis = (self.last_lap_time_seconds * 1000.0).round() as i64;
        Duration::try_milliseconds(millis)
            .and_then(|lap_time| self.timestamp.checked_sub_signed(lap_time))
            .unwrap_or(self.timestamp)
    }

    /// Whether this lap is the one the timing feed marked as the pit lap.
    pub fn is_pit_lap(&self) -> bool {
        self.current_lap > 0 && self.current_lap == self.last_pit_lap
    }

    /// Zero and negative lap times are sentinel values from the feed.
    pub fn has_valid_time(&self) -> bool {
        self.last_lap_time_seconds > 0.0
    }

    pub fn same_run(&self, event_id: i64, run_id: i64) -> bool {
        self.event_id == event_id && self.run_id == run_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parsing_is_lenient() {
        assert_eq!("GREEN".parse::<TrackFlag>(), Ok(TrackFlag::Green));
        assert_eq!(" Checkered ".parse::<TrackFlag>(), Ok(TrackFlag::Finish));
        assert_eq!("caution".parse::<TrackFlag>(), Ok(TrackFlag::Yellow));
        assert_eq!("purple".parse::<TrackFlag>(), Ok(TrackFlag::Unknown));
        assert!(TrackFlag::Stop.is_terminal());
        assert!(!TrackFlag::Red.is_terminal());
    }

    #[test]
    fn absurd_lap_time_starts_at_completion() {
        let mut lap = crate::test_utils::lap("7", 3, 0, 90.0);
        assert_eq!(lap.start_time(), lap.timestamp - Duration::seconds(90));

        for secs in [1e16, f64::MAX, f64::INFINITY] {
            lap.last_lap_time_seconds = secs;
            assert_eq!(lap.start_time(), lap.timestamp);
        }
    }
}
