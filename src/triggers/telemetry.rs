//! Stint triggers derived from speed and fuel telemetry

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use tracing::{debug, trace};

use super::RefuelCheck;
use crate::types::{ChannelDataSet, ChannelId, Stint, StintDelta};

/// Seconds after which telemetry no longer counts as available.
pub const TELEMETRY_STALE_SECS: i64 = 30;
/// Trailing window, in seconds, used for the start trigger.
pub const START_WINDOW_SECS: i64 = 6;
/// Minimum samples in the trailing window before a start can fire.
pub const START_MIN_SAMPLES: usize = 3;
/// Average speed over the window that counts as on track.
pub const START_MIN_AVG_SPEED: f64 = 35.0;

pub const START_NOTE: &str = "Start triggered from telem.";
pub const END_NOTE: &str = "End triggered by telem refueling.";

/// Start and end detection from a car's speed and fuel channels.
///
/// A start fires once the trailing speed average shows the car is on track;
/// an end fires when [`RefuelCheck`] sees fuel going in.
#[derive(Debug, Clone)]
pub struct TelemetryTriggers {
    speed_channel: Option<ChannelId>,
    fuel_channel: Option<ChannelId>,
    speeds: VecDeque<(f64, DateTime<Utc>)>,
    last_telemetry_update: Option<DateTime<Utc>>,
    refuel: RefuelCheck,
}

impl TelemetryTriggers {
    pub fn new(speed_channel: Option<ChannelId>, fuel_channel: Option<ChannelId>) -> Self {
        Self {
            speed_channel,
            fuel_channel,
            speeds: VecDeque::new(),
            last_telemetry_update: None,
            refuel: RefuelCheck::new(),
        }
    }

    /// Replace the refuel detector, e.g. with custom thresholds.
    pub fn with_refuel_check(mut self, refuel: RefuelCheck) -> Self {
        self.refuel = refuel;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.speed_channel.is_some() && self.fuel_channel.is_some()
    }

    pub fn last_telemetry_update(&self) -> Option<DateTime<Utc>> {
        self.last_telemetry_update
    }

    /// Whether telemetry arrived within [`TELEMETRY_STALE_SECS`] of `now`.
    pub fn is_telemetry_available(&self, now: DateTime<Utc>) -> bool {
        self.last_telemetry_update
            .is_some_and(|last| now - last < Duration::seconds(TELEMETRY_STALE_SECS))
    }

    /// Evaluate one data set against the car's current tail stint.
    ///
    /// Returns `None` when the speed or fuel channel is not mapped, and an
    /// empty delta when the data set lacks either sample. `received_at` is
    /// the receipt time used for freshness tracking.
    pub fn process(
        &mut self,
        data: &ChannelDataSet,
        current: Option<&Stint>,
        received_at: DateTime<Utc>,
    ) -> Option<StintDelta> {
        let (speed_channel, fuel_channel) = (self.speed_channel?, self.fuel_channel?);

        let (Some(speed), Some(fuel)) = (data.latest(speed_channel), data.latest(fuel_channel))
        else {
            trace!(device = data.device_id, "Speed or fuel sample missing from data set");
            return Some(StintDelta::default());
        };

        self.last_telemetry_update = Some(received_at);
        let now = speed.timestamp;

        match current {
            Some(stint) if stint.is_open() => {
                if self.refuel.check(speed.value, fuel.value, now) {
                    debug!(%now, "Telemetry end trigger");
                    return Some(StintDelta::end(now, END_NOTE));
                }
            }
            _ => {
                if self.start_detected(speed.value, now) {
                    debug!(%now, "Telemetry start trigger");
                    return Some(StintDelta::start(now, START_NOTE));
                }
            }
        }

        Some(StintDelta::default())
    }

    fn start_detected(&mut self, speed: f64, now: DateTime<Utc>) -> bool {
        let window = Duration::seconds(START_WINDOW_SECS);
        self.speeds.push_back((speed, now));
        while self.speeds.front().is_some_and(|(_, at)| now - *at > window) {
            self.speeds.pop_front();
        }

        if self.speeds.len() < START_MIN_SAMPLES {
            return false;
        }
        let avg = self.speeds.iter().map(|(s, _)| s).sum::<f64>() / self.speeds.len() as f64;
        trace!(avg, samples = self.speeds.len(), "Start window average");

        if avg >= START_MIN_AVG_SPEED {
            self.speeds.clear();
            true
        } else {
            false
        }
    }
}
