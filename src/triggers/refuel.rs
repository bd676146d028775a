//! Refuel detection from speed and fuel level samples

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};

/// Tuning for [`RefuelCheck`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefuelThresholds {
    /// Speeds at or below this count as stopped. Anything above resets the stop.
    pub stopped_speed: f64,
    /// How long the car must be stopped before a refuel can fire.
    pub min_stopped: Duration,
    /// Rise over the minimum fuel seen since stopping that counts as fuelling.
    pub fuel_rise: f64,
    /// How long the rise must hold before it is confirmed.
    pub rise_confirm: Duration,
    /// Quiet period after a trigger.
    pub cooldown: Duration,
}

impl Default for RefuelThresholds {
    fn default() -> Self {
        Self {
            stopped_speed: 3.0,
            min_stopped: Duration::seconds(3),
            fuel_rise: 1.0,
            rise_confirm: Duration::seconds(2),
            cooldown: Duration::minutes(15),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StopWindow {
    since: DateTime<Utc>,
    min_fuel: f64,
    rising_since: Option<DateTime<Utc>>,
}

/// Detects the moment fuel starts going in while the car is stationary.
///
/// Only one trigger fires per cooldown, so a second genuine stop inside the
/// cooldown is not reported.
#[derive(Debug, Clone, Default)]
pub struct RefuelCheck {
    thresholds: RefuelThresholds,
    stop: Option<StopWindow>,
    last_trigger: Option<DateTime<Utc>>,
}

impl RefuelCheck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: RefuelThresholds) -> Self {
        Self { thresholds, stop: None, last_trigger: None }
    }

    pub fn last_trigger(&self) -> Option<DateTime<Utc>> {
        self.last_trigger
    }

    /// Feed one sample. Returns true on the sample that confirms a refuel.
    pub fn check(&mut self, speed: f64, fuel_level: f64, at: DateTime<Utc>) -> bool {
        let t = self.thresholds;

        if speed > t.stopped_speed {
            if self.stop.take().is_some() {
                trace!(speed, "Car moving, stop window cleared");
            }
            return false;
        }

        let stop = self.stop.get_or_insert(StopWindow {
            since: at,
            min_fuel: fuel_level,
            rising_since: None,
        });

        if fuel_level < stop.min_fuel {
            stop.min_fuel = fuel_level;
            stop.rising_since = None;
        }

        if fuel_level >= stop.min_fuel + t.fuel_rise {
            stop.rising_since.get_or_insert(at);
        } else {
            stop.rising_since = None;
        }

        let Some(rising_since) = stop.rising_since else {
            return false;
        };
        if at - stop.since < t.min_stopped || at - rising_since < t.rise_confirm {
            return false;
        }

        if let Some(last) = self.last_trigger {
            if at - last < t.cooldown {
                trace!(%last, "Refuel suppressed by cooldown");
                return false;
            }
        }

        debug!(fuel_level, min_fuel = stop.min_fuel, %at, "Refuel detected");
        self.last_trigger = Some(at);
        true
    }
}
