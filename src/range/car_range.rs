//! Per-car stint arbitration

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::flag_durations::apply_flag_durations;
use crate::triggers::{LapDataTriggers, RefuelCheck, RefuelThresholds, TelemetryTriggers, TriggerPreference};
use crate::types::{CarRangeSettings, ChannelDataSet, EventFlag, Lap, RangeUpdate, Stint, StintDelta};

const MISSED_END_NOTE: &str = "Closed by next start without an end.";

/// Mutable per-car state. Only ever touched under [`CarRange`]'s lock.
#[derive(Debug)]
struct RangeState {
    event_id: Option<i64>,
    run_id: Option<i64>,
    stints: Vec<Stint>,
    telemetry: TelemetryTriggers,
    /// Highest lap seen and whether it carried a finish/stop flag.
    last_lap: Option<(i32, bool)>,
}

impl RangeState {
    /// Track the lap's event/run. Returns true when stints were discarded.
    ///
    /// The first run seen is adopted, stamping any telemetry-opened stints;
    /// a different run afterwards resets the car.
    fn observe_run(&mut self, lap: &Lap) -> bool {
        match self.event_id.zip(self.run_id) {
            Some((event_id, run_id)) if lap.same_run(event_id, run_id) => false,
            Some(_) => {
                info!(
                    car = %lap.car_number,
                    event_id = lap.event_id,
                    run_id = lap.run_id,
                    "New run observed in lap data"
                );
                let discarded = !self.stints.is_empty();
                self.reset(lap.event_id, lap.run_id);
                discarded
            }
            None => {
                self.event_id = Some(lap.event_id);
                self.run_id = Some(lap.run_id);
                for stint in &mut self.stints {
                    stint.event_id = lap.event_id;
                    stint.run_id = lap.run_id;
                }
                false
            }
        }
    }

    /// Record the lap, returning false for stale or duplicate laps.
    ///
    /// A repeat of the latest lap still counts when the feed has since flagged
    /// it finish/stop.
    fn is_new_lap(&mut self, lap: &Lap) -> bool {
        let terminal = lap.flag.is_terminal();
        let is_new = match self.last_lap {
            None => true,
            Some((last, _)) if lap.current_lap > last => true,
            Some((last, was_terminal)) => lap.current_lap == last && terminal && !was_terminal,
        };
        if is_new {
            self.last_lap = Some((lap.current_lap, terminal));
        }
        is_new
    }

    /// Forget the lap counter when a batch tops out below it. Stints are kept
    /// since the run is unchanged. Returns true on a restart.
    fn observe_lap_counter(&mut self, batch_max: i32, car: &str) -> bool {
        match self.last_lap {
            Some((last, _)) if batch_max < last => {
                info!(car, last_lap = last, batch_max, "Lap counter restarted");
                self.last_lap = None;
                true
            }
            _ => false,
        }
    }

    fn reset(&mut self, event_id: i64, run_id: i64) {
        self.event_id = Some(event_id);
        self.run_id = Some(run_id);
        self.stints.clear();
        self.last_lap = None;
    }

    /// Merge a trigger delta into the stint list. Returns true on mutation.
    fn process_updated_stint(&mut self, delta: &StintDelta, settings: &CarRangeSettings) -> bool {
        if let Some(end) = delta.end {
            if let Some(tail) = self.stints.last_mut().filter(|s| s.is_open()) {
                tail.end = Some(end.max(tail.start));
                tail.append_note(&delta.note);
                info!(car = %settings.car_number, stint = %tail.id, %end, "Stint closed");
                return true;
            }
        }

        let Some(start) = delta.start else {
            return false;
        };

        if let Some(tail) = self.stints.last_mut().filter(|s| s.is_open()) {
            tail.end = Some(start.max(tail.start));
            tail.append_note(MISSED_END_NOTE);
            debug!(car = %settings.car_number, stint = %tail.id, "Open stint force-closed by new start");
        }

        // Never let a new stint begin before the previous one ended
        let start = match self.stints.last().and_then(|prev| prev.end) {
            Some(prev_end) => start.max(prev_end),
            None => start,
        };

        let mut stint = Stint {
            id: Uuid::new_v4(),
            car_number: settings.car_number.clone(),
            event_id: self.event_id.unwrap_or_default(),
            run_id: self.run_id.unwrap_or_default(),
            tenant_id: settings.tenant_id.clone(),
            start,
            end: None,
            note: String::new(),
            starting_fuel_gallons: settings.capacity_gallons,
            yellow_duration_minutes: 0.0,
            red_duration_minutes: 0.0,
            start_override: None,
            end_override: None,
            fuel_override: None,
        };
        stint.append_note(&delta.note);

        // A first lap that is also the last one closes at once
        if let Some(end) = delta.end {
            stint.end = Some(end.max(start));
        }

        info!(car = %settings.car_number, stint = %stint.id, %start, "Stint opened");
        self.stints.push(stint);
        true
    }
}

/// Authoritative stint timeline for one car.
///
/// Lap and telemetry updates can arrive concurrently from different inbound
/// flows; every read-modify-write happens under one internal lock and readers
/// get snapshot copies.
#[derive(Debug)]
pub struct CarRange {
    settings: CarRangeSettings,
    clock: Arc<dyn Clock>,
    state: Mutex<RangeState>,
}

impl CarRange {
    pub fn new(settings: CarRangeSettings, clock: Arc<dyn Clock>) -> Self {
        let thresholds = RefuelThresholds {
            cooldown: Duration::minutes(i64::from(settings.refuel_cooldown_minutes)),
            ..RefuelThresholds::default()
        };
        let telemetry = TelemetryTriggers::new(settings.channels.speed, settings.channels.fuel_level)
            .with_refuel_check(RefuelCheck::with_thresholds(thresholds));
        let state = RangeState { event_id: None, run_id: None, stints: Vec::new(), telemetry, last_lap: None };
        Self { settings, clock, state: Mutex::new(state) }
    }

    pub fn settings(&self) -> &CarRangeSettings {
        &self.settings
    }

    pub fn car_number(&self) -> &str {
        &self.settings.car_number
    }

    /// Event and run currently tracked, if any lap has been seen.
    pub fn current_run(&self) -> Option<(i64, i64)> {
        let state = self.state.lock();
        state.event_id.zip(state.run_id)
    }

    /// Drop every stint and start tracking a new event/run.
    pub fn reset_for_new_race(&self, event_id: i64, run_id: i64) {
        let mut state = self.state.lock();
        info!(car = %self.settings.car_number, event_id, run_id, "Resetting stints for new race");
        state.reset(event_id, run_id);
    }

    pub fn is_telemetry_available(&self) -> bool {
        self.state.lock().telemetry.is_telemetry_available(self.clock.now())
    }

    pub fn trigger_preference(&self) -> TriggerPreference {
        TriggerPreference::resolve(self.settings.use_telemetry, self.is_telemetry_available())
    }

    /// Apply lap-derived triggers. Returns true when the stint list changed.
    ///
    /// Laps from another event/run reset the car first. A batch whose highest
    /// lap is below the last one seen restarts the lap counter. Otherwise laps
    /// not newer than the last one seen are skipped unless they carry a
    /// finish/stop flag.
    pub fn process_laps(&self, laps: &[Lap]) -> bool {
        let now = self.clock.now();
        let car = self.settings.car_number.as_str();
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let mut changed = false;

        let run = state.event_id.zip(state.run_id);
        let batch_max = laps
            .iter()
            .filter(|l| l.car_number == car && run.is_none_or(|(event_id, run_id)| l.same_run(event_id, run_id)))
            .map(|l| l.current_lap)
            .max();
        if let Some(batch_max) = batch_max {
            state.observe_lap_counter(batch_max, car);
        }

        for lap in laps.iter().filter(|l| l.car_number == car) {
            changed |= state.observe_run(lap);

            if !state.is_new_lap(lap) {
                continue;
            }

            if !self.settings.use_race_hero_trigger {
                continue;
            }

            let mut delta = LapDataTriggers::process(lap, state.stints.last());
            if lap.flag.is_terminal() && state.stints.last().is_some_and(|s| !s.is_open()) {
                // Laps after the flag never start a new stint
                delta.start = None;
            }
            if delta.is_empty() {
                continue;
            }

            let preference = TriggerPreference::resolve(
                self.settings.use_telemetry,
                state.telemetry.is_telemetry_available(now),
            );
            if !preference.accepts_lap_delta(LapDataTriggers::is_terminal_end(lap, &delta)) {
                debug!(car = %self.settings.car_number, lap = lap.current_lap, "Lap trigger deferred to telemetry");
                continue;
            }

            changed |= state.process_updated_stint(&delta, &self.settings);
        }

        changed
    }

    /// Apply telemetry-derived triggers. Returns true when the stint list changed.
    pub fn process_telemetry(&self, data: &ChannelDataSet) -> bool {
        if !self.settings.use_telemetry || data.is_virtual {
            return false;
        }

        let now = self.clock.now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        match state.telemetry.process(data, state.stints.last(), now) {
            Some(delta) if !delta.is_empty() => state.process_updated_stint(&delta, &self.settings),
            _ => false,
        }
    }

    /// Apply a user correction. Returns true if this car owns the stint.
    pub fn override_stint(&self, update: &RangeUpdate) -> bool {
        let mut state = self.state.lock();
        let Some(stint) = state.stints.iter_mut().find(|s| s.id == update.stint_id) else {
            return false;
        };

        if update.start_override.is_some() {
            stint.start_override = update.start_override;
        }
        if update.end_override.is_some() {
            stint.end_override = update.end_override;
        }
        if update.fuel_override.is_some() {
            stint.fuel_override = update.fuel_override;
        }
        if let Some(note) = &update.note {
            stint.append_note(note);
        }
        info!(car = %self.settings.car_number, stint = %stint.id, "Stint override applied");
        true
    }

    /// Recompute flag minutes for every stint. Returns true if any changed.
    pub fn apply_event_flags(&self, flags: &[EventFlag]) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let event_id = state.event_id;
        let relevant: Vec<EventFlag> =
            flags.iter().filter(|f| event_id.is_none_or(|id| f.event_id == id)).cloned().collect();
        apply_flag_durations(&mut state.stints, &relevant, now)
    }

    /// Snapshot copy of the stint list.
    pub fn stints(&self) -> Vec<Stint> {
        self.state.lock().stints.clone()
    }

    /// Snapshot of the open stint, if any.
    pub fn open_stint(&self) -> Option<Stint> {
        self.state.lock().stints.last().filter(|s| s.is_open()).cloned()
    }

    /// Highest lap number accepted since the last reset or restart.
    pub fn last_lap_number(&self) -> Option<i32> {
        self.state.lock().last_lap.map(|(lap, _)| lap)
    }

    /// Time of the most recent telemetry receipt.
    pub fn last_telemetry_update(&self) -> Option<DateTime<Utc>> {
        self.state.lock().telemetry.last_telemetry_update()
    }
}
