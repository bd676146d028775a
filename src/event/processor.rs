//! Per-event coordination of cars, flags and commits

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace};

use super::{DirtyCars, StintSink};
use crate::classifier::{CarStrategy, LapClassifier};
use crate::clock::Clock;
use crate::config::ServiceConfig;
use crate::consumption::ConsumptionProcessor;
use crate::error::{RangeError, Result};
use crate::range::{CarRange, CarRegistry};
use crate::types::{
    CarRangeSettings, ChannelDataSet, EventFlag, Lap, RangeUpdate, Stint, StintCommit,
};

/// Everything tracked for one car. Each member guards its own state.
#[derive(Debug)]
struct CarState {
    range: CarRange,
    consumption: ConsumptionProcessor,
    classifier: LapClassifier,
}

#[derive(Debug, Default)]
struct LapOutcome {
    stints_changed: bool,
    published: Vec<ChannelDataSet>,
}

impl CarState {
    fn new(settings: CarRangeSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            range: CarRange::new(settings.clone(), clock),
            consumption: ConsumptionProcessor::new(settings),
            classifier: LapClassifier::new(),
        }
    }

    /// `laps` belong to this car and are ordered by lap number.
    fn process_laps(&self, laps: &[Lap]) -> LapOutcome {
        let before = self.range.current_run();
        let last_lap = self.range.last_lap_number();
        let stints_changed = self.range.process_laps(laps);
        let after = self.range.current_run();
        if before.is_some() && before != after {
            self.consumption.reset();
        } else if last_lap.is_some_and(|last| self.range.last_lap_number().is_some_and(|now| now < last)) {
            self.consumption.restart_laps();
        }

        self.classifier.update(laps);
        let published = laps.iter().filter_map(|lap| self.consumption.process_lap(lap)).collect();
        LapOutcome { stints_changed, published }
    }
}

/// Result of one commit pass.
#[derive(Debug, Default)]
pub struct CommitSummary {
    pub committed: Vec<String>,
    pub failed: Vec<(String, RangeError)>,
}

impl CommitSummary {
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty() && self.failed.is_empty()
    }
}

/// Point-in-time view of one car.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct CarSnapshot {
    pub car_number: String,
    pub stints: Vec<Stint>,
    pub strategy: Option<CarStrategy>,
    pub telemetry_available: bool,
    pub last_telemetry_update: Option<DateTime<Utc>>,
}

/// Point-in-time view of every car in the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct EventSnapshot {
    pub event_id: i64,
    pub taken_at: DateTime<Utc>,
    pub cars: Vec<CarSnapshot>,
}

/// Routes inbound telemetry, laps, flags and overrides to per-car state for
/// one event and commits changed stint lists.
///
/// Only cars present in the [`ServiceConfig`] are tracked. Per-car state is
/// created on the first message that names the car.
#[derive(Debug)]
pub struct EventProcessor {
    event_id: i64,
    settings: HashMap<String, CarRangeSettings>,
    devices: HashMap<u32, String>,
    max_concurrent_cars: usize,
    cars: CarRegistry<CarState>,
    flags: RwLock<Vec<EventFlag>>,
    dirty: DirtyCars,
    clock: Arc<dyn Clock>,
}

impl EventProcessor {
    pub fn new(event_id: i64, config: &ServiceConfig, clock: Arc<dyn Clock>) -> Self {
        let settings: HashMap<String, CarRangeSettings> =
            config.cars.iter().map(|car| (car.car_number.clone(), car.clone())).collect();
        let devices = config.cars.iter().map(|car| (car.device_id, car.car_number.clone())).collect();
        info!(event_id, cars = settings.len(), "Event processor created");
        Self {
            event_id,
            settings,
            devices,
            max_concurrent_cars: config.max_concurrent_cars.max(1),
            cars: CarRegistry::new(),
            flags: RwLock::new(Vec::new()),
            dirty: DirtyCars::new(),
            clock,
        }
    }

    pub fn event_id(&self) -> i64 {
        self.event_id
    }

    pub fn dirty_cars(&self) -> &DirtyCars {
        &self.dirty
    }

    fn car(&self, car_number: &str) -> Option<Arc<CarState>> {
        let settings = self.settings.get(car_number)?;
        Some(self.cars.get_or_create(car_number, || {
            debug!(car = car_number, "Tracking car");
            CarState::new(settings.clone(), Arc::clone(&self.clock))
        }))
    }

    /// Feed one telemetry data set to the car owning its device.
    ///
    /// Returns true when the car's stint list changed.
    pub fn process_telemetry(&self, data: &ChannelDataSet) -> bool {
        if data.is_virtual {
            return false;
        }
        let Some(car) = self.devices.get(&data.device_id).and_then(|car| self.car(car)) else {
            trace!(device = data.device_id, "Telemetry for unmapped device");
            return false;
        };

        car.consumption.update_fuel(data);
        let changed = car.range.process_telemetry(data);
        if changed {
            self.dirty.mark(car.range.car_number());
        }
        changed
    }

    /// Process a lap batch, one task per car, and return the derived channel
    /// data sets to publish.
    ///
    /// A car whose task fails is logged and skipped; the rest of the batch
    /// still completes.
    pub async fn process_laps(&self, laps: Vec<Lap>) -> Vec<ChannelDataSet> {
        let mut by_car: BTreeMap<String, Vec<Lap>> = BTreeMap::new();
        for lap in laps {
            if lap.event_id != self.event_id {
                debug!(event_id = lap.event_id, car = %lap.car_number, "Lap for another event");
                continue;
            }
            by_car.entry(lap.car_number.clone()).or_default().push(lap);
        }
        self.fan_out(by_car, CarState::process_laps).await
    }

    /// Run `work` once per configured car, at most `max_concurrent_cars` at
    /// a time.
    async fn fan_out<F>(&self, by_car: BTreeMap<String, Vec<Lap>>, work: F) -> Vec<ChannelDataSet>
    where
        F: Fn(&CarState, &[Lap]) -> LapOutcome + Copy + Send + 'static,
    {
        let mut tasks = JoinSet::new();
        let mut published = Vec::new();
        for (car_number, mut car_laps) in by_car {
            let Some(car) = self.car(&car_number) else {
                trace!(car = %car_number, "Laps for unconfigured car");
                continue;
            };
            car_laps.sort_by_key(|lap| lap.current_lap);

            while tasks.len() >= self.max_concurrent_cars {
                if let Some(joined) = tasks.join_next().await {
                    self.collect(joined, &mut published);
                }
            }
            tasks.spawn(async move {
                let outcome = work(&car, &car_laps);
                (car_number, outcome)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            self.collect(joined, &mut published);
        }
        published
    }

    fn collect(
        &self,
        joined: std::result::Result<(String, LapOutcome), tokio::task::JoinError>,
        published: &mut Vec<ChannelDataSet>,
    ) {
        match joined {
            Ok((car_number, outcome)) => {
                if outcome.stints_changed {
                    self.dirty.mark(&car_number);
                }
                published.extend(outcome.published);
            }
            Err(e) => {
                let error = RangeError::from(e);
                error!(event_id = self.event_id, %error, "Car lap task failed");
            }
        }
    }

    /// Replace the event's flag history and recompute flag minutes.
    pub fn process_flags(&self, flags: Vec<EventFlag>) -> bool {
        let flags: Vec<EventFlag> = flags.into_iter().filter(|f| f.event_id == self.event_id).collect();
        debug!(event_id = self.event_id, flags = flags.len(), "Flag history updated");
        *self.flags.write() = flags;
        self.refresh_flag_durations()
    }

    /// Recompute flag minutes against the stored flag history. Open stints and
    /// open flags grow with the clock, so this runs before every commit.
    pub fn refresh_flag_durations(&self) -> bool {
        let flags = self.flags.read().clone();
        if flags.is_empty() {
            return false;
        }
        let mut changed = false;
        for (car_number, car) in self.cars.snapshot() {
            if car.range.apply_event_flags(&flags) {
                self.dirty.mark(&car_number);
                changed = true;
            }
        }
        changed
    }

    /// Apply a user override to whichever car owns the stint.
    pub fn apply_override(&self, update: &RangeUpdate) -> bool {
        for (car_number, car) in self.cars.snapshot() {
            if car.range.override_stint(update) {
                self.dirty.mark(&car_number);
                return true;
            }
        }
        trace!(stint = %update.stint_id, "Override for a stint this event does not own");
        false
    }

    /// Hand every dirty car's stint list to `sink`.
    ///
    /// Cars whose commit fails stay dirty for the next pass.
    pub async fn commit_dirty(&self, sink: &dyn StintSink) -> CommitSummary {
        let mut summary = CommitSummary::default();
        for car_number in self.dirty.take() {
            let Some(car) = self.cars.get(&car_number) else {
                continue;
            };
            let commit = StintCommit {
                event_id: self.event_id,
                car_number: car_number.clone(),
                tenant_id: car.range.settings().tenant_id.clone(),
                committed_at: self.clock.now(),
                stints: car.range.stints(),
            };
            let stint_count = commit.stints.len();
            match sink.commit(commit).await {
                Ok(()) => {
                    debug!(car = %car_number, stints = stint_count, "Stints committed");
                    summary.committed.push(car_number);
                }
                Err(error) => {
                    debug!(car = %car_number, %error, "Stint commit failed, car stays dirty");
                    self.dirty.restore([car_number.clone()]);
                    summary.failed.push((car_number, error));
                }
            }
        }
        summary
    }

    /// Stint snapshot for one configured car.
    pub fn stints(&self, car_number: &str) -> Result<Vec<Stint>> {
        if !self.settings.contains_key(car_number) {
            return Err(RangeError::UnknownCar { car_number: car_number.to_string() });
        }
        Ok(self.cars.get(car_number).map(|car| car.range.stints()).unwrap_or_default())
    }

    pub fn strategy(&self, car_number: &str) -> Option<Arc<CarStrategy>> {
        self.cars.get(car_number).and_then(|car| car.classifier.strategy())
    }

    pub fn snapshot(&self) -> EventSnapshot {
        let cars = self
            .cars
            .snapshot()
            .into_iter()
            .map(|(car_number, car)| CarSnapshot {
                car_number,
                stints: car.range.stints(),
                strategy: car.classifier.strategy().map(|s| (*s).clone()),
                telemetry_available: car.range.is_telemetry_available(),
                last_telemetry_update: car.range.last_telemetry_update(),
            })
            .collect();
        EventSnapshot { event_id: self.event_id, taken_at: self.clock.now(), cars }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::test_utils::{lap, race_laps, t0, telemetry};
    use crate::types::{ChannelMapping, TrackFlag};
    use chrono::Duration;
    use parking_lot::Mutex;

    const SPEED: u32 = 1;
    const FUEL: u32 = 2;

    fn config() -> ServiceConfig {
        let mut seven = CarRangeSettings::new("7", 70, 18.0);
        seven.tenant_id = "acme".to_string();
        seven.channels = ChannelMapping {
            speed: Some(SPEED),
            fuel_level: Some(FUEL),
            range_laps: Some(10),
            consumption: Some(14),
            ..Default::default()
        };
        let thirty_one = CarRangeSettings::new("31", 310, 22.0);
        ServiceConfig { cars: vec![seven, thirty_one], ..Default::default() }
    }

    fn processor() -> (Arc<ManualClock>, EventProcessor) {
        let clock = Arc::new(ManualClock::new(t0()));
        let processor = EventProcessor::new(1, &config(), clock.clone());
        (clock, processor)
    }

    #[derive(Debug, Default)]
    struct RecordingSink {
        commits: Mutex<Vec<StintCommit>>,
        fail: Mutex<bool>,
    }

    #[async_trait::async_trait]
    impl StintSink for RecordingSink {
        async fn commit(&self, commit: StintCommit) -> Result<()> {
            if *self.fail.lock() {
                return Err(RangeError::persist_failed("offline"));
            }
            self.commits.lock().push(commit);
            Ok(())
        }
    }

    #[tokio::test]
    async fn laps_fan_out_per_car() {
        let (_clock, processor) = processor();
        let mut laps = race_laps("7", &[(90.0, false), (90.0, false)]);
        laps.extend(race_laps("31", &[(95.0, false)]));
        laps.push(lap("99", 1, 0, 90.0));

        processor.process_laps(laps).await;

        assert_eq!(processor.stints("7").unwrap().len(), 1);
        assert_eq!(processor.stints("31").unwrap().len(), 1);
        assert!(matches!(processor.stints("99"), Err(RangeError::UnknownCar { .. })));
        assert!(processor.dirty_cars().is_dirty("7"));
        assert!(processor.dirty_cars().is_dirty("31"));
        assert_eq!(processor.strategy("7").map(|s| s.stints.len()), Some(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fan_out_respects_bound() {
        let mut config = config();
        for n in 100..140u32 {
            config.cars.push(CarRangeSettings::new(n.to_string(), n, 18.0));
        }
        config.max_concurrent_cars = 3;
        let processor = EventProcessor::new(1, &config, Arc::new(ManualClock::new(t0())));

        let laps: Vec<Lap> = (100..140).map(|n| lap(&n.to_string(), 1, 0, 90.0)).collect();
        processor.process_laps(laps).await;
        assert_eq!(processor.dirty_cars().len(), 40);
    }

    #[tokio::test]
    async fn failing_car_does_not_block_others() {
        let (_clock, processor) = processor();
        let mut by_car = BTreeMap::new();
        by_car.insert("31".to_string(), vec![lap("31", 1, 0, 90.0)]);
        by_car.insert("7".to_string(), vec![lap("7", 1, 0, 90.0)]);

        processor
            .fan_out(by_car, |car, laps| {
                if car.range.car_number() == "31" {
                    panic!("lap processing failed for car 31");
                }
                car.process_laps(laps)
            })
            .await;

        assert_eq!(processor.stints("7").unwrap().len(), 1);
        assert!(processor.dirty_cars().is_dirty("7"));
        assert!(!processor.dirty_cars().is_dirty("31"));

        // The failed car still takes later batches
        processor.process_laps(vec![lap("31", 2, 0, 90.0)]).await;
        assert!(processor.dirty_cars().is_dirty("31"));
    }

    #[tokio::test]
    async fn lap_counter_restart_resumes_publishing() {
        let mut config = config();
        config.cars[0].use_telemetry = false;
        let clock = Arc::new(ManualClock::new(t0()));
        let processor = EventProcessor::new(1, &config, clock.clone());

        let mut fuel = 18.0;
        for n in 1..=20 {
            processor.process_telemetry(&telemetry(70, clock.now(), (SPEED, 80.0), (FUEL, fuel)));
            processor.process_laps(vec![lap("7", n, 0, 90.0)]).await;
            fuel -= 0.3;
        }
        processor.process_laps(vec![lap("7", 21, 21, 150.0)]).await;
        assert!(processor.stints("7").unwrap()[0].end.is_some());

        // Same event and run, counter back to 1
        let restart_at = t0() + Duration::hours(2);
        let mut first = lap("7", 1, 0, 90.0);
        first.timestamp = restart_at;
        let mut second = lap("7", 2, 0, 90.0);
        second.timestamp = restart_at + Duration::seconds(90);

        processor.process_telemetry(&telemetry(70, clock.now(), (SPEED, 80.0), (FUEL, 18.0)));
        processor.process_laps(vec![first]).await;
        processor.process_telemetry(&telemetry(70, clock.now(), (SPEED, 80.0), (FUEL, 17.5)));
        let published = processor.process_laps(vec![second]).await;

        let stints = processor.stints("7").unwrap();
        assert_eq!(stints.len(), 2);
        assert!(stints[1].is_open());
        assert_eq!(processor.strategy("7").map(|s| s.total_laps()), Some(2));
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].value_of(10), Some(35.0));
    }

    #[tokio::test]
    async fn laps_for_other_events_are_ignored() {
        let (_clock, processor) = processor();
        let mut other = lap("7", 1, 0, 90.0);
        other.event_id = 2;
        processor.process_laps(vec![other]).await;
        assert!(processor.stints("7").unwrap().is_empty());
        assert!(processor.dirty_cars().is_empty());
    }

    #[tokio::test]
    async fn consumption_channels_published_from_laps() {
        let (clock, processor) = processor();
        processor.process_telemetry(&telemetry(70, t0(), (SPEED, 80.0), (FUEL, 10.0)));
        processor.process_laps(vec![lap("7", 1, 0, 90.0)]).await;

        clock.set(t0() + Duration::seconds(100));
        processor.process_telemetry(&telemetry(70, clock.now(), (SPEED, 80.0), (FUEL, 9.7)));
        let published = processor.process_laps(vec![lap("7", 2, 0, 90.0)]).await;

        assert_eq!(published.len(), 1);
        assert_eq!(published[0].device_id, 70);
        assert_eq!(published[0].value_of(10), Some(32.0));
        assert_eq!(published[0].value_of(14), Some(0.3));
    }

    #[test]
    fn telemetry_routes_by_device() {
        let (clock, processor) = processor();
        let mut at = t0();
        let mut changed = false;
        for speed in [10.0, 40.0, 45.0, 50.0] {
            clock.set(at);
            changed |= processor.process_telemetry(&telemetry(70, at, (SPEED, speed), (FUEL, 18.0)));
            at += Duration::seconds(1);
        }
        assert!(changed);
        assert_eq!(processor.stints("7").unwrap().len(), 1);
        assert!(processor.dirty_cars().is_dirty("7"));

        assert!(!processor.process_telemetry(&telemetry(999, at, (SPEED, 50.0), (FUEL, 18.0))));
    }

    #[tokio::test]
    async fn failed_commit_keeps_car_dirty() {
        let (_clock, processor) = processor();
        processor.process_laps(vec![lap("7", 1, 0, 90.0)]).await;

        let sink = RecordingSink::default();
        *sink.fail.lock() = true;
        let summary = processor.commit_dirty(&sink).await;
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.failed[0].1.is_retryable());
        assert!(processor.dirty_cars().is_dirty("7"));

        *sink.fail.lock() = false;
        let summary = processor.commit_dirty(&sink).await;
        assert_eq!(summary.committed, vec!["7".to_string()]);
        assert!(processor.dirty_cars().is_empty());

        let commits = sink.commits.lock();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].tenant_id, "acme");
        assert_eq!(commits[0].event_id, 1);
        assert_eq!(commits[0].stints.len(), 1);
    }

    #[tokio::test]
    async fn flags_mark_cars_dirty() {
        let (clock, processor) = processor();
        processor.process_laps(vec![lap("7", 1, 0, 60.0)]).await;
        processor.dirty_cars().take();

        clock.set(t0() + Duration::minutes(30));
        let flag = EventFlag {
            event_id: 1,
            run_id: 1,
            flag: TrackFlag::Yellow,
            start: t0() + Duration::minutes(5),
            end: Some(t0() + Duration::minutes(10)),
        };
        assert!(processor.process_flags(vec![flag]));
        assert!(processor.dirty_cars().is_dirty("7"));
        let stints = processor.stints("7").unwrap();
        assert!((stints[0].yellow_duration_minutes - 5.0).abs() < 1e-9);

        processor.dirty_cars().take();
        assert!(!processor.refresh_flag_durations());
        assert!(processor.dirty_cars().is_empty());
    }

    #[tokio::test]
    async fn override_applies_to_owner_only() {
        let (_clock, processor) = processor();
        processor.process_laps(race_laps("7", &[(90.0, false)])).await;
        processor.process_laps(race_laps("31", &[(90.0, false)])).await;
        processor.dirty_cars().take();

        let stint_id = processor.stints("31").unwrap()[0].id;
        let update = RangeUpdate { stint_id, fuel_override: Some(20.0), ..Default::default() };
        assert!(processor.apply_override(&update));
        assert_eq!(processor.dirty_cars().take(), vec!["31".to_string()]);
        assert_eq!(processor.stints("31").unwrap()[0].effective_fuel_gallons(), 20.0);

        let stranger = RangeUpdate { stint_id: uuid::Uuid::new_v4(), ..Default::default() };
        assert!(!processor.apply_override(&stranger));
    }

    #[tokio::test]
    async fn snapshot_covers_tracked_cars() {
        let (_clock, processor) = processor();
        processor.process_laps(race_laps("7", &[(90.0, false), (150.0, true), (90.0, false)])).await;

        let snapshot = processor.snapshot();
        assert_eq!(snapshot.event_id, 1);
        assert_eq!(snapshot.cars.len(), 1);
        let car = &snapshot.cars[0];
        assert_eq!(car.car_number, "7");
        assert_eq!(car.stints.len(), 2);
        assert_eq!(car.strategy.as_ref().map(|s| s.pit_stops.len()), Some(1));
        assert!(!car.telemetry_available);
    }
}
