//! Per-car lap history feeding the classifier

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::{CarStrategy, classify};
use crate::types::Lap;

/// Every valid lap seen for one car in the current run, keyed by lap number.
#[derive(Debug, Clone, Default)]
pub struct CarLapHistory {
    laps: BTreeMap<i32, Lap>,
    max_lap: i32,
    run: Option<(i64, i64)>,
}

impl CarLapHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch of laps for this car.
    ///
    /// The history restarts when the batch belongs to a different run or its
    /// highest lap number is below the highest seen so far. Laps without a
    /// positive time are not kept. Returns whether the history changed.
    pub fn add_laps(&mut self, laps: &[Lap]) -> bool {
        let Some(batch_max) = laps.iter().map(|l| l.current_lap).max() else {
            return false;
        };
        let batch_run = laps.last().map(|l| (l.event_id, l.run_id));

        let mut changed = false;
        let run_changed = self.run.is_some() && batch_run != self.run;
        if run_changed || batch_max < self.max_lap {
            info!(
                max_lap = self.max_lap,
                batch_max,
                run_changed,
                "Lap history restarted"
            );
            changed = !self.laps.is_empty();
            self.laps.clear();
            self.max_lap = 0;
        }
        self.run = batch_run;
        self.max_lap = self.max_lap.max(batch_max);

        for lap in laps {
            if !lap.has_valid_time() {
                debug!(car = %lap.car_number, lap = lap.current_lap, "Dropping lap without time");
                continue;
            }
            if self.laps.get(&lap.current_lap) != Some(lap) {
                self.laps.insert(lap.current_lap, lap.clone());
                changed = true;
            }
        }
        changed
    }

    pub fn laps(&self) -> Vec<Lap> {
        self.laps.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.laps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.laps.is_empty()
    }

    pub fn max_lap(&self) -> i32 {
        self.max_lap
    }

    pub fn classify(&self) -> CarStrategy {
        let laps: Vec<Lap> = self.laps.values().cloned().collect();
        classify(&laps)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Default)]
struct ClassifierState {
    history: CarLapHistory,
    latest: Option<Arc<CarStrategy>>,
}

/// Lap history and latest classification for one car behind one lock.
#[derive(Debug, Default)]
pub struct LapClassifier {
    state: Mutex<ClassifierState>,
}

impl LapClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `laps` and reclassify the whole history when it changed.
    pub fn update(&self, laps: &[Lap]) -> Option<Arc<CarStrategy>> {
        let mut state = self.state.lock();
        if state.history.add_laps(laps) || state.latest.is_none() {
            let strategy = Arc::new(state.history.classify());
            state.latest = Some(Arc::clone(&strategy));
        }
        state.latest.clone()
    }

    pub fn strategy(&self) -> Option<Arc<CarStrategy>> {
        self.state.lock().latest.clone()
    }

    pub fn lap_count(&self) -> usize {
        self.state.lock().history.len()
    }

    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.history.clear();
        state.latest = None;
    }
}
