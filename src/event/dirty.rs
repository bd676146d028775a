//! Set of cars with uncommitted stint changes

use parking_lot::Mutex;
use std::collections::BTreeSet;

/// Cars whose stint list changed since the last successful commit.
///
/// The commit path [`take`](Self::take)s the whole set and
/// [`restore`](Self::restore)s any car whose commit failed, so a change is
/// only forgotten once it has been persisted.
#[derive(Debug, Default)]
pub struct DirtyCars {
    cars: Mutex<BTreeSet<String>>,
}

impl DirtyCars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the car was not already pending.
    pub fn mark(&self, car_number: &str) -> bool {
        let mut cars = self.cars.lock();
        if cars.contains(car_number) {
            return false;
        }
        cars.insert(car_number.to_string())
    }

    /// Remove and return every pending car in car number order.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.cars.lock()).into_iter().collect()
    }

    pub fn restore(&self, car_numbers: impl IntoIterator<Item = String>) {
        self.cars.lock().extend(car_numbers);
    }

    pub fn is_dirty(&self, car_number: &str) -> bool {
        self.cars.lock().contains(car_number)
    }

    pub fn len(&self) -> usize {
        self.cars.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cars.lock().is_empty()
    }
}
