//! Per-car registry with idempotent creation

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Map of car number to shared per-car state.
///
/// Entries are created on first use through [`get_or_create`](Self::get_or_create)
/// and handed out as `Arc`s; the map itself never escapes.
#[derive(Debug)]
pub struct CarRegistry<T> {
    cars: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> Default for CarRegistry<T> {
    fn default() -> Self {
        Self { cars: RwLock::new(HashMap::new()) }
    }
}

impl<T> CarRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing entry for `car_number`, or a new one built by `create`.
    ///
    /// `create` runs at most once per car even under concurrent callers.
    pub fn get_or_create(&self, car_number: &str, create: impl FnOnce() -> T) -> Arc<T> {
        if let Some(existing) = self.cars.read().get(car_number) {
            return Arc::clone(existing);
        }
        let mut cars = self.cars.write();
        Arc::clone(cars.entry(car_number.to_string()).or_insert_with(|| Arc::new(create())))
    }

    pub fn get(&self, car_number: &str) -> Option<Arc<T>> {
        self.cars.read().get(car_number).cloned()
    }

    /// Point-in-time copy of every entry, sorted by car number.
    pub fn snapshot(&self) -> Vec<(String, Arc<T>)> {
        let mut entries: Vec<_> =
            self.cars.read().iter().map(|(car, value)| (car.clone(), Arc::clone(value))).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.cars.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cars.read().is_empty()
    }

    pub fn clear(&self) {
        self.cars.write().clear();
    }
}
