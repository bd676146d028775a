//! Stint records, trigger deltas and user overrides

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A continuous period a car spends on track between pit stops.
///
/// Identity is fixed at creation. After that only `end`, the flag durations,
/// the note trail and the override fields change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct Stint {
    pub id: Uuid,
    pub car_number: String,
    pub event_id: i64,
    pub run_id: i64,
    pub tenant_id: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    /// Append-only audit trail of every trigger that touched the stint.
    pub note: String,
    pub starting_fuel_gallons: f64,
    pub yellow_duration_minutes: f64,
    pub red_duration_minutes: f64,
    pub start_override: Option<DateTime<Utc>>,
    pub end_override: Option<DateTime<Utc>>,
    pub fuel_override: Option<f64>,
}

impl Stint {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Start time honouring a user override.
    pub fn effective_start(&self) -> DateTime<Utc> {
        self.start_override.unwrap_or(self.start)
    }

    /// End time honouring a user override.
    pub fn effective_end(&self) -> Option<DateTime<Utc>> {
        self.end_override.or(self.end)
    }

    /// Starting fuel honouring a user override.
    pub fn effective_fuel_gallons(&self) -> f64 {
        self.fuel_override.unwrap_or(self.starting_fuel_gallons)
    }

    pub(crate) fn append_note(&mut self, note: &str) {
        if note.is_empty() {
            return;
        }
        if !self.note.is_empty() {
            self.note.push(' ');
        }
        self.note.push_str(note);
    }
}

/// Output of a trigger source: a proposed start and/or end.
///
/// Deltas never carry identity. [`CarRange`](crate::CarRange) decides how a
/// delta merges into the authoritative stint list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StintDelta {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub note: String,
}

impl StintDelta {
    pub fn start(at: DateTime<Utc>, note: impl Into<String>) -> Self {
        Self { start: Some(at), end: None, note: note.into() }
    }

    pub fn end(at: DateTime<Utc>, note: impl Into<String>) -> Self {
        Self { start: None, end: Some(at), note: note.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// User-supplied correction to a single stint.
///
/// Broadcast to every active event; only the car owning `stint_id` applies it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct RangeUpdate {
    pub stint_id: Uuid,
    pub start_override: Option<DateTime<Utc>>,
    pub end_override: Option<DateTime<Utc>>,
    pub fuel_override: Option<f64>,
    pub note: Option<String>,
}

/// A car's stint list handed to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct StintCommit {
    pub event_id: i64,
    pub car_number: String,
    pub tenant_id: String,
    pub committed_at: DateTime<Utc>,
    pub stints: Vec<Stint>,
}
