//! Track flag intervals

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TrackFlag;

/// One flag period for an event. `end == None` means the flag is still out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct EventFlag {
    pub event_id: i64,
    pub run_id: i64,
    pub flag: TrackFlag,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}
