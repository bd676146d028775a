//! Yellow and red flag minutes attributed to each stint

use chrono::{DateTime, Utc};

use crate::types::{EventFlag, Stint, TrackFlag};

/// Changes below this many minutes are treated as no change.
const EPSILON_MINUTES: f64 = 1e-6;

/// Minutes of overlap between `[a_start, a_end]` and `[b_start, b_end]`.
pub fn overlap_minutes(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> f64 {
    let start = a_start.max(b_start);
    let end = a_end.min(b_end);
    if end <= start {
        return 0.0;
    }
    (end - start).num_milliseconds() as f64 / 60_000.0
}

/// Recompute yellow and red minutes for every stint from the full flag history.
///
/// Open stints and active flags are both measured up to `now`. Returns true
/// when any stint's stored minutes changed.
pub fn apply_flag_durations(stints: &mut [Stint], flags: &[EventFlag], now: DateTime<Utc>) -> bool {
    let mut changed = false;

    for stint in stints.iter_mut() {
        let stint_start = stint.effective_start();
        let stint_end = stint.effective_end().unwrap_or(now);

        let mut yellow = 0.0;
        let mut red = 0.0;
        for flag in flags {
            let bucket = match flag.flag {
                TrackFlag::Yellow => &mut yellow,
                TrackFlag::Red => &mut red,
                _ => continue,
            };
            let flag_end = flag.end.unwrap_or(now);
            *bucket += overlap_minutes(flag.start, flag_end, stint_start, stint_end);
        }

        if (stint.yellow_duration_minutes - yellow).abs() > EPSILON_MINUTES
            || (stint.red_duration_minutes - red).abs() > EPSILON_MINUTES
        {
            stint.yellow_duration_minutes = yellow;
            stint.red_duration_minutes = red;
            changed = true;
        }
    }

    changed
}
