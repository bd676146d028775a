//! Stint triggers derived from lap timing records

use tracing::trace;

use crate::types::{Lap, Stint, StintDelta};

/// Stateless trigger evaluation over a single lap.
///
/// Start and end rules are checked independently, so one lap can produce
/// both. Callers decide which laps are relevant.
#[derive(Debug, Clone, Copy, Default)]
pub struct LapDataTriggers;

impl LapDataTriggers {
    pub fn process(lap: &Lap, current: Option<&Stint>) -> StintDelta {
        let mut delta = StintDelta::default();
        let mut notes = Vec::new();

        let starts = match current {
            None => lap.current_lap > 0,
            Some(stint) => !stint.is_open() && lap.current_lap > lap.last_pit_lap,
        };
        if starts {
            delta.start = Some(lap.start_time());
            notes.push(format!("Start triggered by lap {} from timing.", lap.current_lap));
        }

        if lap.current_lap > 0 {
            if lap.current_lap == lap.last_pit_lap {
                delta.end = Some(lap.timestamp);
                notes.push(format!("End triggered by pit on lap {}.", lap.current_lap));
            } else if lap.flag.is_terminal() {
                delta.end = Some(lap.timestamp);
                notes.push(format!("End triggered by {} flag on lap {}.", lap.flag, lap.current_lap));
            }
        }

        delta.note = notes.join(" ");
        if !delta.is_empty() {
            trace!(car = %lap.car_number, lap = lap.current_lap, ?delta, "Lap trigger");
        }
        delta
    }

    /// Whether a delta's end came from a finish or stop flag rather than a pit.
    pub fn is_terminal_end(lap: &Lap, delta: &StintDelta) -> bool {
        delta.end.is_some() && lap.flag.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{lap, stint};
    use crate::types::TrackFlag;
    use chrono::Duration;

    #[test]
    fn first_lap_starts_stint_at_lap_start() {
        let l = lap("7", 1, 0, 60.0);
        let delta = LapDataTriggers::process(&l, None);
        assert_eq!(delta.start, Some(l.timestamp - Duration::seconds(60)));
        assert_eq!(delta.end, None);
        assert!(delta.note.contains("lap 1"));
    }

    #[test]
    fn lap_zero_never_triggers() {
        let l = lap("7", 0, 0, 60.0);
        assert!(LapDataTriggers::process(&l, None).is_empty());
    }

    #[test]
    fn pit_lap_ends_open_stint() {
        let l = lap("7", 12, 12, 140.0);
        let open = stint("7", l.timestamp - Duration::minutes(20), None);
        let delta = LapDataTriggers::process(&l, Some(&open));
        assert_eq!(delta.end, Some(l.timestamp));
        assert_eq!(delta.start, None);
    }

    #[test]
    fn out_lap_restarts_after_closed_stint() {
        let l = lap("7", 13, 12, 95.0);
        let closed = stint("7", l.timestamp - Duration::minutes(30), Some(l.timestamp - Duration::minutes(2)));
        let delta = LapDataTriggers::process(&l, Some(&closed));
        assert_eq!(delta.start, Some(l.start_time()));
    }

    #[test]
    fn open_stint_is_not_restarted() {
        let l = lap("7", 13, 12, 95.0);
        let open = stint("7", l.timestamp - Duration::minutes(30), None);
        assert!(LapDataTriggers::process(&l, Some(&open)).is_empty());
    }

    #[test]
    fn finish_flag_ends_stint() {
        let mut l = lap("7", 40, 25, 92.0);
        l.flag = TrackFlag::Finish;
        let open = stint("7", l.timestamp - Duration::minutes(30), None);
        let delta = LapDataTriggers::process(&l, Some(&open));
        assert_eq!(delta.end, Some(l.timestamp));
        assert!(LapDataTriggers::is_terminal_end(&l, &delta));
        assert!(delta.note.contains("Finish"));
    }

    #[test]
    fn start_and_end_can_fire_together() {
        let mut l = lap("7", 1, 0, 61.0);
        l.flag = TrackFlag::Stop;
        let delta = LapDataTriggers::process(&l, None);
        assert!(delta.start.is_some());
        assert!(delta.end.is_some());
    }
}
