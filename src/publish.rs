// =============================================================================
// Publication Gate — discovery-phase throttling of oracle writes
// =============================================================================
//
// In discovery phase the daemon publishes only during a small set of UTC
// hours, in the first ten minutes of the hour, and at most once per hour, so
// observers cannot infer an algorithmic peg from the cadence. Outside
// discovery phase every tick publishes.
// =============================================================================

use chrono::{DateTime, Timelike, Utc};
use tracing::debug;

/// Minutes past the hour during which a discovery-phase publish may fire.
const PUBLISH_WINDOW_MINUTES: u32 = 10;

/// Decides, per tick, whether the oracle sink should be invoked.
#[derive(Debug, Clone)]
pub struct PublicationGate {
    publish_hours: Vec<u32>,
    discovery_phase: bool,
    /// UTC hour of the last publish, or -1 before the first one.
    last_publish_hour: i32,
}

impl PublicationGate {
    pub fn new(publish_hours: Vec<u32>, discovery_phase: bool) -> Self {
        Self {
            publish_hours,
            discovery_phase,
            last_publish_hour: -1,
        }
    }

    /// Evaluate the gate for the current wall-clock time. Records the hour
    /// when a discovery-phase publish fires so it cannot fire twice in the
    /// same hour.
    pub fn should_publish(&mut self, now: DateTime<Utc>) -> bool {
        if !self.discovery_phase {
            return true;
        }

        let hour = now.hour();
        let minute = now.minute();
        let open = self.publish_hours.contains(&hour)
            && minute < PUBLISH_WINDOW_MINUTES
            && self.last_publish_hour != hour as i32;

        if open {
            self.last_publish_hour = hour as i32;
            debug!(hour, minute, "publish window open");
        } else {
            debug!(hour, minute, "publish suppressed by discovery gate");
        }
        open
    }
}

/// Convert a USD value to integer micro-units for the oracle.
///
/// Rounds half away from zero (`f64::round`); published values are never
/// negative so the floor at zero only guards against pathological inputs.
pub fn to_micro_units(value: f64) -> u64 {
    (value * 1e6).round().max(0.0) as u64
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, hour, minute, 0).unwrap()
    }

    #[test]
    fn non_discovery_always_publishes() {
        let mut gate = PublicationGate::new(vec![0, 12], false);
        assert!(gate.should_publish(at(7, 43)));
        assert!(gate.should_publish(at(7, 44)));
    }

    #[test]
    fn discovery_window_sequence() {
        let mut gate = PublicationGate::new(vec![0, 12], true);

        // 12:05 — inside the window, first publish of the hour: fires.
        assert!(gate.should_publish(at(12, 5)));
        // 12:08 — same hour already published: suppressed.
        assert!(!gate.should_publish(at(12, 8)));
        // 12:15 — minute past the window: suppressed.
        assert!(!gate.should_publish(at(12, 15)));
        // 00:02 next day — new hour in the schedule: fires.
        let next_day = Utc.with_ymd_and_hms(2026, 3, 15, 0, 2, 0).unwrap();
        assert!(gate.should_publish(next_day));
        assert!(!gate.should_publish(Utc.with_ymd_and_hms(2026, 3, 15, 0, 9, 0).unwrap()));
    }

    #[test]
    fn off_schedule_hours_never_fire() {
        let mut gate = PublicationGate::new(vec![0, 12], true);
        assert!(!gate.should_publish(at(6, 0)));
        assert!(!gate.should_publish(at(23, 5)));
        assert!(!gate.should_publish(at(12, 10)));
    }

    #[test]
    fn single_hour_schedule_stays_shut_until_cleared() {
        let mut gate = PublicationGate::new(vec![12], true);
        assert!(gate.should_publish(at(12, 3)));
        // Noon the following day: last_publish_hour still equals 12, so the
        // gate stays shut until another scheduled hour clears it.
        let tomorrow_noon = Utc.with_ymd_and_hms(2026, 3, 15, 12, 3, 0).unwrap();
        assert!(!gate.should_publish(tomorrow_noon));
    }

    #[test]
    fn micro_unit_rounding() {
        assert_eq!(to_micro_units(64.301447), 64_301_447);
        assert_eq!(to_micro_units(0.0000006), 1);
        assert_eq!(to_micro_units(0.0000004), 0);
        assert_eq!(to_micro_units(0.0), 0);
        assert_eq!(to_micro_units(-1.0), 0);
    }
}
