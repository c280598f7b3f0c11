//! Alarm-transition detection.
//!
//! The server flags every reading above its ingest threshold. The dashboard
//! only raises its critical alarm when such a reading also clears the local
//! confirm threshold and differs from the last reading it saw. Identity is the
//! (temperature, timestamp) pair; record ids are never compared.

use crate::models::Reading;
use chrono::{DateTime, Utc};

/// The alarm currently tracked by the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmState {
    pub temperature: f64,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

/// What the detector remembers between polls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlarmSnapshot {
    pub last_seen: Option<Reading>,
    pub alarm: Option<AlarmState>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlarmEvent {
    /// A new alarm; the audio cue fires once for each of these.
    Raised(AlarmState),
    /// The server reported a normal reading while an alarm was tracked.
    Cleared,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub snapshot: AlarmSnapshot,
    pub event: Option<AlarmEvent>,
}

impl AlarmSnapshot {
    /// True while an alarm is tracked and nobody has acknowledged it.
    pub fn is_critical(&self) -> bool {
        self.alarm.as_ref().is_some_and(|a| !a.acknowledged)
    }

    /// Acknowledge the tracked alarm locally. Returns the alarm, if any.
    /// The comparison keys are left alone so the same reading cannot re-raise it.
    pub fn acknowledge(&mut self) -> Option<AlarmState> {
        let alarm = self.alarm.as_mut()?;
        alarm.acknowledged = true;
        Some(alarm.clone())
    }
}

/// Fold one fetched reading into the previous snapshot.
pub fn reconcile(previous: &AlarmSnapshot, fetched: &Reading, confirm: f64) -> Reconciliation {
    let is_new = previous
        .last_seen
        .as_ref()
        .map_or(true, |seen| !seen.same_sample(fetched.temperature, fetched.timestamp));

    let (alarm, event) = if !fetched.alert {
        let event = previous.alarm.is_some().then_some(AlarmEvent::Cleared);
        (None, event)
    } else if fetched.temperature > confirm && is_new {
        let alarm = AlarmState {
            temperature: fetched.temperature,
            timestamp: fetched.timestamp,
            acknowledged: false,
        };
        (Some(alarm.clone()), Some(AlarmEvent::Raised(alarm)))
    } else {
        (previous.alarm.clone(), None)
    };

    Reconciliation {
        snapshot: AlarmSnapshot {
            last_seen: Some(fetched.clone()),
            alarm,
        },
        event,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    const CONFIRM: f64 = 30.0;

    fn reading(id: i64, temperature: f64, offset_secs: i64) -> Reading {
        Reading {
            id,
            temperature,
            timestamp: Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap()
                + Duration::seconds(offset_secs),
            alert: temperature > 28.0,
        }
    }

    fn feed(readings: &[Reading]) -> (AlarmSnapshot, Vec<Option<AlarmEvent>>) {
        let mut snapshot = AlarmSnapshot::default();
        let mut events = Vec::new();
        for r in readings {
            let rec = reconcile(&snapshot, r, CONFIRM);
            snapshot = rec.snapshot;
            events.push(rec.event);
        }
        (snapshot, events)
    }

    #[test]
    fn test_first_confirmed_reading_raises() {
        let (snapshot, events) = feed(&[reading(1, 31.0, 0)]);
        assert!(matches!(events[0], Some(AlarmEvent::Raised(_))));
        assert!(snapshot.is_critical());
        assert_eq!(snapshot.last_seen.unwrap().temperature, 31.0);
    }

    #[test]
    fn test_server_flag_below_confirm_does_not_raise() {
        let (snapshot, events) = feed(&[reading(1, 20.0, 0), reading(2, 29.5, 5)]);
        assert_eq!(events, vec![None, None]);
        assert_eq!(snapshot.alarm, None);
        assert!(snapshot.last_seen.unwrap().alert);
    }

    #[test]
    fn test_confirm_threshold_is_strict() {
        let (snapshot, _) = feed(&[reading(1, 30.0, 0)]);
        assert_eq!(snapshot.alarm, None);
    }

    #[test]
    fn test_same_reading_twice_raises_once() {
        let r = reading(1, 31.0, 0);
        let (_, events) = feed(&[r.clone(), r]);
        assert!(events[0].is_some());
        assert_eq!(events[1], None);
    }

    #[test]
    fn test_identity_ignores_record_id() {
        let first = reading(1, 31.0, 0);
        let mut again = first.clone();
        again.id = 99;
        let (_, events) = feed(&[first, again]);
        assert_eq!(events[1], None);
    }

    #[test]
    fn test_new_timestamp_same_temperature_raises_again() {
        let (_, events) = feed(&[reading(1, 31.0, 0), reading(2, 31.0, 5)]);
        assert!(matches!(events[1], Some(AlarmEvent::Raised(_))));
    }

    #[test]
    fn test_normal_reading_clears_even_unacknowledged() {
        let (snapshot, events) = feed(&[reading(1, 31.0, 0), reading(2, 22.0, 5)]);
        assert_eq!(events[1], Some(AlarmEvent::Cleared));
        assert_eq!(snapshot.alarm, None);
    }

    #[test]
    fn test_normal_reading_without_alarm_emits_nothing() {
        let (_, events) = feed(&[reading(1, 22.0, 0), reading(2, 23.0, 5)]);
        assert_eq!(events, vec![None, None]);
    }

    #[test]
    fn test_flagged_unconfirmed_reading_keeps_tracked_alarm() {
        let (snapshot, events) = feed(&[reading(1, 31.0, 0), reading(2, 29.0, 5)]);
        assert_eq!(events[1], None);
        let alarm = snapshot.alarm.unwrap();
        assert_eq!(alarm.temperature, 31.0);
        assert_eq!(snapshot.last_seen.unwrap().temperature, 29.0);
    }

    #[test]
    fn test_acknowledged_alarm_not_re_raised_by_same_reading() {
        let r = reading(1, 31.0, 0);
        let mut snapshot = reconcile(&AlarmSnapshot::default(), &r, CONFIRM).snapshot;

        let acked = snapshot.acknowledge().unwrap();
        assert!(acked.acknowledged);
        assert!(!snapshot.is_critical());

        let rec = reconcile(&snapshot, &r, CONFIRM);
        assert_eq!(rec.event, None);
        assert!(rec.snapshot.alarm.unwrap().acknowledged);
    }

    #[test]
    fn test_acknowledge_without_alarm() {
        let mut snapshot = AlarmSnapshot::default();
        assert_eq!(snapshot.acknowledge(), None);
    }

    #[test]
    fn test_reconcile_leaves_previous_untouched() {
        let previous = feed(&[reading(1, 31.0, 0)]).0;
        let before = previous.clone();
        let _ = reconcile(&previous, &reading(2, 20.0, 5), CONFIRM);
        assert_eq!(previous, before);
    }
}
