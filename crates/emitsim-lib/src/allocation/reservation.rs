use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSlot {
    /// Build an interval, rejecting one that ends before it starts.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end < start {
            return Err(Error::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn starting_at(start: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            start,
            end: start + duration,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// End-exclusive overlap test: touching intervals do not overlap.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Lifecycle of a reservation.
///
/// Serialized with the single-letter codes used by stored records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReservationStatus {
    #[default]
    #[serde(rename = "p")]
    Provisioned,
    #[serde(rename = "c")]
    Confirmed,
    #[serde(rename = "d")]
    Completed,
    #[serde(rename = "e")]
    Cancelled,
}

/// A booked interval against a resource.
///
/// `scheduled` is fixed at booking time; `estimated` follows the latest
/// prediction and drives availability; `actual` is filled in afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub scheduled: TimeSlot,
    pub estimated: TimeSlot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<TimeSlot>,
    #[serde(default)]
    pub status: ReservationStatus,
}

impl Reservation {
    pub fn new(slot: TimeSlot, label: Option<String>) -> Self {
        Self {
            label,
            scheduled: slot,
            estimated: slot,
            actual: None,
            status: ReservationStatus::Provisioned,
        }
    }

    /// External key: the label, or the scheduled start when unlabelled.
    pub fn key(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => self.scheduled.start.to_rfc3339(),
        }
    }

    pub fn set_estimated(&mut self, slot: TimeSlot) {
        self.estimated = slot;
    }

    pub fn set_actual(&mut self, slot: TimeSlot) {
        self.actual = Some(slot);
    }

    /// Estimated duration, or the observed one when `actual` is requested.
    pub fn duration(&self, actual: bool) -> Option<Duration> {
        if actual {
            self.actual.map(|slot| slot.duration())
        } else {
            Some(self.estimated.duration())
        }
    }

    /// Cancelled reservations no longer block their resource.
    pub fn is_active(&self) -> bool {
        self.status != ReservationStatus::Cancelled
    }

    /// Provisioned → confirmed. Returns whether the status changed.
    pub fn confirm(&mut self) -> bool {
        if self.status == ReservationStatus::Provisioned {
            self.status = ReservationStatus::Confirmed;
            return true;
        }
        false
    }

    /// Record the observed interval and close the reservation.
    pub fn complete(&mut self, actual: TimeSlot) -> bool {
        match self.status {
            ReservationStatus::Provisioned | ReservationStatus::Confirmed => {
                self.actual = Some(actual);
                self.status = ReservationStatus::Completed;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) -> bool {
        match self.status {
            ReservationStatus::Provisioned | ReservationStatus::Confirmed => {
                self.status = ReservationStatus::Cancelled;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    #[test]
    fn inverted_interval_is_rejected() {
        assert!(matches!(
            TimeSlot::new(at(10, 10), at(10, 0)),
            Err(Error::InvalidInterval { .. })
        ));
        assert!(TimeSlot::new(at(10, 0), at(10, 0)).is_ok());
    }

    #[test]
    fn touching_slots_do_not_overlap() {
        let a = TimeSlot::new(at(10, 0), at(10, 10)).unwrap();
        let b = TimeSlot::new(at(10, 10), at(10, 20)).unwrap();
        let c = TimeSlot::new(at(10, 5), at(10, 15)).unwrap();
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn key_falls_back_to_scheduled_start() {
        let slot = TimeSlot::new(at(10, 0), at(10, 10)).unwrap();
        assert_eq!(Reservation::new(slot, Some("AF123".into())).key(), "AF123");
        assert_eq!(
            Reservation::new(slot, None).key(),
            "2024-05-01T10:00:00+00:00"
        );
    }

    #[test]
    fn status_transitions() {
        let slot = TimeSlot::new(at(10, 0), at(10, 10)).unwrap();
        let mut r = Reservation::new(slot, None);
        assert!(r.confirm());
        assert!(!r.confirm());
        let observed = TimeSlot::new(at(10, 2), at(10, 14)).unwrap();
        assert!(r.complete(observed));
        assert!(!r.cancel());
        assert_eq!(r.duration(true), Some(Duration::minutes(12)));
        assert_eq!(r.duration(false), Some(Duration::minutes(10)));

        let mut cancelled = Reservation::new(slot, None);
        assert!(cancelled.cancel());
        assert!(!cancelled.is_active());
    }

    #[test]
    fn status_serializes_as_letter_codes() {
        assert_eq!(
            serde_json::to_string(&ReservationStatus::Completed).unwrap(),
            "\"d\""
        );
        let slot = TimeSlot::new(at(10, 0), at(10, 10)).unwrap();
        let json = serde_json::to_value(Reservation::new(slot, Some("X".into()))).unwrap();
        assert_eq!(json["status"], "p");
        assert_eq!(json["scheduled"]["start"], "2024-05-01T10:00:00Z");
    }
}
