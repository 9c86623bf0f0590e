use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::reservation::{Reservation, TimeSlot};
use crate::error::Result;

/// Default gap left after a conflicting reservation by first-fit searches.
pub const DEFAULT_EPSILON_MS: i64 = 1;

/// A bookable resource such as a runway, a ramp or a service vehicle.
#[derive(Debug, Clone)]
pub struct Resource {
    name: String,
    reservations: BTreeMap<String, Reservation>,
    dirty: bool,
    epsilon: Duration,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reservations: BTreeMap::new(),
            dirty: true,
            epsilon: Duration::milliseconds(DEFAULT_EPSILON_MS),
        }
    }

    pub fn with_epsilon(mut self, epsilon: Duration) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }

    /// Whether the resource changed since it was last persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn reservations(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.values()
    }

    /// Active estimated intervals sorted by start.
    fn busy(&self) -> Vec<&TimeSlot> {
        let mut busy: Vec<&TimeSlot> = self
            .reservations
            .values()
            .filter(|r| r.is_active())
            .map(|r| &r.estimated)
            .collect();
        busy.sort();
        busy
    }

    /// Whether `[from, to)` is clear of every active reservation.
    pub fn is_available(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        let requested = TimeSlot { start: from, end: to };
        for slot in self.busy() {
            if slot.start >= to {
                break;
            }
            if slot.overlaps(&requested) {
                return false;
            }
        }
        true
    }

    /// Store a reservation, replacing one with the same key.
    pub fn add(&mut self, reservation: Reservation) {
        let key = reservation.key();
        if self.reservations.contains_key(&key) {
            warn!(resource = %self.name, reservation = %key, "reservation already exists, overwriting");
        }
        self.reservations.insert(key, reservation);
        self.dirty = true;
    }

    /// Book `[from, to)` without checking availability.
    pub fn book(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        label: Option<&str>,
    ) -> Result<Reservation> {
        let reservation = Reservation::new(TimeSlot::new(from, to)?, label.map(str::to_string));
        debug!(resource = %self.name, label = ?label, %from, %to, "booked");
        self.add(reservation.clone());
        Ok(reservation)
    }

    /// Book only if the interval is free.
    pub fn try_book(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        label: Option<&str>,
    ) -> Result<Option<Reservation>> {
        TimeSlot::new(from, to)?;
        if !self.is_available(from, to) {
            return Ok(None);
        }
        self.book(from, to, label).map(Some)
    }

    pub fn remove(&mut self, key: &str) -> Option<Reservation> {
        let removed = self.reservations.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub fn find(&self, key: &str) -> Option<&Reservation> {
        self.reservations.get(key)
    }

    pub fn find_mut(&mut self, key: &str) -> Option<&mut Reservation> {
        let found = self.reservations.get_mut(key);
        if found.is_some() {
            self.dirty = true;
        }
        found
    }

    /// Drop reservations whose estimated end is before `limit`.
    pub fn clean(&mut self, limit: DateTime<Utc>) -> usize {
        let before = self.reservations.len();
        self.reservations.retain(|_, r| r.estimated.end >= limit);
        let removed = before - self.reservations.len();
        if removed > 0 {
            self.dirty = true;
            debug!(resource = %self.name, removed, "cleaned reservations");
        }
        removed
    }

    /// Earliest window of the requested length starting at or after `from`.
    ///
    /// A free window is returned unchanged. Otherwise the window is placed
    /// in the first gap between reservations ending after `from`, starting
    /// one epsilon after the reservation it follows.
    pub fn first_available(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> TimeSlot {
        let requested = TimeSlot { start: from, end: to };
        if self.is_available(from, to) {
            return requested;
        }

        let duration = requested.duration();
        let mut cursor = from;
        for slot in self.busy().into_iter().filter(|slot| slot.end > from) {
            if cursor + duration <= slot.start {
                break;
            }
            cursor = cursor.max(slot.end + self.epsilon);
        }

        debug!(resource = %self.name, %from, start = %cursor, "first available slot");
        TimeSlot::starting_at(cursor, duration)
    }

    /// Like [`Resource::first_available`], but gives up when the window
    /// would end after `latest_end`.
    pub fn first_available_until(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        latest_end: DateTime<Utc>,
    ) -> Option<TimeSlot> {
        Some(self.first_available(from, to)).filter(|slot| slot.end <= latest_end)
    }

    /// `(key, estimated)` pairs sorted by estimated start.
    pub fn allocations(&self) -> Vec<(String, TimeSlot)> {
        let mut out: Vec<(String, TimeSlot)> = self
            .reservations
            .iter()
            .map(|(key, r)| (key.clone(), r.estimated))
            .collect();
        out.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    /// `(key, actual)` pairs for reservations with an observed interval.
    pub fn actual_allocations(&self) -> Vec<(String, TimeSlot)> {
        let mut out: Vec<(String, TimeSlot)> = self
            .reservations
            .iter()
            .filter_map(|(key, r)| r.actual.map(|slot| (key.clone(), slot)))
            .collect();
        out.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        out
    }
}
