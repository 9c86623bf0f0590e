use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::reservation::{Reservation, TimeSlot};
use super::resource::{Resource, DEFAULT_EPSILON_MS};
use super::store::AllocationStore;
use crate::error::{Error, Result};

/// One row of a table snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationEntry {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub label: String,
}

/// Resource name to its reservations, sorted by start.
pub type Snapshot = BTreeMap<String, Vec<AllocationEntry>>;

/// Named registry of resources; the unit of persistence.
///
/// Each resource sits behind its own mutex, so a check-then-book on one
/// resource never races another booking on the same resource while
/// bookings on different resources proceed in parallel.
#[derive(Debug)]
pub struct AllocationTable {
    name: String,
    epsilon: Duration,
    resources: RwLock<BTreeMap<String, Arc<Mutex<Resource>>>>,
}

impl AllocationTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            epsilon: Duration::milliseconds(DEFAULT_EPSILON_MS),
            resources: RwLock::new(BTreeMap::new()),
        }
    }

    /// Gap used by first-fit searches on resources created after this call.
    pub fn with_epsilon(mut self, epsilon: Duration) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_resources<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.add_resource(name);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register an empty resource, replacing any resource with that name.
    pub fn add_resource(&self, name: impl Into<String>) {
        let name = name.into();
        let resource = Resource::new(name.clone()).with_epsilon(self.epsilon);
        let mut resources = self.resources.write().unwrap_or_else(|e| e.into_inner());
        if resources.contains_key(&name) {
            warn!(table = %self.name, resource = %name, "resource already exists, overwriting");
        }
        resources.insert(name, Arc::new(Mutex::new(resource)));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    pub fn resource_names(&self) -> Vec<String> {
        self.resources
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Shared handle to a resource.
    pub fn resource(&self, name: &str) -> Result<Arc<Mutex<Resource>>> {
        self.resources
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownResource {
                table: self.name.clone(),
                name: name.to_string(),
            })
    }

    fn with_resource<T>(&self, name: &str, f: impl FnOnce(&mut Resource) -> T) -> Result<T> {
        let handle = self.resource(name)?;
        let mut guard: MutexGuard<'_, Resource> = handle.lock().unwrap_or_else(|e| e.into_inner());
        Ok(f(&mut guard))
    }

    pub fn is_available(&self, name: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<bool> {
        self.with_resource(name, |r| r.is_available(from, to))
    }

    /// Book unconditionally, even over existing reservations.
    pub fn book(
        &self,
        name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        label: Option<&str>,
    ) -> Result<Reservation> {
        self.with_resource(name, |r| r.book(from, to, label))?
    }

    /// Check availability and book under one lock.
    pub fn try_book(
        &self,
        name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        label: Option<&str>,
    ) -> Result<Option<Reservation>> {
        self.with_resource(name, |r| r.try_book(from, to, label))?
    }

    pub fn first_available(&self, name: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<TimeSlot> {
        TimeSlot::new(from, to)?;
        self.with_resource(name, |r| r.first_available(from, to))
    }

    /// Find the first free window and book it under one lock.
    pub fn book_first_available(
        &self,
        name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        label: Option<&str>,
    ) -> Result<Reservation> {
        TimeSlot::new(from, to)?;
        self.with_resource(name, |r| {
            let slot = r.first_available(from, to);
            r.book(slot.start, slot.end, label)
        })?
    }

    pub fn find_reservation(&self, name: &str, key: &str) -> Result<Option<Reservation>> {
        self.with_resource(name, |r| r.find(key).cloned())
    }

    /// Look a reservation up in memory, then in `store`.
    ///
    /// A reservation found only in the store is added to the resource.
    pub fn find_or_load_reservation(
        &self,
        store: &dyn AllocationStore,
        name: &str,
        key: &str,
    ) -> Result<Option<Reservation>> {
        if let Some(found) = self.find_reservation(name, key)? {
            return Ok(Some(found));
        }
        let stored = store
            .load_resource(&self.name, name)?
            .into_iter()
            .find(|r| r.key() == key);
        if let Some(reservation) = &stored {
            self.with_resource(name, |r| merge_stored(r, [reservation.clone()]))?;
        }
        Ok(stored)
    }

    pub fn remove_reservation(&self, name: &str, key: &str) -> Result<Option<Reservation>> {
        self.with_resource(name, |r| r.remove(key))
    }

    /// Drop reservations ended before `limit` from every resource.
    pub fn clean(&self, limit: DateTime<Utc>) -> usize {
        self.handles()
            .into_iter()
            .map(|(_, handle)| handle.lock().unwrap_or_else(|e| e.into_inner()).clean(limit))
            .sum()
    }

    fn handles(&self) -> Vec<(String, Arc<Mutex<Resource>>)> {
        self.resources
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(name, handle)| (name.clone(), Arc::clone(handle)))
            .collect()
    }

    fn collect(&self, actual: bool) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for (name, handle) in self.handles() {
            let resource = handle.lock().unwrap_or_else(|e| e.into_inner());
            let rows = if actual {
                resource.actual_allocations()
            } else {
                resource.allocations()
            };
            if rows.is_empty() {
                continue;
            }
            snapshot.insert(
                name,
                rows.into_iter()
                    .map(|(label, slot)| AllocationEntry {
                        start: slot.start,
                        end: slot.end,
                        label,
                    })
                    .collect(),
            );
        }
        snapshot
    }

    /// Estimated intervals of every non-empty resource.
    pub fn snapshot(&self) -> Snapshot {
        self.collect(false)
    }

    /// Observed intervals of every resource that has some.
    pub fn snapshot_actual(&self) -> Snapshot {
        self.collect(true)
    }

    /// Persist dirty resources. Returns how many were written.
    pub fn save(&self, store: &dyn AllocationStore) -> Result<usize> {
        let mut saved = 0;
        for (name, handle) in self.handles() {
            let mut resource = handle.lock().unwrap_or_else(|e| e.into_inner());
            if !resource.is_dirty() {
                continue;
            }
            let reservations: Vec<Reservation> = resource.reservations().cloned().collect();
            store.replace_resource(&self.name, &name, &reservations)?;
            resource.mark_clean();
            saved += 1;
            debug!(table = %self.name, resource = %name, count = reservations.len(), "saved resource");
        }
        info!(table = %self.name, saved, "allocation table saved");
        Ok(saved)
    }

    /// Rebuild every resource found in `store` under this table.
    ///
    /// Resources missing from the table are created. Loaded reservations
    /// replace in-memory ones with the same key; unsaved bookings stay
    /// pending for the next [`save`](Self::save).
    pub fn load(&self, store: &dyn AllocationStore) -> Result<usize> {
        let names = store.list_resources(&self.name)?;
        for name in &names {
            if !self.contains(name) {
                self.add_resource(name.clone());
            }
            let reservations = store.load_resource(&self.name, name)?;
            self.with_resource(name, |resource| merge_stored(resource, reservations))?;
        }
        info!(table = %self.name, resources = names.len(), "allocation table loaded");
        Ok(names.len())
    }
}

/// Add reservations read from a store.
///
/// The resource only becomes clean if it already was: a merge must not hide
/// bookings that were never written.
fn merge_stored(resource: &mut Resource, reservations: impl IntoIterator<Item = Reservation>) {
    let had_unsaved = resource.is_dirty();
    for reservation in reservations {
        resource.add(reservation);
    }
    if !had_unsaved {
        resource.mark_clean();
    }
}
