//! Interval booking against named resources (runways, ramps, vehicles).
//!
//! - [`Reservation`] - A booked interval with scheduled/estimated/actual times
//! - [`Resource`] - Availability checks and first-fit search for one resource
//! - [`AllocationTable`] - Thread-safe registry of resources, saved and
//!   loaded through an [`AllocationStore`]

mod reservation;
mod resource;
mod store;
mod table;

pub use reservation::{Reservation, ReservationStatus, TimeSlot};
pub use resource::{Resource, DEFAULT_EPSILON_MS};
pub use store::{AllocationStore, MemoryAllocationStore, SqliteAllocationStore};
pub use table::{AllocationEntry, AllocationTable, Snapshot};
