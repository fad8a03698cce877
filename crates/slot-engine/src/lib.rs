//! # slot-engine
//!
//! Availability and booking arbitration for service appointments.
//!
//! Given a practitioner's weekly work hours, breaks, service durations and
//! buffers, and the bookings already on the calendar, the engine computes the
//! start times at which a new appointment can legally begin on a given day,
//! and guarantees that concurrent attempts to book overlapping times resolve
//! to exactly one winner.
//!
//! All scheduling math runs on absolute UTC instants. Local wall-clock time
//! only appears when a [`ScheduleConfig`] is read against a calendar date.
//! No function reads the system clock; callers pass `now` explicitly.
//!
//! ## Modules
//!
//! - [`timezone`] — DST-aware wall-clock ⇄ UTC conversion
//! - [`interval`] — Half-open interval overlap, merge, and subtraction
//! - [`schedule`] — Work hours, breaks, services, bookings; JSON config and validation
//! - [`busy`] — Aggregate bookings, buffers, and breaks into one busy set
//! - [`slots`] — Enumerate candidate start times with the anti-fragmentation rule
//! - [`reservation`] — Atomic reservation arbiter and store contract
//! - [`error`] — Error types

pub mod busy;
pub mod error;
pub mod interval;
pub mod reservation;
pub mod schedule;
pub mod slots;
pub mod timezone;

pub use busy::{aggregate_busy, aggregate_day};
pub use error::{EngineError, Result};
pub use interval::{merge_sorted, overlaps, subtract, Interval};
pub use reservation::{
    InMemoryReservationStore, NewReservation, PractitionerId, Reservation, ReservationArbiter,
    ReservationId, ReservationStatus, ReservationStore,
};
pub use schedule::{
    Break, ExistingBooking, ScheduleConfig, ServiceCatalog, ServiceId, ServiceInfo, SlotStep,
    WorkInterval,
};
pub use slots::{available_slots, candidate_slots, first_available_slot, CandidateSlot};
pub use timezone::{local_to_utc, utc_to_local, LocalDateTime};
