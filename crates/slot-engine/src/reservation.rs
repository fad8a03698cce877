//! Double-booking prevention: the Reservation Arbiter and its store contract.
//!
//! An enumerated slot is only a suggestion; two clients can pick the same one.
//! The arbiter is the single write path and relies on
//! [`ReservationStore::insert_if_free`] running the overlap check and the
//! insert as one atomic unit, so of any set of concurrent attempts with
//! overlapping windows exactly one commits and the rest get
//! [`EngineError::ReservationConflict`].
//!
//! ```text
//! Proposed ──► Committed
//!          ├─► Rejected(Conflict)   retry with another slot
//!          └─► Rejected(Invalid)    fix the input
//! ```
//!
//! Conflicts are returned as-is; the arbiter never retries on its own.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::interval::Interval;
use crate::schedule::{ExistingBooking, ServiceId, ServiceInfo};

// ── Identifiers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(pub Uuid);

impl ReservationId {
    pub fn new() -> Self {
        ReservationId(Uuid::new_v4())
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PractitionerId(pub String);

impl From<&str> for PractitionerId {
    fn from(s: &str) -> Self {
        PractitionerId(s.to_string())
    }
}

impl fmt::Display for PractitionerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Reservation ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Confirmed,
    Cancelled,
    Completed,
}

impl ReservationStatus {
    /// Whether a reservation in this status still occupies its time.
    pub fn blocks_time(self) -> bool {
        !matches!(self, ReservationStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub practitioner_id: PractitionerId,
    pub service_id: ServiceId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: ReservationStatus,
}

impl Reservation {
    pub fn interval(&self) -> Interval {
        Interval::new(self.start, self.end)
    }

    /// The reservation as input to later availability calculations.
    pub fn as_booking(&self) -> ExistingBooking {
        ExistingBooking::new(self.start, self.end).for_service(self.service_id.clone())
    }
}

/// A validated booking request handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub practitioner_id: PractitionerId,
    pub service_id: ServiceId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl NewReservation {
    pub fn interval(&self) -> Interval {
        Interval::new(self.start, self.end)
    }
}

// ── Store contract ──────────────────────────────────────────────────────────

/// The persistence collaborator.
///
/// Implementations backed by a database must run `insert_if_free` at an
/// isolation level (serializable transaction, exclusion constraint, or a
/// per-practitioner lock) under which two overlapping inserts cannot both
/// observe an empty calendar.
pub trait ReservationStore {
    /// Insert `new` unless a time-blocking reservation of the same
    /// practitioner overlaps `[start, end)`.
    ///
    /// # Errors
    ///
    /// [`EngineError::ReservationConflict`] naming the overlapping reservation,
    /// or [`EngineError::Storage`] for backend failures.
    fn insert_if_free(&self, new: NewReservation) -> Result<Reservation>;

    /// Time-blocking reservations of `practitioner` that overlap `[from, to)`.
    fn bookings_between(
        &self,
        practitioner: &PractitionerId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExistingBooking>>;
}

impl<T: ReservationStore + ?Sized> ReservationStore for &T {
    fn insert_if_free(&self, new: NewReservation) -> Result<Reservation> {
        (**self).insert_if_free(new)
    }

    fn bookings_between(
        &self,
        practitioner: &PractitionerId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExistingBooking>> {
        (**self).bookings_between(practitioner, from, to)
    }
}

impl<T: ReservationStore + ?Sized> ReservationStore for Arc<T> {
    fn insert_if_free(&self, new: NewReservation) -> Result<Reservation> {
        (**self).insert_if_free(new)
    }

    fn bookings_between(
        &self,
        practitioner: &PractitionerId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExistingBooking>> {
        (**self).bookings_between(practitioner, from, to)
    }
}

/// Reference store keeping every reservation in memory.
///
/// One mutex guards the whole table, which makes check-then-insert a single
/// critical section per call.
#[derive(Debug, Default)]
pub struct InMemoryReservationStore {
    table: Mutex<HashMap<PractitionerId, Vec<Reservation>>>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ReservationId) -> Option<Reservation> {
        self.table
            .lock()
            .values()
            .flatten()
            .find(|r| r.id == id)
            .cloned()
    }

    /// All reservations of `practitioner`, any status, ordered by start.
    pub fn reservations_for(&self, practitioner: &PractitionerId) -> Vec<Reservation> {
        let mut rows = self
            .table
            .lock()
            .get(practitioner)
            .cloned()
            .unwrap_or_default();
        rows.sort_by_key(|r| r.start);
        rows
    }

    /// Confirmed → Cancelled. The slot becomes bookable again.
    pub fn cancel(&self, id: ReservationId) -> Result<Reservation> {
        self.transition(id, ReservationStatus::Cancelled)
    }

    /// Confirmed → Completed.
    pub fn complete(&self, id: ReservationId) -> Result<Reservation> {
        self.transition(id, ReservationStatus::Completed)
    }

    fn transition(&self, id: ReservationId, to: ReservationStatus) -> Result<Reservation> {
        let mut table = self.table.lock();
        let row = table
            .values_mut()
            .flatten()
            .find(|r| r.id == id)
            .ok_or_else(|| {
                EngineError::ReservationInvalid(format!("unknown reservation {id}"))
            })?;

        if row.status != ReservationStatus::Confirmed {
            return Err(EngineError::ReservationInvalid(format!(
                "reservation {id} is {:?}, cannot become {:?}",
                row.status, to
            )));
        }
        row.status = to;
        Ok(row.clone())
    }
}

impl ReservationStore for InMemoryReservationStore {
    fn insert_if_free(&self, new: NewReservation) -> Result<Reservation> {
        let mut table = self.table.lock();
        let rows = table.entry(new.practitioner_id.clone()).or_default();

        let requested = new.interval();
        if let Some(existing) = rows
            .iter()
            .find(|r| r.status.blocks_time() && r.interval().overlaps(&requested))
        {
            return Err(EngineError::ReservationConflict {
                start: new.start,
                end: new.end,
                existing: existing.id,
            });
        }

        let reservation = Reservation {
            id: ReservationId::new(),
            practitioner_id: new.practitioner_id,
            service_id: new.service_id,
            start: new.start,
            end: new.end,
            status: ReservationStatus::Confirmed,
        };
        rows.push(reservation.clone());
        Ok(reservation)
    }

    fn bookings_between(
        &self,
        practitioner: &PractitionerId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExistingBooking>> {
        let window = Interval::new(from, to);
        Ok(self
            .reservations_for(practitioner)
            .iter()
            .filter(|r| r.status.blocks_time() && r.interval().overlaps(&window))
            .map(Reservation::as_booking)
            .collect())
    }
}

// ── Arbiter ─────────────────────────────────────────────────────────────────

/// Validates booking attempts and commits them through a [`ReservationStore`].
///
/// Holds no mutable state of its own; share it across workers with `Arc`.
#[derive(Debug)]
pub struct ReservationArbiter<S> {
    store: S,
    services: HashMap<ServiceId, ServiceInfo>,
    horizon: Option<Duration>,
}

impl<S: ReservationStore> ReservationArbiter<S> {
    pub fn new(store: S, services: impl IntoIterator<Item = ServiceInfo>) -> Self {
        Self {
            store,
            services: services.into_iter().map(|s| (s.id.clone(), s)).collect(),
            horizon: None,
        }
    }

    /// Reject reservations starting more than `horizon` after `now`.
    pub fn with_booking_horizon(mut self, horizon: Duration) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Attempt to book `service_id` with `practitioner` starting at `start`.
    ///
    /// The reservation covers `[start, start + duration)`; the service buffer
    /// is a slot-calculation concern and is not part of the stored window.
    ///
    /// # Errors
    ///
    /// - [`EngineError::ReservationInvalid`] for an unknown service, a start
    ///   before `now`, or a start beyond the booking horizon
    /// - [`EngineError::ReservationConflict`] if an overlapping reservation exists
    /// - [`EngineError::Storage`] passed through from the store
    pub fn reserve(
        &self,
        practitioner: &PractitionerId,
        service_id: &ServiceId,
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Reservation> {
        let service = self.services.get(service_id).ok_or_else(|| {
            EngineError::ReservationInvalid(format!("unknown service '{service_id}'"))
        })?;

        if service.duration_minutes == 0 {
            return Err(EngineError::ReservationInvalid(format!(
                "service '{service_id}' has zero duration"
            )));
        }
        if start < now {
            return Err(EngineError::ReservationInvalid(format!(
                "start {start} is in the past"
            )));
        }
        if let Some(horizon) = self.horizon {
            if start > now + horizon {
                return Err(EngineError::ReservationInvalid(format!(
                    "start {start} is beyond the booking window of {} days",
                    horizon.num_days()
                )));
            }
        }

        let new = NewReservation {
            practitioner_id: practitioner.clone(),
            service_id: service_id.clone(),
            start,
            end: start + Duration::minutes(i64::from(service.duration_minutes)),
        };

        match self.store.insert_if_free(new) {
            Ok(reservation) => {
                info!(
                    id = %reservation.id,
                    practitioner = %practitioner,
                    start = %reservation.start,
                    end = %reservation.end,
                    "reservation committed"
                );
                Ok(reservation)
            }
            Err(err) => {
                debug!(
                    practitioner = %practitioner,
                    %start,
                    error = %err,
                    "reservation rejected"
                );
                Err(err)
            }
        }
    }
}
