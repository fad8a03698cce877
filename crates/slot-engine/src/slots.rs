//! Enumerate the start times at which a new appointment can begin.
//!
//! For every work interval of the requested day the enumerator subtracts the
//! aggregated busy set, then walks each free interval in `slot_step_minutes`
//! steps. A candidate is kept only if the appointment (duration plus buffer)
//! fits and the time left before the end of the free interval is either zero
//! or long enough for the shortest service; slivers nobody can book are never
//! created.
//!
//! The result is advisory. Only [`crate::reservation::ReservationArbiter`]
//! decides whether a booking actually goes through.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::busy::aggregate_day;
use crate::error::Result;
use crate::interval::{subtract, Interval};
use crate::schedule::{ExistingBooking, ScheduleConfig, ServiceCatalog, ServiceId, ServiceInfo};
use crate::timezone::{local_time_to_utc, to_local};

/// Candidate start times on `date`, ascending.
///
/// When several services are requested the slot must fit the longest one
/// (duration + buffer) on its own; durations are not summed. If none of the
/// ids is known the schedule's shortest service duration plus the default
/// buffer is used.
///
/// `now` is supplied by the caller; no slot starts before it.
///
/// # Errors
///
/// [`crate::EngineError::InvalidTimezone`] if the schedule zone is unknown.
pub fn available_slots<C: ServiceCatalog + ?Sized>(
    config: &ScheduleConfig,
    date: NaiveDate,
    service_ids: &[ServiceId],
    bookings: &[ExistingBooking],
    services: &C,
    now: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>> {
    let work_intervals = config.intervals_for(date.weekday());
    if work_intervals.is_empty() {
        return Ok(Vec::new());
    }

    let tz = config.tz()?;
    let busy = aggregate_day(bookings, config, date, services)?;
    let required = required_duration(config, service_ids, services);
    let step = Duration::minutes(i64::from(config.slot_step_minutes.minutes()));
    let min_tail = Duration::minutes(i64::from(config.min_service_duration_minutes));

    let mut slots = Vec::new();
    for work in &work_intervals {
        let window = Interval::new(
            local_time_to_utc(date, work.start, &tz)?,
            local_time_to_utc(date, work.end, &tz)?,
        );
        if window.end <= now {
            continue;
        }

        for free in subtract(&window, &busy) {
            walk_free_interval(&free, &busy, required, step, min_tail, now, &mut slots);
        }
    }

    slots.sort();
    slots.dedup();

    debug!(
        %date,
        required_minutes = required.num_minutes(),
        slots = slots.len(),
        "enumerated slots"
    );
    Ok(slots)
}

/// The requested service that blocks the most time (duration + buffer).
///
/// Both the slot length and the visible appointment end come from this one
/// service.
pub fn governing_service<'a, C: ServiceCatalog + ?Sized>(
    config: &ScheduleConfig,
    service_ids: &[ServiceId],
    services: &'a C,
) -> Option<&'a ServiceInfo> {
    service_ids
        .iter()
        .filter_map(|id| services.service(id))
        .max_by_key(|s| s.blocked_minutes(config.buffer_minutes))
}

/// Time a new booking blocks: the longest `duration + buffer` among the
/// requested services.
pub fn required_duration<C: ServiceCatalog + ?Sized>(
    config: &ScheduleConfig,
    service_ids: &[ServiceId],
    services: &C,
) -> Duration {
    let minutes = match governing_service(config, service_ids, services) {
        Some(service) => service.blocked_minutes(config.buffer_minutes),
        None => {
            warn!(
                requested = ?service_ids,
                "no known service requested, using the shortest service duration"
            );
            config
                .min_service_duration_minutes
                .saturating_add(config.buffer_minutes)
        }
    };
    Duration::minutes(i64::from(minutes))
}

fn walk_free_interval(
    free: &Interval,
    busy: &[Interval],
    required: Duration,
    step: Duration,
    min_tail: Duration,
    now: DateTime<Utc>,
    out: &mut Vec<DateTime<Utc>>,
) {
    let Some(mut cursor) = round_up(free.start.max(now), step) else {
        return;
    };

    while cursor + required <= free.end {
        let candidate = Interval::starting_at(cursor, required.num_minutes());
        let tail = free.end - candidate.end;
        let usable_tail = tail == Duration::zero() || tail >= min_tail;

        // Free intervals already exclude busy time; the second check only
        // guards against rounding at the interval edges.
        if usable_tail && !busy.iter().any(|b| b.overlaps(&candidate)) {
            out.push(cursor);
        }
        cursor += step;
    }
}

/// Smallest multiple of `step` on the UTC timeline that is `>= t`.
fn round_up(t: DateTime<Utc>, step: Duration) -> Option<DateTime<Utc>> {
    let step_secs = step.num_seconds();
    if step_secs <= 0 {
        return Some(t);
    }
    let secs = t.timestamp();
    let rem = secs.rem_euclid(step_secs);
    let aligned = if rem == 0 && t.timestamp_subsec_nanos() == 0 {
        secs
    } else {
        secs - rem + step_secs
    };
    DateTime::from_timestamp(aligned, 0)
}

// ── Presentation ────────────────────────────────────────────────────────────

/// A slot as shown to a client: the buffer is not part of the visible end.
///
/// `end` is `start` plus the duration of the [`governing_service`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Start on the practitioner's wall clock, `"HH:mm"`.
    pub local_start: String,
}

/// [`available_slots`] with each start expanded into a [`CandidateSlot`].
pub fn candidate_slots<C: ServiceCatalog + ?Sized>(
    config: &ScheduleConfig,
    date: NaiveDate,
    service_ids: &[ServiceId],
    bookings: &[ExistingBooking],
    services: &C,
    now: DateTime<Utc>,
) -> Result<Vec<CandidateSlot>> {
    let tz = config.tz()?;
    let starts = available_slots(config, date, service_ids, bookings, services, now)?;

    let duration_minutes = governing_service(config, service_ids, services)
        .map_or(config.min_service_duration_minutes, |s| s.duration_minutes);
    let duration = Duration::minutes(i64::from(duration_minutes));

    Ok(starts
        .into_iter()
        .map(|start| {
            let local = to_local(start, &tz);
            CandidateSlot {
                start,
                end: start + duration,
                local_start: format!("{:02}:{:02}", local.hour, local.minute),
            }
        })
        .collect())
}

/// The earliest slot within `horizon_days` days starting at `from`.
///
/// Returns `Ok(None)` when the whole horizon is booked out.
pub fn first_available_slot<C: ServiceCatalog + ?Sized>(
    config: &ScheduleConfig,
    from: NaiveDate,
    horizon_days: u32,
    service_ids: &[ServiceId],
    bookings: &[ExistingBooking],
    services: &C,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    for date in from.iter_days().take(horizon_days as usize) {
        let slots = available_slots(config, date, service_ids, bookings, services, now)?;
        if let Some(first) = slots.first() {
            return Ok(Some(*first));
        }
    }
    Ok(None)
}
