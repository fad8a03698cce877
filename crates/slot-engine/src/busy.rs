//! Aggregate everything that blocks a practitioner's day into one busy set.
//!
//! Bookings (extended by their post-service buffer), breaks, and the optional
//! auto-buffer normalization all reduce to "unavailable time", so the slot
//! enumerator only ever subtracts a single sorted, merged list.

use chrono::{Datelike, Duration, NaiveDate};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::error::Result;
use crate::interval::{normalize, Interval};
use crate::schedule::{Break, ExistingBooking, ScheduleConfig, ServiceCatalog};
use crate::timezone::local_time_to_utc;

/// Build the merged busy intervals of `date`.
///
/// 1. every booking's end is pushed out by its service buffer (or the
///    schedule default)
/// 2. with `auto_buffer`, a gap shorter than `buffer_minutes` between two
///    bookings is closed entirely
/// 3. breaks that apply on the date's weekday are converted to UTC
/// 4. everything is sorted and merged; empty intervals (a break lying
///    entirely inside a DST gap) are dropped
///
/// Inputs are never modified.
///
/// # Errors
///
/// [`crate::EngineError::InvalidTimezone`] if the schedule zone is unknown.
pub fn aggregate_busy<C: ServiceCatalog + ?Sized>(
    bookings: &[ExistingBooking],
    breaks: &[Break],
    config: &ScheduleConfig,
    date: NaiveDate,
    services: &C,
) -> Result<Vec<Interval>> {
    let tz = config.tz()?;

    let mut extended = extend_with_buffers(bookings, config.buffer_minutes, services);
    extended.sort_by_key(|iv| (iv.start, iv.end));

    let mut busy = if config.auto_buffer {
        close_short_gaps(&extended, Duration::minutes(i64::from(config.buffer_minutes)))
    } else {
        extended
    };

    busy.extend(break_intervals(breaks, date, &tz)?);

    let merged = normalize(&busy);
    debug!(
        %date,
        bookings = bookings.len(),
        busy = merged.len(),
        "aggregated busy intervals"
    );
    Ok(merged)
}

/// [`aggregate_busy`] using the breaks configured on the schedule itself.
pub fn aggregate_day<C: ServiceCatalog + ?Sized>(
    bookings: &[ExistingBooking],
    config: &ScheduleConfig,
    date: NaiveDate,
    services: &C,
) -> Result<Vec<Interval>> {
    aggregate_busy(bookings, &config.breaks, config, date, services)
}

/// Each booking as an interval extended by its buffer.
pub fn extend_with_buffers<C: ServiceCatalog + ?Sized>(
    bookings: &[ExistingBooking],
    default_buffer: u32,
    services: &C,
) -> Vec<Interval> {
    bookings
        .iter()
        .filter(|b| {
            let valid = b.start < b.end;
            if !valid {
                warn!(
                    start = %b.start,
                    end = %b.end,
                    "skipping booking that ends before it starts"
                );
            }
            valid
        })
        .map(|b| {
            let mut iv = b.interval();
            let buffer = b
                .service_id
                .as_ref()
                .and_then(|id| services.service(id))
                .map_or(default_buffer, |s| s.buffer_or(default_buffer));
            iv.end += Duration::minutes(i64::from(buffer));
            iv
        })
        .collect()
}

/// Ensure consecutive bookings are either at least `min_gap` apart or touching.
///
/// `sorted` must be ordered by start. A positive gap shorter than `min_gap` is
/// closed by extending the earlier booking to the later one's start; gaps that
/// are already wide enough are left alone, so the result is idempotent.
pub fn close_short_gaps(sorted: &[Interval], min_gap: Duration) -> Vec<Interval> {
    let mut out = sorted.to_vec();
    if out.is_empty() {
        return out;
    }

    // Index of the interval reaching furthest so far; a short booking nested
    // inside a longer one must not define the gap.
    let mut running = 0;
    for i in 1..out.len() {
        let gap = out[i].start - out[running].end;
        if gap > Duration::zero() && gap < min_gap {
            out[running].end = out[i].start;
        }
        if out[i].end >= out[running].end {
            running = i;
        }
    }

    out
}

/// Breaks applying on `date`'s weekday, as UTC intervals.
pub fn break_intervals(breaks: &[Break], date: NaiveDate, tz: &Tz) -> Result<Vec<Interval>> {
    let weekday = date.weekday();
    breaks
        .iter()
        .filter(|b| b.applies_on(weekday))
        .map(|b| {
            Ok(Interval::new(
                local_time_to_utc(date, b.start, tz)?,
                local_time_to_utc(date, b.end, tz)?,
            ))
        })
        .collect()
}
