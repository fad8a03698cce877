//! Conversion between a practitioner's wall-clock time and UTC instants.
//!
//! Schedules are configured in local time (`"09:00"` in `"Europe/Moscow"`),
//! but every other module works on absolute [`DateTime<Utc>`] values. This
//! module is the only boundary between the two.
//!
//! # DST handling
//!
//! A fixed offset is wrong near transition boundaries, so [`local_time_to_utc`]
//! runs a bounded fixed-point search: start from the wall-clock time read as
//! UTC, ask what the zone would show for that guess, and shift the guess by the
//! difference. The offset function is piecewise constant, so one or two steps
//! settle it for every real zone.
//!
//! - Ambiguous wall-clock times (fall back) resolve to the **earliest** instant.
//! - Nonexistent wall-clock times (spring forward) are shifted forward by the
//!   length of the gap: 02:30 on a New York spring-forward day becomes 03:30 EDT.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Timelike, Utc, Weekday,
};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::{EngineError, Result};

/// Upper bound on fixed-point steps before giving up.
const MAX_ITERATIONS: usize = 10;

/// A UTC instant seen on the wall clock of a particular zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocalDateTime {
    /// Calendar date in the zone (may differ from the UTC date).
    pub date: NaiveDate,
    pub hour: u32,
    pub minute: u32,
    /// Weekday of `date`, i.e. the zone's local weekday.
    pub weekday: Weekday,
}

// ── Parsing ─────────────────────────────────────────────────────────────────

/// Parse an IANA timezone name into [`Tz`].
///
/// # Errors
///
/// Returns [`EngineError::InvalidTimezone`] for unknown names. There is no
/// fallback to UTC.
pub fn parse_timezone(s: &str) -> Result<Tz> {
    s.parse::<Tz>()
        .map_err(|_| EngineError::InvalidTimezone(format!("'{}'", s)))
}

/// Parse a strict `"HH:mm"` wall-clock time.
pub fn parse_local_time(s: &str) -> Result<NaiveTime> {
    let bytes = s.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return Err(EngineError::InvalidTime(format!(
            "expected HH:mm, got '{s}'"
        )));
    }
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|e| EngineError::InvalidTime(format!("'{}': {}", s, e)))
}

// ── local → UTC ─────────────────────────────────────────────────────────────

/// Convert a local date and `"HH:mm"` time in a named zone to a UTC instant.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use slot_engine::timezone::local_to_utc;
///
/// let date = NaiveDate::from_ymd_opt(2026, 3, 16).unwrap();
/// let utc = local_to_utc(date, "14:00", "Europe/Moscow").unwrap();
/// assert_eq!(utc.to_rfc3339(), "2026-03-16T11:00:00+00:00");
/// ```
///
/// # Errors
///
/// [`EngineError::InvalidTimezone`] for an unknown zone,
/// [`EngineError::InvalidTime`] for a malformed time string.
pub fn local_to_utc(date: NaiveDate, time: &str, zone: &str) -> Result<DateTime<Utc>> {
    let tz = parse_timezone(zone)?;
    let time = parse_local_time(time)?;
    local_time_to_utc(date, time, &tz)
}

/// Typed form of [`local_to_utc`] for callers that already hold a parsed zone.
pub fn local_time_to_utc(date: NaiveDate, time: NaiveTime, tz: &Tz) -> Result<DateTime<Utc>> {
    let desired = date.and_time(time);
    let mut guess = desired.and_utc();

    for _ in 0..MAX_ITERATIONS {
        let shown = guess.with_timezone(tz).naive_local();
        let diff = desired - shown;
        if diff.num_seconds().abs() < 60 {
            return Ok(earliest_instant(desired, guess, tz));
        }
        guess += diff;
    }

    shift_past_gap(desired, tz)
}

/// For a fall-back wall-clock time the search may land on either occurrence;
/// pin it to the first one.
fn earliest_instant(desired: NaiveDateTime, found: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&desired) {
        LocalResult::Ambiguous(a, b) => a.with_timezone(&Utc).min(b.with_timezone(&Utc)),
        _ => found,
    }
}

/// The search oscillates around a spring-forward gap. Read the wall-clock time
/// with the offset in force before the transition, which lands just past it.
fn shift_past_gap(desired: NaiveDateTime, tz: &Tz) -> Result<DateTime<Utc>> {
    match tz.from_local_datetime(&desired) {
        LocalResult::None => {
            let before = tz
                .offset_from_utc_datetime(&(desired - Duration::hours(24)))
                .fix();
            let shifted = desired - Duration::seconds(i64::from(before.local_minus_utc()));
            Ok(shifted.and_utc())
        }
        _ => Err(EngineError::NonConvergentConversion {
            local: desired.format("%Y-%m-%d %H:%M").to_string(),
            timezone: tz.name().to_string(),
        }),
    }
}

// ── UTC → local ─────────────────────────────────────────────────────────────

/// Express a UTC instant on the wall clock of a named zone.
///
/// # Errors
///
/// Returns [`EngineError::InvalidTimezone`] for an unknown zone.
pub fn utc_to_local(instant: DateTime<Utc>, zone: &str) -> Result<LocalDateTime> {
    let tz = parse_timezone(zone)?;
    Ok(to_local(instant, &tz))
}

/// Typed form of [`utc_to_local`].
pub fn to_local(instant: DateTime<Utc>, tz: &Tz) -> LocalDateTime {
    let local = instant.with_timezone(tz);
    LocalDateTime {
        date: local.date_naive(),
        hour: local.hour(),
        minute: local.minute(),
        weekday: local.weekday(),
    }
}

/// Format the zone's UTC offset at `instant` (e.g. `"-05:00"`, `"+03:00"`).
pub fn utc_offset_label(instant: DateTime<Utc>, tz: &Tz) -> String {
    let offset_secs = instant.with_timezone(tz).offset().fix().local_minus_utc();
    let sign = if offset_secs >= 0 { "+" } else { "-" };
    let abs_secs = offset_secs.unsigned_abs();
    let hours = abs_secs / 3600;
    let minutes = (abs_secs % 3600) / 60;
    format!("{sign}{hours:02}:{minutes:02}")
}

// ── Tests ───────────────────────────────────────────────────────────────────
