//! Schedule data model: work hours, breaks, services, and existing bookings.
//!
//! [`ScheduleConfig`] is the practitioner-owned configuration the engine reads.
//! It is loaded from JSON and validated once, at schedule-update time; slot
//! calculation trusts a validated config and never re-checks it.
//!
//! ```json
//! {
//!   "timezone": "Europe/Moscow",
//!   "work_intervals": { "Mon": [{ "start": "09:00", "end": "18:00" }] },
//!   "breaks": [{ "start": "13:00", "end": "14:00", "reason": "lunch" }],
//!   "buffer_minutes": 15,
//!   "slot_step_minutes": 15,
//!   "min_service_duration_minutes": 30,
//!   "auto_buffer": true
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::interval::Interval;
use crate::timezone::parse_timezone;

const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// `"HH:mm"` (de)serialization for wall-clock times.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        crate::timezone::parse_local_time(&s).map_err(serde::de::Error::custom)
    }
}

// ── Work hours and breaks ───────────────────────────────────────────────────

/// A working window on one weekday, in local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkInterval {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl WorkInterval {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Build from two `"HH:mm"` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self {
            start: crate::timezone::parse_local_time(start)?,
            end: crate::timezone::parse_local_time(end)?,
        })
    }

    fn contains(&self, start: NaiveTime, end: NaiveTime) -> bool {
        self.start <= start && end <= self.end
    }
}

/// A non-bookable window inside the working day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Break {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Weekdays the break applies to. Empty means every working day.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days: Vec<Weekday>,
}

impl Break {
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self {
            start: crate::timezone::parse_local_time(start)?,
            end: crate::timezone::parse_local_time(end)?,
            reason: None,
            days: Vec::new(),
        })
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn on_days(mut self, days: &[Weekday]) -> Self {
        self.days = days.to_vec();
        self
    }

    pub fn applies_on(&self, weekday: Weekday) -> bool {
        self.days.is_empty() || self.days.contains(&weekday)
    }
}

// ── Slot step ───────────────────────────────────────────────────────────────

/// Granularity of candidate start times: 5, 10 or 15 minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SlotStep(u32);

impl SlotStep {
    pub const FIVE: SlotStep = SlotStep(5);
    pub const TEN: SlotStep = SlotStep(10);
    pub const FIFTEEN: SlotStep = SlotStep(15);

    pub fn minutes(self) -> u32 {
        self.0
    }
}

impl Default for SlotStep {
    fn default() -> Self {
        SlotStep::FIFTEEN
    }
}

impl TryFrom<u32> for SlotStep {
    type Error = EngineError;

    fn try_from(minutes: u32) -> Result<Self> {
        match minutes {
            5 | 10 | 15 => Ok(SlotStep(minutes)),
            _ => Err(EngineError::InvalidScheduleConfig(format!(
                "slot step must be 5, 10 or 15 minutes, got {minutes}"
            ))),
        }
    }
}

impl From<SlotStep> for u32 {
    fn from(step: SlotStep) -> u32 {
        step.0
    }
}

// ── ScheduleConfig ──────────────────────────────────────────────────────────

fn default_min_service_duration() -> u32 {
    30
}

/// A practitioner's recurring availability and booking rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Working windows per weekday. Missing weekdays are days off.
    #[serde(default)]
    pub work_intervals: HashMap<Weekday, Vec<WorkInterval>>,
    #[serde(default)]
    pub breaks: Vec<Break>,
    /// Default post-service buffer, used when a service has none of its own.
    #[serde(default)]
    pub buffer_minutes: u32,
    #[serde(default)]
    pub slot_step_minutes: SlotStep,
    /// Shortest bookable service; free tails shorter than this are not left behind.
    #[serde(default = "default_min_service_duration")]
    pub min_service_duration_minutes: u32,
    /// IANA zone name the wall-clock times above are expressed in.
    pub timezone: String,
    /// Close gaps between bookings that are shorter than `buffer_minutes`.
    #[serde(default)]
    pub auto_buffer: bool,
}

impl ScheduleConfig {
    /// An empty schedule (no working days) in `timezone` with default rules.
    pub fn new(timezone: impl Into<String>) -> Self {
        Self {
            work_intervals: HashMap::new(),
            breaks: Vec::new(),
            buffer_minutes: 0,
            slot_step_minutes: SlotStep::default(),
            min_service_duration_minutes: default_min_service_duration(),
            timezone: timezone.into(),
            auto_buffer: false,
        }
    }

    /// Parse a JSON schedule and validate it.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidScheduleConfig`] for malformed JSON or a schedule
    /// that breaks an invariant, [`EngineError::InvalidTimezone`] for an
    /// unknown zone.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ScheduleConfig = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidScheduleConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the working windows of `weekday`, replacing any existing ones.
    pub fn with_day(mut self, weekday: Weekday, intervals: Vec<WorkInterval>) -> Self {
        self.work_intervals.insert(weekday, intervals);
        self
    }

    pub fn with_break(mut self, brk: Break) -> Self {
        self.breaks.push(brk);
        self
    }

    pub fn tz(&self) -> Result<Tz> {
        parse_timezone(&self.timezone)
    }

    /// Working windows of `weekday`, sorted by start.
    pub fn intervals_for(&self, weekday: Weekday) -> Vec<WorkInterval> {
        let mut intervals = self
            .work_intervals
            .get(&weekday)
            .cloned()
            .unwrap_or_default();
        intervals.sort_by_key(|iv| iv.start);
        intervals
    }

    /// Check the schedule-update invariants.
    ///
    /// - the timezone is a known IANA zone
    /// - every work interval and break has `start < end`
    /// - work intervals of one weekday do not overlap
    /// - every break lies inside a work interval on each day it applies to
    /// - the shortest service duration is positive
    pub fn validate(&self) -> Result<()> {
        self.tz()?;

        if self.min_service_duration_minutes == 0 {
            return Err(invalid("min_service_duration_minutes must be positive"));
        }

        for weekday in ALL_WEEKDAYS {
            let intervals = self.intervals_for(weekday);
            for iv in &intervals {
                if iv.start >= iv.end {
                    return Err(invalid(format!(
                        "{weekday} work interval {} must start before it ends",
                        span(iv.start, iv.end)
                    )));
                }
            }
            for pair in intervals.windows(2) {
                if pair[1].start < pair[0].end {
                    return Err(invalid(format!(
                        "{weekday} work intervals {} and {} overlap",
                        span(pair[0].start, pair[0].end),
                        span(pair[1].start, pair[1].end)
                    )));
                }
            }
        }

        for brk in &self.breaks {
            if brk.start >= brk.end {
                return Err(invalid(format!(
                    "break {} must start before it ends",
                    span(brk.start, brk.end)
                )));
            }

            let mut applied = false;
            for weekday in ALL_WEEKDAYS {
                let intervals = self.intervals_for(weekday);
                let explicit = brk.days.contains(&weekday);
                if !brk.applies_on(weekday) || (intervals.is_empty() && !explicit) {
                    continue;
                }
                applied = true;
                if !intervals.iter().any(|iv| iv.contains(brk.start, brk.end)) {
                    return Err(invalid(format!(
                        "break {} on {weekday} lies outside every work interval",
                        span(brk.start, brk.end)
                    )));
                }
            }
            if !applied {
                return Err(invalid(format!(
                    "break {} does not fall on any working day",
                    span(brk.start, brk.end)
                )));
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> EngineError {
    EngineError::InvalidScheduleConfig(msg.into())
}

fn span(start: NaiveTime, end: NaiveTime) -> String {
    format!("{}-{}", start.format("%H:%M"), end.format("%H:%M"))
}

// ── Services ────────────────────────────────────────────────────────────────

/// Identifier of a bookable service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(pub String);

impl From<&str> for ServiceId {
    fn from(s: &str) -> Self {
        ServiceId(s.to_string())
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Duration and buffer of a service, snapshotted for one calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub id: ServiceId,
    pub duration_minutes: u32,
    /// `None` means "use the schedule default"; `Some(0)` is an explicit zero.
    #[serde(default)]
    pub buffer_minutes: Option<u32>,
}

impl ServiceInfo {
    pub fn new(id: impl Into<ServiceId>, duration_minutes: u32) -> Self {
        Self {
            id: id.into(),
            duration_minutes,
            buffer_minutes: None,
        }
    }

    pub fn with_buffer(mut self, minutes: u32) -> Self {
        self.buffer_minutes = Some(minutes);
        self
    }

    pub fn buffer_or(&self, default: u32) -> u32 {
        self.buffer_minutes.unwrap_or(default)
    }

    /// Duration plus buffer: the time the service blocks the calendar.
    ///
    /// Saturates at `u32::MAX` rather than wrapping.
    pub fn blocked_minutes(&self, default_buffer: u32) -> u32 {
        self.duration_minutes.saturating_add(self.buffer_or(default_buffer))
    }
}

/// Lookup of service metadata by id.
pub trait ServiceCatalog {
    fn service(&self, id: &ServiceId) -> Option<&ServiceInfo>;
}

impl ServiceCatalog for [ServiceInfo] {
    fn service(&self, id: &ServiceId) -> Option<&ServiceInfo> {
        self.iter().find(|s| &s.id == id)
    }
}

impl ServiceCatalog for Vec<ServiceInfo> {
    fn service(&self, id: &ServiceId) -> Option<&ServiceInfo> {
        self.as_slice().service(id)
    }
}

impl ServiceCatalog for HashMap<ServiceId, ServiceInfo> {
    fn service(&self, id: &ServiceId) -> Option<&ServiceInfo> {
        self.get(id)
    }
}

// ── Existing bookings ───────────────────────────────────────────────────────

/// A committed reservation, read as busy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingBooking {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<ServiceId>,
}

impl ExistingBooking {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            service_id: None,
        }
    }

    pub fn for_service(mut self, id: impl Into<ServiceId>) -> Self {
        self.service_id = Some(id.into());
        self
    }

    pub fn interval(&self) -> Interval {
        Interval::new(self.start, self.end)
    }
}
