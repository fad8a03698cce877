//! Half-open `[start, end)` interval algebra over UTC instants.
//!
//! Adjacent intervals (one ends exactly when the other starts) do NOT overlap,
//! but they DO merge: no zero-length gap survives [`merge_sorted`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A half-open span of absolute time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// An interval of `minutes` beginning at `start`.
    pub fn starting_at(start: DateTime<Utc>, minutes: i64) -> Self {
        Self {
            start,
            end: start + Duration::minutes(minutes),
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        overlaps(self, other)
    }
}

/// Two intervals overlap iff `a.start < b.end && b.start < a.end`.
pub fn overlaps(a: &Interval, b: &Interval) -> bool {
    a.start < b.end && b.start < a.end
}

/// Coalesce intervals that are already sorted by start.
///
/// An interval whose start is `<=` the running end is absorbed, so touching
/// intervals become one.
pub fn merge_sorted(intervals: &[Interval]) -> Vec<Interval> {
    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());

    for iv in intervals {
        match merged.last_mut() {
            Some(last) if iv.start <= last.end => {
                if iv.end > last.end {
                    last.end = iv.end;
                }
            }
            _ => merged.push(*iv),
        }
    }

    merged
}

/// Sort, drop empty intervals, then [`merge_sorted`].
pub fn normalize(intervals: &[Interval]) -> Vec<Interval> {
    let mut sorted: Vec<Interval> = intervals
        .iter()
        .filter(|iv| !iv.is_empty())
        .copied()
        .collect();
    sorted.sort_by_key(|iv| (iv.start, iv.end));
    merge_sorted(&sorted)
}

/// Free time inside `window` once `busy` (sorted and merged) is removed.
pub fn subtract(window: &Interval, busy: &[Interval]) -> Vec<Interval> {
    let mut free = Vec::new();
    let mut cursor = window.start;

    for b in busy {
        if b.end <= cursor {
            continue;
        }
        if b.start >= window.end {
            break;
        }
        if b.start > cursor {
            free.push(Interval::new(cursor, b.start.min(window.end)));
        }
        cursor = cursor.max(b.end);
        if cursor >= window.end {
            break;
        }
    }

    if cursor < window.end {
        free.push(Interval::new(cursor, window.end));
    }

    free
}
