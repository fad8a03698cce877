//! Error types for slot-engine operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::reservation::ReservationId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Invalid schedule config: {0}")]
    InvalidScheduleConfig(String),

    #[error("Timezone conversion did not converge for {local} in {timezone}")]
    NonConvergentConversion { local: String, timezone: String },

    #[error("Reservation conflict: [{start}, {end}) overlaps reservation {existing}")]
    ReservationConflict {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        existing: ReservationId,
    },

    #[error("Invalid reservation: {0}")]
    ReservationInvalid(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// Whether re-querying availability and retrying with another time can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ReservationConflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
