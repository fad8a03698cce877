//! JSON fixture describing one practitioner's calendar.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use slot_engine::{ExistingBooking, ScheduleConfig, ServiceInfo};

#[derive(Debug, Deserialize)]
pub struct Fixture {
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub services: Vec<ServiceInfo>,
    #[serde(default)]
    pub bookings: Vec<ExistingBooking>,
}

impl Fixture {
    /// Read, parse, and validate a fixture file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        let fixture: Fixture = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse fixture {}", path.display()))?;
        fixture
            .schedule
            .validate()
            .with_context(|| format!("invalid schedule in {}", path.display()))?;
        Ok(fixture)
    }
}
