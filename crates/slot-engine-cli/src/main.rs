//! `slots` — inspect appointment availability for a practitioner fixture.

mod fixture;

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde_json::json;
use slot_engine::schedule::ServiceId;
use slot_engine::timezone::{parse_timezone, utc_offset_label};
use slot_engine::{candidate_slots, first_available_slot, local_to_utc};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::fixture::Fixture;

#[derive(Parser)]
#[command(name = "slots", version, about = "Appointment slot calculator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List bookable start times on one day
    Available {
        /// Fixture file with schedule, services and bookings
        #[arg(short, long)]
        fixture: PathBuf,
        /// Local calendar date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,
        /// Service ids to fit (repeatable)
        #[arg(short, long = "service", required = true)]
        services: Vec<String>,
        /// Reference instant (RFC 3339); defaults to the system clock
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Find the earliest bookable start time within a horizon
    First {
        #[arg(short, long)]
        fixture: PathBuf,
        /// First local date to search (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        /// Number of days to search
        #[arg(long, default_value_t = 14)]
        days: u32,
        #[arg(short, long = "service", required = true)]
        services: Vec<String>,
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Check a fixture's schedule configuration
    Validate {
        #[arg(short, long)]
        fixture: PathBuf,
    },
    /// Convert a local wall-clock time to UTC
    Convert {
        #[arg(long)]
        date: NaiveDate,
        /// Wall-clock time (HH:mm)
        #[arg(long)]
        time: String,
        /// IANA timezone name
        #[arg(long)]
        zone: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Available {
            fixture,
            date,
            services,
            now,
        } => {
            let f = Fixture::load(&fixture)?;
            let ids = service_ids(&services);
            let now = now.unwrap_or_else(Utc::now);
            debug!(%date, %now, "listing available slots");

            let slots = candidate_slots(&f.schedule, date, &ids, &f.bookings, &f.services, now)?;
            println!("{}", serde_json::to_string_pretty(&slots)?);
        }
        Command::First {
            fixture,
            from,
            days,
            services,
            now,
        } => {
            let f = Fixture::load(&fixture)?;
            let ids = service_ids(&services);
            let now = now.unwrap_or_else(Utc::now);

            let first =
                first_available_slot(&f.schedule, from, days, &ids, &f.bookings, &f.services, now)?;
            println!("{}", json!({ "slot": first }));
        }
        Command::Validate { fixture } => {
            let f = Fixture::load(&fixture)?;
            let output = json!({
                "valid": true,
                "timezone": f.schedule.timezone,
                "working_days": f.schedule.work_intervals.values().filter(|v| !v.is_empty()).count(),
                "breaks": f.schedule.breaks.len(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Convert { date, time, zone } => {
            let utc = local_to_utc(date, &time, &zone)?;
            let tz = parse_timezone(&zone)?;
            let output = json!({
                "utc": utc.to_rfc3339(),
                "utc_offset": utc_offset_label(utc, &tz),
                "weekday": date.weekday().to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn service_ids(raw: &[String]) -> Vec<ServiceId> {
    raw.iter().map(|s| ServiceId(s.clone())).collect()
}
