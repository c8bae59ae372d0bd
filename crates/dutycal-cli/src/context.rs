//! Per-invocation state: validated config plus the opened event store.

use anyhow::{Context as _, Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use dutycal_core::week::local_midnight;
use dutycal_core::{DutyCalConfig, EventStore, SqliteBackend};
use std::path::Path;
use tracing::debug;

pub struct Context {
    pub config: DutyCalConfig,
    pub store: EventStore<SqliteBackend>,
}

impl Context {
    /// Load the config (explicit path, user file, or defaults) and open the
    /// store it names.
    pub fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = DutyCalConfig::load_or_default(config_path)?;
        let path = config.store.resolved_path();
        let backend = SqliteBackend::open(&path, config.store.keyspace.clone())
            .with_context(|| format!("Failed to open event store {}", path.display()))?;
        debug!(path = %path.display(), zone = %config.calendar.time_zone, "event store opened");

        let store = EventStore::new(
            backend,
            config.store.column_family.clone(),
            config.calendar.time_zone,
        )
        .with_max_events_per_day(config.calendar.max_events_per_day);
        Ok(Self { config, store })
    }

    pub const fn zone(&self) -> Tz {
        self.config.calendar.time_zone
    }

    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.zone())
    }
}

/// Parse `YYYY-MM-DD` as local midnight in `tz`.
pub fn parse_date(value: &str, tz: Tz) -> Result<DateTime<Tz>> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid date {value:?}, expected YYYY-MM-DD"))?;
    Ok(local_midnight(date, tz))
}

/// Parse `YYYY-MM-DD HH:MM` (or an RFC 3339 instant) into `tz`.
pub fn parse_local_time(value: &str, tz: Tz) -> Result<DateTime<Tz>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&tz));
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M")
        .with_context(|| format!("invalid time {value:?}, expected \"YYYY-MM-DD HH:MM\""))?;
    naive
        .and_local_timezone(tz)
        .earliest()
        .ok_or_else(|| anyhow!("{value} does not exist in {tz}"))
}

/// Parse a `HH:MM` or `90m`-style duration.
pub fn parse_duration(value: &str) -> Result<chrono::Duration> {
    if let Ok(time) = NaiveTime::parse_from_str(value, "%H:%M") {
        return Ok(time.signed_duration_since(NaiveTime::default()));
    }
    let unit_at = value.char_indices().last().map_or(0, |(at, _)| at);
    let (digits, unit) = value.split_at(unit_at);
    let amount: i64 = digits
        .parse()
        .with_context(|| format!("invalid duration {value:?}, expected HH:MM, 90m or 2h"))?;
    match unit {
        "m" => Ok(chrono::Duration::minutes(amount)),
        "h" => Ok(chrono::Duration::hours(amount)),
        _ => bail!("invalid duration unit in {value:?}, expected m or h"),
    }
}
