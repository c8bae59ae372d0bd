//! Calendar read paths built from single-bucket range queries.
//!
//! [`EventStore::fetch_range`] only sees the week bucket of its lower
//! bound, so every view here decomposes its span into per-day or per-week
//! queries first.

use chrono::{DateTime, Days, NaiveDate};
use chrono_tz::Tz;
use tracing::debug;

use crate::backend::ColumnBackend;
use crate::error::StoreError;
use crate::event::Event;
use crate::store::{EventStore, RangeQuery};
use crate::week::{local_midnight, week_of, week_start};

/// Events overlapping one local day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayEvents {
    pub date: NaiveDate,
    pub events: Vec<Event>,
}

/// One week bucket, split into its seven days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekView {
    pub week: i64,
    /// Local Monday 00:00.
    pub start: DateTime<Tz>,
    pub days: Vec<DayEvents>,
}

impl WeekView {
    /// Previous bucket, clamped at zero.
    #[must_use]
    pub fn previous_week(&self) -> i64 {
        (self.week - 1).max(0)
    }

    #[must_use]
    pub const fn next_week(&self) -> i64 {
        self.week + 1
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.days.iter().flat_map(|day| day.events.iter())
    }
}

/// Load the seven days of `week`, one range query per local day.
///
/// Each day lists events overlapping it, ordered by start. An event that
/// runs past midnight shows on every day it touches within the bucket.
///
/// # Errors
///
/// The first failing day query.
pub fn week_view<B: ColumnBackend>(
    store: &EventStore<B>,
    week: i64,
) -> Result<WeekView, StoreError> {
    let location = store.location();
    let start = week_start(week, location);
    let first_day = start.date_naive();

    let mut days = Vec::with_capacity(7);
    for date in first_day.iter_days().take(7) {
        let day_start = local_midnight(date, location);
        let Some(next) = date.checked_add_days(Days::new(1)) else {
            break;
        };
        let query = RangeQuery::starting_at(day_start).until(local_midnight(next, location));
        let mut events = store.fetch_range(&query)?;
        events.sort_by_key(|event| event.start);
        days.push(DayEvents { date, events });
    }

    debug!(
        week,
        events = days.iter().map(|d| d.events.len()).sum::<usize>(),
        "week view loaded"
    );
    Ok(WeekView { week, start, days })
}

/// Required shifts without an owner, from local midnight of `now` through
/// `lookahead_days` days, walking one week bucket at a time.
///
/// # Errors
///
/// The first failing bucket query.
pub fn uncovered_events<B: ColumnBackend>(
    store: &EventStore<B>,
    now: DateTime<Tz>,
    lookahead_days: u32,
) -> Result<Vec<Event>, StoreError> {
    let location = store.location();
    let today = now.with_timezone(&location).date_naive();
    let mut cursor = local_midnight(today, location);
    let Some(end) = today
        .checked_add_days(Days::new(u64::from(lookahead_days)))
        .map(|day| local_midnight(day, location))
    else {
        return Ok(Vec::new());
    };

    let mut uncovered = Vec::new();
    while cursor < end {
        let bucket_end = week_start(week_of(&cursor) + 1, location).min(end);
        let query = RangeQuery::starting_at(cursor)
            .until(bucket_end)
            .owned_by("");
        uncovered.extend(
            store
                .fetch_range_all(&query)?
                .into_iter()
                .filter(|event| event.is_uncovered() && event.start < end),
        );
        cursor = bucket_end;
    }

    uncovered.sort_by_key(|event| event.start);
    debug!(count = uncovered.len(), lookahead_days, "uncovered shifts scanned");
    Ok(uncovered)
}

/// Up to `limit` events of the current week bucket still running at `now`,
/// optionally restricted to one owner (`""` for open shifts).
///
/// # Errors
///
/// The backend failure unchanged.
pub fn upcoming<B: ColumnBackend>(
    store: &EventStore<B>,
    now: DateTime<Tz>,
    owner: Option<&str>,
    limit: u32,
) -> Result<Vec<Event>, StoreError> {
    let mut query = RangeQuery::starting_at(now).limit(limit);
    if let Some(owner) = owner {
        query = query.owned_by(owner);
    }
    let mut events = store.fetch_range(&query)?;
    events.sort_by_key(|event| event.start);
    Ok(events)
}
