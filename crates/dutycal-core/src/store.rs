//! Event persistence and range queries over a [`ColumnBackend`].
//!
//! Rows live in one column family. Range queries go through the secondary
//! index on the `week` column, which is always the equality clause of the
//! query: a range whose bounds fall in different week buckets only returns
//! rows from the bucket of its lower bound. Callers that need several weeks
//! issue one query per bucket (see [`crate::calendar`]).

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, instrument};

use crate::backend::{
    ColumnBackend, ConsistencyLevel, IndexClause, IndexExpression, IndexOperator, Mutation,
};
use crate::error::StoreError;
use crate::event::codec::{self, encode_millis, encode_week};
use crate::event::schema::{ALL_COLUMNS, END, OWNER, READ_COLUMNS, START, WEEK};
use crate::event::{Event, derive_id};
use crate::week::{week_of, week_start};

/// Row cap density used when the configuration does not name one.
pub const DEFAULT_MAX_EVENTS_PER_DAY: u32 = 24;

const SECONDS_PER_DAY: u64 = 86_400;

/// Bounds and filters of a [`EventStore::fetch_range`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    /// Lower bound; selects the week bucket. The epoch disables the
    /// `end >= from` filter.
    pub from: DateTime<Tz>,
    /// Upper bound on `start`, if any.
    pub to: Option<DateTime<Tz>>,
    /// Exact owner match; `Some("")` selects unassigned events.
    pub owner: Option<String>,
    /// Row cap; derived from the span when absent.
    pub limit: Option<u32>,
    pub quorum: bool,
}

impl RangeQuery {
    #[must_use]
    pub const fn starting_at(from: DateTime<Tz>) -> Self {
        Self {
            from,
            to: None,
            owner: None,
            limit: None,
            quorum: false,
        }
    }

    #[must_use]
    pub fn until(mut self, to: DateTime<Tz>) -> Self {
        self.to = Some(to);
        self
    }

    #[must_use]
    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn quorum(mut self, quorum: bool) -> Self {
        self.quorum = quorum;
        self
    }
}

/// Reads and writes events in one column family.
#[derive(Debug)]
pub struct EventStore<B> {
    backend: B,
    column_family: String,
    location: Tz,
    max_events_per_day: u32,
}

impl<B: ColumnBackend> EventStore<B> {
    pub fn new(backend: B, column_family: impl Into<String>, location: Tz) -> Self {
        Self {
            backend,
            column_family: column_family.into(),
            location,
            max_events_per_day: DEFAULT_MAX_EVENTS_PER_DAY,
        }
    }

    #[must_use]
    pub fn with_max_events_per_day(mut self, max_events_per_day: u32) -> Self {
        self.max_events_per_day = max_events_per_day;
        self
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Zone events are decoded into.
    pub const fn location(&self) -> Tz {
        self.location
    }

    pub fn column_family(&self) -> &str {
        &self.column_family
    }

    /// Load one event by row key.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the row has no live columns, a decode
    /// error for malformed columns, otherwise the backend failure unchanged.
    #[instrument(skip(self))]
    pub fn fetch(&self, id: &str, quorum: bool) -> Result<Event, StoreError> {
        let columns = self.backend.get_slice(
            &self.column_family,
            id,
            &READ_COLUMNS,
            ConsistencyLevel::from_quorum(quorum),
        )?;
        if columns.is_empty() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        codec::decode(id, &columns, self.location)
    }

    /// Load the events of `query.from`'s week bucket that overlap the query
    /// bounds, at most the query's row cap of them.
    ///
    /// # Errors
    ///
    /// The backend failure unchanged, or the first decode error among the
    /// returned rows.
    pub fn fetch_range(&self, query: &RangeQuery) -> Result<Vec<Event>, StoreError> {
        let (events, _) = self.fetch_page(query, String::new())?;
        Ok(events)
    }

    /// Like [`Self::fetch_range`], but keeps paging through the index until
    /// the bucket is exhausted; the row cap only sizes each page.
    ///
    /// # Errors
    ///
    /// The first failing page, as in [`Self::fetch_range`].
    pub fn fetch_range_all(&self, query: &RangeQuery) -> Result<Vec<Event>, StoreError> {
        let mut events = Vec::new();
        let mut start_key = String::new();
        loop {
            let (page, next) = self.fetch_page(query, start_key)?;
            events.extend(page);
            match next {
                Some(key) => start_key = key,
                None => return Ok(events),
            }
        }
    }

    /// One index page from `start_key` on. Returns the key to resume from
    /// when the page came back full.
    fn fetch_page(
        &self,
        query: &RangeQuery,
        start_key: String,
    ) -> Result<(Vec<Event>, Option<String>), StoreError> {
        let from = query.from.with_timezone(&self.location);
        let week = week_of(&from);

        let mut expressions = vec![IndexExpression::new(
            WEEK,
            IndexOperator::Eq,
            encode_week(week),
        )];
        if let Some(owner) = &query.owner {
            expressions.push(IndexExpression::new(
                OWNER,
                IndexOperator::Eq,
                owner.as_bytes(),
            ));
        }
        if let Some(to) = &query.to {
            expressions.push(IndexExpression::new(
                START,
                IndexOperator::Lte,
                encode_millis(to),
            ));
        }
        if from.timestamp_millis() != 0 {
            expressions.push(IndexExpression::new(
                END,
                IndexOperator::Gte,
                encode_millis(&from),
            ));
        }

        let count = query
            .limit
            .unwrap_or_else(|| self.default_cap(&from, query.to.as_ref()));
        debug!(
            week,
            count,
            start_key = %start_key,
            owner = query.owner.as_deref(),
            quorum = query.quorum,
            "range query"
        );

        let clause = IndexClause {
            expressions,
            start_key,
            count,
        };
        let slices = self.backend.get_indexed_slices(
            &self.column_family,
            &clause,
            &READ_COLUMNS,
            ConsistencyLevel::from_quorum(query.quorum),
        )?;

        // Start keys are inclusive; a trailing NUL is the next key after.
        let full = usize::try_from(count).is_ok_and(|cap| slices.len() >= cap);
        let next = if full {
            slices.last().map(|slice| format!("{}\0", slice.key))
        } else {
            None
        };
        let events = slices
            .into_iter()
            .filter(|slice| !slice.columns.is_empty())
            .map(|slice| codec::decode(&slice.key, &slice.columns, self.location))
            .collect::<Result<_, _>>()?;
        Ok((events, next))
    }

    /// Cap proportional to the hours spanned; an open range spans to the end
    /// of `from`'s week bucket.
    fn default_cap(&self, from: &DateTime<Tz>, to: Option<&DateTime<Tz>>) -> u32 {
        let end = to
            .copied()
            .unwrap_or_else(|| week_start(week_of(from) + 1, self.location));
        let seconds = u64::try_from((end - *from).num_seconds()).unwrap_or(0);
        let cap = u64::from(self.max_events_per_day)
            .saturating_mul(seconds)
            .div_ceil(SECONDS_PER_DAY)
            .max(1);
        u32::try_from(cap).unwrap_or(u32::MAX)
    }

    /// Write every column of `event` as one atomic batch.
    ///
    /// Assigns a derived id when the event has none. On success the event's
    /// write timestamp advances; on failure it is left untouched.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidInput`] for an incomplete event, otherwise the
    /// backend failure unchanged.
    #[instrument(skip(self, event), fields(id = %event.id))]
    pub fn sync(&self, event: &mut Event) -> Result<(), StoreError> {
        event.validate()?;
        if event.id.is_empty() {
            event.id = derive_id(event)
                .ok_or_else(|| StoreError::InvalidInput("cannot derive event id".into()))?;
        }

        let ts = next_write_ts(event.last_write_ts());
        let mutations = codec::encode(event, ts);
        self.backend.batch_mutate(
            &self.column_family,
            &event.id,
            &mutations,
            ConsistencyLevel::Quorum,
        )?;
        event.mark_written(ts);
        debug!(id = %event.id, ts, "event synced");
        Ok(())
    }

    /// Tombstone every column of `event` as of its last observed write.
    ///
    /// Writes newer than that timestamp, from other writers, survive.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotSynced`] without touching the backend if the event
    /// was never written, otherwise the backend failure unchanged.
    #[instrument(skip(self, event), fields(id = %event.id))]
    pub fn delete(&self, event: &Event) -> Result<(), StoreError> {
        if !event.is_synced() {
            return Err(StoreError::NotSynced);
        }
        let tombstone = Mutation::Delete {
            columns: ALL_COLUMNS.iter().map(ToString::to_string).collect(),
            timestamp: event.last_write_ts(),
        };
        self.backend.batch_mutate(
            &self.column_family,
            &event.id,
            &[tombstone],
            ConsistencyLevel::Quorum,
        )?;
        debug!(id = %event.id, "event deleted");
        Ok(())
    }
}

/// Current time in microseconds, kept strictly above `previous` so that a
/// re-sync always wins over the write it replaces.
fn next_write_ts(previous: i64) -> i64 {
    Utc::now()
        .timestamp_micros()
        .max(previous.saturating_add(1))
}
