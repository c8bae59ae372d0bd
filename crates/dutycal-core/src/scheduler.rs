//! Recurrence scheduler.
//!
//! Each run walks every rule from local midnight of the start day up to the
//! rule's horizon and materializes the occurrences that are missing. An
//! occurrence is recognised by its generator id, a fingerprint of its start,
//! duration and content, so repeated runs converge instead of duplicating
//! rows. Nothing is persisted between runs; the store itself is the cursor.
//!
//! Two runs racing over the same horizon could both see a slot as empty.
//! [`Scheduler::schedule_all_exclusive`] serializes runs with an advisory
//! file lock.

use std::path::Path;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Days, Duration};
use chrono_tz::Tz;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::backend::ColumnBackend;
use crate::config::{RecurrenceKind, RecurrenceRule};
use crate::error::StoreError;
use crate::event::{Event, NewEvent};
use crate::lock::{LockError, SchedulerLock};
use crate::store::{EventStore, RangeQuery};
use crate::week::{local_midnight, local_time_on};

const TAG_START: u8 = 0x08;
const TAG_DURATION: u8 = 0x10;
const TAG_CONTENT_HASH: u8 = 0x1a;

/// Outcome counts for one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScheduleReport {
    /// Occurrences written by this run.
    pub created: usize,
    /// Occurrences already present.
    pub existing: usize,
    /// Occurrences whose write failed; retried by the next run.
    pub failed: usize,
}

impl ScheduleReport {
    #[must_use]
    pub const fn occurrences(&self) -> usize {
        self.created + self.existing + self.failed
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("cannot acquire scheduler lock: {0}")]
    Lock(#[from] LockError),

    #[error("scheduling {rule:?} aborted: {source}")]
    Store { rule: String, source: StoreError },
}

impl ScheduleError {
    /// Stable `E####` code of the underlying failure.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Lock(err) => err.code(),
            Self::Store { source, .. } => source.kind().code(),
        }
    }
}

/// Fingerprint of one rule occurrence.
///
/// Protobuf wire encoding of `{1: start unix seconds, 2: duration seconds,
/// 3: sha256(title ++ description)}`, matching ids written by earlier
/// generator versions byte for byte.
#[must_use]
pub fn generator_id(
    start: &DateTime<Tz>,
    duration: Duration,
    title: &str,
    description: &str,
) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(description.as_bytes());
    let content_hash = hasher.finalize();

    let mut out = Vec::with_capacity(2 * 11 + 2 + content_hash.len());
    out.push(TAG_START);
    put_varint(&mut out, u64::from_ne_bytes(start.timestamp().to_ne_bytes()));
    out.push(TAG_DURATION);
    put_varint(
        &mut out,
        u64::from_ne_bytes(duration.num_seconds().to_ne_bytes()),
    );
    out.push(TAG_CONTENT_HASH);
    put_varint(&mut out, content_hash.len() as u64);
    out.extend_from_slice(&content_hash);
    out
}

/// Base-128 varint; negative integers arrive as their two's complement and
/// take ten bytes.
#[allow(clippy::cast_possible_truncation)]
fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Materializes recurring events into an [`EventStore`].
#[derive(Debug)]
pub struct Scheduler<'s, B> {
    store: &'s EventStore<B>,
    schedule_ahead_days: u32,
}

impl<'s, B: ColumnBackend> Scheduler<'s, B> {
    /// `schedule_ahead_days` applies to rules without their own horizon.
    pub const fn new(store: &'s EventStore<B>, schedule_ahead_days: u32) -> Self {
        Self {
            store,
            schedule_ahead_days,
        }
    }

    /// Create the missing occurrences of `rule` between local midnight of
    /// `start` and the rule's horizon.
    ///
    /// A failed write is logged and counted, and the walk continues; the
    /// next run retries it.
    ///
    /// # Errors
    ///
    /// The first range-query failure, which ends the walk for this rule.
    pub fn schedule_recurring_event(
        &self,
        start: DateTime<Tz>,
        rule: &RecurrenceRule,
    ) -> Result<ScheduleReport, StoreError> {
        match rule.kind {
            RecurrenceKind::Weekday => self.schedule_weekday(start, rule),
        }
    }

    fn schedule_weekday(
        &self,
        start: DateTime<Tz>,
        rule: &RecurrenceRule,
    ) -> Result<ScheduleReport, StoreError> {
        let location = self.store.location();
        let today = start.with_timezone(&location).date_naive();
        let ahead = rule.schedule_ahead_days.unwrap_or(self.schedule_ahead_days);
        let duration = rule.duration();
        let mut report = ScheduleReport::default();

        let Some(horizon_end) = today
            .checked_add_days(Days::new(u64::from(ahead)))
            .map(|day| local_midnight(day, location))
        else {
            return Ok(report);
        };

        let offset = (rule.weekday.num_days_from_monday() + 7
            - today.weekday().num_days_from_monday())
            % 7;
        let mut date = today.checked_add_days(Days::new(u64::from(offset)));
        debug!(
            title = %rule.title,
            weekday = %rule.weekday,
            horizon_end = %horizon_end,
            "scheduling weekday rule"
        );

        while let Some(day) = date {
            let candidate = local_time_on(day, rule.start_hour, rule.start_minute, location);
            if candidate >= horizon_end {
                break;
            }

            let gen_id = generator_id(&candidate, duration, &rule.title, &rule.description);
            let query = RangeQuery::starting_at(candidate)
                .until(candidate + duration)
                .quorum(true);
            // Every overlapping row, not just the first page: other shifts in
            // the slot must not hide this rule's occurrence.
            let events = self.store.fetch_range_all(&query).inspect_err(|err| {
                warn!(
                    title = %rule.title,
                    from = %candidate,
                    to = %(candidate + duration),
                    error = %err,
                    "cannot fetch existing occurrences"
                );
            })?;

            if events
                .iter()
                .any(|event| event.generator_id.as_deref() == Some(gen_id.as_slice()))
            {
                report.existing += 1;
            } else {
                let mut event = Event::create(
                    NewEvent {
                        title: rule.title.clone(),
                        description: rule.description.clone(),
                        owner: String::new(),
                        start: candidate,
                        duration,
                        reference: rule.reference_url(),
                        required: rule.required,
                    },
                    location,
                );
                event.generator_id = Some(gen_id);

                match self.store.sync(&mut event) {
                    Ok(()) => {
                        info!(title = %rule.title, start = %candidate, id = %event.id, "occurrence created");
                        report.created += 1;
                    }
                    Err(err) => {
                        warn!(
                            title = %rule.title,
                            start = %candidate,
                            error = %err,
                            "cannot create occurrence"
                        );
                        report.failed += 1;
                    }
                }
            }

            date = day.checked_add_days(Days::new(7));
        }

        Ok(report)
    }

    /// Schedule every rule, in order, while holding the scheduler lock.
    ///
    /// A rule whose range query fails does not stop the remaining rules;
    /// the first such failure is returned once all rules were attempted.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::Lock`] if the lock stays held past `timeout`,
    /// [`ScheduleError::Store`] for the first aborted rule.
    pub fn schedule_all_exclusive(
        &self,
        lock_path: &Path,
        timeout: StdDuration,
        rules: &[RecurrenceRule],
        start: DateTime<Tz>,
    ) -> Result<Vec<ScheduleReport>, ScheduleError> {
        let lock = SchedulerLock::acquire(lock_path, timeout)?;

        let mut reports = Vec::with_capacity(rules.len());
        let mut first_failure = None;
        for rule in rules {
            match self.schedule_recurring_event(start, rule) {
                Ok(report) => {
                    info!(
                        title = %rule.title,
                        created = report.created,
                        existing = report.existing,
                        failed = report.failed,
                        "rule scheduled"
                    );
                    reports.push(report);
                }
                Err(source) => {
                    error!(title = %rule.title, error = %source, "rule aborted");
                    reports.push(ScheduleReport::default());
                    if first_failure.is_none() {
                        first_failure = Some(ScheduleError::Store {
                            rule: rule.title.clone(),
                            source,
                        });
                    }
                }
            }
        }

        lock.release();
        first_failure.map_or(Ok(reports), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedBackend;
    use chrono::{TimeZone, Timelike, Weekday};
    use chrono_tz::Europe::Zurich;

    fn standup_rule() -> RecurrenceRule {
        RecurrenceRule {
            kind: RecurrenceKind::Weekday,
            weekday: Weekday::Mon,
            start_hour: 9,
            start_minute: 0,
            duration_hours: 0,
            duration_minutes: 30,
            title: "Standup".into(),
            description: "daily sync".into(),
            required: true,
            reference: None,
            schedule_ahead_days: None,
        }
    }

    fn day(tz: Tz, y: i32, m: u32, d: u32) -> DateTime<Tz> {
        tz.with_ymd_and_hms(y, m, d, 0, 0, 0)
            .single()
            .expect("valid date")
    }

    fn store(tz: Tz) -> EventStore<ScriptedBackend> {
        EventStore::new(ScriptedBackend::new(), "events", tz)
    }

    fn all_events(store: &EventStore<ScriptedBackend>, from: DateTime<Tz>, weeks: i64) -> Vec<Event> {
        let mut events = Vec::new();
        for week in 0..weeks {
            let query = RangeQuery::starting_at(from + Duration::weeks(week)).limit(100);
            events.extend(store.fetch_range(&query).expect("range"));
        }
        events.sort_by_key(|e| e.start);
        events
    }

    fn read_varint(bytes: &[u8]) -> (u64, usize) {
        let mut value = 0_u64;
        for (i, byte) in bytes.iter().enumerate() {
            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return (value, i + 1);
            }
        }
        panic!("unterminated varint");
    }

    #[test]
    fn generator_id_uses_protobuf_wire_layout() {
        let start = day(Tz::UTC, 2024, 1, 8) + Duration::hours(9);
        let id = generator_id(&start, Duration::minutes(30), "Standup", "daily sync");

        assert_eq!(id[0], TAG_START);
        let (unix, used) = read_varint(&id[1..]);
        assert_eq!(unix, 1_704_704_400);

        let rest = &id[1 + used..];
        assert_eq!(rest[0], TAG_DURATION);
        let (secs, used) = read_varint(&rest[1..]);
        assert_eq!(secs, 1800);

        let rest = &rest[1 + used..];
        assert_eq!(rest[..2], [TAG_CONTENT_HASH, 32]);
        let expected: Vec<u8> = Sha256::digest(b"Standupdaily sync").to_vec();
        assert_eq!(rest[2..], expected[..]);
    }

    #[test]
    fn generator_id_tracks_slot_and_content() {
        let start = day(Tz::UTC, 2024, 1, 8) + Duration::hours(9);
        let base = generator_id(&start, Duration::minutes(30), "Standup", "daily sync");

        assert_eq!(base, generator_id(&start, Duration::minutes(30), "Standup", "daily sync"));
        assert_ne!(base, generator_id(&(start + Duration::weeks(1)), Duration::minutes(30), "Standup", "daily sync"));
        assert_ne!(base, generator_id(&start, Duration::minutes(45), "Standup", "daily sync"));
        assert_ne!(base, generator_id(&start, Duration::minutes(30), "Standup", "weekly sync"));
    }

    #[test]
    fn negative_values_encode_as_ten_byte_varints() {
        let mut out = Vec::new();
        put_varint(&mut out, u64::from_ne_bytes((-1_i64).to_ne_bytes()));
        assert_eq!(out.len(), 10);
        assert_eq!(out[9], 0x01);
    }

    #[test]
    fn two_week_horizon_creates_two_mondays() {
        let store = store(Tz::UTC);
        let scheduler = Scheduler::new(&store, 14);
        let start = day(Tz::UTC, 2024, 1, 1);

        let report = scheduler
            .schedule_recurring_event(start, &standup_rule())
            .expect("schedule");
        assert_eq!(report, ScheduleReport { created: 2, existing: 0, failed: 0 });

        let events = all_events(&store, start, 3);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].start - events[0].start, Duration::days(7));
        assert_eq!(events[0].start, start + Duration::hours(9));
        for event in &events {
            assert!(event.is_unassigned());
            assert!(event.required);
            assert_eq!(event.duration, Duration::minutes(30));
            assert_eq!(
                event.generator_id.as_deref(),
                Some(generator_id(&event.start, event.duration, "Standup", "daily sync").as_slice())
            );
        }
    }

    #[test]
    fn rerun_is_idempotent() {
        let store = store(Tz::UTC);
        let scheduler = Scheduler::new(&store, 14);
        let start = day(Tz::UTC, 2024, 1, 1);

        scheduler.schedule_recurring_event(start, &standup_rule()).expect("first run");
        let rows = store.backend().inner().row_count("events").expect("count");

        let again = scheduler
            .schedule_recurring_event(start + Duration::hours(13), &standup_rule())
            .expect("second run");
        assert_eq!(again, ScheduleReport { created: 0, existing: 2, failed: 0 });
        assert_eq!(store.backend().inner().row_count("events").expect("count"), rows);
    }

    #[test]
    fn first_candidate_is_next_matching_weekday() {
        let store = store(Tz::UTC);
        let scheduler = Scheduler::new(&store, 7);
        let tuesday = day(Tz::UTC, 2024, 1, 2);

        let report = scheduler.schedule_recurring_event(tuesday, &standup_rule()).expect("schedule");
        assert_eq!(report.created, 1);
        let events = all_events(&store, day(Tz::UTC, 2024, 1, 8), 1);
        assert_eq!(events[0].start, day(Tz::UTC, 2024, 1, 8) + Duration::hours(9));
    }

    #[test]
    fn rule_horizon_overrides_default() {
        let store = store(Tz::UTC);
        let scheduler = Scheduler::new(&store, 14);
        let rule = RecurrenceRule {
            schedule_ahead_days: Some(28),
            ..standup_rule()
        };
        let report = scheduler
            .schedule_recurring_event(day(Tz::UTC, 2024, 1, 1), &rule)
            .expect("schedule");
        assert_eq!(report.created, 4);
    }

    #[test]
    fn occurrences_keep_local_wall_clock_across_dst() {
        let store = store(Zurich);
        let scheduler = Scheduler::new(&store, 14);
        let start = day(Zurich, 2024, 3, 25);

        scheduler.schedule_recurring_event(start, &standup_rule()).expect("schedule");
        let events = all_events(&store, start, 2);
        assert_eq!(events.len(), 2);
        for event in &events {
            assert_eq!(event.start.hour(), 9);
            assert_eq!(event.start.weekday(), Weekday::Mon);
        }
        assert_eq!(events[1].start - events[0].start, Duration::days(7) - Duration::hours(1));
    }

    #[test]
    fn failed_write_is_counted_and_walk_continues() {
        let store = store(Tz::UTC);
        store.backend().fail_batch(0);
        let scheduler = Scheduler::new(&store, 14);
        let start = day(Tz::UTC, 2024, 1, 1);

        let report = scheduler.schedule_recurring_event(start, &standup_rule()).expect("schedule");
        assert_eq!(report, ScheduleReport { created: 1, existing: 0, failed: 1 });

        let retry = scheduler.schedule_recurring_event(start, &standup_rule()).expect("retry");
        assert_eq!(retry, ScheduleReport { created: 1, existing: 1, failed: 0 });
        assert_eq!(retry.occurrences(), 2);
    }

    #[test]
    fn fetch_failure_aborts_rule_without_writes() {
        let store = store(Tz::UTC);
        store.backend().fail_index_reads(StoreError::Timeout("slow".into()));
        let scheduler = Scheduler::new(&store, 14);

        let err = scheduler
            .schedule_recurring_event(day(Tz::UTC, 2024, 1, 1), &standup_rule())
            .expect_err("fetch failure");
        assert_eq!(err, StoreError::Timeout("slow".into()));
        assert_eq!(store.backend().batches.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn exclusive_run_reports_each_rule() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = store(Tz::UTC);
        let scheduler = Scheduler::new(&store, 14);
        let rules = [
            standup_rule(),
            RecurrenceRule {
                weekday: Weekday::Fri,
                title: "Retro".into(),
                ..standup_rule()
            },
        ];

        let reports = scheduler
            .schedule_all_exclusive(
                &dir.path().join("dutygen.lock"),
                StdDuration::from_millis(50),
                &rules,
                day(Tz::UTC, 2024, 1, 1),
            )
            .expect("scheduled");
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.created == 2));
    }

    #[test]
    fn exclusive_run_fails_while_lock_is_held() {
        let dir = tempfile::tempdir().expect("temp dir");
        let lock_path = dir.path().join("dutygen.lock");
        let _held = SchedulerLock::acquire(&lock_path, StdDuration::from_millis(50)).expect("lock");

        let store = store(Tz::UTC);
        let err = Scheduler::new(&store, 14)
            .schedule_all_exclusive(
                &lock_path,
                StdDuration::from_millis(20),
                &[standup_rule()],
                day(Tz::UTC, 2024, 1, 1),
            )
            .expect_err("lock held");
        assert!(matches!(err, ScheduleError::Lock(LockError::Timeout { .. })));
        assert_eq!(err.code(), "E5001");
        assert_eq!(store.backend().calls(), 0);
    }

    #[test]
    fn exclusive_run_surfaces_aborted_rule() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = store(Tz::UTC);
        store.backend().fail_index_reads(StoreError::Unavailable("down".into()));

        let err = Scheduler::new(&store, 14)
            .schedule_all_exclusive(
                &dir.path().join("dutygen.lock"),
                StdDuration::from_millis(50),
                &[standup_rule()],
                day(Tz::UTC, 2024, 1, 1),
            )
            .expect_err("aborted");
        assert!(matches!(err, ScheduleError::Store { ref rule, .. } if rule == "Standup"));
        assert_eq!(err.code(), "E2001");
    }
}
