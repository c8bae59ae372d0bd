//! Duty events: the unit of persistence.
//!
//! An [`Event`] lives in memory until [`crate::store::EventStore::sync`]
//! writes it. Its row key is either supplied by the caller or derived from
//! the title, start and duration (see [`derive_id`]), so manually created
//! duplicates of the same slot collapse onto one row.

pub mod codec;
pub mod schema;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use chrono_tz::Tz;
use sha2::{Digest, Sha224};
use std::fmt::Write as _;
use url::Url;

use crate::error::StoreError;
use crate::week::week_of;

/// Caller-provided fields for a new, unsynced event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    /// Empty for an unassigned shift.
    pub owner: String,
    pub start: DateTime<Tz>,
    pub duration: Duration,
    pub reference: Option<Url>,
    pub required: bool,
}

/// A calendar entry, possibly persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Row key. Empty until assigned by the caller or by the first sync.
    pub id: String,
    pub title: String,
    pub description: String,
    /// Empty means unassigned.
    pub owner: String,
    pub start: DateTime<Tz>,
    pub duration: Duration,
    pub required: bool,
    pub reference: Option<Url>,
    /// Fingerprint of the recurrence rule slot that produced this event.
    pub generator_id: Option<Vec<u8>>,
    last_write_ts: i64,
}

impl Event {
    /// Build an unsynced event with its start normalized into `location`.
    ///
    /// Start and duration are cut to whole milliseconds, the precision the
    /// store keeps, so a fetched copy compares equal to the one written.
    #[must_use]
    pub fn create(new: NewEvent, location: Tz) -> Self {
        Self {
            id: String::new(),
            title: new.title,
            description: new.description,
            owner: new.owner,
            start: new.start.with_timezone(&location).trunc_subsecs(3),
            duration: Duration::milliseconds(new.duration.num_milliseconds()),
            required: new.required,
            reference: new.reference,
            generator_id: None,
            last_write_ts: 0,
        }
    }

    /// Empty event for row `id`, filled in by the decoder.
    pub(crate) fn blank(id: &str, location: Tz) -> Self {
        Self {
            id: id.to_string(),
            title: String::new(),
            description: String::new(),
            owner: String::new(),
            start: DateTime::<Utc>::default().with_timezone(&location),
            duration: Duration::zero(),
            required: false,
            reference: None,
            generator_id: None,
            last_write_ts: 0,
        }
    }

    #[must_use]
    pub fn end(&self) -> DateTime<Tz> {
        self.start + self.duration
    }

    /// Week bucket the event is indexed under.
    #[must_use]
    pub fn week(&self) -> i64 {
        week_of(&self.start)
    }

    /// Microsecond timestamp of the last successful write, zero if never
    /// written.
    #[must_use]
    pub const fn last_write_ts(&self) -> i64 {
        self.last_write_ts
    }

    #[must_use]
    pub const fn is_synced(&self) -> bool {
        self.last_write_ts != 0
    }

    #[must_use]
    pub fn is_unassigned(&self) -> bool {
        self.owner.is_empty()
    }

    /// Required shift that nobody has taken yet.
    #[must_use]
    pub fn is_uncovered(&self) -> bool {
        self.required && self.is_unassigned()
    }

    pub(crate) fn mark_written(&mut self, ts: i64) {
        self.last_write_ts = ts;
    }

    /// Check the fields a persistable event must carry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInput`] for an empty title or
    /// description, or a negative duration.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.title.is_empty() {
            return Err(StoreError::InvalidInput("event title is empty".into()));
        }
        if self.description.is_empty() {
            return Err(StoreError::InvalidInput(
                "event description is empty".into(),
            ));
        }
        if self.duration < Duration::zero() {
            return Err(StoreError::InvalidInput(format!(
                "event duration {} is negative",
                format_duration(self.duration)
            )));
        }
        Ok(())
    }
}

/// Derive a row key from title, start and duration.
///
/// Returns `None` when the title is empty. The key embeds the week bucket,
/// the start second, the duration and a SHA-224 of the title, so it is
/// stable for the same slot and changes when any of the three change.
#[must_use]
pub fn derive_id(event: &Event) -> Option<String> {
    if event.title.is_empty() {
        return None;
    }
    let title_hash = Sha224::digest(event.title.as_bytes());
    Some(format!(
        "{:08X}:{:016X}:{}.{:x}",
        event.week(),
        event.start.timestamp(),
        format_duration(event.duration),
        title_hash
    ))
}

/// Format a duration as hours, minutes and seconds, e.g. `1h30m0s`, `30m0s`
/// or `45s`. Sub-second precision is dropped.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds();
    if total == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    if total < 0 {
        out.push('-');
    }
    let abs = total.unsigned_abs();
    let (hours, minutes, seconds) = (abs / 3600, abs % 3600 / 60, abs % 60);
    if hours > 0 {
        let _ = write!(out, "{hours}h{minutes}m");
    } else if minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    let _ = write!(out, "{seconds}s");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Zurich;

    fn standup() -> Event {
        let start = Tz::UTC
            .with_ymd_and_hms(2024, 1, 8, 9, 0, 0)
            .single()
            .expect("valid time");
        Event::create(
            NewEvent {
                title: "Standup".into(),
                description: "daily sync".into(),
                owner: String::new(),
                start,
                duration: Duration::minutes(30),
                reference: None,
                required: true,
            },
            Tz::UTC,
        )
    }

    #[test]
    fn create_normalizes_start_into_location() {
        let mut new = NewEvent {
            title: "Night shift".into(),
            description: "door".into(),
            owner: "bob".into(),
            start: Tz::UTC
                .with_ymd_and_hms(2024, 1, 8, 23, 30, 0)
                .single()
                .expect("valid time"),
            duration: Duration::hours(8),
            reference: None,
            required: false,
        };
        let event = Event::create(new.clone(), Zurich);
        assert_eq!(event.start.timezone(), Zurich);
        assert_eq!(event.start, new.start);
        assert!(!event.is_synced());

        new.start = event.start;
        assert_eq!(Event::create(new, Zurich).week(), event.week());
    }

    #[test]
    fn create_drops_sub_millisecond_precision() {
        let mut new_event = NewEvent {
            title: "Standup".into(),
            description: "daily sync".into(),
            owner: String::new(),
            start: standup().start + Duration::nanoseconds(123_456_789),
            duration: Duration::minutes(30) + Duration::microseconds(2_500),
            reference: None,
            required: true,
        };
        let event = Event::create(new_event.clone(), Tz::UTC);
        assert_eq!(event.start, standup().start + Duration::milliseconds(123));
        assert_eq!(event.duration, Duration::minutes(30) + Duration::milliseconds(2));

        new_event.start = event.start;
        assert_eq!(Event::create(new_event, Tz::UTC).start, event.start);
    }

    #[test]
    fn derive_id_has_expected_shape() {
        let id = derive_id(&standup()).expect("title present");
        let parts: Vec<&str> = id.splitn(3, ':').collect();
        assert_eq!(parts[0], format!("{:08X}", 2819));
        assert_eq!(parts[1], format!("{:016X}", 1_704_704_400_i64));
        let (duration, hash) = parts[2].split_once('.').expect("hash separator");
        assert_eq!(duration, "30m0s");
        assert_eq!(hash.len(), 56);
    }

    #[test]
    fn derive_id_is_deterministic() {
        assert_eq!(derive_id(&standup()), derive_id(&standup()));
    }

    #[test]
    fn derive_id_changes_with_each_input() {
        let base = derive_id(&standup());

        let mut retitled = standup();
        retitled.title = "Retro".into();
        assert_ne!(derive_id(&retitled), base);

        let mut moved = standup();
        moved.start += Duration::minutes(15);
        assert_ne!(derive_id(&moved), base);

        let mut longer = standup();
        longer.duration = Duration::minutes(45);
        assert_ne!(derive_id(&longer), base);

        let mut reassigned = standup();
        reassigned.owner = "alice".into();
        reassigned.description = "changed".into();
        assert_eq!(derive_id(&reassigned), base);
    }

    #[test]
    fn derive_id_requires_title() {
        let mut event = standup();
        event.title.clear();
        assert_eq!(derive_id(&event), None);
    }

    #[test]
    fn durations_format_like_clock_spans() {
        assert_eq!(format_duration(Duration::zero()), "0s");
        assert_eq!(format_duration(Duration::seconds(45)), "45s");
        assert_eq!(format_duration(Duration::minutes(30)), "30m0s");
        assert_eq!(format_duration(Duration::minutes(90)), "1h30m0s");
        assert_eq!(format_duration(Duration::hours(8)), "8h0m0s");
        assert_eq!(format_duration(-Duration::minutes(5)), "-5m0s");
    }

    #[test]
    fn validate_rejects_incomplete_events() {
        assert!(standup().validate().is_ok());

        let mut untitled = standup();
        untitled.title.clear();
        assert!(matches!(untitled.validate(), Err(StoreError::InvalidInput(_))));

        let mut undescribed = standup();
        undescribed.description.clear();
        assert!(matches!(undescribed.validate(), Err(StoreError::InvalidInput(_))));

        let mut negative = standup();
        negative.duration = -Duration::minutes(1);
        assert!(matches!(negative.validate(), Err(StoreError::InvalidInput(_))));
    }
}
