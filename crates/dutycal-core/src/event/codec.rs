//! Column codec for events.
//!
//! Encoding produces one batch of mutations sharing a single write
//! timestamp. Every field is rewritten on each sync, including the
//! write-only `week` index recomputed from the current start. Unset optional
//! fields are never written as empty values; they are tombstoned instead, so
//! clearing a reference or generator id through a sync sticks.
//!
//! Decoding is tolerant where the data model allows it (unknown columns,
//! unparsable reference URLs, missing bounds) and strict where a value
//! cannot be interpreted at all (wrong integer width, invalid UTF-8).

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use url::Url;

use super::Event;
use super::schema::{
    DESCRIPTION, END, GENERATOR_ID, OWNER, REFERENCE, REQUIRED, START, TITLE, WEEK,
};
use crate::backend::{Column, Mutation};
use crate::error::StoreError;

/// Encode an instant as big-endian milliseconds since Unix epoch.
#[must_use]
pub fn encode_millis<Z: chrono::TimeZone>(ts: &DateTime<Z>) -> Vec<u8> {
    ts.timestamp_millis().to_be_bytes().to_vec()
}

/// Encode a week bucket as a big-endian 64-bit integer.
#[must_use]
pub fn encode_week(week: i64) -> Vec<u8> {
    week.to_be_bytes().to_vec()
}

/// Build the mutation batch writing `event` at `timestamp`.
#[must_use]
pub fn encode(event: &Event, timestamp: i64) -> Vec<Mutation> {
    let mut mutations = vec![
        insert(TITLE, event.title.as_bytes(), timestamp),
        insert(DESCRIPTION, event.description.as_bytes(), timestamp),
        insert(OWNER, event.owner.as_bytes(), timestamp),
        insert(START, encode_millis(&event.start), timestamp),
        insert(END, encode_millis(&event.end()), timestamp),
        insert(REQUIRED, [u8::from(event.required)], timestamp),
        insert(WEEK, encode_week(event.week()), timestamp),
    ];

    let mut cleared = Vec::new();
    match &event.reference {
        Some(url) => mutations.push(insert(REFERENCE, url.as_str().as_bytes(), timestamp)),
        None => cleared.push(REFERENCE.to_string()),
    }
    match event.generator_id.as_deref() {
        Some(id) if !id.is_empty() => mutations.push(insert(GENERATOR_ID, id, timestamp)),
        _ => cleared.push(GENERATOR_ID.to_string()),
    }

    if !cleared.is_empty() {
        mutations.push(Mutation::Delete {
            columns: cleared,
            timestamp,
        });
    }
    mutations
}

fn insert(name: &str, value: impl Into<Vec<u8>>, timestamp: i64) -> Mutation {
    Mutation::Insert(Column::new(name, value, timestamp))
}

/// Rebuild the event stored under `key` from its columns.
///
/// # Errors
///
/// Returns [`StoreError::Decode`] when a text column is not UTF-8 or a time
/// column is not exactly eight bytes.
pub fn decode(key: &str, columns: &[Column], location: Tz) -> Result<Event, StoreError> {
    let mut event = Event::blank(key, location);
    let mut start_ms = 0_i64;
    let mut end_ms = 0_i64;
    let mut last_write_ts = 0_i64;

    for column in columns {
        last_write_ts = last_write_ts.max(column.timestamp);

        match column.name.as_str() {
            TITLE => event.title = decode_text(key, column)?,
            DESCRIPTION => event.description = decode_text(key, column)?,
            OWNER => event.owner = decode_text(key, column)?,
            START => start_ms = decode_i64(key, column)?,
            END => end_ms = decode_i64(key, column)?,
            REQUIRED => event.required = column.value.first().is_some_and(|b| *b > 0),
            // Unparsable references are dropped rather than failing the row.
            REFERENCE => {
                event.reference = std::str::from_utf8(&column.value)
                    .ok()
                    .and_then(|raw| Url::parse(raw).ok());
            }
            GENERATOR_ID => {
                event.generator_id = (!column.value.is_empty()).then(|| column.value.clone());
            }
            _ => {}
        }
    }

    let start = decode_instant(key, START, start_ms, location)?;
    let end = decode_instant(key, END, end_ms, location)?;
    if start > end {
        event.start = end;
        event.duration = start - end;
    } else {
        event.start = start;
        event.duration = end - start;
    }
    event.mark_written(last_write_ts);

    Ok(event)
}

fn decode_error(key: &str, column: &str, reason: impl Into<String>) -> StoreError {
    StoreError::Decode {
        key: key.to_string(),
        column: column.to_string(),
        reason: reason.into(),
    }
}

fn decode_text(key: &str, column: &Column) -> Result<String, StoreError> {
    String::from_utf8(column.value.clone())
        .map_err(|e| decode_error(key, &column.name, format!("invalid utf-8: {e}")))
}

fn decode_i64(key: &str, column: &Column) -> Result<i64, StoreError> {
    let bytes: [u8; 8] = column.value.as_slice().try_into().map_err(|_| {
        decode_error(
            key,
            &column.name,
            format!("expected 8 bytes, found {}", column.value.len()),
        )
    })?;
    Ok(i64::from_be_bytes(bytes))
}

fn decode_instant(key: &str, column: &str, millis: i64, location: Tz) -> Result<DateTime<Tz>, StoreError> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|utc| utc.with_timezone(&location))
        .ok_or_else(|| decode_error(key, column, format!("timestamp {millis} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NewEvent;
    use crate::event::schema::ALL_COLUMNS;
    use chrono::{Duration, TimeZone};
    use chrono_tz::Europe::Zurich;

    const TS: i64 = 1_704_000_000_000_000;

    fn rota_event() -> Event {
        let start = Zurich
            .with_ymd_and_hms(2024, 1, 9, 18, 0, 0)
            .single()
            .expect("valid time");
        let mut event = Event::create(
            NewEvent {
                title: "Open lab".into(),
                description: "Keys at the front desk".into(),
                owner: "carol".into(),
                start,
                duration: Duration::hours(3),
                reference: Some(Url::parse("https://wiki.example.org/open-lab").expect("url")),
                required: true,
            },
            Zurich,
        );
        event.id = "open-lab".into();
        event.generator_id = Some(vec![8, 1, 16, 2]);
        event
    }

    /// What a backend would hand back after applying the batch.
    fn stored_columns(mutations: &[Mutation]) -> Vec<Column> {
        mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::Insert(col) => Some(col.clone()),
                Mutation::Delete { .. } => None,
            })
            .collect()
    }

    #[test]
    fn encode_writes_every_schema_column_once() {
        let mutations = encode(&rota_event(), TS);
        let mut names: Vec<_> = stored_columns(&mutations)
            .into_iter()
            .map(|c| {
                assert_eq!(c.timestamp, TS);
                c.name
            })
            .collect();
        names.sort();
        let mut expected: Vec<_> = ALL_COLUMNS.iter().map(ToString::to_string).collect();
        expected.sort();
        assert_eq!(names, expected);
        assert!(!mutations.iter().any(|m| matches!(m, Mutation::Delete { .. })));
    }

    #[test]
    fn encode_tombstones_unset_optionals() {
        let mut event = rota_event();
        event.reference = None;
        event.generator_id = Some(Vec::new());

        let mutations = encode(&event, TS);
        let names: Vec<_> = stored_columns(&mutations).into_iter().map(|c| c.name).collect();
        assert!(!names.iter().any(|n| n == REFERENCE || n == GENERATOR_ID));
        assert!(mutations.contains(&Mutation::Delete {
            columns: vec![REFERENCE.to_string(), GENERATOR_ID.to_string()],
            timestamp: TS,
        }));
    }

    #[test]
    fn encode_writes_week_from_current_start() {
        let mut event = rota_event();
        event.start += Duration::days(7);
        let week = stored_columns(&encode(&event, TS))
            .into_iter()
            .find(|c| c.name == WEEK)
            .expect("week column");
        assert_eq!(week.value, encode_week(rota_event().week() + 1));
    }

    #[test]
    fn decode_restores_encoded_fields() {
        let event = rota_event();
        let decoded =
            decode("open-lab", &stored_columns(&encode(&event, TS)), Zurich).expect("decode");

        assert_eq!(decoded.title, event.title);
        assert_eq!(decoded.description, event.description);
        assert_eq!(decoded.owner, event.owner);
        assert_eq!(decoded.start, event.start);
        assert_eq!(decoded.duration, event.duration);
        assert_eq!(decoded.required, event.required);
        assert_eq!(decoded.reference, event.reference);
        assert_eq!(decoded.generator_id, event.generator_id);
        assert_eq!(decoded.last_write_ts(), TS);
    }

    #[test]
    fn decode_swaps_inverted_bounds() {
        let start = Tz::UTC.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).single().expect("time");
        let columns = vec![
            Column::new(TITLE, "Standup", 7),
            Column::new(START, encode_millis(&start), 7),
        ];
        let event = decode("k", &columns, Tz::UTC).expect("decode");
        assert_eq!(event.start.timestamp(), 0);
        assert_eq!(event.end(), start);
        assert!(event.duration >= Duration::zero());
    }

    #[test]
    fn decode_drops_unparsable_reference() {
        let columns = vec![
            Column::new(TITLE, "Standup", 1),
            Column::new(REFERENCE, "not a url", 1),
        ];
        let event = decode("k", &columns, Tz::UTC).expect("lossy read");
        assert_eq!(event.reference, None);
    }

    #[test]
    fn decode_ignores_week_and_unknown_columns() {
        let columns = vec![
            Column::new(WEEK, vec![1, 2, 3], 1),
            Column::new("location", "hall", 1),
            Column::new(REQUIRED, vec![0], 1),
        ];
        let event = decode("k", &columns, Tz::UTC).expect("decode");
        assert!(!event.required);
    }

    #[test]
    fn decode_rejects_short_timestamp() {
        let columns = vec![Column::new(START, vec![0, 1, 2], 1)];
        let err = decode("k", &columns, Tz::UTC).expect_err("short start");
        assert!(matches!(err, StoreError::Decode { ref column, .. } if column == START));
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        let columns = vec![Column::new(OWNER, vec![0xff, 0xfe], 1)];
        assert!(matches!(
            decode("k", &columns, Tz::UTC),
            Err(StoreError::Decode { .. })
        ));
    }

    #[test]
    fn decode_takes_newest_column_timestamp() {
        let columns = vec![
            Column::new(TITLE, "Standup", 5),
            Column::new(OWNER, "alice", 9),
            Column::new(DESCRIPTION, "sync", 3),
        ];
        let event = decode("k", &columns, Tz::UTC).expect("decode");
        assert_eq!(event.last_write_ts(), 9);
    }
}
