//! Versioned DDL for the column store, tracked in `PRAGMA user_version`.

use super::schema;
use rusqlite::{Connection, Transaction, types::Type};

/// Newest layout this build can write.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

/// Ordered steps; each brings the file from `version - 1` to `version`.
const STEPS: [(u32, &str); 2] = [(1, schema::MIGRATION_V1_SQL), (2, schema::MIGRATION_V2_SQL)];

/// Layout version recorded in the open file; `0` for a fresh database.
///
/// # Errors
///
/// Fails when the pragma cannot be read or holds a negative value.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let raw: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(err)))
}

fn stamp(tx: &Transaction<'_>, version: u32) -> rusqlite::Result<()> {
    tx.pragma_update(None, "user_version", i64::from(version))?;
    tx.execute(
        "UPDATE store_meta SET schema_version = ?1 WHERE id = 1",
        [i64::from(version)],
    )?;
    Ok(())
}

/// Bring the database up to [`LATEST_SCHEMA_VERSION`] and return the
/// version it ends at. Every step commits on its own, so an interrupted
/// upgrade resumes where it stopped.
///
/// # Errors
///
/// Returns the first `SQLite` error hit while applying a step.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let start = current_schema_version(conn)?;
    let mut reached = start;

    for &(version, ddl) in STEPS.iter().filter(|(version, _)| *version > start) {
        let tx = conn.transaction()?;
        tx.execute_batch(ddl)?;
        stamp(&tx, version)?;
        tx.commit()?;
        tracing::debug!(from = reached, to = version, "column store upgraded");
        reached = version;
    }

    Ok(reached)
}
