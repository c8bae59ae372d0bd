//! `SQLite` rendition of the wide-column backend.
//!
//! A file-backed store runs in WAL mode with `synchronous = NORMAL`, so the
//! CLI can read while a generator run writes. Writers wait up to
//! [`BUSY_WAIT`] for each other before `SQLite` reports the file as busy.

pub mod columns;
pub mod migrations;
pub mod schema;

pub use columns::SqliteBackend;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// How long a connection waits on another writer's lock.
pub const BUSY_WAIT: Duration = Duration::from_secs(5);

/// Open the store file at `path`, creating it and its directory when
/// missing, and upgrade its layout.
///
/// # Errors
///
/// Fails when the directory or file cannot be created, or when a pragma or
/// migration step is rejected.
pub fn open_column_store(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating event store directory {}", dir.display()))?;
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("opening event store {}", path.display()))?;
    tune(&conn).with_context(|| format!("setting pragmas on {}", path.display()))?;
    migrations::migrate(&mut conn).context("upgrading event store layout")?;
    tracing::debug!(path = %path.display(), "column store ready");
    Ok(conn)
}

/// Fresh private store used by tests and benches.
///
/// # Errors
///
/// Fails only if the layout cannot be created.
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("opening in-memory event store")?;
    migrations::migrate(&mut conn).context("upgrading event store layout")?;
    Ok(conn)
}

fn tune(conn: &Connection) -> rusqlite::Result<()> {
    // `journal_mode` answers with the mode in effect, so it needs a query.
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(%mode, "WAL unavailable, readers will block on writes");
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(BUSY_WAIT)
}
