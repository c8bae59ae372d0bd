//! `SQLite` layout emulating a wide-column keyspace.
//!
//! - `cells` holds one live value per (keyspace, column family, row, column)
//!   together with its microsecond write timestamp
//! - `tombstones` remembers the newest deletion per column so that writes
//!   older than a delete stay suppressed, as in a last-write-wins store
//! - `store_meta` tracks the schema version

/// Migration v1: cell and tombstone tables plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS cells (
    keyspace TEXT NOT NULL,
    column_family TEXT NOT NULL,
    row_key TEXT NOT NULL CHECK (length(row_key) > 0),
    name TEXT NOT NULL CHECK (length(name) > 0),
    value BLOB NOT NULL,
    write_ts INTEGER NOT NULL,
    PRIMARY KEY (keyspace, column_family, row_key, name)
);

CREATE TABLE IF NOT EXISTS tombstones (
    keyspace TEXT NOT NULL,
    column_family TEXT NOT NULL,
    row_key TEXT NOT NULL,
    name TEXT NOT NULL,
    deleted_at_us INTEGER NOT NULL,
    PRIMARY KEY (keyspace, column_family, row_key, name)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: secondary index over column values.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_cells_name_value
    ON cells(keyspace, column_family, name, value, row_key);

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
";

/// Indexes expected by the index-clause query path.
pub const REQUIRED_INDEXES: &[&str] = &["idx_cells_name_value"];

/// Keep a write unless a newer tombstone covers it; on conflict the larger
/// timestamp wins and equal timestamps fall back to the larger value.
pub const UPSERT_CELL_SQL: &str = r"
INSERT INTO cells (keyspace, column_family, row_key, name, value, write_ts)
SELECT ?1, ?2, ?3, ?4, ?5, ?6
WHERE NOT EXISTS (
    SELECT 1 FROM tombstones t
    WHERE t.keyspace = ?1
      AND t.column_family = ?2
      AND t.row_key = ?3
      AND t.name = ?4
      AND t.deleted_at_us >= ?6
)
ON CONFLICT (keyspace, column_family, row_key, name) DO UPDATE SET
    value = excluded.value,
    write_ts = excluded.write_ts
WHERE excluded.write_ts > cells.write_ts
   OR (excluded.write_ts = cells.write_ts AND excluded.value > cells.value)
";

pub const UPSERT_TOMBSTONE_SQL: &str = r"
INSERT INTO tombstones (keyspace, column_family, row_key, name, deleted_at_us)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT (keyspace, column_family, row_key, name) DO UPDATE SET
    deleted_at_us = max(tombstones.deleted_at_us, excluded.deleted_at_us)
";

pub const DELETE_COVERED_CELL_SQL: &str = r"
DELETE FROM cells
WHERE keyspace = ?1
  AND column_family = ?2
  AND row_key = ?3
  AND name = ?4
  AND write_ts <= ?5
";

pub const SELECT_ROW_SQL: &str = r"
SELECT name, value, write_ts
FROM cells
WHERE keyspace = ?1 AND column_family = ?2 AND row_key = ?3
ORDER BY name
";
