//! [`ColumnBackend`] over a single `SQLite` connection.
//!
//! Cells follow last-write-wins by microsecond timestamp. A tombstone hides
//! every write to the same column at or before its timestamp, so a late,
//! older write cannot resurrect deleted data. Consistency levels are
//! accepted and ignored: there is exactly one replica.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, ErrorCode, params, params_from_iter, types::Value};
use tracing::{debug, instrument};

use super::schema::{
    DELETE_COVERED_CELL_SQL, SELECT_ROW_SQL, UPSERT_CELL_SQL, UPSERT_TOMBSTONE_SQL,
};
use crate::backend::{
    Column, ColumnBackend, ConsistencyLevel, IndexClause, IndexOperator, KeySlice, Mutation,
};
use crate::error::StoreError;

/// Column store backed by one `SQLite` database, scoped to a keyspace.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    keyspace: String,
}

impl SqliteBackend {
    /// Wrap an already migrated connection.
    pub fn new(conn: Connection, keyspace: impl Into<String>) -> Self {
        Self {
            conn: Mutex::new(conn),
            keyspace: keyspace.into(),
        }
    }

    /// Open the database file at `path`, creating and migrating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path, keyspace: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self::new(super::open_column_store(path)?, keyspace))
    }

    /// Fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory(keyspace: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self::new(super::open_in_memory()?, keyspace))
    }

    #[must_use]
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// Number of rows with at least one live column in `column_family`.
    ///
    /// # Errors
    ///
    /// Returns the mapped `SQLite` failure.
    pub fn row_count(&self, column_family: &str) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(DISTINCT row_key) FROM cells
                 WHERE keyspace = ?1 AND column_family = ?2",
                params![self.keyspace, column_family],
                |row| row.get(0),
            )
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| StoreError::Unavailable("column store connection poisoned".into()))?;
        f(&mut guard).map_err(map_sqlite_error)
    }
}

impl ColumnBackend for SqliteBackend {
    #[instrument(level = "trace", skip(self, columns))]
    fn get_slice(
        &self,
        column_family: &str,
        key: &str,
        columns: &[&str],
        consistency: ConsistencyLevel,
    ) -> Result<Vec<Column>, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidInput("row key is empty".into()));
        }
        self.with_conn(|conn| read_row(conn, &self.keyspace, column_family, key, columns))
    }

    #[instrument(level = "trace", skip(self, columns))]
    fn get_indexed_slices(
        &self,
        column_family: &str,
        clause: &IndexClause,
        columns: &[&str],
        consistency: ConsistencyLevel,
    ) -> Result<Vec<KeySlice>, StoreError> {
        let (sql, values) = index_query(&self.keyspace, column_family, clause)?;

        self.with_conn(|conn| {
            let keys = {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
                    row.get::<_, String>(0)
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };
            debug!(matched = keys.len(), "index clause evaluated");

            let mut slices = Vec::with_capacity(keys.len());
            for key in keys {
                let columns = read_row(conn, &self.keyspace, column_family, &key, columns)?;
                slices.push(KeySlice { key, columns });
            }
            Ok(slices)
        })
    }

    #[instrument(level = "trace", skip(self, mutations), fields(mutations = mutations.len()))]
    fn batch_mutate(
        &self,
        column_family: &str,
        key: &str,
        mutations: &[Mutation],
        consistency: ConsistencyLevel,
    ) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidInput("row key is empty".into()));
        }

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            for mutation in mutations {
                match mutation {
                    Mutation::Insert(column) => {
                        tx.execute(
                            UPSERT_CELL_SQL,
                            params![
                                self.keyspace,
                                column_family,
                                key,
                                column.name,
                                column.value,
                                column.timestamp
                            ],
                        )?;
                    }
                    Mutation::Delete { columns, timestamp } => {
                        for name in columns {
                            let args = params![self.keyspace, column_family, key, name, timestamp];
                            tx.execute(UPSERT_TOMBSTONE_SQL, args)?;
                            tx.execute(DELETE_COVERED_CELL_SQL, args)?;
                        }
                    }
                }
            }
            tx.commit()
        })
    }
}

fn read_row(
    conn: &Connection,
    keyspace: &str,
    column_family: &str,
    key: &str,
    columns: &[&str],
) -> rusqlite::Result<Vec<Column>> {
    let mut stmt = conn.prepare_cached(SELECT_ROW_SQL)?;
    let rows = stmt.query_map(params![keyspace, column_family, key], |row| {
        Ok(Column {
            name: row.get(0)?,
            value: row.get(1)?,
            timestamp: row.get(2)?,
        })
    })?;

    let mut out = Vec::new();
    for column in rows {
        let column = column?;
        if columns.contains(&column.name.as_str()) {
            out.push(column);
        }
    }
    Ok(out)
}

/// Translate an index clause into SQL. The first equality expression drives
/// the scan over the value index; every other expression becomes an
/// `EXISTS` filter on the same row.
fn index_query(
    keyspace: &str,
    column_family: &str,
    clause: &IndexClause,
) -> Result<(String, Vec<Value>), StoreError> {
    let Some(driver) = clause
        .expressions
        .iter()
        .position(|expr| expr.op == IndexOperator::Eq)
    else {
        return Err(StoreError::InvalidInput(
            "index clause needs at least one equality expression".into(),
        ));
    };
    if clause.count == 0 {
        return Err(StoreError::InvalidInput(
            "index clause count must be positive".into(),
        ));
    }

    let head = &clause.expressions[driver];
    let mut sql = String::from(
        "SELECT c0.row_key FROM cells c0 \
         WHERE c0.keyspace = ?1 AND c0.column_family = ?2 \
         AND c0.name = ?3 AND c0.value = ?4 AND c0.row_key >= ?5",
    );
    let mut values = vec![
        Value::Text(keyspace.to_string()),
        Value::Text(column_family.to_string()),
        Value::Text(head.column.clone()),
        Value::Blob(head.value.clone()),
        Value::Text(clause.start_key.clone()),
    ];

    for (i, expr) in clause.expressions.iter().enumerate() {
        if i == driver {
            continue;
        }
        let alias = format!("c{}", i + 1);
        let name_param = values.len() + 1;
        let value_param = name_param + 1;
        values.push(Value::Text(expr.column.clone()));
        values.push(Value::Blob(expr.value.clone()));
        sql.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM cells {alias} \
             WHERE {alias}.keyspace = c0.keyspace \
             AND {alias}.column_family = c0.column_family \
             AND {alias}.row_key = c0.row_key \
             AND {alias}.name = ?{name_param} \
             AND {alias}.value {op} ?{value_param})",
            op = expr.op.sql(),
        ));
    }

    values.push(Value::Integer(i64::from(clause.count)));
    sql.push_str(&format!(" ORDER BY c0.row_key LIMIT ?{}", values.len()));

    Ok((sql, values))
}

/// Classify a `SQLite` failure into the store's error kinds.
#[must_use]
pub fn map_sqlite_error(err: rusqlite::Error) -> StoreError {
    let message = err.to_string();
    match &err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => StoreError::Timeout(message),
            ErrorCode::CannotOpen
            | ErrorCode::SystemIoFailure
            | ErrorCode::DiskFull
            | ErrorCode::ReadOnly
            | ErrorCode::PermissionDenied
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::FileLockingProtocolFailed => StoreError::Unavailable(message),
            ErrorCode::ConstraintViolation
            | ErrorCode::TooBig
            | ErrorCode::TypeMismatch
            | ErrorCode::ParameterOutOfRange => StoreError::InvalidInput(message),
            _ => StoreError::Transport(message),
        },
        rusqlite::Error::InvalidParameterCount(..)
        | rusqlite::Error::InvalidParameterName(_)
        | rusqlite::Error::ToSqlConversionFailure(_) => StoreError::InvalidInput(message),
        _ => StoreError::Transport(message),
    }
}
