//! Wide-column backend interface.
//!
//! The event store talks to its database through [`ColumnBackend`]: a
//! single-row slice read, a secondary-index slice read, and an atomic batch
//! mutation of one row. Every call carries a [`ConsistencyLevel`]. The
//! request types mirror a Cassandra-style thrift API; [`crate::db`] provides
//! a `SQLite` implementation with the same timestamp semantics.

use crate::error::StoreError;

/// Replica acknowledgement required for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsistencyLevel {
    /// A single replica answers.
    #[default]
    One,
    /// A majority of replicas answers.
    Quorum,
}

impl ConsistencyLevel {
    #[must_use]
    pub const fn from_quorum(quorum: bool) -> Self {
        if quorum { Self::Quorum } else { Self::One }
    }
}

/// One named cell of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub value: Vec<u8>,
    /// Write timestamp in microseconds since Unix epoch.
    pub timestamp: i64,
}

impl Column {
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            timestamp,
        }
    }
}

/// A write or tombstone applied to one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Write a column; kept only if its timestamp is newer than what the
    /// backend already holds for that column.
    Insert(Column),
    /// Suppress the named columns for every write at or before `timestamp`.
    Delete { columns: Vec<String>, timestamp: i64 },
}

/// Comparison applied by an index expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOperator {
    Eq,
    Gte,
    Gt,
    Lte,
    Lt,
}

impl IndexOperator {
    /// SQL spelling of the operator.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gte => ">=",
            Self::Gt => ">",
            Self::Lte => "<=",
            Self::Lt => "<",
        }
    }
}

/// `column <op> value`, compared bytewise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexExpression {
    pub column: String,
    pub op: IndexOperator,
    pub value: Vec<u8>,
}

impl IndexExpression {
    pub fn new(column: impl Into<String>, op: IndexOperator, value: impl Into<Vec<u8>>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }
}

/// A secondary-index query. At least one expression must be an equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexClause {
    pub expressions: Vec<IndexExpression>,
    /// First row key to consider; empty starts from the beginning.
    pub start_key: String,
    /// Maximum number of rows returned.
    pub count: u32,
}

/// A row returned by an index query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySlice {
    pub key: String,
    pub columns: Vec<Column>,
}

/// Client of a wide-column store.
///
/// `column_family` names the table inside the backend's keyspace. Reads
/// return only live columns among `columns`; rows without live columns are
/// returned empty (slice read) or omitted (index read).
pub trait ColumnBackend {
    /// Read the named columns of one row.
    ///
    /// # Errors
    ///
    /// Returns the backend failure kind unchanged.
    fn get_slice(
        &self,
        column_family: &str,
        key: &str,
        columns: &[&str],
        consistency: ConsistencyLevel,
    ) -> Result<Vec<Column>, StoreError>;

    /// Read the named columns of every row matching `clause`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInput`] for clauses without an equality
    /// expression, otherwise the backend failure kind unchanged.
    fn get_indexed_slices(
        &self,
        column_family: &str,
        clause: &IndexClause,
        columns: &[&str],
        consistency: ConsistencyLevel,
    ) -> Result<Vec<KeySlice>, StoreError>;

    /// Apply all `mutations` to row `key` atomically.
    ///
    /// # Errors
    ///
    /// Returns the backend failure kind unchanged; on error nothing is
    /// applied.
    fn batch_mutate(
        &self,
        column_family: &str,
        key: &str,
        mutations: &[Mutation],
        consistency: ConsistencyLevel,
    ) -> Result<(), StoreError>;
}

impl<B: ColumnBackend + ?Sized> ColumnBackend for &B {
    fn get_slice(
        &self,
        column_family: &str,
        key: &str,
        columns: &[&str],
        consistency: ConsistencyLevel,
    ) -> Result<Vec<Column>, StoreError> {
        (**self).get_slice(column_family, key, columns, consistency)
    }

    fn get_indexed_slices(
        &self,
        column_family: &str,
        clause: &IndexClause,
        columns: &[&str],
        consistency: ConsistencyLevel,
    ) -> Result<Vec<KeySlice>, StoreError> {
        (**self).get_indexed_slices(column_family, clause, columns, consistency)
    }

    fn batch_mutate(
        &self,
        column_family: &str,
        key: &str,
        mutations: &[Mutation],
        consistency: ConsistencyLevel,
    ) -> Result<(), StoreError> {
        (**self).batch_mutate(column_family, key, mutations, consistency)
    }
}
