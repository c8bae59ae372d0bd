//! Backend double for unit tests: counts calls and fails on demand.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::backend::{
    Column, ColumnBackend, ConsistencyLevel, IndexClause, KeySlice, Mutation,
};
use crate::db::SqliteBackend;
use crate::error::StoreError;

#[derive(Debug)]
pub struct ScriptedBackend {
    inner: SqliteBackend,
    pub slice_reads: AtomicUsize,
    pub index_reads: AtomicUsize,
    pub batches: AtomicUsize,
    /// Zero-based batch numbers answered with a timeout.
    failing_batches: Mutex<HashSet<usize>>,
    failing_index_reads: Mutex<Option<StoreError>>,
    pub consistency_seen: Mutex<Vec<ConsistencyLevel>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            inner: SqliteBackend::open_in_memory("dutycal").expect("in-memory store"),
            slice_reads: AtomicUsize::new(0),
            index_reads: AtomicUsize::new(0),
            batches: AtomicUsize::new(0),
            failing_batches: Mutex::new(HashSet::new()),
            failing_index_reads: Mutex::new(None),
            consistency_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_batch(&self, n: usize) {
        self.failing_batches.lock().expect("lock").insert(n);
    }

    pub fn fail_index_reads(&self, err: StoreError) {
        *self.failing_index_reads.lock().expect("lock") = Some(err);
    }

    pub fn calls(&self) -> usize {
        self.slice_reads.load(Ordering::SeqCst)
            + self.index_reads.load(Ordering::SeqCst)
            + self.batches.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &SqliteBackend {
        &self.inner
    }

    fn record(&self, consistency: ConsistencyLevel) {
        self.consistency_seen.lock().expect("lock").push(consistency);
    }
}

impl ColumnBackend for ScriptedBackend {
    fn get_slice(
        &self,
        column_family: &str,
        key: &str,
        columns: &[&str],
        consistency: ConsistencyLevel,
    ) -> Result<Vec<Column>, StoreError> {
        self.slice_reads.fetch_add(1, Ordering::SeqCst);
        self.record(consistency);
        self.inner.get_slice(column_family, key, columns, consistency)
    }

    fn get_indexed_slices(
        &self,
        column_family: &str,
        clause: &IndexClause,
        columns: &[&str],
        consistency: ConsistencyLevel,
    ) -> Result<Vec<KeySlice>, StoreError> {
        self.index_reads.fetch_add(1, Ordering::SeqCst);
        self.record(consistency);
        if let Some(err) = self.failing_index_reads.lock().expect("lock").clone() {
            return Err(err);
        }
        self.inner
            .get_indexed_slices(column_family, clause, columns, consistency)
    }

    fn batch_mutate(
        &self,
        column_family: &str,
        key: &str,
        mutations: &[Mutation],
        consistency: ConsistencyLevel,
    ) -> Result<(), StoreError> {
        let n = self.batches.fetch_add(1, Ordering::SeqCst);
        self.record(consistency);
        if self.failing_batches.lock().expect("lock").contains(&n) {
            return Err(StoreError::Timeout(format!("scripted failure of batch {n}")));
        }
        self.inner
            .batch_mutate(column_family, key, mutations, consistency)
    }
}
