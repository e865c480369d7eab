use crate::error::BalError;
use crate::name::Name;
use crate::storage::encoded_key::EncodedKey;
use crate::storage::engine::{Direction, FlatEngine, IndexEntry, IndexSlot, RowRecord, Seek};
use crate::storage::rows::IndexedRows;
use im::OrdMap;
use std::ops::Bound;

/// Unscoped in-memory object store with nested undo sessions.
#[derive(Debug, Default)]
pub struct FlatMemoryEngine {
    tables: OrdMap<Name, IndexedRows>,
    undo: Vec<OrdMap<Name, IndexedRows>>,
}

impl FlatMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self, table: Name) -> usize {
        self.tables.get(&table).map_or(0, IndexedRows::len)
    }

    fn rows(&self, table: Name) -> Result<&IndexedRows, BalError> {
        self.tables
            .get(&table)
            .ok_or_else(|| BalError::table_not_declared(table))
    }

    fn rows_mut(&mut self, table: Name) -> Result<&mut IndexedRows, BalError> {
        self.tables
            .get_mut(&table)
            .ok_or_else(|| BalError::table_not_declared(table))
    }
}

impl FlatEngine for FlatMemoryEngine {
    fn declare_table(&mut self, table: Name, secondary_count: usize) -> Result<(), BalError> {
        if let Some(existing) = self.tables.get(&table) {
            if existing.secondary_count() != secondary_count {
                return Err(BalError::Schema(format!(
                    "table {table} already declared with {} secondary indexes",
                    existing.secondary_count()
                )));
            }
            return Ok(());
        }
        self.tables.insert(table, IndexedRows::new(table, secondary_count));
        Ok(())
    }

    fn insert(&mut self, table: Name, record: RowRecord) -> Result<(), BalError> {
        self.rows_mut(table)?.insert(record)
    }

    fn find(&self, table: Name, primary: &EncodedKey) -> Result<Option<RowRecord>, BalError> {
        Ok(self.rows(table)?.get(primary).cloned())
    }

    fn range(
        &self,
        table: Name,
        slot: IndexSlot,
        start: Bound<Seek>,
        end: Bound<Seek>,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<IndexEntry>, BalError> {
        self.rows(table)?.range(slot, &start, &end, direction, limit)
    }

    fn erase(&mut self, table: Name, primary: &EncodedKey) -> Result<RowRecord, BalError> {
        self.rows_mut(table)?.erase(primary)
    }

    fn modify(&mut self, table: Name, record: RowRecord) -> Result<(), BalError> {
        self.rows_mut(table)?.modify(record).map(|_| ())
    }

    fn begin_undo(&mut self) -> bool {
        self.undo.push(self.tables.clone());
        true
    }

    fn commit_undo(&mut self) {
        self.undo.pop();
    }

    fn rollback_undo(&mut self) {
        if let Some(previous) = self.undo.pop() {
            self.tables = previous;
        }
    }
}
