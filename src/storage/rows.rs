use crate::error::BalError;
use crate::name::Name;
use crate::storage::encoded_key::EncodedKey;
use crate::storage::engine::{Direction, IndexEntry, IndexSlot, RowRecord, Seek, composite_bounds};
use im::OrdMap;
use std::ops::Bound;

/// The rows of one table partition together with all of its secondary indexes.
///
/// Secondary maps are keyed by `secondary key ++ primary key` and map back to the
/// primary key, which keeps duplicate secondary keys ordered by primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRows {
    table: Name,
    rows: OrdMap<EncodedKey, RowRecord>,
    secondary: Vec<OrdMap<EncodedKey, EncodedKey>>,
}

impl IndexedRows {
    pub fn new(table: Name, secondary_count: usize) -> Self {
        Self {
            table,
            rows: OrdMap::new(),
            secondary: vec![OrdMap::new(); secondary_count],
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn secondary_count(&self) -> usize {
        self.secondary.len()
    }

    pub fn get(&self, primary: &EncodedKey) -> Option<&RowRecord> {
        self.rows.get(primary)
    }

    pub fn insert(&mut self, record: RowRecord) -> Result<(), BalError> {
        self.check_shape(&record)?;
        if self.rows.contains_key(&record.primary) {
            return Err(BalError::DuplicateKey {
                table: self.table,
                key: hex::encode(record.primary.as_slice()),
            });
        }
        self.index(&record);
        self.rows.insert(record.primary.clone(), record);
        Ok(())
    }

    pub fn erase(&mut self, primary: &EncodedKey) -> Result<RowRecord, BalError> {
        let record = self
            .rows
            .remove(primary)
            .ok_or_else(|| self.missing(primary))?;
        self.unindex(&record);
        Ok(record)
    }

    /// Replaces a row in place and returns the previous version.
    pub fn modify(&mut self, record: RowRecord) -> Result<RowRecord, BalError> {
        self.check_shape(&record)?;
        let previous = self
            .rows
            .get(&record.primary)
            .cloned()
            .ok_or_else(|| self.missing(&record.primary))?;
        for (i, (old, new)) in previous
            .secondary
            .iter()
            .zip(record.secondary.iter())
            .enumerate()
        {
            if old != new {
                self.secondary[i].remove(&old.concat(&previous.primary));
                self.secondary[i].insert(new.concat(&record.primary), record.primary.clone());
            }
        }
        self.rows.insert(record.primary.clone(), record);
        Ok(previous)
    }

    pub fn range(
        &self,
        slot: IndexSlot,
        start: &Bound<Seek>,
        end: &Bound<Seek>,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<IndexEntry>, BalError> {
        let Some(bounds) = composite_bounds(slot, start, end) else {
            return Ok(Vec::new());
        };
        match slot {
            IndexSlot::Primary => {
                let iter = self.rows.range(bounds).map(|(pk, _)| IndexEntry::primary(pk.clone()));
                Ok(take(iter, direction, limit))
            }
            IndexSlot::Secondary(i) => {
                let index = self.secondary.get(i).ok_or_else(|| {
                    BalError::Schema(format!("table {} has no secondary index {i}", self.table))
                })?;
                let iter = index.range(bounds).map(|(composite, pk)| IndexEntry {
                    key: composite.truncated(composite.len() - pk.len()),
                    primary: pk.clone(),
                });
                Ok(take(iter, direction, limit))
            }
        }
    }

    fn index(&mut self, record: &RowRecord) {
        for (i, key) in record.secondary.iter().enumerate() {
            self.secondary[i].insert(key.concat(&record.primary), record.primary.clone());
        }
    }

    fn unindex(&mut self, record: &RowRecord) {
        for (i, key) in record.secondary.iter().enumerate() {
            self.secondary[i].remove(&key.concat(&record.primary));
        }
    }

    fn check_shape(&self, record: &RowRecord) -> Result<(), BalError> {
        if record.secondary.len() != self.secondary.len() {
            return Err(BalError::Schema(format!(
                "table {} declares {} secondary indexes but the row carries {} keys",
                self.table,
                self.secondary.len(),
                record.secondary.len()
            )));
        }
        Ok(())
    }

    fn missing(&self, primary: &EncodedKey) -> BalError {
        missing_row(self.table, primary)
    }
}

pub fn missing_row(table: Name, primary: &EncodedKey) -> BalError {
    BalError::not_found(format!(
        "row {} not found in table {table}",
        hex::encode(primary.as_slice())
    ))
}

fn take<I>(iter: I, direction: Direction, limit: usize) -> Vec<IndexEntry>
where
    I: DoubleEndedIterator<Item = IndexEntry>,
{
    match direction {
        Direction::Forward => iter.take(limit).collect(),
        Direction::Reverse => iter.rev().take(limit).collect(),
    }
}
