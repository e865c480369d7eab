use crate::error::BalError;
use crate::name::Name;
use crate::storage::encoded_key::{EncodedKey, prefix_successor};
use crate::storage::engine::{
    Direction, FlatEngine, IndexEntry, IndexSlot, RowRecord, Scope, Seek, StorageEngine,
};
use std::ops::Bound;

const SCOPE_PREFIX_BYTES: usize = 8;

/// Presents an unscoped engine as a scoped one.
///
/// Every primary and secondary key is stored behind the big-endian scope, so one
/// scope's rows form a contiguous run in each index and open range ends are
/// clamped to that run. Payers are ignored.
#[derive(Debug, Default)]
pub struct ScopeEmulation<F> {
    inner: F,
}

impl<F: FlatEngine> ScopeEmulation<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    fn scoped_record(scope: Scope, record: RowRecord) -> RowRecord {
        RowRecord {
            primary: scoped(scope, &record.primary),
            bytes: record.bytes,
            secondary: record.secondary.iter().map(|k| scoped(scope, k)).collect(),
        }
    }

    fn unscoped_record(record: RowRecord) -> Result<RowRecord, BalError> {
        Ok(RowRecord {
            primary: unscoped(&record.primary)?,
            bytes: record.bytes,
            secondary: record
                .secondary
                .iter()
                .map(unscoped)
                .collect::<Result<_, _>>()?,
        })
    }
}

fn scoped(scope: Scope, key: &EncodedKey) -> EncodedKey {
    EncodedKey::from_u64(scope).concat(key)
}

fn unscoped(key: &EncodedKey) -> Result<EncodedKey, BalError> {
    key.strip_prefix(SCOPE_PREFIX_BYTES).ok_or_else(|| {
        BalError::Decode(format!(
            "stored key {} is shorter than its scope prefix",
            hex::encode(key.as_slice())
        ))
    })
}

fn scoped_seek(scope: Scope, seek: Seek) -> Seek {
    match seek {
        Seek::Key(key) => Seek::Key(scoped(scope, &key)),
        Seek::Entry(entry) => Seek::Entry(IndexEntry {
            key: scoped(scope, &entry.key),
            primary: scoped(scope, &entry.primary),
        }),
    }
}

fn scoped_start(scope: Scope, start: Bound<Seek>) -> Bound<Seek> {
    match start {
        Bound::Unbounded => Bound::Included(Seek::Key(EncodedKey::from_u64(scope))),
        Bound::Included(seek) => Bound::Included(scoped_seek(scope, seek)),
        Bound::Excluded(seek) => Bound::Excluded(scoped_seek(scope, seek)),
    }
}

fn scoped_end(scope: Scope, end: Bound<Seek>) -> Bound<Seek> {
    match end {
        Bound::Unbounded => match prefix_successor(&EncodedKey::from_u64(scope)) {
            Some(next) => Bound::Excluded(Seek::Key(next)),
            None => Bound::Unbounded,
        },
        Bound::Included(seek) => Bound::Included(scoped_seek(scope, seek)),
        Bound::Excluded(seek) => Bound::Excluded(scoped_seek(scope, seek)),
    }
}

impl<F: FlatEngine> StorageEngine for ScopeEmulation<F> {
    fn native_scopes(&self) -> bool {
        false
    }

    fn declare_table(&mut self, table: Name, secondary_count: usize) -> Result<(), BalError> {
        self.inner.declare_table(table, secondary_count)
    }

    fn ordered_insert(
        &mut self,
        table: Name,
        scope: Scope,
        _payer: Option<Name>,
        record: RowRecord,
    ) -> Result<(), BalError> {
        self.inner.insert(table, Self::scoped_record(scope, record))
    }

    fn ordered_find(
        &self,
        table: Name,
        scope: Scope,
        primary: &EncodedKey,
    ) -> Result<Option<RowRecord>, BalError> {
        self.inner
            .find(table, &scoped(scope, primary))?
            .map(Self::unscoped_record)
            .transpose()
    }

    fn ordered_range(
        &self,
        table: Name,
        scope: Scope,
        slot: IndexSlot,
        start: Bound<Seek>,
        end: Bound<Seek>,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<IndexEntry>, BalError> {
        self.inner
            .range(
                table,
                slot,
                scoped_start(scope, start),
                scoped_end(scope, end),
                direction,
                limit,
            )?
            .into_iter()
            .map(|entry| {
                Ok(IndexEntry {
                    key: unscoped(&entry.key)?,
                    primary: unscoped(&entry.primary)?,
                })
            })
            .collect()
    }

    fn ordered_erase(
        &mut self,
        table: Name,
        scope: Scope,
        primary: &EncodedKey,
    ) -> Result<RowRecord, BalError> {
        let record = self.inner.erase(table, &scoped(scope, primary))?;
        Self::unscoped_record(record)
    }

    fn ordered_modify(
        &mut self,
        table: Name,
        scope: Scope,
        _payer: Option<Name>,
        record: RowRecord,
    ) -> Result<(), BalError> {
        self.inner.modify(table, Self::scoped_record(scope, record))
    }

    fn begin_undo(&mut self) -> bool {
        self.inner.begin_undo()
    }

    fn commit_undo(&mut self) {
        self.inner.commit_undo();
    }

    fn rollback_undo(&mut self) {
        self.inner.rollback_undo();
    }
}

#[cfg(test)]
mod tests {
    use super::ScopeEmulation;
    use crate::name::Name;
    use crate::storage::encoded_key::EncodedKey;
    use crate::storage::engine::{Direction, IndexSlot, RowRecord, Seek, StorageEngine};
    use crate::storage::flat::FlatMemoryEngine;
    use smallvec::smallvec;
    use std::ops::Bound;

    const TABLE: Name = Name::new("scoped");

    fn record(pk: u64, key: u64) -> RowRecord {
        RowRecord {
            primary: EncodedKey::from_u64(pk),
            bytes: vec![1, 2, 3],
            secondary: smallvec![EncodedKey::from_u64(key)],
        }
    }

    fn scan(
        engine: &ScopeEmulation<FlatMemoryEngine>,
        scope: u64,
        slot: IndexSlot,
        direction: Direction,
    ) -> Vec<u64> {
        engine
            .ordered_range(
                TABLE,
                scope,
                slot,
                Bound::Unbounded,
                Bound::Unbounded,
                direction,
                usize::MAX,
            )
            .expect("range")
            .into_iter()
            .map(|entry| entry.primary.to_u64().expect("u64"))
            .collect()
    }

    #[test]
    fn scopes_do_not_leak_into_each_other() {
        let mut engine = ScopeEmulation::new(FlatMemoryEngine::new());
        engine.declare_table(TABLE, 1).expect("declare");
        engine.ordered_insert(TABLE, 1, None, record(5, 50)).expect("insert");
        engine.ordered_insert(TABLE, 2, None, record(5, 10)).expect("same pk other scope");
        engine.ordered_insert(TABLE, 2, None, record(6, 60)).expect("insert");
        engine
            .ordered_insert(TABLE, u64::MAX, None, record(1, 1))
            .expect("top scope");

        assert_eq!(scan(&engine, 1, IndexSlot::Primary, Direction::Forward), vec![5]);
        assert_eq!(scan(&engine, 2, IndexSlot::Primary, Direction::Reverse), vec![6, 5]);
        assert_eq!(scan(&engine, 2, IndexSlot::Secondary(0), Direction::Forward), vec![5, 6]);
        assert_eq!(scan(&engine, u64::MAX, IndexSlot::Primary, Direction::Forward), vec![1]);
        assert!(scan(&engine, 3, IndexSlot::Primary, Direction::Forward).is_empty());
        assert_eq!(engine.inner().row_count(TABLE), 4);
    }

    #[test]
    fn results_come_back_without_the_prefix() {
        let mut engine = ScopeEmulation::new(FlatMemoryEngine::new());
        engine.declare_table(TABLE, 1).expect("declare");
        engine.ordered_insert(TABLE, 9, None, record(3, 30)).expect("insert");

        let found = engine
            .ordered_find(TABLE, 9, &EncodedKey::from_u64(3))
            .expect("find")
            .expect("present");
        assert_eq!(found, record(3, 30));

        let upper = engine
            .ordered_range(
                TABLE,
                9,
                IndexSlot::Secondary(0),
                Bound::Excluded(Seek::Key(EncodedKey::from_u64(20))),
                Bound::Unbounded,
                Direction::Forward,
                1,
            )
            .expect("range");
        assert_eq!(upper[0].key, EncodedKey::from_u64(30));
        assert!(!engine.native_scopes());
        assert_eq!(engine.usage(Name::new("alice")), 0);
    }
}
