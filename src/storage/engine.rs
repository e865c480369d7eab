use crate::error::BalError;
use crate::name::Name;
use crate::storage::encoded_key::{EncodedKey, prefix_successor};
use smallvec::SmallVec;
use std::ops::Bound;

/// Logical partition of a table.
pub type Scope = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexSlot {
    Primary,
    Secondary(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

/// One row as the engines see it: primary key, payload, and one key per secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    pub primary: EncodedKey,
    pub bytes: Vec<u8>,
    pub secondary: SmallVec<[EncodedKey; 4]>,
}

impl RowRecord {
    pub fn billable_bytes(&self) -> u64 {
        let keys: usize = self.secondary.iter().map(EncodedKey::len).sum();
        (self.primary.len() + self.bytes.len() + keys) as u64
    }
}

/// Position in one index. For the primary index `key == primary`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexEntry {
    pub key: EncodedKey,
    pub primary: EncodedKey,
}

impl IndexEntry {
    pub fn primary(primary: EncodedKey) -> Self {
        Self {
            key: primary.clone(),
            primary,
        }
    }

    /// Sort key inside the index: the key itself for the primary index, and the
    /// secondary key followed by the primary key otherwise so ties stay ordered.
    pub fn composite(&self, slot: IndexSlot) -> EncodedKey {
        match slot {
            IndexSlot::Primary => self.primary.clone(),
            IndexSlot::Secondary(_) => self.key.concat(&self.primary),
        }
    }
}

/// A range endpoint: either every entry carrying a key, or one exact entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seek {
    Key(EncodedKey),
    Entry(IndexEntry),
}

/// Translates key/entry bounds into bounds over composite sort keys. `None` means
/// the range is empty.
pub(crate) fn composite_bounds(
    slot: IndexSlot,
    start: &Bound<Seek>,
    end: &Bound<Seek>,
) -> Option<(Bound<EncodedKey>, Bound<EncodedKey>)> {
    let lower = match start {
        Bound::Unbounded => Bound::Unbounded,
        Bound::Included(Seek::Key(key)) => Bound::Included(key.clone()),
        Bound::Excluded(Seek::Key(key)) => Bound::Included(prefix_successor(key)?),
        Bound::Included(Seek::Entry(entry)) => Bound::Included(entry.composite(slot)),
        Bound::Excluded(Seek::Entry(entry)) => Bound::Excluded(entry.composite(slot)),
    };
    let upper = match end {
        Bound::Unbounded => Bound::Unbounded,
        Bound::Included(Seek::Key(key)) => match prefix_successor(key) {
            Some(next) => Bound::Excluded(next),
            None => Bound::Unbounded,
        },
        Bound::Excluded(Seek::Key(key)) => Bound::Excluded(key.clone()),
        Bound::Included(Seek::Entry(entry)) => Bound::Included(entry.composite(slot)),
        Bound::Excluded(Seek::Entry(entry)) => Bound::Excluded(entry.composite(slot)),
    };
    if range_is_empty(&lower, &upper) {
        return None;
    }
    Some((lower, upper))
}

fn range_is_empty(lower: &Bound<EncodedKey>, upper: &Bound<EncodedKey>) -> bool {
    match (lower, upper) {
        (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
        (Bound::Included(lo), Bound::Excluded(hi))
        | (Bound::Excluded(lo), Bound::Included(hi))
        | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
        _ => false,
    }
}

/// Ordered storage partitioned by table and scope.
///
/// Every index of a table is maintained by the engine, so one call either updates
/// all of them or none.
pub trait StorageEngine {
    fn native_scopes(&self) -> bool;

    /// Idempotent; redeclaring with a different index count is a schema error.
    fn declare_table(&mut self, table: Name, secondary_count: usize) -> Result<(), BalError>;

    fn ordered_insert(
        &mut self,
        table: Name,
        scope: Scope,
        payer: Option<Name>,
        record: RowRecord,
    ) -> Result<(), BalError>;

    fn ordered_find(
        &self,
        table: Name,
        scope: Scope,
        primary: &EncodedKey,
    ) -> Result<Option<RowRecord>, BalError>;

    #[allow(clippy::too_many_arguments)]
    fn ordered_range(
        &self,
        table: Name,
        scope: Scope,
        slot: IndexSlot,
        start: Bound<Seek>,
        end: Bound<Seek>,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<IndexEntry>, BalError>;

    fn ordered_erase(
        &mut self,
        table: Name,
        scope: Scope,
        primary: &EncodedKey,
    ) -> Result<RowRecord, BalError>;

    /// Replaces the row with `record.primary`, repositioning changed secondary keys.
    fn ordered_modify(
        &mut self,
        table: Name,
        scope: Scope,
        payer: Option<Name>,
        record: RowRecord,
    ) -> Result<(), BalError>;

    /// Opens an undo session; `false` when the engine cannot revert writes.
    fn begin_undo(&mut self) -> bool {
        false
    }

    fn commit_undo(&mut self) {}

    fn rollback_undo(&mut self) {}

    /// Bytes currently billed to `payer`; zero on engines without accounting.
    fn usage(&self, _payer: Name) -> u64 {
        0
    }
}

/// Ordered storage without scopes, the shape of a plain object database.
pub trait FlatEngine {
    fn declare_table(&mut self, table: Name, secondary_count: usize) -> Result<(), BalError>;

    fn insert(&mut self, table: Name, record: RowRecord) -> Result<(), BalError>;

    fn find(&self, table: Name, primary: &EncodedKey) -> Result<Option<RowRecord>, BalError>;

    fn range(
        &self,
        table: Name,
        slot: IndexSlot,
        start: Bound<Seek>,
        end: Bound<Seek>,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<IndexEntry>, BalError>;

    fn erase(&mut self, table: Name, primary: &EncodedKey) -> Result<RowRecord, BalError>;

    fn modify(&mut self, table: Name, record: RowRecord) -> Result<(), BalError>;

    fn begin_undo(&mut self) -> bool {
        false
    }

    fn commit_undo(&mut self) {}

    fn rollback_undo(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::{IndexEntry, IndexSlot, Seek, composite_bounds};
    use crate::storage::encoded_key::EncodedKey;
    use std::ops::Bound;

    #[test]
    fn excluded_key_skips_every_tie() {
        let key = EncodedKey::from_u64(5);
        let (lower, _) = composite_bounds(
            IndexSlot::Secondary(0),
            &Bound::Excluded(Seek::Key(key.clone())),
            &Bound::Unbounded,
        )
        .expect("non-empty");
        let tie = key.concat(&EncodedKey::from_u64(u64::MAX));
        match lower {
            Bound::Included(bound) => assert!(bound > tie),
            other => panic!("unexpected bound {other:?}"),
        }
    }

    #[test]
    fn inverted_range_is_empty() {
        let lo = Seek::Entry(IndexEntry::primary(EncodedKey::from_u64(9)));
        let hi = Seek::Entry(IndexEntry::primary(EncodedKey::from_u64(3)));
        assert!(
            composite_bounds(IndexSlot::Primary, &Bound::Included(lo), &Bound::Included(hi))
                .is_none()
        );
    }
}
