use crate::error::BalError;
use crate::keys::{IndexKey, IndexKeyType, KeyKind};
use crate::name::Name;
use crate::storage::{Direction, EncodedKey, IndexSlot, Seek};
use crate::table::{Cursor, Row, RowIter, Table};
use std::ops::Bound;

/// View of a table ordered by one secondary key, ties broken by primary key.
pub struct SecondaryIndex<R: Row> {
    table: Table<R>,
    slot: usize,
    tag: Name,
    kind: KeyKind,
}

impl<R: Row> SecondaryIndex<R> {
    pub(crate) fn new(table: Table<R>, slot: usize, tag: Name, kind: KeyKind) -> Self {
        Self {
            table,
            slot,
            tag,
            kind,
        }
    }

    pub fn tag(&self) -> Name {
        self.tag
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    fn index_slot(&self) -> IndexSlot {
        IndexSlot::Secondary(self.slot)
    }

    fn encode<K: IndexKeyType>(&self, key: K) -> Result<EncodedKey, BalError> {
        if K::KIND != self.kind {
            return Err(BalError::Schema(format!(
                "index {} of table {} is keyed by {}, not {}",
                self.tag,
                R::TABLE_NAME,
                self.kind.as_str(),
                K::KIND.as_str()
            )));
        }
        Ok(key.into_index_key().encode())
    }

    pub fn begin(&self) -> Result<Cursor<R>, BalError> {
        self.table.first(self.index_slot(), Direction::Forward)
    }

    pub fn end(&self) -> Cursor<R> {
        Cursor::end(self.index_slot(), Direction::Forward)
    }

    pub fn rbegin(&self) -> Result<Cursor<R>, BalError> {
        self.table.first(self.index_slot(), Direction::Reverse)
    }

    pub fn rend(&self) -> Cursor<R> {
        Cursor::end(self.index_slot(), Direction::Reverse)
    }

    pub fn next(&self, cursor: &Cursor<R>) -> Result<Cursor<R>, BalError> {
        self.table.next(cursor)
    }

    pub fn prev(&self, cursor: &Cursor<R>) -> Result<Cursor<R>, BalError> {
        self.table.prev(cursor)
    }

    pub fn iter(&self) -> RowIter<R> {
        RowIter::new(
            self.table.clone(),
            self.index_slot(),
            Bound::Unbounded,
            Bound::Unbounded,
        )
    }

    /// First entry whose key is not less than `key`.
    pub fn lower_bound<K: IndexKeyType>(&self, key: K) -> Result<Cursor<R>, BalError> {
        let key = self.encode(key)?;
        self.table
            .seek(self.index_slot(), Bound::Included(Seek::Key(key)))
    }

    /// First entry whose key is greater than `key`.
    pub fn upper_bound<K: IndexKeyType>(&self, key: K) -> Result<Cursor<R>, BalError> {
        let key = self.encode(key)?;
        self.table
            .seek(self.index_slot(), Bound::Excluded(Seek::Key(key)))
    }

    /// First entry with exactly `key`, or the end cursor.
    pub fn find<K: IndexKeyType>(&self, key: K) -> Result<Cursor<R>, BalError> {
        let encoded = self.encode(key)?;
        let cursor = self.lower_bound(key)?;
        match cursor.entry() {
            Some(entry) if entry.key == encoded => Ok(cursor),
            _ => Ok(self.end()),
        }
    }

    pub fn get<K: IndexKeyType>(&self, key: K, message: impl Into<String>) -> Result<R, BalError> {
        let cursor = self.find(key)?;
        match cursor.row {
            Some(row) => Ok(row),
            None => Err(BalError::not_found(message)),
        }
    }

    pub fn contains<K: IndexKeyType>(&self, key: K) -> Result<bool, BalError> {
        Ok(!self.find(key)?.is_end())
    }

    /// Every row carrying exactly `key`, in primary-key order.
    pub fn equal_range<K: IndexKeyType>(&self, key: K) -> Result<RowIter<R>, BalError> {
        self.range(key, key)
    }

    /// Rows with `lo <= key <= hi`.
    pub fn range<K: IndexKeyType>(&self, lo: K, hi: K) -> Result<RowIter<R>, BalError> {
        let lo = self.encode(lo)?;
        let hi = self.encode(hi)?;
        Ok(RowIter::new(
            self.table.clone(),
            self.index_slot(),
            Bound::Included(Seek::Key(lo)),
            Bound::Included(Seek::Key(hi)),
        ))
    }

    /// Secondary key under `cursor`.
    pub fn key<K: IndexKeyType>(&self, cursor: &Cursor<R>) -> Result<K, BalError> {
        let entry = cursor
            .entry()
            .ok_or_else(|| BalError::Validation("cannot read the key of an end cursor".into()))?;
        let key = IndexKey::decode(self.kind, entry.key.as_slice())?;
        K::from_index_key(key).ok_or_else(|| {
            BalError::Schema(format!(
                "index {} is keyed by {}, not {}",
                self.tag,
                self.kind.as_str(),
                K::KIND.as_str()
            ))
        })
    }

    pub fn create(&self, constructor: impl FnOnce(&mut R)) -> Result<R, BalError> {
        self.table.create(constructor)
    }

    pub fn modify(
        &self,
        cursor: &Cursor<R>,
        mutator: impl FnOnce(&mut R),
    ) -> Result<R, BalError> {
        self.table.modify(cursor, mutator)
    }

    /// Erases the row under `cursor` and returns the next cursor in this index.
    pub fn erase(&self, cursor: &Cursor<R>) -> Result<Cursor<R>, BalError> {
        if cursor.slot() != self.index_slot() {
            return Err(BalError::Validation(format!(
                "cursor does not belong to index {}",
                self.tag
            )));
        }
        self.table.erase(cursor)
    }
}
