//! Scoped tables: typed rows ordered by a 64-bit primary key, with any number of
//! secondary indexes, on top of a [`Store`].

mod cursor;
mod index;
mod schema;

pub use cursor::{Cursor, RowIter};
pub use index::SecondaryIndex;
pub use schema::{SecondaryIndexDescriptor, TableSchema};

use crate::config::DEFAULT_MAX_SECONDARY_INDEXES;
use crate::error::BalError;
use crate::keys::PrimaryKey;
use crate::name::Name;
use crate::storage::{Direction, EncodedKey, IndexEntry, IndexSlot, Scope, Seek, Store};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ops::Bound;
use std::rc::Rc;

/// A record type stored in a table.
pub trait Row: Serialize + DeserializeOwned + Clone + Default + 'static {
    const TABLE_NAME: Name;

    type PrimaryKey: PrimaryKey;

    fn primary_key(&self) -> Self::PrimaryKey;

    fn secondary_indexes() -> Vec<SecondaryIndexDescriptor<Self>> {
        Vec::new()
    }
}

/// Handle on the rows of `R` within one scope.
pub struct Table<R: Row> {
    store: Store,
    scope: Scope,
    schema: Rc<TableSchema<R>>,
}

impl<R: Row> Clone for Table<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            scope: self.scope,
            schema: Rc::clone(&self.schema),
        }
    }
}

impl<R: Row> std::fmt::Debug for Table<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &R::TABLE_NAME.to_string())
            .field("scope", &self.scope)
            .finish()
    }
}

impl<R: Row> Table<R> {
    /// Binds `R` to `scope`, declaring the table on the store if needed.
    pub fn open(store: &Store, scope: Scope) -> Result<Self, BalError> {
        Self::open_with_limit(store, scope, DEFAULT_MAX_SECONDARY_INDEXES)
    }

    /// Like [`Table::open`], allowing up to `max_secondary_indexes` indexes on `R`.
    pub fn open_with_limit(
        store: &Store,
        scope: Scope,
        max_secondary_indexes: usize,
    ) -> Result<Self, BalError> {
        let schema = TableSchema::<R>::for_row();
        schema.validate(max_secondary_indexes)?;
        store.declare_table(schema.name(), schema.secondary_count())?;
        Ok(Self {
            store: store.clone(),
            scope,
            schema: Rc::new(schema),
        })
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn name(&self) -> Name {
        R::TABLE_NAME
    }

    pub fn schema(&self) -> &TableSchema<R> {
        &self.schema
    }

    pub fn begin(&self) -> Result<Cursor<R>, BalError> {
        self.first(IndexSlot::Primary, Direction::Forward)
    }

    pub fn end(&self) -> Cursor<R> {
        Cursor::end(IndexSlot::Primary, Direction::Forward)
    }

    pub fn rbegin(&self) -> Result<Cursor<R>, BalError> {
        self.first(IndexSlot::Primary, Direction::Reverse)
    }

    pub fn rend(&self) -> Cursor<R> {
        Cursor::end(IndexSlot::Primary, Direction::Reverse)
    }

    /// Moves one step in the cursor's own direction; fails at the end.
    pub fn next(&self, cursor: &Cursor<R>) -> Result<Cursor<R>, BalError> {
        let Some(entry) = cursor.entry.as_ref() else {
            return Err(BalError::Validation(
                "cannot advance a cursor past the end".into(),
            ));
        };
        let ascending = cursor.direction == Direction::Forward;
        let next = self.neighbour(cursor.slot, Some(entry), ascending)?;
        self.load(cursor.slot, cursor.direction, next)
    }

    /// Moves one step against the cursor's direction; fails at the first row.
    pub fn prev(&self, cursor: &Cursor<R>) -> Result<Cursor<R>, BalError> {
        let ascending = cursor.direction == Direction::Reverse;
        match self.neighbour(cursor.slot, cursor.entry.as_ref(), ascending)? {
            Some(entry) => self.load(cursor.slot, cursor.direction, Some(entry)),
            None => Err(BalError::Validation(
                "cannot move a cursor before the first row".into(),
            )),
        }
    }

    pub fn iter(&self) -> RowIter<R> {
        RowIter::new(
            self.clone(),
            IndexSlot::Primary,
            Bound::Unbounded,
            Bound::Unbounded,
        )
    }

    pub fn full_range(&self) -> RowIter<R> {
        self.iter()
    }

    /// Rows with `lo <= primary key <= hi`.
    pub fn get_range(&self, lo: R::PrimaryKey, hi: R::PrimaryKey) -> RowIter<R> {
        RowIter::new(
            self.clone(),
            IndexSlot::Primary,
            Bound::Included(Seek::Key(Self::primary_key(lo))),
            Bound::Included(Seek::Key(Self::primary_key(hi))),
        )
    }

    pub fn is_empty(&self) -> Result<bool, BalError> {
        Ok(self.begin()?.is_end())
    }

    /// One past the largest primary key in scope, or the zero key when empty.
    pub fn next_id(&self) -> Result<R::PrimaryKey, BalError> {
        let last = self.rbegin()?;
        match last.row() {
            Some(row) => row.primary_key().incremented(),
            None => Ok(R::PrimaryKey::default()),
        }
    }

    pub fn find(&self, key: R::PrimaryKey) -> Result<Cursor<R>, BalError> {
        let primary = Self::primary_key(key);
        match self.store.find(R::TABLE_NAME, self.scope, &primary)? {
            Some(record) => Ok(Cursor {
                slot: IndexSlot::Primary,
                direction: Direction::Forward,
                entry: Some(IndexEntry::primary(primary)),
                row: Some(self.schema.decode(&record)?),
            }),
            None => Ok(self.end()),
        }
    }

    pub fn find_id(&self, key: R::PrimaryKey) -> Result<Option<R>, BalError> {
        let primary = Self::primary_key(key);
        self.store
            .find(R::TABLE_NAME, self.scope, &primary)?
            .map(|record| self.schema.decode(&record))
            .transpose()
    }

    /// Like [`Table::find_id`] but a missing row aborts with `message`.
    pub fn get_id(&self, key: R::PrimaryKey, message: impl Into<String>) -> Result<R, BalError> {
        self.find_id(key)?
            .ok_or_else(|| BalError::not_found(message))
    }

    pub fn contains(&self, key: R::PrimaryKey) -> Result<bool, BalError> {
        let primary = Self::primary_key(key);
        Ok(self
            .store
            .find(R::TABLE_NAME, self.scope, &primary)?
            .is_some())
    }

    pub fn lower_bound(&self, key: R::PrimaryKey) -> Result<Cursor<R>, BalError> {
        self.seek(
            IndexSlot::Primary,
            Bound::Included(Seek::Key(Self::primary_key(key))),
        )
    }

    pub fn upper_bound(&self, key: R::PrimaryKey) -> Result<Cursor<R>, BalError> {
        self.seek(
            IndexSlot::Primary,
            Bound::Excluded(Seek::Key(Self::primary_key(key))),
        )
    }

    pub fn secondary_index(&self, tag: Name) -> Result<SecondaryIndex<R>, BalError> {
        let slot = self.schema.index_slot(tag)?;
        let kind = self
            .schema
            .descriptor(slot)
            .map(SecondaryIndexDescriptor::kind)
            .ok_or_else(|| BalError::Schema(format!("missing index slot {slot}")))?;
        Ok(SecondaryIndex::new(self.clone(), slot, tag, kind))
    }

    /// Builds a row from `R::default()` and inserts it into every index.
    pub fn create(&self, constructor: impl FnOnce(&mut R)) -> Result<R, BalError> {
        self.insert_row(None, constructor)
    }

    pub fn create_with_payer(
        &self,
        payer: Name,
        constructor: impl FnOnce(&mut R),
    ) -> Result<R, BalError> {
        self.insert_row(Some(payer), constructor)
    }

    pub fn modify(
        &self,
        cursor: &Cursor<R>,
        mutator: impl FnOnce(&mut R),
    ) -> Result<R, BalError> {
        self.update_row(cursor.get()?.primary_key(), None, mutator)
    }

    pub fn modify_with_payer(
        &self,
        cursor: &Cursor<R>,
        payer: Name,
        mutator: impl FnOnce(&mut R),
    ) -> Result<R, BalError> {
        self.update_row(cursor.get()?.primary_key(), Some(payer), mutator)
    }

    /// Applies `mutator` to the stored version of `row`.
    pub fn modify_row(&self, row: &R, mutator: impl FnOnce(&mut R)) -> Result<R, BalError> {
        self.update_row(row.primary_key(), None, mutator)
    }

    /// Erases the row under `cursor` and returns the following cursor in the same
    /// index and direction.
    pub fn erase(&self, cursor: &Cursor<R>) -> Result<Cursor<R>, BalError> {
        let Some(entry) = cursor.entry.as_ref() else {
            return Err(BalError::Validation("cannot erase through an end cursor".into()));
        };
        let following = self.next(cursor)?;
        self.store.erase(R::TABLE_NAME, self.scope, &entry.primary)?;
        Ok(following)
    }

    pub fn erase_row(&self, row: &R) -> Result<(), BalError> {
        self.store
            .erase(R::TABLE_NAME, self.scope, &Self::primary_key(row.primary_key()))
            .map(|_| ())
    }

    fn primary_key(key: R::PrimaryKey) -> EncodedKey {
        TableSchema::<R>::encode_primary(key)
    }

    fn insert_row(
        &self,
        payer: Option<Name>,
        constructor: impl FnOnce(&mut R),
    ) -> Result<R, BalError> {
        let mut row = R::default();
        constructor(&mut row);
        let record = self.schema.record(&row)?;
        self.store.insert(R::TABLE_NAME, self.scope, payer, record)?;
        Ok(row)
    }

    fn update_row(
        &self,
        key: R::PrimaryKey,
        payer: Option<Name>,
        mutator: impl FnOnce(&mut R),
    ) -> Result<R, BalError> {
        let mut row = self.get_id(
            key,
            format!("cannot modify missing row {key:?} in table {}", R::TABLE_NAME),
        )?;
        mutator(&mut row);
        if row.primary_key() != key {
            return Err(BalError::Validation(format!(
                "modify changed the primary key of a row in table {} from {key:?} to {:?}",
                R::TABLE_NAME,
                row.primary_key()
            )));
        }
        let record = self.schema.record(&row)?;
        self.store.modify(R::TABLE_NAME, self.scope, payer, record)?;
        Ok(row)
    }

    pub(crate) fn entries(
        &self,
        slot: IndexSlot,
        start: Bound<Seek>,
        end: Bound<Seek>,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<IndexEntry>, BalError> {
        self.store
            .range(R::TABLE_NAME, self.scope, slot, start, end, direction, limit)
    }

    pub(crate) fn load_row(&self, entry: &IndexEntry) -> Result<R, BalError> {
        let record = self
            .store
            .find(R::TABLE_NAME, self.scope, &entry.primary)?
            .ok_or_else(|| {
                BalError::Decode(format!(
                    "index entry of table {} points at missing row {}",
                    R::TABLE_NAME,
                    hex::encode(entry.primary.as_slice())
                ))
            })?;
        self.schema.decode(&record)
    }

    pub(crate) fn load(
        &self,
        slot: IndexSlot,
        direction: Direction,
        entry: Option<IndexEntry>,
    ) -> Result<Cursor<R>, BalError> {
        let row = entry.as_ref().map(|e| self.load_row(e)).transpose()?;
        Ok(Cursor {
            slot,
            direction,
            entry,
            row,
        })
    }

    pub(crate) fn first(
        &self,
        slot: IndexSlot,
        direction: Direction,
    ) -> Result<Cursor<R>, BalError> {
        let entry = self
            .entries(slot, Bound::Unbounded, Bound::Unbounded, direction, 1)?
            .into_iter()
            .next();
        self.load(slot, direction, entry)
    }

    /// Forward cursor at the first entry at or after `start`.
    pub(crate) fn seek(&self, slot: IndexSlot, start: Bound<Seek>) -> Result<Cursor<R>, BalError> {
        let entry = self
            .entries(slot, start, Bound::Unbounded, Direction::Forward, 1)?
            .into_iter()
            .next();
        self.load(slot, Direction::Forward, entry)
    }

    /// Adjacent entry in key order; from the end position this is the first or
    /// last entry of the index.
    fn neighbour(
        &self,
        slot: IndexSlot,
        from: Option<&IndexEntry>,
        ascending: bool,
    ) -> Result<Option<IndexEntry>, BalError> {
        let (start, end, direction) = match (from, ascending) {
            (Some(entry), true) => (
                Bound::Excluded(Seek::Entry(entry.clone())),
                Bound::Unbounded,
                Direction::Forward,
            ),
            (Some(entry), false) => (
                Bound::Unbounded,
                Bound::Excluded(Seek::Entry(entry.clone())),
                Direction::Reverse,
            ),
            (None, true) => (Bound::Unbounded, Bound::Unbounded, Direction::Forward),
            (None, false) => (Bound::Unbounded, Bound::Unbounded, Direction::Reverse),
        };
        Ok(self
            .entries(slot, start, end, direction, 1)?
            .into_iter()
            .next())
    }
}
