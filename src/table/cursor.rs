use crate::error::BalError;
use crate::storage::{Direction, IndexEntry, IndexSlot, Seek};
use crate::table::{Row, Table};
use std::ops::Bound;

/// Read-only position in one index of a table.
///
/// A cursor remembers which index and direction it walks, so stepping or erasing
/// through it stays within that index. `entry == None` is the end position.
#[derive(Debug, Clone)]
pub struct Cursor<R> {
    pub(crate) slot: IndexSlot,
    pub(crate) direction: Direction,
    pub(crate) entry: Option<IndexEntry>,
    pub(crate) row: Option<R>,
}

impl<R> Cursor<R> {
    pub(crate) fn end(slot: IndexSlot, direction: Direction) -> Self {
        Self {
            slot,
            direction,
            entry: None,
            row: None,
        }
    }

    pub fn is_end(&self) -> bool {
        self.entry.is_none()
    }

    pub fn slot(&self) -> IndexSlot {
        self.slot
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn entry(&self) -> Option<&IndexEntry> {
        self.entry.as_ref()
    }

    pub fn row(&self) -> Option<&R> {
        self.row.as_ref()
    }

    pub fn get(&self) -> Result<&R, BalError> {
        self.row
            .as_ref()
            .ok_or_else(|| BalError::Validation("cannot dereference an end cursor".into()))
    }
}

impl<R> PartialEq for Cursor<R> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.direction == other.direction && self.entry == other.entry
    }
}

/// Double-ended iterator over the rows of one index between two bounds.
///
/// Each step re-seeks from the last yielded entry, so the iterator tolerates
/// mutations of rows it has already passed.
pub struct RowIter<R: Row> {
    table: Table<R>,
    slot: IndexSlot,
    front: Bound<Seek>,
    back: Bound<Seek>,
    done: bool,
}

impl<R: Row> RowIter<R> {
    pub(crate) fn new(
        table: Table<R>,
        slot: IndexSlot,
        front: Bound<Seek>,
        back: Bound<Seek>,
    ) -> Self {
        Self {
            table,
            slot,
            front,
            back,
            done: false,
        }
    }

    fn step(&mut self, direction: Direction) -> Option<Result<R, BalError>> {
        if self.done {
            return None;
        }
        let found = self.table.entries(
            self.slot,
            self.front.clone(),
            self.back.clone(),
            direction,
            1,
        );
        let entry = match found {
            Ok(entries) => entries.into_iter().next(),
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };
        let Some(entry) = entry else {
            self.done = true;
            return None;
        };
        let row = self.table.load_row(&entry);
        match direction {
            Direction::Forward => self.front = Bound::Excluded(Seek::Entry(entry)),
            Direction::Reverse => self.back = Bound::Excluded(Seek::Entry(entry)),
        }
        if row.is_err() {
            self.done = true;
        }
        Some(row)
    }
}

impl<R: Row> Iterator for RowIter<R> {
    type Item = Result<R, BalError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step(Direction::Forward)
    }
}

impl<R: Row> DoubleEndedIterator for RowIter<R> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.step(Direction::Reverse)
    }
}
