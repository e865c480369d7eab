pub mod encoded_key;
pub mod engine;
pub mod flat;
pub mod native;
pub mod rows;
pub mod scope;

pub use encoded_key::EncodedKey;
pub use engine::{
    Direction, FlatEngine, IndexEntry, IndexSlot, RowRecord, Scope, Seek, StorageEngine,
};
pub use flat::FlatMemoryEngine;
pub use native::NativeScopeEngine;
pub use scope::ScopeEmulation;

use crate::error::BalError;
use crate::name::Name;
use std::cell::RefCell;
use std::ops::Bound;
use std::rc::Rc;

/// Shared handle to the engine backing every table of a contract.
///
/// Execution is single-threaded and run to completion, so a `RefCell` provides the
/// exclusion; no borrow is held across user callbacks.
#[derive(Clone)]
pub struct Store {
    engine: Rc<RefCell<Box<dyn StorageEngine>>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("native_scopes", &self.native_scopes())
            .finish()
    }
}

impl Store {
    pub fn new(engine: impl StorageEngine + 'static) -> Self {
        Self {
            engine: Rc::new(RefCell::new(Box::new(engine))),
        }
    }

    pub fn native_scopes(&self) -> bool {
        self.engine.borrow().native_scopes()
    }

    pub fn usage(&self, payer: Name) -> u64 {
        self.engine.borrow().usage(payer)
    }

    pub fn declare_table(&self, table: Name, secondary_count: usize) -> Result<(), BalError> {
        self.engine.borrow_mut().declare_table(table, secondary_count)
    }

    pub fn insert(
        &self,
        table: Name,
        scope: Scope,
        payer: Option<Name>,
        record: RowRecord,
    ) -> Result<(), BalError> {
        self.engine
            .borrow_mut()
            .ordered_insert(table, scope, payer, record)
    }

    pub fn find(
        &self,
        table: Name,
        scope: Scope,
        primary: &EncodedKey,
    ) -> Result<Option<RowRecord>, BalError> {
        self.engine.borrow().ordered_find(table, scope, primary)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn range(
        &self,
        table: Name,
        scope: Scope,
        slot: IndexSlot,
        start: Bound<Seek>,
        end: Bound<Seek>,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<IndexEntry>, BalError> {
        self.engine
            .borrow()
            .ordered_range(table, scope, slot, start, end, direction, limit)
    }

    pub fn erase(
        &self,
        table: Name,
        scope: Scope,
        primary: &EncodedKey,
    ) -> Result<RowRecord, BalError> {
        self.engine.borrow_mut().ordered_erase(table, scope, primary)
    }

    pub fn modify(
        &self,
        table: Name,
        scope: Scope,
        payer: Option<Name>,
        record: RowRecord,
    ) -> Result<(), BalError> {
        self.engine
            .borrow_mut()
            .ordered_modify(table, scope, payer, record)
    }

    pub fn begin_undo(&self) -> bool {
        self.engine.borrow_mut().begin_undo()
    }

    pub fn commit_undo(&self) {
        self.engine.borrow_mut().commit_undo();
    }

    pub fn rollback_undo(&self) {
        self.engine.borrow_mut().rollback_undo();
    }
}
