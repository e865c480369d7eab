use crate::error::BalError;
use crate::name::Name;
use crate::storage::encoded_key::EncodedKey;
use crate::storage::engine::{
    Direction, IndexEntry, IndexSlot, RowRecord, Scope, Seek, StorageEngine,
};
use crate::storage::rows::{IndexedRows, missing_row};
use im::{HashMap, OrdMap};
use std::ops::Bound;
use tracing::debug;

/// Fixed per-row charge added to the encoded size when billing a payer.
pub const ROW_OVERHEAD_BYTES: u64 = 112;

#[derive(Debug, Clone, Default)]
struct NativeState {
    declared: HashMap<Name, usize>,
    partitions: OrdMap<(Name, Scope), IndexedRows>,
    billing: OrdMap<(Name, Scope, EncodedKey), (Name, u64)>,
    usage: OrdMap<Name, u64>,
}

/// In-memory engine with native scopes and per-payer resource accounting.
///
/// All state lives in persistent maps, so an undo session is a cheap snapshot.
#[derive(Debug, Default)]
pub struct NativeScopeEngine {
    state: NativeState,
    undo: Vec<NativeState>,
    default_payer: Option<Name>,
}

impl NativeScopeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bills rows created without an explicit payer to `payer`.
    pub fn with_default_payer(mut self, payer: Name) -> Self {
        self.default_payer = Some(payer);
        self
    }

    fn secondary_count(&self, table: Name) -> Result<usize, BalError> {
        self.state
            .declared
            .get(&table)
            .copied()
            .ok_or_else(|| BalError::table_not_declared(table))
    }

    fn partition(&self, table: Name, scope: Scope) -> Result<Option<&IndexedRows>, BalError> {
        self.secondary_count(table)?;
        Ok(self.state.partitions.get(&(table, scope)))
    }

    /// Partition for an insert, created on first use.
    fn partition_for_insert(
        &mut self,
        table: Name,
        scope: Scope,
    ) -> Result<&mut IndexedRows, BalError> {
        let secondary_count = self.secondary_count(table)?;
        Ok(self
            .state
            .partitions
            .entry((table, scope))
            .or_insert_with(|| IndexedRows::new(table, secondary_count)))
    }

    /// Partition that already holds `primary`'s scope; never creates one.
    fn existing_partition(
        &mut self,
        table: Name,
        scope: Scope,
        primary: &EncodedKey,
    ) -> Result<&mut IndexedRows, BalError> {
        self.secondary_count(table)?;
        self.state
            .partitions
            .get_mut(&(table, scope))
            .ok_or_else(|| missing_row(table, primary))
    }

    fn charge(&mut self, table: Name, scope: Scope, payer: Option<Name>, record: &RowRecord) {
        let Some(payer) = payer.or(self.default_payer) else {
            return;
        };
        let bytes = record.billable_bytes() + ROW_OVERHEAD_BYTES;
        self.state
            .billing
            .insert((table, scope, record.primary.clone()), (payer, bytes));
        *self.state.usage.entry(payer).or_insert(0) += bytes;
        debug!(table = %table, scope, payer = %payer, bytes, "charged row storage");
    }

    /// Refunds the current bill for a row and returns who paid it.
    fn refund(&mut self, table: Name, scope: Scope, primary: &EncodedKey) -> Option<Name> {
        let (payer, bytes) = self
            .state
            .billing
            .remove(&(table, scope, primary.clone()))?;
        if let Some(total) = self.state.usage.get_mut(&payer) {
            *total = total.saturating_sub(bytes);
        }
        Some(payer)
    }
}

impl StorageEngine for NativeScopeEngine {
    fn native_scopes(&self) -> bool {
        true
    }

    fn declare_table(&mut self, table: Name, secondary_count: usize) -> Result<(), BalError> {
        match self.state.declared.get(&table) {
            Some(existing) if *existing != secondary_count => Err(BalError::Schema(format!(
                "table {table} already declared with {existing} secondary indexes"
            ))),
            Some(_) => Ok(()),
            None => {
                self.state.declared.insert(table, secondary_count);
                Ok(())
            }
        }
    }

    fn ordered_insert(
        &mut self,
        table: Name,
        scope: Scope,
        payer: Option<Name>,
        record: RowRecord,
    ) -> Result<(), BalError> {
        let billed = record.clone();
        self.partition_for_insert(table, scope)?.insert(record)?;
        self.charge(table, scope, payer, &billed);
        Ok(())
    }

    fn ordered_find(
        &self,
        table: Name,
        scope: Scope,
        primary: &EncodedKey,
    ) -> Result<Option<RowRecord>, BalError> {
        Ok(self
            .partition(table, scope)?
            .and_then(|rows| rows.get(primary))
            .cloned())
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
        match self.partition(table, scope)? {
            Some(rows) => rows.range(slot, &start, &end, direction, limit),
            None => Ok(Vec::new()),
        }
    }

    fn ordered_erase(
        &mut self,
        table: Name,
        scope: Scope,
        primary: &EncodedKey,
    ) -> Result<RowRecord, BalError> {
        let rows = self.existing_partition(table, scope, primary)?;
        let record = rows.erase(primary)?;
        if rows.is_empty() {
            self.state.partitions.remove(&(table, scope));
        }
        self.refund(table, scope, primary);
        Ok(record)
    }

    fn ordered_modify(
        &mut self,
        table: Name,
        scope: Scope,
        payer: Option<Name>,
        record: RowRecord,
    ) -> Result<(), BalError> {
        let billed = record.clone();
        self.existing_partition(table, scope, &billed.primary)?.modify(record)?;
        let previous_payer = self.refund(table, scope, &billed.primary);
        self.charge(table, scope, payer.or(previous_payer), &billed);
        Ok(())
    }

    fn begin_undo(&mut self) -> bool {
        self.undo.push(self.state.clone());
        true
    }

    fn commit_undo(&mut self) {
        self.undo.pop();
    }

    fn rollback_undo(&mut self) {
        if let Some(previous) = self.undo.pop() {
            self.state = previous;
        }
    }

    fn usage(&self, payer: Name) -> u64 {
        self.state.usage.get(&payer).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::{NativeScopeEngine, ROW_OVERHEAD_BYTES};
    use crate::error::BalErrorCode;
    use crate::name::Name;
    use crate::storage::encoded_key::EncodedKey;
    use crate::storage::engine::{Direction, IndexSlot, RowRecord, StorageEngine};
    use smallvec::SmallVec;
    use std::ops::Bound;

    const FRUIT: Name = Name::new("fruit");

    fn record(pk: u64, payload: &[u8]) -> RowRecord {
        RowRecord {
            primary: EncodedKey::from_u64(pk),
            bytes: payload.to_vec(),
            secondary: SmallVec::new(),
        }
    }

    #[test]
    fn undeclared_table_is_rejected() {
        let engine = NativeScopeEngine::new();
        let err = engine
            .ordered_find(FRUIT, 0, &EncodedKey::from_u64(1))
            .expect_err("undeclared");
        assert_eq!(err.code(), BalErrorCode::TableNotDeclared);
    }

    #[test]
    fn redeclaring_with_other_shape_fails() {
        let mut engine = NativeScopeEngine::new();
        engine.declare_table(FRUIT, 1).expect("declare");
        engine.declare_table(FRUIT, 1).expect("idempotent");
        assert!(engine.declare_table(FRUIT, 2).is_err());
    }

    #[test]
    fn payer_is_charged_and_refunded() {
        let alice = Name::new("alice");
        let bob = Name::new("bob");
        let mut engine = NativeScopeEngine::new();
        engine.declare_table(FRUIT, 0).expect("declare");
        engine
            .ordered_insert(FRUIT, 1, Some(alice), record(1, b"abcd"))
            .expect("insert");
        assert_eq!(engine.usage(alice), 8 + 4 + ROW_OVERHEAD_BYTES);

        engine
            .ordered_modify(FRUIT, 1, Some(bob), record(1, b"ab"))
            .expect("modify");
        assert_eq!(engine.usage(alice), 0);
        assert_eq!(engine.usage(bob), 8 + 2 + ROW_OVERHEAD_BYTES);

        engine
            .ordered_modify(FRUIT, 1, None, record(1, b"abc"))
            .expect("modify keeps payer");
        assert_eq!(engine.usage(bob), 8 + 3 + ROW_OVERHEAD_BYTES);

        engine
            .ordered_erase(FRUIT, 1, &EncodedKey::from_u64(1))
            .expect("erase");
        assert_eq!(engine.usage(bob), 0);
    }

    #[test]
    fn partitions_exist_only_while_they_hold_rows() {
        let mut engine = NativeScopeEngine::new();
        engine.declare_table(FRUIT, 0).expect("declare");

        let err = engine
            .ordered_erase(FRUIT, 5, &EncodedKey::from_u64(1))
            .expect_err("nothing to erase");
        assert_eq!(err.code(), BalErrorCode::NotFound);
        let err = engine
            .ordered_modify(FRUIT, 6, None, record(1, b"x"))
            .expect_err("nothing to modify");
        assert_eq!(err.code(), BalErrorCode::NotFound);
        assert!(engine.state.partitions.is_empty());

        engine.ordered_insert(FRUIT, 5, None, record(1, b"x")).expect("insert");
        engine.ordered_insert(FRUIT, 5, None, record(2, b"y")).expect("insert");
        engine
            .ordered_erase(FRUIT, 5, &EncodedKey::from_u64(1))
            .expect("erase");
        assert_eq!(engine.state.partitions.len(), 1);
        engine
            .ordered_erase(FRUIT, 5, &EncodedKey::from_u64(2))
            .expect("erase");
        assert!(engine.state.partitions.is_empty());

        let err = engine
            .ordered_erase(Name::new("veg"), 5, &EncodedKey::from_u64(1))
            .expect_err("undeclared");
        assert_eq!(err.code(), BalErrorCode::TableNotDeclared);
    }

    #[test]
    fn rollback_restores_rows_and_usage() {
        let alice = Name::new("alice");
        let mut engine = NativeScopeEngine::new().with_default_payer(alice);
        engine.declare_table(FRUIT, 0).expect("declare");
        engine.ordered_insert(FRUIT, 0, None, record(1, b"x")).expect("insert");
        let before = engine.usage(alice);

        assert!(engine.begin_undo());
        engine.ordered_insert(FRUIT, 0, None, record(2, b"y")).expect("insert");
        engine
            .ordered_erase(FRUIT, 0, &EncodedKey::from_u64(1))
            .expect("erase");
        engine.rollback_undo();

        assert_eq!(engine.usage(alice), before);
        let all = engine
            .ordered_range(
                FRUIT,
                0,
                IndexSlot::Primary,
                Bound::Unbounded,
                Bound::Unbounded,
                Direction::Forward,
                usize::MAX,
            )
            .expect("range");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].primary, EncodedKey::from_u64(1));
    }
}
