use crate::error::BalError;
use crate::keys::{IndexKey, IndexKeyType, KeyKind, PrimaryKey};
use crate::name::Name;
use crate::storage::{EncodedKey, RowRecord};
use crate::table::Row;
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

type KeyExtractor<R> = Rc<dyn Fn(&R) -> Result<IndexKey, BalError>>;

/// One secondary index of a row type: its tag, key width and key extractor.
pub struct SecondaryIndexDescriptor<R> {
    tag: Name,
    kind: KeyKind,
    extract: KeyExtractor<R>,
}

impl<R> Clone for SecondaryIndexDescriptor<R> {
    fn clone(&self) -> Self {
        Self {
            tag: self.tag,
            kind: self.kind,
            extract: Rc::clone(&self.extract),
        }
    }
}

impl<R> fmt::Debug for SecondaryIndexDescriptor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondaryIndexDescriptor")
            .field("tag", &self.tag.to_string())
            .field("kind", &self.kind)
            .finish()
    }
}

impl<R: 'static> SecondaryIndexDescriptor<R> {
    pub fn new<K, F>(tag: Name, extract: F) -> Self
    where
        K: IndexKeyType,
        F: Fn(&R) -> K + 'static,
    {
        Self {
            tag,
            kind: K::KIND,
            extract: Rc::new(move |row: &R| Ok(extract(row).into_index_key())),
        }
    }

    /// For keys that can fail to build, such as composites of wide fields.
    pub fn try_new<K, F>(tag: Name, extract: F) -> Self
    where
        K: IndexKeyType,
        F: Fn(&R) -> Result<K, BalError> + 'static,
    {
        Self {
            tag,
            kind: K::KIND,
            extract: Rc::new(move |row: &R| extract(row).map(IndexKeyType::into_index_key)),
        }
    }

    pub fn tag(&self) -> Name {
        self.tag
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn key_for(&self, row: &R) -> Result<IndexKey, BalError> {
        (self.extract)(row)
    }
}

/// Validated index layout of a row type.
pub struct TableSchema<R> {
    name: Name,
    indexes: Vec<SecondaryIndexDescriptor<R>>,
}

impl<R: Row> TableSchema<R> {
    pub fn for_row() -> Self {
        Self {
            name: R::TABLE_NAME,
            indexes: R::secondary_indexes(),
        }
    }

    pub fn name(&self) -> Name {
        self.name
    }

    pub fn indexes(&self) -> &[SecondaryIndexDescriptor<R>] {
        &self.indexes
    }

    pub fn secondary_count(&self) -> usize {
        self.indexes.len()
    }

    pub fn validate(&self, max_secondary_indexes: usize) -> Result<(), BalError> {
        if self.name.is_empty() {
            return Err(BalError::Schema("table name must not be empty".into()));
        }
        if self.indexes.len() > max_secondary_indexes {
            return Err(BalError::Schema(format!(
                "table {} declares {} secondary indexes, limit is {max_secondary_indexes}",
                self.name,
                self.indexes.len()
            )));
        }
        let mut seen = HashSet::new();
        for index in &self.indexes {
            if !seen.insert(index.tag) {
                return Err(BalError::Schema(format!(
                    "table {} declares index tag {} more than once",
                    self.name, index.tag
                )));
            }
        }
        Ok(())
    }

    /// Position of the index tagged `tag`; exactly one descriptor must match.
    pub fn index_slot(&self, tag: Name) -> Result<usize, BalError> {
        let mut matches = self
            .indexes
            .iter()
            .enumerate()
            .filter(|(_, index)| index.tag == tag)
            .map(|(slot, _)| slot);
        match (matches.next(), matches.next()) {
            (Some(slot), None) => Ok(slot),
            (None, _) => Err(BalError::Schema(format!(
                "table {} has no secondary index tagged {tag}",
                self.name
            ))),
            (Some(_), Some(_)) => Err(BalError::Schema(format!(
                "table {} has an ambiguous secondary index tag {tag}",
                self.name
            ))),
        }
    }

    pub fn descriptor(&self, slot: usize) -> Option<&SecondaryIndexDescriptor<R>> {
        self.indexes.get(slot)
    }

    pub fn encode_primary(key: R::PrimaryKey) -> EncodedKey {
        EncodedKey::from_u64(key.to_raw())
    }

    pub fn record(&self, row: &R) -> Result<RowRecord, BalError> {
        let bytes = rmp_serde::to_vec(row).map_err(|e| BalError::Encode(e.to_string()))?;
        let mut secondary = SmallVec::with_capacity(self.indexes.len());
        for index in &self.indexes {
            let key = index.key_for(row)?;
            if key.kind() != index.kind {
                return Err(BalError::Schema(format!(
                    "index {} of table {} produced a {} key, expected {}",
                    index.tag,
                    self.name,
                    key.kind().as_str(),
                    index.kind.as_str()
                )));
            }
            secondary.push(key.encode());
        }
        Ok(RowRecord {
            primary: Self::encode_primary(row.primary_key()),
            bytes,
            secondary,
        })
    }

    pub fn decode(&self, record: &RowRecord) -> Result<R, BalError> {
        rmp_serde::from_slice(&record.bytes).map_err(|e| BalError::Decode(e.to_string()))
    }
}
