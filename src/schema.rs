use crate::config::BalConfig;
use crate::error::BalError;
use crate::keys::KeyKind;
use crate::name::Name;
use crate::storage::Store;
use crate::table::{Row, TableSchema};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDeclaration {
    pub tag: Name,
    pub kind: KeyKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDeclaration {
    pub name: Name,
    pub indexes: Vec<IndexDeclaration>,
}

/// Row types a contract stores, collected once at startup.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    max_secondary_indexes: usize,
    tables: Vec<TableDeclaration>,
}

impl SchemaRegistry {
    pub fn new(max_secondary_indexes: usize) -> Self {
        Self {
            max_secondary_indexes,
            tables: Vec::new(),
        }
    }

    pub fn from_config(config: &BalConfig) -> Self {
        Self::new(config.max_secondary_indexes)
    }

    pub fn register<R: Row>(&mut self) -> Result<&mut Self, BalError> {
        let schema = TableSchema::<R>::for_row();
        schema.validate(self.max_secondary_indexes)?;
        if self.contains(schema.name()) {
            return Err(BalError::Schema(format!(
                "table {} registered more than once",
                schema.name()
            )));
        }
        self.tables.push(TableDeclaration {
            name: schema.name(),
            indexes: schema
                .indexes()
                .iter()
                .map(|index| IndexDeclaration {
                    tag: index.tag(),
                    kind: index.kind(),
                })
                .collect(),
        });
        Ok(self)
    }

    pub fn max_secondary_indexes(&self) -> usize {
        self.max_secondary_indexes
    }

    pub fn contains(&self, table: Name) -> bool {
        self.tables.iter().any(|t| t.name == table)
    }

    pub fn tables(&self) -> &[TableDeclaration] {
        &self.tables
    }

    /// Declares every registered table on `store`.
    pub fn materialize(&self, store: &Store) -> Result<(), BalError> {
        for table in &self.tables {
            store.declare_table(table.name, table.indexes.len())?;
            info!(
                table = %table.name,
                secondary_indexes = table.indexes.len(),
                native_scopes = store.native_scopes(),
                "declared table"
            );
        }
        Ok(())
    }
}
