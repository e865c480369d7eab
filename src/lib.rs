pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod keys;
pub mod name;
pub mod runtime;
pub mod schema;
pub mod storage;
pub mod table;

pub use config::{BalConfig, ExtraDataPolicy, ScopeMode};
pub use dispatch::{ActionRegistry, Dispatcher, ParseResult, ParsedAction};
pub use error::{BalError, BalErrorCode, ensure};
pub use keys::{Id, IndexKey, KeyKind, PrimaryKey};
pub use name::Name;
pub use runtime::{ActionContext, ApplyOutcome, Contract, ContractRuntime, Host, Timestamp};
pub use schema::SchemaRegistry;
pub use storage::{FlatMemoryEngine, NativeScopeEngine, Scope, ScopeEmulation, Store};
pub use table::{Cursor, Row, SecondaryIndex, SecondaryIndexDescriptor, Table};
