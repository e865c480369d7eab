//! Contract runtime: registers a contract's tables and actions once, then runs
//! each incoming payload as one atomic invocation.

use crate::config::{BalConfig, ExtraDataPolicy};
use crate::dispatch::{ActionRegistry, Dispatcher, ParseResult};
use crate::error::BalError;
use crate::name::Name;
use crate::schema::SchemaRegistry;
use crate::storage::{Scope, Store};
use crate::table::{Row, Table};
use std::rc::Rc;
use tracing::{info, warn};

/// Seconds since the Unix epoch, as the host reports block time.
pub type Timestamp = u64;

/// Services the hosting chain provides to a running contract.
pub trait Host {
    fn require_authorization(&self, account: Name) -> Result<(), BalError>;

    fn account_exists(&self, account: Name) -> bool;

    fn current_time(&self) -> Timestamp;

    fn owner_account(&self) -> Name;
}

/// What a contract hands to its handlers for one invocation.
#[derive(Clone)]
pub struct ActionContext {
    store: Store,
    schema: Rc<SchemaRegistry>,
    host: Rc<dyn Host>,
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("store", &self.store)
            .field("tables", &self.schema.tables().len())
            .finish()
    }
}

impl ActionContext {
    pub fn new(store: Store, schema: Rc<SchemaRegistry>, host: Rc<dyn Host>) -> Self {
        Self {
            store,
            schema,
            host,
        }
    }

    /// Table `R` within `scope`; `R` must have been registered by the contract.
    pub fn table<R: Row>(&self, scope: Scope) -> Result<Table<R>, BalError> {
        if !self.schema.contains(R::TABLE_NAME) {
            return Err(BalError::table_not_declared(R::TABLE_NAME));
        }
        Table::open_with_limit(&self.store, scope, self.schema.max_secondary_indexes())
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn require_authorization(&self, account: Name) -> Result<(), BalError> {
        self.host.require_authorization(account)
    }

    pub fn account_exists(&self, account: Name) -> bool {
        self.host.account_exists(account)
    }

    pub fn current_time(&self) -> Timestamp {
        self.host.current_time()
    }

    pub fn owner_account(&self) -> Name {
        self.host.owner_account()
    }
}

/// A portable contract: its tables, its actions, and how to build an instance
/// for one invocation.
pub trait Contract: Sized + 'static {
    fn tables(registry: &mut SchemaRegistry) -> Result<(), BalError>;

    fn actions(registry: &mut ActionRegistry<Self>) -> Result<(), BalError>;

    fn instantiate(context: ActionContext) -> Result<Self, BalError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The payload was not addressed to this contract.
    Ignored,
    /// Addressed to this contract but not run.
    Rejected { reason: ParseResult },
    Applied { action: Name, extra_data: bool },
    /// The handler failed and its writes were rolled back.
    Aborted { action: Name, error: BalError },
}

pub struct ContractRuntime<C: Contract> {
    config: BalConfig,
    store: Store,
    schema: Rc<SchemaRegistry>,
    host: Rc<dyn Host>,
    dispatcher: Dispatcher<C>,
}

impl<C: Contract> std::fmt::Debug for ContractRuntime<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractRuntime")
            .field("contract", &self.config.contract_name)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl<C: Contract> ContractRuntime<C> {
    pub fn initialize(
        config: BalConfig,
        store: Store,
        host: impl Host + 'static,
    ) -> Result<Self, BalError> {
        config.validate()?;
        let mut schema = SchemaRegistry::from_config(&config);
        C::tables(&mut schema)?;
        schema.materialize(&store)?;

        let mut actions = ActionRegistry::new();
        C::actions(&mut actions)?;
        let dispatcher = Dispatcher::new(&config, actions)?;
        info!(
            contract = %config.contract_name,
            tables = schema.tables().len(),
            actions = dispatcher.action_count(),
            native_scopes = store.native_scopes(),
            "contract initialized"
        );
        Ok(Self {
            config,
            store,
            schema: Rc::new(schema),
            host: Rc::new(host),
            dispatcher,
        })
    }

    pub fn config(&self) -> &BalConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher<C> {
        &self.dispatcher
    }

    pub fn context(&self) -> ActionContext {
        ActionContext::new(
            self.store.clone(),
            Rc::clone(&self.schema),
            Rc::clone(&self.host),
        )
    }

    /// Runs one host-delivered payload.
    ///
    /// `Err` means the host must abort its transaction: a parse failure under
    /// `abort_on_parse_failure`, or a failed handler on a store without undo.
    pub fn apply(&self, payload: &[u8]) -> Result<ApplyOutcome, BalError> {
        let (result, parsed) = self.dispatcher.parse(payload);
        let action = match (result, parsed) {
            (ParseResult::WrongMagic, _) => return Ok(ApplyOutcome::Ignored),
            (ParseResult::ExtraData, Some(_))
                if self.config.extra_data_policy == ExtraDataPolicy::Reject =>
            {
                warn!(
                    contract = %self.config.contract_name,
                    "rejecting action carrying extra data"
                );
                return Ok(ApplyOutcome::Rejected {
                    reason: ParseResult::ExtraData,
                });
            }
            (ParseResult::ParseOk | ParseResult::ExtraData, Some(action)) => action,
            (reason, _) => {
                if self.config.abort_on_parse_failure {
                    return Err(BalError::Decode(format!(
                        "payload for {} could not be parsed",
                        self.config.contract_name
                    )));
                }
                return Ok(ApplyOutcome::Rejected { reason });
            }
        };

        let extra_data = result == ParseResult::ExtraData;
        let name = action.name();
        let undo = self.store.begin_undo();
        let run = C::instantiate(self.context())
            .and_then(|mut contract| self.dispatcher.dispatch(&mut contract, action));
        match run {
            Ok(()) => {
                if undo {
                    self.store.commit_undo();
                }
                info!(
                    contract = %self.config.contract_name,
                    action = %name,
                    extra_data,
                    "action applied"
                );
                Ok(ApplyOutcome::Applied {
                    action: name,
                    extra_data,
                })
            }
            Err(error) if undo => {
                self.store.rollback_undo();
                warn!(
                    contract = %self.config.contract_name,
                    action = %name,
                    error = %error,
                    code = error.code_str(),
                    "action aborted, writes rolled back"
                );
                Ok(ApplyOutcome::Aborted {
                    action: name,
                    error,
                })
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionContext, ApplyOutcome, Contract, ContractRuntime, Host, Timestamp};
    use crate::config::BalConfig;
    use crate::dispatch::{ActionRegistry, ParseResult, encode_binary_action};
    use crate::error::{BalError, BalErrorCode};
    use crate::name::Name;
    use crate::schema::SchemaRegistry;
    use crate::table::Row;
    use serde::{Deserialize, Serialize};

    struct FixedHost;

    impl Host for FixedHost {
        fn require_authorization(&self, account: Name) -> Result<(), BalError> {
            if account == Name::new("alice") {
                Ok(())
            } else {
                Err(BalError::Unauthorized { account })
            }
        }

        fn account_exists(&self, account: Name) -> bool {
            account == Name::new("alice")
        }

        fn current_time(&self) -> Timestamp {
            1_700_000_000
        }

        fn owner_account(&self) -> Name {
            Name::new("counter")
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Count {
        id: u64,
        value: u64,
    }

    impl Row for Count {
        const TABLE_NAME: Name = Name::new("counts");
        type PrimaryKey = u64;

        fn primary_key(&self) -> u64 {
            self.id
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Unregistered {
        id: u64,
    }

    impl Row for Unregistered {
        const TABLE_NAME: Name = Name::new("unregistered");
        type PrimaryKey = u64;

        fn primary_key(&self) -> u64 {
            self.id
        }
    }

    struct Counter {
        context: ActionContext,
    }

    impl Counter {
        fn bump(&mut self, by: u64) -> Result<(), BalError> {
            self.context.require_authorization(Name::new("alice"))?;
            let table = self.context.table::<Count>(0)?;
            match table.find_id(0)? {
                Some(row) => {
                    table.modify_row(&row, |c| c.value += by)?;
                }
                None => {
                    table.create(|c| c.value = by)?;
                }
            }
            Ok(())
        }

        fn failing(&mut self) -> Result<(), BalError> {
            let table = self.context.table::<Count>(0)?;
            table.create(|c| {
                c.id = 99;
                c.value = 1;
            })?;
            Err(BalError::Aborted("always fails".into()))
        }

        fn stray(&mut self) -> Result<(), BalError> {
            self.context.table::<Unregistered>(0).map(|_| ())
        }
    }

    impl Contract for Counter {
        fn tables(registry: &mut SchemaRegistry) -> Result<(), BalError> {
            registry.register::<Count>().map(|_| ())
        }

        fn actions(registry: &mut ActionRegistry<Self>) -> Result<(), BalError> {
            registry
                .action(Name::new("bump"), Counter::bump)?
                .action(Name::new("failing"), Counter::failing)?
                .action(Name::new("stray"), Counter::stray)?;
            Ok(())
        }

        fn instantiate(context: ActionContext) -> Result<Self, BalError> {
            Ok(Self { context })
        }
    }

    fn runtime() -> ContractRuntime<Counter> {
        let config = BalConfig::new("counter");
        let store = config.build_store();
        ContractRuntime::initialize(config, store, FixedHost).expect("initialize")
    }

    fn total(runtime: &ContractRuntime<Counter>) -> u64 {
        runtime
            .context()
            .table::<Count>(0)
            .expect("table")
            .find_id(0)
            .expect("find")
            .map(|c| c.value)
            .unwrap_or(0)
    }

    #[test]
    fn applies_and_persists_across_invocations() {
        let runtime = runtime();
        for _ in 0..2 {
            let outcome = runtime
                .apply(&encode_binary_action("counter", 0, &(5u64,)))
                .expect("apply");
            assert_eq!(
                outcome,
                ApplyOutcome::Applied {
                    action: Name::new("bump"),
                    extra_data: false
                }
            );
        }
        assert_eq!(total(&runtime), 10);
    }

    #[test]
    fn failed_handler_is_rolled_back() {
        let runtime = runtime();
        let outcome = runtime
            .apply(&encode_binary_action("counter", 1, &()))
            .expect("apply");
        match outcome {
            ApplyOutcome::Aborted { action, error } => {
                assert_eq!(action, Name::new("failing"));
                assert_eq!(error.code(), BalErrorCode::Aborted);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        let table = runtime.context().table::<Count>(0).expect("table");
        assert!(!table.contains(99).expect("contains"));
    }

    #[test]
    fn unregistered_tables_are_refused() {
        let runtime = runtime();
        let outcome = runtime
            .apply(&encode_binary_action("counter", 2, &()))
            .expect("apply");
        match outcome {
            ApplyOutcome::Aborted { error, .. } => {
                assert_eq!(error.code(), BalErrorCode::TableNotDeclared)
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn foreign_and_broken_payloads() {
        let runtime = runtime();
        assert_eq!(
            runtime
                .apply(&encode_binary_action("other", 0, &(1u64,)))
                .expect("apply"),
            ApplyOutcome::Ignored
        );
        assert_eq!(
            runtime
                .apply(&encode_binary_action("counter", 7, &()))
                .expect("apply"),
            ApplyOutcome::Rejected {
                reason: ParseResult::ParseFailed
            }
        );

        let config = BalConfig::strict("counter");
        let store = config.build_store();
        let strict = ContractRuntime::<Counter>::initialize(config, store, FixedHost)
            .expect("initialize");
        assert!(strict.apply(&encode_binary_action("counter", 7, &())).is_err());

        let mut payload = encode_binary_action("counter", 0, &(1u64,));
        payload.push(0);
        assert_eq!(
            strict.apply(&payload).expect("apply"),
            ApplyOutcome::Rejected {
                reason: ParseResult::ExtraData
            }
        );
        assert_eq!(total(&strict), 0);
    }
}
