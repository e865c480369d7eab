use crate::error::BalError;
use crate::storage::{FlatMemoryEngine, NativeScopeEngine, ScopeEmulation, Store};

/// What to do with an action whose payload decoded but left bytes unread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtraDataPolicy {
    #[default]
    Execute,
    Reject,
}

/// Which in-memory backend [`BalConfig::build_store`] creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeMode {
    #[default]
    Native,
    Emulated,
}

pub const DEFAULT_MAX_DECODE_DEPTH: usize = 20;
pub const DEFAULT_MAX_SECONDARY_INDEXES: usize = 16;

/// Runtime configuration for a contract deployment.
#[derive(Debug, Clone)]
pub struct BalConfig {
    /// Component of the dispatch magic, `contract-action/<name>-1.0`.
    pub contract_name: String,
    pub max_decode_depth: usize,
    pub max_secondary_indexes: usize,
    pub extra_data_policy: ExtraDataPolicy,
    /// Report undecodable payloads to the host as an error instead of dropping them.
    pub abort_on_parse_failure: bool,
    pub log_payloads: bool,
    pub scope_mode: ScopeMode,
}

impl Default for BalConfig {
    fn default() -> Self {
        Self {
            contract_name: String::new(),
            max_decode_depth: DEFAULT_MAX_DECODE_DEPTH,
            max_secondary_indexes: DEFAULT_MAX_SECONDARY_INDEXES,
            extra_data_policy: ExtraDataPolicy::Execute,
            abort_on_parse_failure: false,
            log_payloads: true,
            scope_mode: ScopeMode::Native,
        }
    }
}

impl BalConfig {
    pub fn new(contract_name: impl Into<String>) -> Self {
        Self {
            contract_name: contract_name.into(),
            ..Self::default()
        }
    }

    /// Rejects trailing payload bytes and surfaces parse failures to the host.
    pub fn strict(contract_name: impl Into<String>) -> Self {
        Self {
            contract_name: contract_name.into(),
            extra_data_policy: ExtraDataPolicy::Reject,
            abort_on_parse_failure: true,
            ..Self::default()
        }
    }

    /// Runs on the scope emulation adapter so flat backends get exercised locally.
    pub fn development(contract_name: impl Into<String>) -> Self {
        Self {
            contract_name: contract_name.into(),
            scope_mode: ScopeMode::Emulated,
            log_payloads: true,
            ..Self::default()
        }
    }

    pub fn with_scope_mode(mut self, scope_mode: ScopeMode) -> Self {
        self.scope_mode = scope_mode;
        self
    }

    pub fn with_extra_data_policy(mut self, policy: ExtraDataPolicy) -> Self {
        self.extra_data_policy = policy;
        self
    }

    pub fn with_max_decode_depth(mut self, depth: usize) -> Self {
        self.max_decode_depth = depth;
        self
    }

    pub fn with_max_secondary_indexes(mut self, limit: usize) -> Self {
        self.max_secondary_indexes = limit;
        self
    }

    pub fn with_abort_on_parse_failure(mut self, abort: bool) -> Self {
        self.abort_on_parse_failure = abort;
        self
    }

    pub fn magic(&self) -> String {
        crate::dispatch::envelope::magic(&self.contract_name)
    }

    pub fn validate(&self) -> Result<(), BalError> {
        if self.contract_name.is_empty() {
            return Err(BalError::InvalidConfig {
                message: "contract_name must not be empty".into(),
            });
        }
        if self.contract_name.chars().any(char::is_whitespace) {
            return Err(BalError::InvalidConfig {
                message: "contract_name must not contain whitespace".into(),
            });
        }
        if self.max_decode_depth == 0 {
            return Err(BalError::InvalidConfig {
                message: "max_decode_depth must be > 0".into(),
            });
        }
        if self.max_secondary_indexes == 0 {
            return Err(BalError::InvalidConfig {
                message: "max_secondary_indexes must be > 0".into(),
            });
        }
        Ok(())
    }

    /// Fresh in-memory store of the configured scope mode.
    pub fn build_store(&self) -> Store {
        match self.scope_mode {
            ScopeMode::Native => Store::new(NativeScopeEngine::new()),
            ScopeMode::Emulated => Store::new(ScopeEmulation::new(FlatMemoryEngine::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BalConfig, ExtraDataPolicy, ScopeMode};

    #[test]
    fn profiles_validate() {
        for config in [
            BalConfig::new("tally"),
            BalConfig::strict("tally"),
            BalConfig::development("tally"),
        ] {
            config.validate().expect("valid profile");
        }
        let strict = BalConfig::strict("tally");
        assert_eq!(strict.extra_data_policy, ExtraDataPolicy::Reject);
        assert!(strict.abort_on_parse_failure);
        assert_eq!(BalConfig::development("tally").scope_mode, ScopeMode::Emulated);
    }

    #[test]
    fn rejects_bad_contract_names() {
        assert!(BalConfig::default().validate().is_err());
        assert!(BalConfig::new("two words").validate().is_err());
        assert!(BalConfig::new("ok").with_max_decode_depth(0).validate().is_err());
    }

    #[test]
    fn magic_embeds_contract_name() {
        assert_eq!(BalConfig::new("tally").magic(), "contract-action/tally-1.0");
    }

    #[test]
    fn build_store_honours_scope_mode() {
        assert!(BalConfig::new("t").build_store().native_scopes());
        assert!(
            !BalConfig::new("t")
                .with_scope_mode(ScopeMode::Emulated)
                .build_store()
                .native_scopes()
        );
    }
}
