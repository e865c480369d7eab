use crate::name::Name;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Table,
    Index,
    Action,
    Row,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceType::Table => write!(f, "table"),
            ResourceType::Index => write!(f, "index"),
            ResourceType::Action => write!(f, "action"),
            ResourceType::Row => write!(f, "row"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalErrorCode {
    Encode,
    Decode,
    Validation,
    InvalidConfig,
    InvalidName,
    Schema,
    NotFound,
    TableNotDeclared,
    DuplicateKey,
    ResourceExceeded,
    Unauthorized,
    Aborted,
}

impl BalErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            BalErrorCode::Encode => "encode",
            BalErrorCode::Decode => "decode",
            BalErrorCode::Validation => "validation",
            BalErrorCode::InvalidConfig => "invalid_config",
            BalErrorCode::InvalidName => "invalid_name",
            BalErrorCode::Schema => "schema_error",
            BalErrorCode::NotFound => "not_found",
            BalErrorCode::TableNotDeclared => "table_not_declared",
            BalErrorCode::DuplicateKey => "duplicate_key",
            BalErrorCode::ResourceExceeded => "resource_exceeded",
            BalErrorCode::Unauthorized => "unauthorized",
            BalErrorCode::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalError {
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("schema error: {0}")]
    Schema(String),
    /// A point lookup missed; carries the caller's diagnostic.
    #[error("{message}")]
    NotFound { message: String },
    #[error("{resource_type} '{resource_id}' is not declared")]
    NotDeclared {
        resource_type: ResourceType,
        resource_id: String,
    },
    #[error("duplicate primary key in table '{table}': {key}")]
    DuplicateKey { table: Name, key: String },
    #[error("resource exceeded: {0}")]
    ResourceExceeded(String),
    #[error("missing required authorization of {account}")]
    Unauthorized { account: Name },
    #[error("contract aborted: {0}")]
    Aborted(String),
}

impl BalError {
    pub fn code(&self) -> BalErrorCode {
        match self {
            BalError::Encode(_) => BalErrorCode::Encode,
            BalError::Decode(_) => BalErrorCode::Decode,
            BalError::Validation(_) => BalErrorCode::Validation,
            BalError::InvalidConfig { .. } => BalErrorCode::InvalidConfig,
            BalError::InvalidName { .. } => BalErrorCode::InvalidName,
            BalError::Schema(_) => BalErrorCode::Schema,
            BalError::NotFound { .. } => BalErrorCode::NotFound,
            BalError::NotDeclared { .. } => BalErrorCode::TableNotDeclared,
            BalError::DuplicateKey { .. } => BalErrorCode::DuplicateKey,
            BalError::ResourceExceeded(_) => BalErrorCode::ResourceExceeded,
            BalError::Unauthorized { .. } => BalErrorCode::Unauthorized,
            BalError::Aborted(_) => BalErrorCode::Aborted,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        BalError::NotFound {
            message: message.into(),
        }
    }

    pub fn table_not_declared(table: Name) -> Self {
        BalError::NotDeclared {
            resource_type: ResourceType::Table,
            resource_id: table.to_string(),
        }
    }
}

/// Aborts the running action with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> Result<(), BalError> {
    if condition {
        Ok(())
    } else {
        Err(BalError::Aborted(message.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::{BalError, BalErrorCode, ResourceType, ensure};

    #[test]
    fn error_code_strings_are_stable() {
        assert_eq!(BalErrorCode::Schema.as_str(), "schema_error");
        assert_eq!(BalErrorCode::DuplicateKey.as_str(), "duplicate_key");
        assert_eq!(
            BalErrorCode::ResourceExceeded.as_str(),
            "resource_exceeded"
        );
    }

    #[test]
    fn not_found_displays_caller_message() {
        let err = BalError::not_found("Couldn't find grocery");
        assert_eq!(err.to_string(), "Couldn't find grocery");
        assert_eq!(err.code_str(), "not_found");
    }

    #[test]
    fn not_declared_maps_to_table_code() {
        let err = BalError::NotDeclared {
            resource_type: ResourceType::Table,
            resource_id: "groceries".into(),
        };
        assert_eq!(err.code(), BalErrorCode::TableNotDeclared);
        assert_eq!(err.to_string(), "table 'groceries' is not declared");
    }

    #[test]
    fn ensure_aborts_with_message() {
        assert!(ensure(true, "unused").is_ok());
        let err = ensure(false, "poll is closed").expect_err("abort");
        assert_eq!(err, BalError::Aborted("poll is closed".into()));
    }
}
