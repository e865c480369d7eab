//! Wire layout of an action payload:
//! `contract-action/<contract>-1.0` followed by a format byte and the body.
//!
//! * `b`: uvarint action discriminant, then each parameter in the binary codec.
//! * `s`: action name, whitespace, then a JSON array of positional arguments
//!   (omitted for actions without parameters).

use crate::codec::write_uvarint;
use crate::dispatch::action::ActionArgs;
use crate::error::BalError;
use crate::name::Name;
use serde_json::Value;

pub const MAGIC_PREFIX: &str = "contract-action/";
pub const MAGIC_SUFFIX: &str = "-1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Binary,
    Text,
}

impl PayloadFormat {
    pub fn byte(self) -> u8 {
        match self {
            PayloadFormat::Binary => b'b',
            PayloadFormat::Text => b's',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'b' => Some(PayloadFormat::Binary),
            b's' => Some(PayloadFormat::Text),
            _ => None,
        }
    }
}

pub fn magic(contract_name: &str) -> String {
    format!("{MAGIC_PREFIX}{contract_name}{MAGIC_SUFFIX}")
}

pub fn encode_binary_action<A: ActionArgs>(
    contract_name: &str,
    discriminant: u64,
    args: &A,
) -> Vec<u8> {
    let mut out = magic(contract_name).into_bytes();
    out.push(PayloadFormat::Binary.byte());
    write_uvarint(&mut out, discriminant);
    args.encode_binary(&mut out);
    out
}

/// Text envelope from already-built JSON arguments.
pub fn encode_text_action(contract_name: &str, action: Name, args: &[Value]) -> Vec<u8> {
    let mut out = magic(contract_name).into_bytes();
    out.push(PayloadFormat::Text.byte());
    out.extend_from_slice(action.to_string().as_bytes());
    if !args.is_empty() {
        out.push(b' ');
        out.extend_from_slice(Value::Array(args.to_vec()).to_string().as_bytes());
    }
    out
}

/// Text envelope from typed arguments; fails if an argument has no JSON form.
pub fn encode_text_args<A: ActionArgs>(
    contract_name: &str,
    action: Name,
    args: &A,
) -> Result<Vec<u8>, BalError> {
    Ok(encode_text_action(contract_name, action, &args.to_json()?))
}
