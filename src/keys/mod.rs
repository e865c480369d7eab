//! Ordered key construction.
//!
//! Every index key is one of three fixed-width unsigned integers. They are stored
//! big-endian, so the byte order of an [`EncodedKey`] equals the numeric order of
//! the key, which in turn equals the order of the sub-fields it was built from.

mod composite;
mod id;
mod string;
mod variant;

pub use composite::{KeyWord, composite2, composite3, split2, split3};
pub use id::{Id, PrimaryKey};
pub use string::{STRING_KEY_BYTES, string_key};
pub use variant::{
    KeyVariant, MAX_VARIANT_ALTERNATIVES, VARIANT_VALUE_BITS, decompose, decompose_max,
    decompose_min, recompose,
};

use crate::error::BalError;
use crate::storage::encoded_key::EncodedKey;
use primitive_types::U256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    U64,
    U128,
    U256,
}

impl KeyKind {
    pub fn width(self) -> usize {
        match self {
            KeyKind::U64 => 8,
            KeyKind::U128 => 16,
            KeyKind::U256 => 32,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeyKind::U64 => "u64",
            KeyKind::U128 => "u128",
            KeyKind::U256 => "u256",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    U64(u64),
    U128(u128),
    U256(U256),
}

impl IndexKey {
    pub fn kind(&self) -> KeyKind {
        match self {
            IndexKey::U64(_) => KeyKind::U64,
            IndexKey::U128(_) => KeyKind::U128,
            IndexKey::U256(_) => KeyKind::U256,
        }
    }

    pub fn encode(&self) -> EncodedKey {
        match self {
            IndexKey::U64(v) => EncodedKey::from_slice(&v.to_be_bytes()),
            IndexKey::U128(v) => EncodedKey::from_slice(&v.to_be_bytes()),
            IndexKey::U256(v) => {
                let mut bytes = [0u8; 32];
                v.to_big_endian(&mut bytes);
                EncodedKey::from_slice(&bytes)
            }
        }
    }

    pub fn decode(kind: KeyKind, bytes: &[u8]) -> Result<Self, BalError> {
        if bytes.len() != kind.width() {
            return Err(BalError::Decode(format!(
                "{} key must be {} bytes, got {}",
                kind.as_str(),
                kind.width(),
                bytes.len()
            )));
        }
        Ok(match kind {
            KeyKind::U64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                IndexKey::U64(u64::from_be_bytes(buf))
            }
            KeyKind::U128 => {
                let mut buf = [0u8; 16];
                buf.copy_from_slice(bytes);
                IndexKey::U128(u128::from_be_bytes(buf))
            }
            KeyKind::U256 => IndexKey::U256(U256::from_big_endian(bytes)),
        })
    }
}

/// Integer types usable as a secondary index key.
pub trait IndexKeyType: Copy {
    const KIND: KeyKind;

    fn into_index_key(self) -> IndexKey;

    fn from_index_key(key: IndexKey) -> Option<Self>;
}

impl IndexKeyType for u64 {
    const KIND: KeyKind = KeyKind::U64;

    fn into_index_key(self) -> IndexKey {
        IndexKey::U64(self)
    }

    fn from_index_key(key: IndexKey) -> Option<Self> {
        match key {
            IndexKey::U64(v) => Some(v),
            _ => None,
        }
    }
}

impl IndexKeyType for u128 {
    const KIND: KeyKind = KeyKind::U128;

    fn into_index_key(self) -> IndexKey {
        IndexKey::U128(self)
    }

    fn from_index_key(key: IndexKey) -> Option<Self> {
        match key {
            IndexKey::U128(v) => Some(v),
            _ => None,
        }
    }
}

impl IndexKeyType for U256 {
    const KIND: KeyKind = KeyKind::U256;

    fn into_index_key(self) -> IndexKey {
        IndexKey::U256(self)
    }

    fn from_index_key(key: IndexKey) -> Option<Self> {
        match key {
            IndexKey::U256(v) => Some(v),
            _ => None,
        }
    }
}
