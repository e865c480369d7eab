use crate::error::BalError;
use crate::keys::id::Id;
use crate::name::Name;
use primitive_types::U256;

/// A scalar that occupies one 64-bit word of a composite key.
pub trait KeyWord {
    fn key_word(&self) -> Result<u64, BalError>;
}

macro_rules! lossless_key_word {
    ($($t:ty),*) => {
        $(
            impl KeyWord for $t {
                fn key_word(&self) -> Result<u64, BalError> {
                    Ok(u64::from(*self))
                }
            }
        )*
    };
}

lossless_key_word!(u8, u16, u32, u64, bool);

impl KeyWord for usize {
    fn key_word(&self) -> Result<u64, BalError> {
        u64::try_from(*self).map_err(|_| oversized("usize", &self.to_string()))
    }
}

impl KeyWord for u128 {
    fn key_word(&self) -> Result<u64, BalError> {
        u64::try_from(*self).map_err(|_| oversized("u128", &self.to_string()))
    }
}

impl KeyWord for U256 {
    fn key_word(&self) -> Result<u64, BalError> {
        if self.bits() > 64 {
            return Err(oversized("u256", &self.to_string()));
        }
        Ok(self.low_u64())
    }
}

impl KeyWord for Name {
    fn key_word(&self) -> Result<u64, BalError> {
        Ok(self.value())
    }
}

impl<T> KeyWord for Id<T> {
    fn key_word(&self) -> Result<u64, BalError> {
        Ok(self.value)
    }
}

fn oversized(kind: &str, value: &str) -> BalError {
    BalError::Schema(format!(
        "composite key field of type {kind} does not fit 64 bits: {value}"
    ))
}

pub fn composite2(a: impl KeyWord, b: impl KeyWord) -> Result<u128, BalError> {
    Ok((u128::from(a.key_word()?) << 64) | u128::from(b.key_word()?))
}

pub fn composite3(
    a: impl KeyWord,
    b: impl KeyWord,
    c: impl KeyWord,
) -> Result<U256, BalError> {
    Ok(U256([c.key_word()?, b.key_word()?, a.key_word()?, 0]))
}

pub fn split2(key: u128) -> (u64, u64) {
    ((key >> 64) as u64, key as u64)
}

/// Inverse of [`composite3`]; the top 64 bits of `key` are ignored.
pub fn split3(key: U256) -> (u64, u64, u64) {
    let U256(words) = key;
    (words[2], words[1], words[0])
}
