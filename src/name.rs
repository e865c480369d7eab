//! 64-bit base-32 names used for accounts, tables, index tags and actions.
//!
//! Up to 12 characters from `.12345abcdefghijklmnopqrstuvwxyz` occupy 5 bits each,
//! most significant first; an optional 13th character from `.12345abcdefghij`
//! fills the low 4 bits. Integer order of the packed value matches the
//! character order of the name, so names are valid ordered key words.

use crate::error::BalError;
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const CHARMAP: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";
const MAX_NAME_LEN: usize = 13;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(u64);

const fn char_to_symbol(c: u8) -> Option<u64> {
    match c {
        b'a'..=b'z' => Some((c - b'a') as u64 + 6),
        b'1'..=b'5' => Some((c - b'1') as u64 + 1),
        b'.' => Some(0),
        _ => None,
    }
}

const fn encode(bytes: &[u8]) -> Result<u64, &'static str> {
    if bytes.len() > MAX_NAME_LEN {
        return Err("name is longer than 13 characters");
    }
    let mut value = 0u64;
    let mut i = 0;
    while i < bytes.len() {
        let Some(symbol) = char_to_symbol(bytes[i]) else {
            return Err("name contains a character outside [.1-5a-z]");
        };
        if i < 12 {
            value |= (symbol & 0x1f) << (64 - 5 * (i + 1));
        } else {
            if symbol > 0x0f {
                return Err("13th character of a name must be in [.1-5a-j]");
            }
            value |= symbol;
        }
        i += 1;
    }
    Ok(value)
}

impl Name {
    /// Builds a name at compile time; panics on invalid input.
    pub const fn new(s: &str) -> Self {
        match encode(s.as_bytes()) {
            Ok(value) => Name(value),
            Err(_) => panic!("invalid name literal"),
        }
    }

    pub const fn from_raw(value: u64) -> Self {
        Name(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of significant characters once trailing dots are trimmed.
    pub fn length(self) -> usize {
        self.to_string().len()
    }
}

impl FromStr for Name {
    type Err = BalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        encode(s.as_bytes())
            .map(Name)
            .map_err(|reason| BalError::InvalidName {
                name: s.to_string(),
                reason,
            })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = [b'.'; MAX_NAME_LEN];
        let mut tmp = self.0;
        for i in 0..MAX_NAME_LEN {
            let mask = if i == 0 { 0x0f } else { 0x1f };
            out[12 - i] = CHARMAP[(tmp & mask) as usize];
            tmp >>= if i == 0 { 4 } else { 5 };
        }
        let len = out.iter().rposition(|c| *c != b'.').map_or(0, |p| p + 1);
        // CHARMAP is ASCII.
        f.write_str(std::str::from_utf8(&out[..len]).map_err(|_| fmt::Error)?)
    }
}

impl From<Name> for u64 {
    fn from(name: Name) -> Self {
        name.0
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_u64(self.0)
        }
    }
}

struct NameVisitor;

impl Visitor<'_> for NameVisitor {
    type Value = Name;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a name string or its 64-bit value")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Name, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Name, E> {
        Ok(Name(v))
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(NameVisitor)
        } else {
            deserializer.deserialize_u64(NameVisitor)
        }
    }
}
