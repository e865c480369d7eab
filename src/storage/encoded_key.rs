use smallvec::SmallVec;
use std::fmt;

/// Raw key bytes whose lexicographic order is the index order.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EncodedKey {
    bytes: SmallVec<[u8; 64]>,
}

impl EncodedKey {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            bytes: SmallVec::from_slice(bytes),
        }
    }

    pub fn from_u64(value: u64) -> Self {
        Self::from_slice(&value.to_be_bytes())
    }

    /// Reads back a key written by [`EncodedKey::from_u64`].
    pub fn to_u64(&self) -> Option<u64> {
        let bytes: [u8; 8] = self.bytes.as_slice().try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn concat(&self, suffix: &EncodedKey) -> EncodedKey {
        let mut bytes = self.bytes.clone();
        bytes.extend_from_slice(suffix.as_slice());
        Self { bytes }
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.bytes.starts_with(prefix)
    }

    /// Drops the first `len` bytes; `None` if the key is shorter.
    pub fn strip_prefix(&self, len: usize) -> Option<EncodedKey> {
        self.bytes.get(len..).map(EncodedKey::from_slice)
    }

    pub fn truncated(&self, len: usize) -> EncodedKey {
        EncodedKey::from_slice(&self.bytes[..len.min(self.bytes.len())])
    }
}

impl fmt::Debug for EncodedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedKey({})", hex::encode(&self.bytes))
    }
}

/// Smallest key greater than every key that starts with `prefix`.
pub fn prefix_successor(prefix: &EncodedKey) -> Option<EncodedKey> {
    let mut next = prefix.bytes.clone();
    for i in (0..next.len()).rev() {
        if next[i] != 0xFF {
            next[i] += 1;
            next.truncate(i + 1);
            return Some(EncodedKey { bytes: next });
        }
    }
    None
}
