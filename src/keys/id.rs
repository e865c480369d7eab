use crate::error::BalError;
use crate::name::Name;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Keys usable as a table's primary key. Primary keys are 64-bit on every backend.
pub trait PrimaryKey: Copy + Ord + Default + fmt::Debug {
    fn to_raw(self) -> u64;

    fn from_raw(raw: u64) -> Self;

    fn incremented(self) -> Result<Self, BalError> {
        self.to_raw()
            .checked_add(1)
            .map(Self::from_raw)
            .ok_or_else(|| {
                BalError::Validation("Unable to increment ID: ID is at maximum value".into())
            })
    }
}

impl PrimaryKey for u64 {
    fn to_raw(self) -> u64 {
        self
    }

    fn from_raw(raw: u64) -> Self {
        raw
    }
}

impl PrimaryKey for Name {
    fn to_raw(self) -> u64 {
        self.value()
    }

    fn from_raw(raw: u64) -> Self {
        Name::from_raw(raw)
    }
}

/// A 64-bit ID distinguished at the type level by `Tag`, so IDs of different
/// tables cannot be mixed up.
pub struct Id<Tag> {
    pub value: u64,
    _tag: PhantomData<fn() -> Tag>,
}

impl<Tag> Id<Tag> {
    pub const fn new(value: u64) -> Self {
        Self {
            value,
            _tag: PhantomData,
        }
    }
}

impl<Tag> Clone for Id<Tag> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Tag> Copy for Id<Tag> {}

impl<Tag> Default for Id<Tag> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<Tag> PartialEq for Id<Tag> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<Tag> Eq for Id<Tag> {}

impl<Tag> PartialOrd for Id<Tag> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<Tag> Ord for Id<Tag> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<Tag> Hash for Id<Tag> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<Tag> fmt::Debug for Id<Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaggedID{{{}}}", self.value)
    }
}

impl<Tag> fmt::Display for Id<Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaggedID{{{}}}", self.value)
    }
}

impl<Tag> From<u64> for Id<Tag> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<Tag> PrimaryKey for Id<Tag> {
    fn to_raw(self) -> u64 {
        self.value
    }

    fn from_raw(raw: u64) -> Self {
        Self::new(raw)
    }
}

impl<Tag> Serialize for Id<Tag> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.value)
    }
}

impl<'de, Tag> Deserialize<'de> for Id<Tag> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u64::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::{Id, PrimaryKey};

    enum PollTag {}
    type PollId = Id<PollTag>;

    #[test]
    fn increment_is_checked() {
        assert_eq!(PollId::new(4).incremented().expect("inc"), PollId::new(5));
        let err = PollId::new(u64::MAX).incremented().expect_err("at max");
        assert!(err.to_string().contains("maximum value"));
    }

    #[test]
    fn displays_as_tagged_id() {
        assert_eq!(PollId::new(7).to_string(), "TaggedID{7}");
    }

    #[test]
    fn serializes_as_bare_integer() {
        assert_eq!(serde_json::to_string(&PollId::new(3)).expect("json"), "3");
        let back: PollId = serde_json::from_str("3").expect("parse");
        assert_eq!(back, PollId::new(3));
    }
}
