use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize, Serializer};

/// Typed numeric id. The phantom parameter keeps a room id from being passed
/// where a mob instance id is expected.
pub struct Id<T> {
    pub value: u64,
    phantom: PhantomData<T>,
}

pub type IdMap<T> = HashMap<Id<T>, T>;

impl<T> Id<T> {
    pub fn new(value: u64) -> Id<T> {
        Id { value, phantom: PhantomData }
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.value)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Id::new(u64::deserialize(deserializer)?))
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.value)
    }
}

#[derive(Debug)]
pub struct IdSource<T> {
    next_id: u64,
    phantom: PhantomData<T>,
}

impl<T> IdSource<T> {
    pub fn new(first_id: u64) -> IdSource<T> {
        IdSource { next_id: first_id, phantom: PhantomData }
    }

    pub fn next(&mut self) -> Id<T> {
        let id = Id::new(self.next_id);
        self.next_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    #[test]
    fn ids_order_by_value() {
        let mut source = IdSource::<Marker>::new(7);
        let a = source.next();
        let b = source.next();
        assert!(a < b);
        assert_eq!(b.value, 8);
        assert_eq!(format!("{:?}", a), "#7");
    }
}
