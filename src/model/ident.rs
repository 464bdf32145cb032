//! Identifier values and the name-keyed table used for global lookups.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;

/// Immutable, cheaply clonable name. Compares by value.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Arc<str>);

impl Identifier {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl PartialEq<str> for Identifier {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Identifier {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

/// Flat, case-sensitive table keyed by identifier. Entries are never replaced.
#[derive(Debug, Clone)]
pub struct IdentTable<V> {
    entries: AHashMap<Identifier, V>,
}

impl<V> Default for IdentTable<V> {
    fn default() -> Self {
        Self {
            entries: AHashMap::new(),
        }
    }
}

impl<V> IdentTable<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under `name` unless the name is already taken, in which case the existing
    /// entry is returned and the table is left untouched.
    pub fn insert(&mut self, name: Identifier, value: V) -> Result<(), &V> {
        use std::collections::hash_map::Entry;
        match self.entries.entry(name) {
            Entry::Occupied(existing) => Err(&*existing.into_mut()),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &V)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_compare_by_value() {
        let a = Identifier::new("gpr");
        let b = Identifier::from(String::from("gpr"));
        assert_eq!(a, b, "separately allocated names must compare equal");
        assert_eq!(a, "gpr");
        assert_ne!(a, Identifier::new("GPR"), "lookups are case-sensitive");
    }

    #[test]
    fn table_rejects_second_insert_and_keeps_first_value() {
        let mut table = IdentTable::new();
        table.insert(Identifier::new("r0"), 1u32).expect("first insert");
        let existing = table
            .insert(Identifier::new("r0"), 2u32)
            .expect_err("second insert must fail");
        assert_eq!(*existing, 1);
        assert_eq!(table.get("r0"), Some(&1));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn table_lookup_by_str_slice() {
        let mut table = IdentTable::new();
        table.insert(Identifier::new("imm8"), ()).expect("insert");
        assert!(table.contains("imm8"));
        assert!(!table.contains("imm"));
    }
}
