//! Ordered, duplicate-free entity collection.
//!
//! Insertion order is kept only so output is deterministic; nothing relies
//! on it semantically.

use crate::entity::Entity;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A collection of one entity type, keyed by [`Entity::key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collection<T> {
    items: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Entity> Collection<T> {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entity, rejecting a duplicate key.
    pub fn add(&mut self, item: T) -> Result<()> {
        if self.find(item.key()).is_some() {
            return Err(Error::Duplicate {
                kind: T::KIND,
                key: item.key().to_string(),
            });
        }
        self.items.push(item);
        Ok(())
    }

    /// Replace the entity with the same key in place, or append it.
    ///
    /// Returns the replaced entity, if any.
    pub fn upsert(&mut self, item: T) -> Option<T> {
        match self.items.iter_mut().find(|e| e.key() == item.key()) {
            Some(slot) => Some(std::mem::replace(slot, item)),
            None => {
                self.items.push(item);
                None
            }
        }
    }

    pub fn find(&self, key: &str) -> Option<&T> {
        self.items.iter().find(|e| e.key() == key)
    }

    pub fn find_mut(&mut self, key: &str) -> Option<&mut T> {
        self.items.iter_mut().find(|e| e.key() == key)
    }

    /// Remove by key. Not-found is `None`, not an error.
    pub fn remove(&mut self, key: &str) -> Option<T> {
        let index = self.items.iter().position(|e| e.key() == key)?;
        Some(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn keys(&self) -> Vec<String> {
        self.items.iter().map(|e| e.key().to_string()).collect()
    }

    /// Whether an entity with the same identity is present.
    pub fn contains_identity(&self, item: &T) -> bool {
        self.items.iter().any(|e| e.same_identity(item))
    }

    /// Entities of `self` whose identity is absent from `other`.
    pub fn difference(&self, other: &Self) -> Self {
        self.items
            .iter()
            .filter(|e| !other.contains_identity(e))
            .cloned()
            .collect()
    }

    /// `self` followed by the entities of `other` it does not already hold.
    pub fn merged_with(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for item in other.difference(self) {
            merged.upsert(item);
        }
        merged
    }

    /// Check every entity for completeness.
    pub fn validate(&self) -> Result<()> {
        self.items.iter().try_for_each(Entity::validate)
    }

    /// Reject collections holding the same key twice.
    ///
    /// Deserialized collections bypass [`Collection::add`], so documents
    /// call this after loading.
    pub fn check_unique(&self) -> Result<()> {
        for (i, item) in self.items.iter().enumerate() {
            if self.items[..i].iter().any(|e| e.key() == item.key()) {
                return Err(Error::Duplicate {
                    kind: T::KIND,
                    key: item.key().to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

/// Collecting keeps the last entity for each key.
impl<T: Entity> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut collection = Self::new();
        for item in iter {
            collection.upsert(item);
        }
        collection
    }
}

impl<T> IntoIterator for Collection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NtpServer;

    fn server(name: &str) -> NtpServer {
        NtpServer::new(name).with_address(format!("{name}.example"))
    }

    #[test]
    fn test_add_rejects_duplicate() {
        let mut servers = Collection::new();
        servers.add(server("a")).unwrap();
        let err = servers.add(server("a")).unwrap_err();
        assert!(matches!(err, Error::Duplicate { key, .. } if key == "a"));
        assert_eq!(servers.len(), 1);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut servers: Collection<NtpServer> = [server("a"), server("b")].into_iter().collect();
        let replaced = servers.upsert(server("a").with_port(123));
        assert!(replaced.is_some());
        assert_eq!(servers.keys(), vec!["a", "b"]);
        assert_eq!(servers.find("a").unwrap().port, Some(123));
    }

    #[test]
    fn test_remove_missing_is_none() {
        let mut servers: Collection<NtpServer> = [server("a")].into_iter().collect();
        assert!(servers.remove("zzz").is_none());
        assert!(servers.remove("a").is_some());
        assert!(servers.is_empty());
    }

    #[test]
    fn test_difference_and_merge() {
        let desired: Collection<NtpServer> =
            [server("a"), server("b"), server("c")].into_iter().collect();
        let live: Collection<NtpServer> = [server("b"), server("x")].into_iter().collect();

        let missing = desired.difference(&live);
        assert_eq!(missing.keys(), vec!["a", "c"]);

        let merged = live.merged_with(&missing);
        assert_eq!(merged.keys(), vec!["b", "x", "a", "c"]);
    }

    #[test]
    fn test_find_mut_edits_entity() {
        let mut servers: Collection<NtpServer> = [server("a")].into_iter().collect();
        servers.find_mut("a").unwrap().iburst = true;
        assert!(servers.find("a").unwrap().iburst);
    }

    #[test]
    fn test_check_unique() {
        let servers: Collection<NtpServer> =
            serde_json::from_str(r#"[{"name":"a"},{"name":"a"}]"#).unwrap();
        assert!(servers.check_unique().is_err());
    }
}
