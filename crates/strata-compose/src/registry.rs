//! Handle registry: the single source of truth mapping
//! `(unit, handle name)` to a [`ResourceHandle`].
//!
//! Keys are written once and never removed; iteration follows insertion
//! order, which during instantiation is the resolved unit order.

use std::collections::{BTreeSet, HashMap};

use strata_common::error::{Result, StrataError};
use strata_common::types::{HandleKey, ResourceHandle};

/// Insertion-ordered map of every handle produced during a run.
#[derive(Debug, Default, Clone)]
pub struct HandleRegistry {
    entries: Vec<(HandleKey, ResourceHandle)>,
    index: HashMap<HandleKey, usize>,
}

impl HandleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handle under `(unit, name)`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::HandleCollision`] if the key already exists,
    /// even when the stored handle is identical.
    pub fn put(&mut self, unit: &str, name: &str, handle: ResourceHandle) -> Result<()> {
        let key = HandleKey::new(unit, name);
        if self.index.contains_key(&key) {
            return Err(StrataError::HandleCollision { key });
        }
        tracing::debug!(handle = %key, kind = %handle.kind(), "registered handle");
        let _ = self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, handle));
        Ok(())
    }

    /// Looks up a handle by its owning unit and name.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnknownHandle`] if nothing is registered under the key.
    pub fn get(&self, unit: &str, name: &str) -> Result<&ResourceHandle> {
        self.lookup(&HandleKey::new(unit, name))
    }

    /// Looks up a handle by key.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnknownHandle`] if nothing is registered under the key.
    pub fn lookup(&self, key: &HandleKey) -> Result<&ResourceHandle> {
        self.index
            .get(key)
            .map(|&pos| &self.entries[pos].1)
            .ok_or_else(|| StrataError::UnknownHandle { key: key.clone() })
    }

    /// Returns `true` if the key is registered.
    #[must_use]
    pub fn contains(&self, key: &HandleKey) -> bool {
        self.index.contains_key(key)
    }

    /// Number of registered handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no handle has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&HandleKey, &ResourceHandle)> {
        self.entries.iter().map(|(key, handle)| (key, handle))
    }

    /// Iterates over the handles owned by one unit.
    pub fn owned_by<'a>(
        &'a self,
        unit: &'a str,
    ) -> impl Iterator<Item = (&'a HandleKey, &'a ResourceHandle)> + 'a {
        self.iter().filter(move |(key, _)| key.unit() == unit)
    }

    /// Distinct owning units, in order of first registration.
    #[must_use]
    pub fn units(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.entries
            .iter()
            .map(|(key, _)| key.unit())
            .filter(|unit| seen.insert(*unit))
            .collect()
    }
}

/// Read-only view of the registry restricted to the handles a unit declared.
///
/// Templates receive this instead of the registry so that reading an
/// undeclared handle fails instead of silently creating a hidden edge.
#[derive(Debug)]
pub struct Inputs<'a> {
    registry: &'a HandleRegistry,
    declared: &'a BTreeSet<HandleKey>,
}

impl<'a> Inputs<'a> {
    /// Wraps `registry`, exposing only `declared` keys.
    #[must_use]
    pub const fn new(registry: &'a HandleRegistry, declared: &'a BTreeSet<HandleKey>) -> Self {
        Self { registry, declared }
    }

    /// Returns a declared input handle.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnknownHandle`] if the key was not declared
    /// or has not been produced.
    pub fn get(&self, key: &HandleKey) -> Result<&'a ResourceHandle> {
        if !self.declared.contains(key) {
            return Err(StrataError::UnknownHandle { key: key.clone() });
        }
        self.registry.lookup(key)
    }
}

#[cfg(test)]
mod tests {
    use strata_common::types::{ResourceKind, SubnetClass};

    use super::*;

    fn subnet(name: &str) -> ResourceHandle {
        ResourceHandle::new(name, ResourceKind::Subnet(SubnetClass::Private))
    }

    #[test]
    fn put_then_get() {
        let mut registry = HandleRegistry::new();
        registry.put("network", "private-a", subnet("private-a")).expect("put");
        let handle = registry.get("network", "private-a").expect("get");
        assert_eq!(handle.name(), "private-a");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn second_put_is_rejected_even_when_identical() {
        let mut registry = HandleRegistry::new();
        registry.put("network", "private-a", subnet("private-a")).expect("put");
        let err = registry
            .put("network", "private-a", subnet("private-a"))
            .unwrap_err();
        assert!(matches!(err, StrataError::HandleCollision { .. }), "got: {err}");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn same_name_under_different_units_is_allowed() {
        let mut registry = HandleRegistry::new();
        registry.put("blue", "app", subnet("app")).expect("blue");
        registry.put("green", "app", subnet("app")).expect("green");
        assert_eq!(registry.units(), vec!["blue", "green"]);
    }

    #[test]
    fn get_unknown_fails() {
        let registry = HandleRegistry::new();
        let err = registry.get("network", "vpc").unwrap_err();
        assert!(matches!(err, StrataError::UnknownHandle { .. }), "got: {err}");
        assert!(err.to_string().contains("network.vpc"));
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut registry = HandleRegistry::new();
        registry.put("network", "b", subnet("b")).expect("b");
        registry.put("network", "a", subnet("a")).expect("a");
        let names: Vec<&str> = registry.iter().map(|(k, _)| k.name()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(registry.owned_by("network").count(), 2);
        assert_eq!(registry.owned_by("other").count(), 0);
    }

    #[test]
    fn inputs_hide_undeclared_handles() {
        let mut registry = HandleRegistry::new();
        registry.put("network", "a", subnet("a")).expect("a");
        registry.put("network", "b", subnet("b")).expect("b");
        let declared: BTreeSet<HandleKey> = [HandleKey::new("network", "a")].into();
        let inputs = Inputs::new(&registry, &declared);
        assert!(inputs.get(&HandleKey::new("network", "a")).is_ok());
        assert!(inputs.get(&HandleKey::new("network", "b")).is_err());
    }
}
