//! Type registry: maps `(type name, family)` to a variant.
//!
//! The registry is an explicit value handed to whoever creates sets, so tests
//! and embedders can register their own variants without global state.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ipset::error::SetError;
use crate::ipset::family::{Inet, Inet6};
use crate::ipset::shape::{HashNet, HashNetPort, HashNetPortNet};
use crate::ipset::types::Family;
use crate::ipset::variant::{HashVariant, TypeVariant};

#[derive(Debug, Clone)]
pub struct TypeRegistry {
    variants: BTreeMap<(&'static str, Family), Arc<dyn TypeVariant>>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            variants: BTreeMap::new(),
        }
    }

    /// Registry with every built-in hash type for both families.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(HashVariant::<HashNet, Inet>::new()));
        registry.register(Arc::new(HashVariant::<HashNet, Inet6>::new()));
        registry.register(Arc::new(HashVariant::<HashNetPort, Inet>::new()));
        registry.register(Arc::new(HashVariant::<HashNetPort, Inet6>::new()));
        registry.register(Arc::new(HashVariant::<HashNetPortNet, Inet>::new()));
        registry.register(Arc::new(HashVariant::<HashNetPortNet, Inet6>::new()));
        registry
    }

    /// Adds a variant, replacing any previous one with the same name and family.
    pub fn register(&mut self, variant: Arc<dyn TypeVariant>) {
        let key = (variant.type_name(), variant.family());
        if self.variants.insert(key, variant).is_some() {
            tracing::debug!(type_name = key.0, family = %key.1, "Type variant replaced");
        }
    }

    pub fn resolve(&self, name: &str, family: Family) -> Result<Arc<dyn TypeVariant>, SetError> {
        self.variants
            .iter()
            .find(|((n, f), _)| *n == name && *f == family)
            .map(|(_, variant)| Arc::clone(variant))
            .ok_or_else(|| SetError::UnknownType {
                name: name.to_string(),
                family,
            })
    }

    /// Distinct registered type names, sorted.
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.variants.keys().map(|(name, _)| *name).collect();
        names.dedup();
        names
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_resolves_all_types() {
        let registry = TypeRegistry::builtin();
        for name in ["hash:net", "hash:net,port", "hash:net,port,net"] {
            for family in [Family::Inet, Family::Inet6] {
                let variant = registry.resolve(name, family).unwrap();
                assert_eq!(variant.type_name(), name);
                assert_eq!(variant.family(), family);
            }
        }
        assert_eq!(
            registry.type_names(),
            vec!["hash:net", "hash:net,port", "hash:net,port,net"]
        );
    }

    #[test]
    fn test_unknown_type() {
        let registry = TypeRegistry::builtin();
        assert_eq!(
            registry.resolve("hash:ip", Family::Inet).unwrap_err(),
            SetError::UnknownType { name: "hash:ip".into(), family: Family::Inet }
        );
        assert!(TypeRegistry::new().resolve("hash:net", Family::Inet).is_err());
    }
}
