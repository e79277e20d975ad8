//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check set names are unique and types are registered
//! - Check every entry parses and plans against its set's type and family
//! - Validate value ranges (limits > 0, metrics address)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function of the config and the type registry
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::EngineConfig;
use crate::ipset::{SetError, SetRequest, TypeRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("set #{index} has an empty name")]
    EmptySetName { index: usize },

    #[error("set {0:?} is defined more than once")]
    DuplicateSet(String),

    #[error("set {set:?}: {source}")]
    SetType { set: String, source: SetError },

    #[error("set {set:?}, entry {entry:?}: {source}")]
    Entry {
        set: String,
        entry: String,
        source: SetError,
    },

    #[error("{field} must be greater than zero")]
    ZeroLimit { field: String },

    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),
}

/// Check `config` against `registry`, collecting every problem found.
pub fn validate_config(
    config: &EngineConfig,
    registry: &TypeRegistry,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let limits = &config.limits;
    for (field, value) in [
        ("limits.hash_size", limits.hash_size as u64),
        ("limits.max_elements", limits.max_elements as u64),
        ("limits.max_request_elements", limits.max_request_elements),
        ("limits.queue_depth", limits.queue_depth as u64),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroLimit { field: field.to_string() });
        }
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(obs.metrics_address.clone()));
    }

    let mut seen = HashSet::new();
    for (index, set) in config.sets.iter().enumerate() {
        if set.name.trim().is_empty() {
            errors.push(ValidationError::EmptySetName { index });
            continue;
        }
        if !seen.insert(set.name.as_str()) {
            errors.push(ValidationError::DuplicateSet(set.name.clone()));
        }
        if set.max_elements == Some(0) {
            errors.push(ValidationError::ZeroLimit {
                field: format!("sets.{}.max_elements", set.name),
            });
        }

        let variant = match registry.resolve(&set.set_type, set.family) {
            Ok(variant) => variant,
            Err(source) => {
                errors.push(ValidationError::SetType { set: set.name.clone(), source });
                continue;
            }
        };

        for entry in &set.entries {
            let checked = entry
                .entry
                .parse::<SetRequest>()
                .and_then(|request| variant.plan(&request));
            let source = match checked {
                Ok(plan) if plan.len() > limits.max_request_elements => {
                    SetError::CapacityExceeded {
                        requested: plan.len(),
                        limit: limits.max_request_elements,
                    }
                }
                Ok(_) => continue,
                Err(source) => source,
            };
            errors.push(ValidationError::Entry {
                set: set.name.clone(),
                entry: entry.entry.clone(),
                source,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{EntryConfig, SetConfig};
    use crate::ipset::Family;

    fn set(name: &str, set_type: &str, family: Family, entries: &[&str]) -> SetConfig {
        SetConfig {
            name: name.to_string(),
            set_type: set_type.to_string(),
            family,
            comment: false,
            hash_size: None,
            max_elements: None,
            entries: entries
                .iter()
                .map(|e| EntryConfig { entry: e.to_string(), nomatch: false, comment: None })
                .collect(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = EngineConfig {
            sets: vec![set("acl", "hash:net,port,net", Family::Inet, &["10.0.0.0/24,tcp:80,192.168.1.0/24"])],
            ..EngineConfig::default()
        };
        assert!(validate_config(&config, &TypeRegistry::builtin()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = EngineConfig {
            sets: vec![
                set("acl", "hash:net", Family::Inet, &["10.0.0.0/8"]),
                set("acl", "hash:ip", Family::Inet, &[]),
                set("v6", "hash:net,port", Family::Inet6, &["2001:db8::1-2001:db8::9,tcp:80", "10.0.0.1,tcp:80"]),
                set("", "hash:net", Family::Inet, &[]),
            ],
            ..EngineConfig::default()
        };
        config.limits.queue_depth = 0;

        let errors = validate_config(&config, &TypeRegistry::builtin()).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors.contains(&ValidationError::DuplicateSet("acl".into())));
        assert!(errors.contains(&ValidationError::EmptySetName { index: 3 }));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::SetType { .. })));
        assert_eq!(
            errors.iter().filter(|e| matches!(e, ValidationError::Entry { .. })).count(),
            2
        );
    }

    #[test]
    fn test_entry_over_request_cap() {
        let mut config = EngineConfig {
            sets: vec![set("acl", "hash:net,port", Family::Inet, &["10.0.0.0/24,tcp:1-100"])],
            ..EngineConfig::default()
        };
        config.limits.max_request_elements = 10;
        let errors = validate_config(&config, &TypeRegistry::builtin()).unwrap_err();
        assert!(matches!(
            &errors[0],
            ValidationError::Entry { source: SetError::CapacityExceeded { requested: 100, .. }, .. }
        ));
    }

    #[test]
    fn test_metrics_address_checked_when_enabled() {
        let mut config = EngineConfig::default();
        config.observability.metrics_address = "not-an-address".into();
        assert!(validate_config(&config, &TypeRegistry::builtin()).is_ok());
        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config, &TypeRegistry::builtin()).unwrap_err(),
            vec![ValidationError::MetricsAddress("not-an-address".into())]
        );
    }
}
