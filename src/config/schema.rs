//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML.
//!
//! ```toml
//! [limits]
//! max_request_elements = 65536
//!
//! [[sets]]
//! name = "vip-acl"
//! type = "hash:net,port,net"
//! family = "inet"
//! comment = true
//! entries = [
//!     { entry = "10.0.0.0/24,tcp:80-81,192.168.1.0/24" },
//!     { entry = "10.0.0.128/25,tcp:80,192.168.1.0/24", nomatch = true },
//! ]
//! ```

use serde::{Deserialize, Serialize};

use crate::ipset::{Family, SetOptions};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Defaults applied to every set.
    pub limits: LimitsConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Set definitions, created in order.
    pub sets: Vec<SetConfig>,
}

/// Engine-wide limits; per-set values override these.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Default initial bucket count.
    pub hash_size: usize,

    /// Default element limit per set.
    pub max_elements: usize,

    /// Largest number of elements a single request may expand to.
    pub max_request_elements: u64,

    /// Control queue depth.
    pub queue_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let set = SetOptions::default();
        Self {
            hash_size: set.hash_size,
            max_elements: set.max_elements,
            max_request_elements: set.max_request_elements,
            queue_depth: 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// One set definition.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SetConfig {
    /// Unique set name.
    pub name: String,

    /// Type name, e.g. `hash:net,port,net`.
    #[serde(rename = "type")]
    pub set_type: String,

    #[serde(default)]
    pub family: Family,

    /// Store element comments.
    #[serde(default)]
    pub comment: bool,

    /// Overrides `limits.hash_size`.
    #[serde(default)]
    pub hash_size: Option<usize>,

    /// Overrides `limits.max_elements`.
    #[serde(default)]
    pub max_elements: Option<usize>,

    #[serde(default)]
    pub entries: Vec<EntryConfig>,
}

impl SetConfig {
    /// Creation options after applying engine-wide defaults.
    pub fn options(&self, limits: &LimitsConfig) -> SetOptions {
        SetOptions {
            comment: self.comment,
            hash_size: self.hash_size.unwrap_or(limits.hash_size),
            max_elements: self.max_elements.unwrap_or(limits.max_elements),
            max_request_elements: limits.max_request_elements,
        }
    }
}

/// One configured entry, in ipset entry syntax.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EntryConfig {
    pub entry: String,

    #[serde(default)]
    pub nomatch: bool,

    #[serde(default)]
    pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert!(config.sets.is_empty());
        assert_eq!(config.limits.max_request_elements, 65536);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_set_overrides_limits() {
        let config: EngineConfig = toml::from_str(
            r#"
            [limits]
            hash_size = 64

            [[sets]]
            name = "acl"
            type = "hash:net"
            family = "inet6"
            max_elements = 10
            "#,
        )
        .unwrap();
        let set = &config.sets[0];
        assert_eq!(set.family, Family::Inet6);
        let options = set.options(&config.limits);
        assert_eq!(options.hash_size, 64);
        assert_eq!(options.max_elements, 10);
        assert!(!options.comment);
    }
}
