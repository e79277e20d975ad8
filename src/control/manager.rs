//! Named set collection.
//!
//! # Responsibilities
//! - Create, destroy and look up sets by name
//! - Route control-plane requests to the named set
//! - Build sets from configuration and swap them in on reload
//!
//! # Design Decisions
//! - Sets live in a `DashMap` so the packet path can look them up while the
//!   control plane replaces them; only the per-set table read is lock-free
//! - A reload builds every configured set before touching the live map; one
//!   bad set aborts the reload and leaves the running sets as they were

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

use crate::config::schema::{EngineConfig, LimitsConfig, SetConfig};
use crate::control::error::ControlError;
use crate::ipset::{
    AdtOutcome, Family, IpSet, Member, PacketView, SetOptions, SetRequest, TestResult,
    TypeRegistry,
};
use crate::observability::metrics;

/// Summary row for one set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: &'static str,
    pub family: Family,
    pub elements: usize,
}

/// What a configuration reload changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    pub created: Vec<String>,
    pub replaced: Vec<String>,
    pub removed: Vec<String>,
}

pub struct SetManager {
    registry: Arc<TypeRegistry>,
    limits: ArcSwap<LimitsConfig>,
    sets: DashMap<String, Arc<IpSet>>,
}

impl SetManager {
    pub fn new(registry: Arc<TypeRegistry>, limits: LimitsConfig) -> Self {
        Self {
            registry,
            limits: ArcSwap::from_pointee(limits),
            sets: DashMap::new(),
        }
    }

    /// Build every set `config` describes.
    pub fn from_config(
        registry: Arc<TypeRegistry>,
        config: &EngineConfig,
    ) -> Result<Self, ControlError> {
        let manager = Self::new(registry, config.limits.clone());
        manager.apply_config(config)?;
        Ok(manager)
    }

    /// Options a new set gets when none are given.
    pub fn default_options(&self) -> SetOptions {
        let limits = self.limits.load();
        SetOptions {
            comment: false,
            hash_size: limits.hash_size,
            max_elements: limits.max_elements,
            max_request_elements: limits.max_request_elements,
        }
    }

    pub fn create(
        &self,
        name: &str,
        type_name: &str,
        family: Family,
        options: SetOptions,
    ) -> Result<Arc<IpSet>, ControlError> {
        let entry = match self.sets.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(ControlError::SetExists(name.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => entry,
        };
        let set = Arc::new(IpSet::create(&self.registry, name, type_name, family, options)?);
        entry.insert(Arc::clone(&set));
        metrics::record_set_count(self.sets.len());
        Ok(set)
    }

    pub fn destroy(&self, name: &str) -> Result<(), ControlError> {
        self.sets
            .remove(name)
            .ok_or_else(|| ControlError::NoSuchSet(name.to_string()))?;
        tracing::info!(set = %name, "Set destroyed");
        metrics::record_set_count(self.sets.len());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<IpSet>, ControlError> {
        self.sets
            .get(name)
            .map(|set| Arc::clone(set.value()))
            .ok_or_else(|| ControlError::NoSuchSet(name.to_string()))
    }

    /// Set names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sets.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn summaries(&self) -> Vec<SetSummary> {
        let mut rows: Vec<SetSummary> = self
            .sets
            .iter()
            .map(|e| {
                let set = e.value();
                SetSummary {
                    name: set.name().to_string(),
                    type_name: set.type_name(),
                    family: set.family(),
                    elements: set.len(),
                }
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    pub fn add(&self, set: &str, request: &SetRequest) -> Result<AdtOutcome, ControlError> {
        Ok(self.get(set)?.add(request)?)
    }

    pub fn del(&self, set: &str, request: &SetRequest) -> Result<AdtOutcome, ControlError> {
        Ok(self.get(set)?.del(request)?)
    }

    pub fn test(&self, set: &str, request: &SetRequest) -> Result<TestResult, ControlError> {
        Ok(self.get(set)?.test(request)?)
    }

    /// Packet-path test against a named set; an unknown set is `NotFound`.
    ///
    /// The name lookup takes a shard read lock. Hot paths should hold the
    /// `Arc<IpSet>` from [`SetManager::get`] and call [`IpSet::test_packet`].
    pub fn test_packet(&self, set: &str, pkt: &dyn PacketView) -> TestResult {
        match self.sets.get(set) {
            Some(set) => set.test_packet(pkt),
            None => TestResult::NotFound,
        }
    }

    pub fn list(&self, set: &str) -> Result<Vec<Member>, ControlError> {
        Ok(self.get(set)?.list())
    }

    pub fn flush(&self, set: &str) -> Result<usize, ControlError> {
        Ok(self.get(set)?.flush())
    }

    /// Create a detached set and load its configured entries.
    pub fn build_set(
        &self,
        config: &SetConfig,
        limits: &LimitsConfig,
    ) -> Result<IpSet, ControlError> {
        let set = IpSet::create(
            &self.registry,
            config.name.as_str(),
            &config.set_type,
            config.family,
            config.options(limits),
        )?;

        for entry in &config.entries {
            let wrap = |source| ControlError::Entry {
                set: config.name.clone(),
                entry: entry.entry.clone(),
                source,
            };
            let mut request: SetRequest = entry.entry.parse().map_err(wrap)?;
            request.nomatch = entry.nomatch;
            request.comment = entry.comment.clone();
            set.add(&request).map_err(wrap)?;
        }

        tracing::debug!(set = %config.name, elements = set.len(), "Set built from config");
        Ok(set)
    }

    /// Replace the running sets with those in `config`.
    ///
    /// Sets are built off to the side first, so a failing set leaves every
    /// running set untouched.
    pub fn apply_config(&self, config: &EngineConfig) -> Result<ReloadSummary, ControlError> {
        let built = config
            .sets
            .iter()
            .map(|set| self.build_set(set, &config.limits))
            .collect::<Result<Vec<_>, _>>()?;

        self.limits.store(Arc::new(config.limits.clone()));

        let mut summary = ReloadSummary::default();
        for set in built {
            let name = set.name().to_string();
            metrics::record_set_size(&name, set.len());
            match self.sets.insert(name.clone(), Arc::new(set)) {
                Some(_) => summary.replaced.push(name),
                None => summary.created.push(name),
            }
        }

        let stale: Vec<String> = self
            .sets
            .iter()
            .map(|e| e.key().clone())
            .filter(|name| !config.sets.iter().any(|s| &s.name == name))
            .collect();
        for name in stale {
            self.sets.remove(&name);
            summary.removed.push(name);
        }

        metrics::record_set_count(self.sets.len());
        tracing::info!(
            created = summary.created.len(),
            replaced = summary.replaced.len(),
            removed = summary.removed.len(),
            "Configuration applied"
        );
        Ok(summary)
    }
}
