//! A named set: one type variant bound to one published hash table.
//!
//! # Responsibilities
//! - Validate and size control-plane requests before touching the table
//! - Serialize writers; publish each successful request as a whole new table
//! - Answer control-plane and packet-path tests without locking
//!
//! # Design Decisions
//! - Readers load the current table through `ArcSwap` and never block
//! - Writers clone the table (shallow, buckets are shared), apply the whole
//!   request to the clone and store it; a failed request publishes nothing

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::ipset::adt::{self, AdtOutcome};
use crate::ipset::error::SetError;
use crate::ipset::hash::{HashTable, OnCollision};
use crate::ipset::lookup;
use crate::ipset::packet::PacketView;
use crate::ipset::registry::TypeRegistry;
use crate::ipset::request::{AdtOp, SetRequest};
use crate::ipset::types::{Family, Member, TestResult};
use crate::ipset::variant::{Probe, TypeVariant};
use crate::observability::metrics;

/// Longest stored comment, in bytes.
pub const MAX_COMMENT_LEN: usize = 255;

/// Per-set creation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetOptions {
    /// Store comments on elements.
    pub comment: bool,
    /// Initial bucket count, rounded up to a power of two.
    pub hash_size: usize,
    /// Element limit for the whole set.
    pub max_elements: usize,
    /// Largest number of elements one request may expand to.
    pub max_request_elements: u64,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            comment: false,
            hash_size: 1024,
            max_elements: 65536,
            max_request_elements: 65536,
        }
    }
}

pub struct IpSet {
    name: String,
    variant: Arc<dyn TypeVariant>,
    options: SetOptions,
    table: ArcSwap<HashTable>,
    writer: Mutex<()>,
}

impl IpSet {
    /// Create an empty set, resolving its variant from `registry`.
    pub fn create(
        registry: &TypeRegistry,
        name: impl Into<String>,
        type_name: &str,
        family: Family,
        options: SetOptions,
    ) -> Result<Self, SetError> {
        let variant = registry.resolve(type_name, family)?;
        Ok(Self::with_variant(name, variant, options))
    }

    pub fn with_variant(
        name: impl Into<String>,
        variant: Arc<dyn TypeVariant>,
        options: SetOptions,
    ) -> Self {
        let name = name.into();
        tracing::info!(
            set = %name,
            type_name = variant.type_name(),
            family = %variant.family(),
            hash_size = options.hash_size,
            max_elements = options.max_elements,
            "Set created"
        );
        Self {
            table: ArcSwap::from_pointee(HashTable::new(options.hash_size, options.max_elements)),
            name,
            variant,
            options,
            writer: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.variant.type_name()
    }

    pub fn family(&self) -> Family {
        self.variant.family()
    }

    pub fn options(&self) -> &SetOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.table.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add every element the request expands to.
    pub fn add(&self, request: &SetRequest) -> Result<AdtOutcome, SetError> {
        let result = self.apply_add(request);
        self.record(AdtOp::Add, request, &result);
        result
    }

    /// Delete every element the request expands to.
    pub fn del(&self, request: &SetRequest) -> Result<AdtOutcome, SetError> {
        let result = self.apply_del(request);
        self.record(AdtOp::Del, request, &result);
        result
    }

    /// Control-plane test. Explicit prefixes on every network field test that
    /// element only; otherwise the multi-length lookup runs.
    pub fn test(&self, request: &SetRequest) -> Result<TestResult, SetError> {
        let result = self
            .variant
            .test_probe(request)
            .map(|probe| lookup::classify(&self.table.load(), self.variant.as_ref(), probe));
        match &result {
            Ok(verdict) => metrics::record_request(&self.name, AdtOp::Test, verdict.as_str()),
            Err(e) => {
                tracing::warn!(set = %self.name, error = %e, "Test request rejected");
                metrics::record_request(&self.name, AdtOp::Test, e.kind());
            }
        }
        result
    }

    /// Packet-path classification. Never fails and never locks.
    pub fn test_packet(&self, pkt: &dyn PacketView) -> TestResult {
        match self.variant.packet_key(pkt) {
            Some(key) => {
                let table = self.table.load();
                lookup::classify(&table, self.variant.as_ref(), Probe::Lookup(key))
            }
            None => TestResult::NotFound,
        }
    }

    /// Snapshot of every element, in hash order.
    pub fn list(&self) -> Vec<Member> {
        let table = self.table.load();
        table
            .iter()
            .map(|elem| self.variant.list(elem, self.options.comment))
            .collect()
    }

    /// Remove every element. Returns how many were removed.
    pub fn flush(&self) -> usize {
        let removed = self
            .mutate(|table| {
                let removed = table.len();
                table.clear();
                Ok(removed)
            })
            .unwrap_or_default();
        tracing::info!(set = %self.name, removed, "Set flushed");
        metrics::record_set_size(&self.name, 0);
        removed
    }

    fn apply_add(&self, request: &SetRequest) -> Result<AdtOutcome, SetError> {
        let plan = self.variant.plan(request)?;
        self.check_capacity(plan.len())?;

        let comment = self.stored_comment(request.comment.as_deref());
        let policy = if request.replace {
            OnCollision::Replace
        } else {
            OnCollision::Reject
        };
        let variant = self.variant.as_ref();
        self.mutate(|table| adt::add(table, variant, &plan, request.nomatch, comment, policy))
    }

    fn apply_del(&self, request: &SetRequest) -> Result<AdtOutcome, SetError> {
        let plan = self.variant.plan(request)?;
        self.check_capacity(plan.len())?;

        let variant = self.variant.as_ref();
        self.mutate(|table| adt::del(table, variant, &plan))
    }

    fn check_capacity(&self, requested: u64) -> Result<(), SetError> {
        let limit = self.options.max_request_elements;
        if requested > limit {
            return Err(SetError::CapacityExceeded { requested, limit });
        }
        Ok(())
    }

    fn stored_comment<'a>(&self, comment: Option<&'a str>) -> Option<&'a str> {
        if !self.options.comment {
            return None;
        }
        comment.map(|c| truncate(c, MAX_COMMENT_LEN))
    }

    /// Run `f` on a private copy of the table and publish it if `f` succeeds.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut HashTable) -> Result<T, SetError>,
    ) -> Result<T, SetError> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut table = HashTable::clone(&self.table.load());
        let out = f(&mut table)?;
        self.table.store(Arc::new(table));
        Ok(out)
    }

    fn record(&self, op: AdtOp, request: &SetRequest, result: &Result<AdtOutcome, SetError>) {
        match result {
            Ok(outcome) => {
                tracing::debug!(
                    set = %self.name,
                    op = %op,
                    added = outcome.added,
                    replaced = outcome.replaced,
                    unchanged = outcome.unchanged,
                    deleted = outcome.deleted,
                    missing = outcome.missing,
                    "Request applied"
                );
                metrics::record_request(&self.name, op, "ok");
                if outcome.changed() > 0 {
                    metrics::record_set_size(&self.name, self.len());
                }
            }
            Err(e) => {
                tracing::warn!(set = %self.name, op = %op, request = ?request, error = %e, "Request rejected");
                metrics::record_request(&self.name, op, e.kind());
            }
        }
    }
}

impl fmt::Debug for IpSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpSet")
            .field("name", &self.name)
            .field("type", &self.variant.type_name())
            .field("family", &self.variant.family())
            .field("len", &self.len())
            .finish()
    }
}

/// Longest prefix of `s` within `max` bytes that ends on a char boundary.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
