//! Hash table core.
//!
//! # Responsibilities
//! - Store element records in power-of-two bucket chains
//! - Delegate hashing and equality to the set's type variant
//! - Track the mask histogram used by multi-length lookup
//!
//! # Design Decisions
//! - Buckets are `Arc`-shared: cloning a table is shallow, and a write copies
//!   only the buckets it touches. Writers mutate a clone and publish it whole.
//! - Resizing rehashes into a fresh bucket array on the writer's copy, so a
//!   reader holding the old table keeps seeing every element it had

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ipset::error::SetError;
use crate::ipset::types::{Compare, Elem, ElemKey, MaskKey};
use crate::ipset::variant::TypeVariant;

/// Grow once the element count passes this share of the bucket count.
const MAX_LOAD_PERCENT: usize = 75;

/// What to do when an added element's key is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnCollision {
    /// Overwrite nomatch flag and comment.
    Replace,
    /// Refuse a differing nomatch flag; identical re-adds are no-ops.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Replaced,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct HashTable {
    buckets: Vec<Arc<Vec<Elem>>>,
    len: usize,
    max_elements: usize,
    masks: BTreeMap<MaskKey, usize>,
}

impl HashTable {
    /// `hash_size` is rounded up to a power of two.
    pub fn new(hash_size: usize, max_elements: usize) -> Self {
        Self {
            buckets: empty_buckets(hash_size.max(1).next_power_of_two()),
            len: 0,
            max_elements,
            masks: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Distinct masks present, least specific first.
    pub fn masks(&self) -> impl DoubleEndedIterator<Item = &MaskKey> {
        self.masks.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Elem> {
        self.buckets.iter().flat_map(|bucket| bucket.iter())
    }

    fn slot(&self, hash: u32) -> usize {
        hash as usize & (self.buckets.len() - 1)
    }

    fn position(&self, variant: &dyn TypeVariant, key: &ElemKey) -> (usize, Option<usize>) {
        let slot = self.slot(variant.hash(key));
        let pos = self.buckets[slot]
            .iter()
            .position(|elem| variant.compare(key, elem) != Compare::Unequal);
        (slot, pos)
    }

    /// Exact-key test, no expansion.
    pub fn test(&self, variant: &dyn TypeVariant, key: &ElemKey) -> Compare {
        let slot = self.slot(variant.hash(key));
        self.buckets[slot]
            .iter()
            .map(|elem| variant.compare(key, elem))
            .find(|c| *c != Compare::Unequal)
            .unwrap_or(Compare::Unequal)
    }

    pub fn add(
        &mut self,
        variant: &dyn TypeVariant,
        elem: Elem,
        policy: OnCollision,
    ) -> Result<AddOutcome, SetError> {
        let (slot, pos) = self.position(variant, &elem.key);

        if let Some(pos) = pos {
            let existing = &self.buckets[slot][pos];
            let same_nomatch = existing.nomatch == elem.nomatch;
            if same_nomatch && existing.comment == elem.comment {
                return Ok(AddOutcome::Unchanged);
            }
            return match policy {
                OnCollision::Replace => {
                    Arc::make_mut(&mut self.buckets[slot])[pos] = elem;
                    Ok(AddOutcome::Replaced)
                }
                OnCollision::Reject if !same_nomatch => {
                    let existing = &self.buckets[slot][pos];
                    Err(SetError::KeyCollision(variant.list(existing, false).to_string()))
                }
                OnCollision::Reject => Ok(AddOutcome::Unchanged),
            };
        }

        if self.len >= self.max_elements {
            return Err(SetError::SetFull {
                limit: self.max_elements,
            });
        }
        if (self.len + 1) * 100 > self.buckets.len() * MAX_LOAD_PERCENT {
            self.grow(variant);
        }

        let slot = self.slot(variant.hash(&elem.key));
        *self.masks.entry(elem.key.mask()).or_insert(0) += 1;
        Arc::make_mut(&mut self.buckets[slot]).push(elem);
        self.len += 1;
        Ok(AddOutcome::Added)
    }

    pub fn del(&mut self, variant: &dyn TypeVariant, key: &ElemKey) -> Option<Elem> {
        let (slot, pos) = self.position(variant, key);
        let pos = pos?;
        let removed = Arc::make_mut(&mut self.buckets[slot]).swap_remove(pos);
        self.len -= 1;

        let mask = removed.key.mask();
        if let Some(count) = self.masks.get_mut(&mask) {
            *count -= 1;
            if *count == 0 {
                self.masks.remove(&mask);
            }
        }
        Some(removed)
    }

    pub fn clear(&mut self) {
        let buckets = self.buckets.len();
        self.buckets = empty_buckets(buckets);
        self.len = 0;
        self.masks.clear();
    }

    fn grow(&mut self, variant: &dyn TypeVariant) {
        let size = self.buckets.len() * 2;
        let mut chains: Vec<Vec<Elem>> = vec![Vec::new(); size];
        for elem in self.iter() {
            let slot = variant.hash(&elem.key) as usize & (size - 1);
            chains[slot].push(elem.clone());
        }
        self.buckets = chains.into_iter().map(Arc::new).collect();
        tracing::debug!(buckets = size, elements = self.len, "Hash table resized");
    }
}

fn empty_buckets(size: usize) -> Vec<Arc<Vec<Elem>>> {
    (0..size).map(|_| Arc::new(Vec::new())).collect()
}
