//! Multi-length lookup.
//!
//! # Data Flow
//! ```text
//! probe (host addresses, exact L4)
//!     │
//!     ▼
//! for each mask in the histogram, most specific first:
//!     skip if the mask is narrower than the probe's prefix
//!     netmask(probe, mask) ──▶ exact test
//!         EqualReject ──▶ Reject (stop)
//!         EqualAccept ──▶ remember
//!     │
//!     ▼
//! Accept if remembered, else NotFound
//! ```
//!
//! An exclusion anywhere wins over an inclusion anywhere, regardless of
//! prefix length. Only masks with at least one stored element are visited.
//! A probe that names a prefix only matches elements of that prefix or wider.

use crate::ipset::hash::HashTable;
use crate::ipset::types::{Compare, ElemKey, TestResult};
use crate::ipset::variant::{Probe, TypeVariant};

pub(crate) fn classify(table: &HashTable, variant: &dyn TypeVariant, probe: Probe) -> TestResult {
    match probe {
        Probe::Exact(key) => table.test(variant, &key).into(),
        Probe::Lookup(key) => lookup(table, variant, &key),
    }
}

fn lookup(table: &HashTable, variant: &dyn TypeVariant, key: &ElemKey) -> TestResult {
    let mut accepted = false;
    for mask in table.masks().rev() {
        if mask.cidr1 > key.cidr1 || mask.cidr2 > key.cidr2 {
            continue;
        }
        let masked = variant.netmask(key, *mask);
        match table.test(variant, &masked) {
            Compare::EqualReject => return TestResult::Reject,
            Compare::EqualAccept => accepted = true,
            Compare::Unequal => {}
        }
    }
    if accepted {
        TestResult::Accept
    } else {
        TestResult::NotFound
    }
}
