//! ADT driver: expands range requests into element operations.
//!
//! # Responsibilities
//! - Hold the per-field expansion of a request (`AdtPlan`)
//! - Size the cartesian product before anything is mutated
//! - Apply add/del element by element against a table copy
//!
//! # Design Decisions
//! - Plans are built by the type variant; this module never looks at families
//! - Expansion is lazy: elements are generated while applying, not collected

use serde::Serialize;
use std::ops::RangeInclusive;

use crate::ipset::cidr::Cidr;
use crate::ipset::error::SetError;
use crate::ipset::hash::{AddOutcome, HashTable, OnCollision};
use crate::ipset::request::PortRange;
use crate::ipset::types::{Elem, ElemKey};
use crate::ipset::variant::TypeVariant;

/// How the port field of a request expands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortPlan {
    /// The shape has no port field.
    None,
    /// Full range, stored as a single port-any element.
    Any,
    /// One element per port.
    Range(PortRange),
}

impl PortPlan {
    pub fn from_request(ports: Option<PortRange>) -> Result<Self, SetError> {
        match ports {
            None => Ok(PortPlan::Any),
            Some(r) if r.from > r.to => Err(SetError::InvalidRange(format!(
                "port range {}-{} is inverted",
                r.from, r.to
            ))),
            Some(r) if r.is_full() => Ok(PortPlan::Any),
            Some(r) => Ok(PortPlan::Range(r)),
        }
    }

    pub fn len(&self) -> u64 {
        match self {
            PortPlan::None | PortPlan::Any => 1,
            PortPlan::Range(r) => u64::from(r.to - r.from) + 1,
        }
    }

    /// `(port, port_any)` pairs.
    fn values(&self) -> impl Iterator<Item = (u16, bool)> {
        let (ports, any): (RangeInclusive<u16>, bool) = match self {
            PortPlan::None => (0..=0, false),
            PortPlan::Any => (0..=0, true),
            PortPlan::Range(r) => (r.from..=r.to, false),
        };
        ports.map(move |port| (port, any))
    }
}

/// Fully validated expansion of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdtPlan {
    pub net1: Vec<Cidr>,
    /// `[Cidr::ANY]` for single-network shapes.
    pub net2: Vec<Cidr>,
    pub proto: u8,
    pub ports: PortPlan,
}

impl AdtPlan {
    /// Number of elements the plan expands to.
    pub fn len(&self) -> u64 {
        (self.net1.len() as u64)
            .saturating_mul(self.net2.len() as u64)
            .saturating_mul(self.ports.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product net1 × net2 × ports; net2 is re-enumerated for every net1 block.
    pub fn keys(&self) -> impl Iterator<Item = ElemKey> + '_ {
        self.net1.iter().flat_map(move |n1| {
            self.net2.iter().flat_map(move |n2| {
                self.ports.values().map(move |(port, port_any)| ElemKey {
                    ip1: n1.addr,
                    cidr1: n1.prefix,
                    ip2: n2.addr,
                    cidr2: n2.prefix,
                    proto: self.proto,
                    port,
                    port_any,
                })
            })
        })
    }
}

/// Element counts produced by one add or del request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdtOutcome {
    pub added: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub missing: usize,
}

impl AdtOutcome {
    pub fn changed(&self) -> usize {
        self.added + self.replaced + self.deleted
    }
}

pub(crate) fn add(
    table: &mut HashTable,
    variant: &dyn TypeVariant,
    plan: &AdtPlan,
    nomatch: bool,
    comment: Option<&str>,
    policy: OnCollision,
) -> Result<AdtOutcome, SetError> {
    let mut outcome = AdtOutcome::default();
    for key in plan.keys() {
        let elem = Elem {
            key,
            nomatch,
            comment: comment.map(str::to_owned),
        };
        match table.add(variant, elem, policy)? {
            AddOutcome::Added => outcome.added += 1,
            AddOutcome::Replaced => outcome.replaced += 1,
            AddOutcome::Unchanged => outcome.unchanged += 1,
        }
    }
    Ok(outcome)
}

/// Absent elements are skipped; a request that matched nothing is `NotFound`.
pub(crate) fn del(
    table: &mut HashTable,
    variant: &dyn TypeVariant,
    plan: &AdtPlan,
) -> Result<AdtOutcome, SetError> {
    let mut outcome = AdtOutcome::default();
    for key in plan.keys() {
        match table.del(variant, &key) {
            Some(_) => outcome.deleted += 1,
            None => outcome.missing += 1,
        }
    }
    if outcome.deleted == 0 {
        return Err(SetError::NotFound);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_plan() {
        assert_eq!(PortPlan::from_request(None).unwrap(), PortPlan::Any);
        assert_eq!(
            PortPlan::from_request(Some(PortRange::FULL)).unwrap(),
            PortPlan::Any
        );
        assert_eq!(
            PortPlan::from_request(Some(PortRange::new(80, 81))).unwrap().len(),
            2
        );
        assert!(PortPlan::from_request(Some(PortRange::new(81, 80))).is_err());
    }

    #[test]
    fn test_top_port_does_not_wrap() {
        let plan = PortPlan::Range(PortRange::new(65534, 65535));
        let ports: Vec<_> = plan.values().collect();
        assert_eq!(ports, vec![(65534, false), (65535, false)]);
    }

    #[test]
    fn test_cartesian_product() {
        let plan = AdtPlan {
            net1: vec![Cidr { addr: 0, prefix: 31 }, Cidr { addr: 2, prefix: 32 }],
            net2: vec![Cidr { addr: 8, prefix: 30 }, Cidr { addr: 12, prefix: 31 }],
            proto: 6,
            ports: PortPlan::Range(PortRange::new(80, 82)),
        };
        assert_eq!(plan.len(), 12);
        let keys: Vec<_> = plan.keys().collect();
        assert_eq!(keys.len(), 12);
        // net2 is fully re-enumerated for the second net1 block
        assert_eq!(keys[6].ip1, 2);
        assert_eq!(keys[6].ip2, 8);
        assert_eq!(keys[6].port, 80);
    }
}
