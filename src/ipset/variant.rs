//! Type variants: the capability table of a set type for one address family.
//!
//! # Responsibilities
//! - Hash and compare over the key view
//! - Mask probe keys for multi-length lookup
//! - Project stored elements into list records
//! - Expand requests per family (`plan`) and build test / packet probes
//!
//! # Design Decisions
//! - One `HashVariant<S, F>` per (shape, family), monomorphized; the registry
//!   hands out `Arc<dyn TypeVariant>` resolved once at set creation
//! - Nomatch is not part of equality; compare reports it as `EqualReject`

use std::fmt;
use std::marker::PhantomData;

use crate::ipset::adt::{AdtPlan, PortPlan};
use crate::ipset::cidr::{prefix_mask, Cidr};
use crate::ipset::error::SetError;
use crate::ipset::family::AddrFamily;
use crate::ipset::packet::{self, PacketView};
use crate::ipset::request::{NetRange, SetRequest};
use crate::ipset::shape::KeyShape;
use crate::ipset::types::{
    addr_bits, bits_addr, proto, Compare, Elem, ElemKey, Family, L4Member, MaskKey, Member, Net,
};

/// How a control-plane test is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Every network field carried an explicit prefix: look up that element only.
    Exact(ElemKey),
    /// Point addresses: run the multi-length lookup. A field given with a
    /// prefix keeps it in the key and bounds the masks tried for that field.
    Lookup(ElemKey),
}

pub trait TypeVariant: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &'static str;

    fn family(&self) -> Family;

    /// Bucket hash over the key view.
    fn hash(&self, key: &ElemKey) -> u32;

    fn compare(&self, probe: &ElemKey, stored: &Elem) -> Compare {
        if *probe != stored.key {
            Compare::Unequal
        } else if stored.nomatch {
            Compare::EqualReject
        } else {
            Compare::EqualAccept
        }
    }

    /// Mask an unmasked probe down to `mask` before lookup.
    fn netmask(&self, key: &ElemKey, mask: MaskKey) -> ElemKey;

    fn list(&self, elem: &Elem, comment: bool) -> Member;

    /// Expand an add/del request into its element plan.
    fn plan(&self, request: &SetRequest) -> Result<AdtPlan, SetError>;

    fn test_probe(&self, request: &SetRequest) -> Result<Probe, SetError>;

    /// Probe key for a live packet; `None` when the packet cannot yield one.
    fn packet_key(&self, pkt: &dyn PacketView) -> Option<ElemKey>;
}

pub struct HashVariant<S, F> {
    _marker: PhantomData<fn() -> (S, F)>,
}

impl<S: KeyShape, F: AddrFamily> HashVariant<S, F> {
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    fn check_family(request: &SetRequest) -> Result<(), SetError> {
        if request.family != F::FAMILY {
            return Err(SetError::FamilyMismatch {
                set: F::FAMILY,
                request: request.family,
            });
        }
        Ok(())
    }

    fn check_fields(request: &SetRequest) -> Result<(), SetError> {
        if S::NETS < 2 && request.net2.is_some() {
            return Err(SetError::UnsupportedOperation(format!(
                "{} has a single network field",
                S::NAME
            )));
        }
        if !S::L4 && (request.ports.is_some() || request.proto != proto::ANY) {
            return Err(SetError::UnsupportedOperation(format!(
                "{} has no protocol or port field",
                S::NAME
            )));
        }
        Ok(())
    }

    fn net2(request: &SetRequest) -> NetRange {
        request.net2.unwrap_or_else(|| NetRange::any(F::FAMILY))
    }

    /// Single block for an explicitly prefixed field, or the unmasked host address.
    fn probe_field(net: &NetRange) -> Result<(u128, u8), SetError> {
        let (from, _, prefix) = net.bounds(F::FAMILY)?;
        match prefix {
            Some(prefix) => {
                let block = Cidr::new(F::BITS, from, prefix)?;
                Ok((block.addr, block.prefix))
            }
            None => Ok((from, F::BITS)),
        }
    }
}

impl<S: KeyShape, F: AddrFamily> Default for HashVariant<S, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: KeyShape, F: AddrFamily> fmt::Debug for HashVariant<S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashVariant({}, {})", S::NAME, F::FAMILY)
    }
}

impl<S: KeyShape, F: AddrFamily> TypeVariant for HashVariant<S, F> {
    fn type_name(&self) -> &'static str {
        S::NAME
    }

    fn family(&self) -> Family {
        F::FAMILY
    }

    fn hash(&self, key: &ElemKey) -> u32 {
        F::hash(key)
    }

    fn netmask(&self, key: &ElemKey, mask: MaskKey) -> ElemKey {
        let mut masked = *key;
        masked.ip1 &= prefix_mask(F::BITS, mask.cidr1);
        masked.cidr1 = mask.cidr1;
        if S::NETS == 2 {
            masked.ip2 &= prefix_mask(F::BITS, mask.cidr2);
            masked.cidr2 = mask.cidr2;
        }
        if S::L4 {
            if !mask.proto_exact {
                masked.proto = proto::ANY;
            }
            if !mask.port_exact {
                masked.port = 0;
                masked.port_any = true;
            }
        }
        masked
    }

    fn list(&self, elem: &Elem, comment: bool) -> Member {
        let key = &elem.key;
        Member {
            net1: Net {
                addr: bits_addr(F::FAMILY, key.ip1),
                prefix: key.cidr1,
            },
            l4: S::L4.then(|| L4Member {
                proto: key.proto,
                port: (!key.port_any).then_some(key.port),
            }),
            net2: (S::NETS == 2).then(|| Net {
                addr: bits_addr(F::FAMILY, key.ip2),
                prefix: key.cidr2,
            }),
            nomatch: elem.nomatch,
            comment: if comment { elem.comment.clone() } else { None },
        }
    }

    fn plan(&self, request: &SetRequest) -> Result<AdtPlan, SetError> {
        Self::check_family(request)?;
        Self::check_fields(request)?;

        let (from, to, prefix) = request.net1.bounds(F::FAMILY)?;
        let net1 = F::expand(from, to, prefix)?;

        let net2 = if S::NETS == 2 {
            let (from, to, prefix) = Self::net2(request).bounds(F::FAMILY)?;
            F::expand(from, to, prefix)?
        } else {
            vec![Cidr::ANY]
        };

        let (proto, ports) = if S::L4 {
            (request.proto, PortPlan::from_request(request.ports)?)
        } else {
            (proto::ANY, PortPlan::None)
        };

        Ok(AdtPlan {
            net1,
            net2,
            proto,
            ports,
        })
    }

    fn test_probe(&self, request: &SetRequest) -> Result<Probe, SetError> {
        Self::check_family(request)?;
        Self::check_fields(request)?;

        let net2 = Self::net2(request);
        let exact = request.net1.prefix.is_some() && (S::NETS < 2 || net2.prefix.is_some());

        let (ip1, cidr1) = Self::probe_field(&request.net1)?;
        let mut key = ElemKey {
            ip1,
            cidr1,
            ..ElemKey::default()
        };
        if S::NETS == 2 {
            let (ip2, cidr2) = Self::probe_field(&net2)?;
            key.ip2 = ip2;
            key.cidr2 = cidr2;
        }
        if S::L4 {
            key.proto = request.proto;
            match request.ports {
                Some(ports) if exact && ports.is_full() => key.port_any = true,
                Some(ports) => key.port = ports.from,
                None if exact => key.port_any = true,
                None => {}
            }
        }

        Ok(if exact { Probe::Exact(key) } else { Probe::Lookup(key) })
    }

    fn packet_key(&self, pkt: &dyn PacketView) -> Option<ElemKey> {
        let src = pkt.src_addr();
        if Family::of(&src) != F::FAMILY {
            return None;
        }
        let mut key = ElemKey {
            ip1: addr_bits(src),
            cidr1: F::BITS,
            ..ElemKey::default()
        };
        if S::NETS == 2 {
            let dst = pkt.dst_addr();
            if Family::of(&dst) != F::FAMILY {
                return None;
            }
            key.ip2 = addr_bits(dst);
            key.cidr2 = F::BITS;
        }
        if S::L4 {
            key.proto = pkt.protocol();
            key.port = packet::l4_port(pkt)?;
        }
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipset::family::{Inet, Inet6};
    use crate::ipset::request::PortRange;
    use crate::ipset::shape::{HashNet, HashNetPortNet};

    fn req(entry: &str) -> SetRequest {
        entry.parse().unwrap()
    }

    #[test]
    fn test_plan_scenario_counts() {
        let v = HashVariant::<HashNetPortNet, Inet>::new();
        let plan = v.plan(&req("10.0.0.0/24,tcp:80-81,192.168.1.0/24")).unwrap();
        assert_eq!(plan.len(), 2);

        let plan = v.plan(&req("10.0.0.0-10.0.0.5,tcp:80,192.168.1.0-192.168.1.2")).unwrap();
        // 2 blocks × 2 blocks × 1 port
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn test_plan_rejects_wrong_family() {
        let v = HashVariant::<HashNetPortNet, Inet>::new();
        let err = v.plan(&req("2001:db8::/64,tcp:80")).unwrap_err();
        assert_eq!(
            err,
            SetError::FamilyMismatch { set: Family::Inet, request: Family::Inet6 }
        );

        // family of the second network is checked too
        let err = v.plan(&req("10.0.0.0/24,tcp:80,2001:db8::/64")).unwrap_err();
        assert!(matches!(err, SetError::FamilyMismatch { .. }));
    }

    #[test]
    fn test_inet6_plan_needs_prefix() {
        let v = HashVariant::<HashNetPortNet, Inet6>::new();
        assert!(v.plan(&req("2001:db8::/64,tcp:80-82,2001:db8:1::/48")).is_ok());
        let err = v.plan(&req("2001:db8::1-2001:db8::5,tcp:80")).unwrap_err();
        assert!(matches!(err, SetError::UnsupportedOperation(_)));
    }

    #[test]
    fn test_single_net_shape_rejects_extra_fields() {
        let v = HashVariant::<HashNet, Inet>::new();
        assert!(v.plan(&req("10.0.0.0/8")).is_ok());
        assert!(matches!(
            v.plan(&req("10.0.0.0/8,tcp:80")),
            Err(SetError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_netmask_applies_wildcards() {
        let v = HashVariant::<HashNetPortNet, Inet>::new();
        let probe = ElemKey {
            ip1: 0x0a00_0005,
            cidr1: 32,
            ip2: 0xc0a8_0109,
            cidr2: 32,
            proto: proto::TCP,
            port: 80,
            port_any: false,
        };
        let masked = v.netmask(
            &probe,
            MaskKey { cidr1: 24, cidr2: 16, proto_exact: false, port_exact: false },
        );
        assert_eq!(masked.ip1, 0x0a00_0000);
        assert_eq!(masked.ip2, 0xc0a8_0000);
        assert_eq!(masked.proto, proto::ANY);
        assert!(masked.port_any);
        assert_eq!(masked.port, 0);
    }

    #[test]
    fn test_probe_modes() {
        let v = HashVariant::<HashNetPortNet, Inet>::new();
        assert!(matches!(
            v.test_probe(&req("10.0.0.0/24,tcp:80,192.168.1.0/24")).unwrap(),
            Probe::Exact(_)
        ));
        assert!(matches!(
            v.test_probe(&req("10.0.0.5,tcp:80,192.168.1.9")).unwrap(),
            Probe::Lookup(_)
        ));
        let probe = v
            .test_probe(&SetRequest::new("10.0.0.5".parse().unwrap()).with_ports(PortRange::new(80, 90)))
            .unwrap();
        match probe {
            Probe::Lookup(key) => assert_eq!(key.port, 80),
            Probe::Exact(_) => panic!("expected lookup"),
        }
    }

    #[test]
    fn test_list_projection() {
        let v = HashVariant::<HashNetPortNet, Inet>::new();
        let plan = v.plan(&req("10.0.0.0/24,udp:53,192.168.1.0/24")).unwrap();
        let key = plan.keys().next().unwrap();
        let elem = Elem { key, nomatch: false, comment: Some("dns".into()) };
        assert_eq!(v.list(&elem, true).to_string(), "10.0.0.0/24,udp:53,192.168.1.0/24 comment \"dns\"");
        assert_eq!(v.list(&elem, false).comment, None);
    }
}
