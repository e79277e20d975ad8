//! Core set types: families, element keys, stored records and results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Well-known IP protocol numbers.
pub mod proto {
    /// Wildcard: matches any protocol.
    pub const ANY: u8 = 0;
    pub const ICMP: u8 = 1;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
    pub const ICMPV6: u8 = 58;
    pub const SCTP: u8 = 132;
    pub const UDPLITE: u8 = 136;

    /// Parse a protocol name or number.
    pub fn parse(s: &str) -> Option<u8> {
        match s.to_ascii_lowercase().as_str() {
            "any" | "*" => Some(ANY),
            "icmp" => Some(ICMP),
            "tcp" => Some(TCP),
            "udp" => Some(UDP),
            "icmpv6" => Some(ICMPV6),
            "sctp" => Some(SCTP),
            "udplite" => Some(UDPLITE),
            other => other.parse().ok(),
        }
    }

    pub fn name(proto: u8) -> Option<&'static str> {
        match proto {
            ANY => Some("any"),
            ICMP => Some("icmp"),
            TCP => Some("tcp"),
            UDP => Some("udp"),
            ICMPV6 => Some("icmpv6"),
            SCTP => Some("sctp"),
            UDPLITE => Some("udplite"),
            _ => None,
        }
    }
}

/// Address family a set is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    #[default]
    Inet,
    Inet6,
}

impl Family {
    /// Width of an address in bits.
    pub const fn bits(self) -> u8 {
        match self {
            Family::Inet => 32,
            Family::Inet6 => 128,
        }
    }

    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Family::Inet,
            IpAddr::V6(_) => Family::Inet6,
        }
    }

    /// The all-zero address of this family.
    pub fn unspecified(self) -> IpAddr {
        match self {
            Family::Inet => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            Family::Inet6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Family::Inet => "inet",
            Family::Inet6 => "inet6",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Family {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inet" | "ipv4" => Ok(Family::Inet),
            "inet6" | "ipv6" => Ok(Family::Inet6),
            other => Err(format!("unknown family: {other}")),
        }
    }
}

/// Address as an unsigned integer; IPv4 occupies the low 32 bits.
pub fn addr_bits(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

pub fn bits_addr(family: Family, bits: u128) -> IpAddr {
    match family {
        Family::Inet => IpAddr::V4(Ipv4Addr::from(bits as u32)),
        Family::Inet6 => IpAddr::V6(Ipv6Addr::from(bits)),
    }
}

/// The key view: the only fields that take part in hashing and equality.
///
/// Fields a key shape does not use stay zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ElemKey {
    pub ip1: u128,
    pub cidr1: u8,
    pub ip2: u128,
    pub cidr2: u8,
    pub proto: u8,
    pub port: u16,
    /// Collapsed full port range; `port` is zero when set.
    pub port_any: bool,
}

impl ElemKey {
    /// Mask histogram slot this key belongs to.
    pub fn mask(&self) -> MaskKey {
        MaskKey {
            cidr1: self.cidr1,
            cidr2: self.cidr2,
            proto_exact: self.proto != proto::ANY,
            port_exact: !self.port_any,
        }
    }
}

/// A stored element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elem {
    pub key: ElemKey,
    pub nomatch: bool,
    pub comment: Option<String>,
}

/// Prefix lengths and L4 wildcard state a probe is masked to before lookup.
///
/// Ordering is by specificity: iterating in reverse visits the longest
/// prefixes first and exact L4 before wildcard L4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaskKey {
    pub cidr1: u8,
    pub cidr2: u8,
    pub proto_exact: bool,
    pub port_exact: bool,
}

/// Outcome of comparing a probe key against a stored element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Unequal,
    EqualAccept,
    EqualReject,
}

/// Tri-state classification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestResult {
    /// A matching element was found.
    Accept,
    /// A matching nomatch element was found: explicitly excluded.
    Reject,
    /// No element applies.
    NotFound,
}

impl TestResult {
    /// Resolve to a membership decision, using `default` when no element applies.
    pub fn matched_or(self, default: bool) -> bool {
        match self {
            TestResult::Accept => true,
            TestResult::Reject => false,
            TestResult::NotFound => default,
        }
    }
}

impl From<Compare> for TestResult {
    fn from(c: Compare) -> Self {
        match c {
            Compare::EqualAccept => TestResult::Accept,
            Compare::EqualReject => TestResult::Reject,
            Compare::Unequal => TestResult::NotFound,
        }
    }
}

impl TestResult {
    pub fn as_str(self) -> &'static str {
        match self {
            TestResult::Accept => "accept",
            TestResult::Reject => "reject",
            TestResult::NotFound => "not-found",
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network as shown in list output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Net {
    pub addr: IpAddr,
    pub prefix: u8,
}

impl fmt::Display for Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

impl Serialize for Net {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Protocol and port of a listed element. `port` is `None` for the port-any wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct L4Member {
    pub proto: u8,
    pub port: Option<u16>,
}

impl fmt::Display for L4Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match proto::name(self.proto) {
            Some(name) => f.write_str(name)?,
            None => write!(f, "{}", self.proto)?,
        }
        match self.port {
            Some(port) => write!(f, ":{port}"),
            None => f.write_str(":0-65535"),
        }
    }
}

/// Display record produced by listing a set.
///
/// Renders in entry syntax, so a listed member can be fed back as a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub net1: Net,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l4: Option<L4Member>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net2: Option<Net>,
    pub nomatch: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.net1)?;
        if let Some(l4) = &self.l4 {
            write!(f, ",{l4}")?;
        }
        if let Some(net2) = &self.net2 {
            write!(f, ",{net2}")?;
        }
        if self.nomatch {
            f.write_str(" nomatch")?;
        }
        if let Some(comment) = &self.comment {
            write!(f, " comment {comment:?}")?;
        }
        Ok(())
    }
}
