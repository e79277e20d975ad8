//! Control-plane requests and the entry text syntax.
//!
//! Entry syntax follows ipset: `NET[,PROTO:PORTS][,NET]`.
//!
//! ```text
//! 10.0.0.0/24
//! 10.0.0.0-10.0.0.5,udp:53
//! 10.0.0.0/24,tcp:80-81,192.168.1.0/24
//! 2001:db8::/64,any:0-65535,2001:db8:1::/64
//! ```

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::ipset::error::SetError;
use crate::ipset::types::{addr_bits, proto, Family};

/// Operation applied by the ADT driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdtOp {
    Add,
    Del,
    Test,
}

impl AdtOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AdtOp::Add => "add",
            AdtOp::Del => "del",
            AdtOp::Test => "test",
        }
    }
}

impl fmt::Display for AdtOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One network field of a request: an inclusive range, optionally pinned to a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetRange {
    pub from: IpAddr,
    pub to: IpAddr,
    /// When set, the field is the single block `from/prefix` and `to` is ignored.
    pub prefix: Option<u8>,
}

impl NetRange {
    pub fn host(addr: IpAddr) -> Self {
        Self { from: addr, to: addr, prefix: None }
    }

    pub fn cidr(addr: IpAddr, prefix: u8) -> Self {
        Self { from: addr, to: addr, prefix: Some(prefix) }
    }

    pub fn range(from: IpAddr, to: IpAddr) -> Self {
        Self { from, to, prefix: None }
    }

    /// The whole address space of `family`.
    pub fn any(family: Family) -> Self {
        Self::cidr(family.unspecified(), 0)
    }

    pub fn family(&self) -> Family {
        Family::of(&self.from)
    }

    /// Integer bounds, checked against the family the caller expects.
    pub(crate) fn bounds(&self, family: Family) -> Result<(u128, u128, Option<u8>), SetError> {
        for addr in [self.from, self.to] {
            let request = Family::of(&addr);
            if request != family {
                return Err(SetError::FamilyMismatch { set: family, request });
            }
        }
        Ok((addr_bits(self.from), addr_bits(self.to), self.prefix))
    }
}

impl FromStr for NetRange {
    type Err = SetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parse_addr = |a: &str| {
            a.trim()
                .parse::<IpAddr>()
                .map_err(|_| SetError::invalid_entry(s, format!("bad address {a:?}")))
        };

        if let Some((addr, len)) = s.split_once('/') {
            let prefix = len
                .trim()
                .parse::<u8>()
                .map_err(|_| SetError::invalid_entry(s, format!("bad prefix length {len:?}")))?;
            return Ok(Self::cidr(parse_addr(addr)?, prefix));
        }
        if let Some((from, to)) = s.split_once('-') {
            let (from, to) = (parse_addr(from)?, parse_addr(to)?);
            if Family::of(&from) != Family::of(&to) {
                return Err(SetError::invalid_entry(s, "range mixes address families"));
            }
            return Ok(Self::range(from, to));
        }
        Ok(Self::host(parse_addr(s)?))
    }
}

impl fmt::Display for NetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            Some(prefix) => write!(f, "{}/{}", self.from, prefix),
            None if self.from == self.to => write!(f, "{}", self.from),
            None => write!(f, "{}-{}", self.from, self.to),
        }
    }
}

/// Inclusive port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub from: u16,
    pub to: u16,
}

impl PortRange {
    pub const FULL: PortRange = PortRange { from: 0, to: u16::MAX };

    pub const fn new(from: u16, to: u16) -> Self {
        Self { from, to }
    }

    pub const fn single(port: u16) -> Self {
        Self { from: port, to: port }
    }

    /// Covers every port; stored as the port-any wildcard.
    pub const fn is_full(&self) -> bool {
        self.from == 0 && self.to == u16::MAX
    }
}

impl FromStr for PortRange {
    type Err = SetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_port = |p: &str| {
            p.trim()
                .parse::<u16>()
                .map_err(|_| SetError::invalid_entry(s, format!("bad port {p:?}")))
        };
        match s.split_once('-') {
            Some((from, to)) => Ok(Self::new(parse_port(from)?, parse_port(to)?)),
            None => Ok(Self::single(parse_port(s)?)),
        }
    }
}

/// A control-plane request against one set.
///
/// Ranges are expanded by the set's type variant; nothing of the request is
/// stored except the resulting elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRequest {
    pub family: Family,
    pub net1: NetRange,
    /// Second network for two-network shapes; `None` means the whole space.
    pub net2: Option<NetRange>,
    /// Protocol number, `0` for any.
    pub proto: u8,
    /// `None` means any port. A test probes `from` only; the rest of a
    /// partial range is ignored.
    pub ports: Option<PortRange>,
    pub comment: Option<String>,
    pub nomatch: bool,
    /// Overwrite an existing equal-key element on add (most recent write wins).
    pub replace: bool,
}

impl SetRequest {
    pub fn new(net1: NetRange) -> Self {
        Self {
            family: net1.family(),
            net1,
            net2: None,
            proto: proto::ANY,
            ports: None,
            comment: None,
            nomatch: false,
            replace: true,
        }
    }

    pub fn with_net2(mut self, net2: NetRange) -> Self {
        self.net2 = Some(net2);
        self
    }

    pub fn with_proto(mut self, proto: u8) -> Self {
        self.proto = proto;
        self
    }

    pub fn with_ports(mut self, ports: PortRange) -> Self {
        self.ports = Some(ports);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_nomatch(mut self, nomatch: bool) -> Self {
        self.nomatch = nomatch;
        self
    }

    /// Fail with `KeyCollision` instead of overwriting a differently-flagged element.
    pub fn strict(mut self) -> Self {
        self.replace = false;
        self
    }
}

fn parse_l4(entry: &str, part: &str) -> Result<(u8, PortRange), SetError> {
    match part.split_once(':') {
        Some((name, ports)) => {
            let proto = proto::parse(name.trim())
                .ok_or_else(|| SetError::invalid_entry(entry, format!("unknown protocol {name:?}")))?;
            Ok((proto, ports.parse()?))
        }
        // ipset defaults a bare port to TCP.
        None => Ok((proto::TCP, part.parse()?)),
    }
}

impl FromStr for SetRequest {
    type Err = SetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',').map(str::trim);
        let net1: NetRange = match parts.next() {
            Some(first) if !first.is_empty() => first.parse()?,
            _ => return Err(SetError::invalid_entry(s, "empty entry")),
        };
        let mut request = SetRequest::new(net1);

        for part in parts {
            if request.net2.is_some() {
                return Err(SetError::invalid_entry(s, "too many components"));
            }
            // IPv6 addresses contain ':' too, so try the network form first.
            if let Ok(net2) = part.parse::<NetRange>() {
                request.net2 = Some(net2);
                continue;
            }
            if request.ports.is_some() {
                return Err(SetError::invalid_entry(s, format!("unexpected component {part:?}")));
            }
            let (proto, ports) = parse_l4(s, part)?;
            request.proto = proto;
            request.ports = Some(ports);
        }
        Ok(request)
    }
}
