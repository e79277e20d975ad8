//! Packet view consumed by the data-path classifier.
//!
//! The classifier only needs the two network addresses, the L4 protocol and
//! the first 16-bit word past the network header. `Packet` is a borrowed view
//! over a raw IPv4/IPv6 datagram for callers without their own packet type.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Offset of the classified port within the transport header.
///
/// This is the first 16-bit word after the network header, which is the
/// source port for TCP, UDP, SCTP and UDP-Lite.
pub const PORT_OFFSET: usize = 0;

const IPV4_MIN_HEADER: usize = 20;
const IPV6_HEADER: usize = 40;

pub trait PacketView {
    fn src_addr(&self) -> IpAddr;

    fn dst_addr(&self) -> IpAddr;

    /// L4 protocol number.
    fn protocol(&self) -> u8;

    /// Bytes following the network header.
    fn transport_header(&self) -> &[u8];
}

/// Port used as the probe key; `None` if the transport header is too short.
pub fn l4_port(pkt: &dyn PacketView) -> Option<u16> {
    let l4 = pkt.transport_header();
    let word = l4.get(PORT_OFFSET..PORT_OFFSET + 2)?;
    Some(u16::from_be_bytes([word[0], word[1]]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub protocol: u8,
    pub l4: &'a [u8],
}

impl<'a> Packet<'a> {
    pub fn new(src: IpAddr, dst: IpAddr, protocol: u8, l4: &'a [u8]) -> Self {
        Self { src, dst, protocol, l4 }
    }

    /// Parse a raw datagram. IPv6 extension headers are not walked: the
    /// next-header field is taken as the protocol.
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        match *data.first()? >> 4 {
            4 => Self::parse_v4(data),
            6 => Self::parse_v6(data),
            _ => None,
        }
    }

    fn parse_v4(data: &'a [u8]) -> Option<Self> {
        let ihl = usize::from(data[0] & 0x0f) * 4;
        if ihl < IPV4_MIN_HEADER || data.len() < ihl {
            return None;
        }
        let total = usize::from(u16::from_be_bytes([data[2], data[3]]));
        let end = total.clamp(ihl, data.len());
        let octets = |at: usize| [data[at], data[at + 1], data[at + 2], data[at + 3]];
        Some(Self {
            src: IpAddr::V4(Ipv4Addr::from(octets(12))),
            dst: IpAddr::V4(Ipv4Addr::from(octets(16))),
            protocol: data[9],
            l4: &data[ihl..end],
        })
    }

    fn parse_v6(data: &'a [u8]) -> Option<Self> {
        if data.len() < IPV6_HEADER {
            return None;
        }
        let payload = usize::from(u16::from_be_bytes([data[4], data[5]]));
        let end = (IPV6_HEADER + payload).min(data.len());
        let addr = |at: usize| {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&data[at..at + 16]);
            Ipv6Addr::from(octets)
        };
        Some(Self {
            src: IpAddr::V6(addr(8)),
            dst: IpAddr::V6(addr(24)),
            protocol: data[6],
            l4: &data[IPV6_HEADER..end],
        })
    }
}

impl PacketView for Packet<'_> {
    fn src_addr(&self) -> IpAddr {
        self.src
    }

    fn dst_addr(&self) -> IpAddr {
        self.dst
    }

    fn protocol(&self) -> u8 {
        self.protocol
    }

    fn transport_header(&self) -> &[u8] {
        self.l4
    }
}
