//! Shared utilities for integration tests.

use std::net::IpAddr;

use lb_ipset::ipset::{Family, IpSet, SetOptions, SetRequest, TypeRegistry};

/// Create a set with default options from the built-in registry.
pub fn new_set(type_name: &str, family: Family) -> IpSet {
    new_set_with(type_name, family, SetOptions::default())
}

pub fn new_set_with(type_name: &str, family: Family, options: SetOptions) -> IpSet {
    IpSet::create(&TypeRegistry::builtin(), "test", type_name, family, options).unwrap()
}

/// Parse an entry in ipset syntax.
pub fn req(entry: &str) -> SetRequest {
    entry.parse().unwrap()
}

/// Listed members rendered in entry syntax, sorted.
#[allow(dead_code)]
pub fn members(set: &IpSet) -> Vec<String> {
    let mut out: Vec<String> = set.list().iter().map(ToString::to_string).collect();
    out.sort();
    out
}

/// Build a raw IPv4 datagram with an L4 header carrying `sport`/`dport`.
#[allow(dead_code)]
pub fn ipv4_packet(src: &str, dst: &str, proto: u8, sport: u16, dport: u16) -> Vec<u8> {
    let (IpAddr::V4(src), IpAddr::V4(dst)) = (src.parse::<IpAddr>().unwrap(), dst.parse::<IpAddr>().unwrap()) else {
        panic!("expected IPv4 addresses");
    };
    let mut pkt = vec![0u8; 28];
    pkt[0] = 0x45;
    pkt[2..4].copy_from_slice(&28u16.to_be_bytes());
    pkt[8] = 64;
    pkt[9] = proto;
    pkt[12..16].copy_from_slice(&src.octets());
    pkt[16..20].copy_from_slice(&dst.octets());
    pkt[20..22].copy_from_slice(&sport.to_be_bytes());
    pkt[22..24].copy_from_slice(&dport.to_be_bytes());
    pkt
}

/// Build a raw IPv6 datagram with an 8-byte L4 header.
#[allow(dead_code)]
pub fn ipv6_packet(src: &str, dst: &str, proto: u8, sport: u16, dport: u16) -> Vec<u8> {
    let (IpAddr::V6(src), IpAddr::V6(dst)) = (src.parse::<IpAddr>().unwrap(), dst.parse::<IpAddr>().unwrap()) else {
        panic!("expected IPv6 addresses");
    };
    let mut pkt = vec![0u8; 48];
    pkt[0] = 0x60;
    pkt[4..6].copy_from_slice(&8u16.to_be_bytes());
    pkt[6] = proto;
    pkt[7] = 64;
    pkt[8..24].copy_from_slice(&src.octets());
    pkt[24..40].copy_from_slice(&dst.octets());
    pkt[40..42].copy_from_slice(&sport.to_be_bytes());
    pkt[42..44].copy_from_slice(&dport.to_be_bytes());
    pkt
}
