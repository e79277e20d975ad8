//! Membership semantics of the built-in set types.

use rand::Rng;
use std::net::Ipv4Addr;

use lb_ipset::ipset::types::proto;
use lb_ipset::ipset::{Family, Packet, SetError, SetOptions, TestResult};

mod common;
use common::{members, new_set, new_set_with, req};

fn v4(n: u32) -> String {
    Ipv4Addr::from(n).to_string()
}

#[test]
fn test_scenario_three_field_cidrs() {
    let set = new_set("hash:net,port,net", Family::Inet);
    let outcome = set.add(&req("10.0.0.0/24,tcp:80-81,192.168.1.0/24")).unwrap();
    assert_eq!(outcome.added, 2);
    assert_eq!(set.len(), 2);

    assert_eq!(set.test(&req("10.0.0.5,tcp:80,192.168.1.9")).unwrap(), TestResult::Accept);
    assert_eq!(set.test(&req("10.0.0.5,tcp:82,192.168.1.9")).unwrap(), TestResult::NotFound);
    assert_eq!(set.test(&req("10.0.1.5,tcp:80,192.168.1.9")).unwrap(), TestResult::NotFound);
}

#[test]
fn test_scenario_unaligned_range_any_proto_any_port() {
    for type_name in ["hash:net,port", "hash:net,port,net"] {
        let set = new_set(type_name, Family::Inet);
        set.add(&req("10.0.0.0-10.0.0.5,any:0-65535")).unwrap();
        // 10.0.0.0/30 + 10.0.0.4/31, one port-any element each
        assert_eq!(set.len(), 2, "{type_name}");

        for host in 0..=5u32 {
            let addr = v4(0x0a00_0000 + host);
            for l4 in ["tcp:80", "udp:53", "sctp:0", "47:65535"] {
                let entry = if type_name == "hash:net,port" {
                    format!("{addr},{l4}")
                } else {
                    format!("{addr},{l4},172.16.0.1")
                };
                assert_eq!(set.test(&req(&entry)).unwrap(), TestResult::Accept, "{entry}");
            }
        }
        let outside = if type_name == "hash:net,port" {
            "10.0.0.6,tcp:80".to_string()
        } else {
            "10.0.0.6,tcp:80,172.16.0.1".to_string()
        };
        assert_eq!(set.test(&req(&outside)).unwrap(), TestResult::NotFound);
    }
}

#[test]
fn test_random_range_coverage() {
    let mut rng = rand::thread_rng();
    for _ in 0..20 {
        let from: u32 = rng.gen_range(0x0a00_0000..0x0a00_ff00);
        let to = from + rng.gen_range(0..300);
        let set = new_set("hash:net", Family::Inet);
        set.add(&req(&format!("{}-{}", v4(from), v4(to)))).unwrap();

        for addr in from.saturating_sub(3)..=to + 3 {
            let expected = if (from..=to).contains(&addr) {
                TestResult::Accept
            } else {
                TestResult::NotFound
            };
            assert_eq!(set.test(&req(&v4(addr))).unwrap(), expected, "{}", v4(addr));
        }
    }
}

#[test]
fn test_range_to_top_of_space() {
    let set = new_set("hash:net", Family::Inet);
    set.add(&req("255.255.255.250-255.255.255.255")).unwrap();
    assert_eq!(members(&set), vec!["255.255.255.250/31", "255.255.255.252/30"]);
    assert_eq!(set.test(&req("255.255.255.255")).unwrap(), TestResult::Accept);
    assert_eq!(set.test(&req("255.255.255.249")).unwrap(), TestResult::NotFound);
}

#[test]
fn test_idempotent_add() {
    let set = new_set("hash:net,port,net", Family::Inet);
    let entry = req("10.0.0.0-10.0.0.9,udp:53-54,192.168.0.0/16");
    let first = set.add(&entry).unwrap();
    let before = members(&set);

    let second = set.add(&entry).unwrap();
    assert_eq!(second.added, 0);
    assert_eq!(second.changed(), 0);
    assert_eq!(second.unchanged, first.added);
    assert_eq!(members(&set), before);
}

#[test]
fn test_nomatch_precedence() {
    let set = new_set("hash:net,port,net", Family::Inet);
    set.add(&req("10.0.0.0/16,tcp:443,0.0.0.0/0")).unwrap();
    set.add(&req("10.0.5.0/24,tcp:443,0.0.0.0/0").with_nomatch(true)).unwrap();

    assert_eq!(set.test(&req("10.0.5.77,tcp:443,8.8.8.8")).unwrap(), TestResult::Reject);
    assert_eq!(set.test(&req("10.0.6.77,tcp:443,8.8.8.8")).unwrap(), TestResult::Accept);
    assert!(!TestResult::Reject.matched_or(true));
    assert!(TestResult::NotFound.matched_or(true));
}

#[test]
fn test_prefix_query_ignores_narrower_members() {
    let set = new_set("hash:net,port,net", Family::Inet);
    set.add(&req("10.0.0.0/32,tcp:80,192.168.1.0/24")).unwrap();

    assert_eq!(set.test(&req("10.0.0.0/24,tcp:80,192.168.1.9")).unwrap(), TestResult::NotFound);
    assert_eq!(set.test(&req("10.0.0.1,tcp:80,192.168.1.9")).unwrap(), TestResult::NotFound);
    assert_eq!(set.test(&req("10.0.0.0,tcp:80,192.168.1.9")).unwrap(), TestResult::Accept);

    // a wider member still covers the named prefix
    set.add(&req("10.0.0.0/16,tcp:80,192.168.0.0/16")).unwrap();
    assert_eq!(set.test(&req("10.0.0.0/24,tcp:80,192.168.1.9")).unwrap(), TestResult::Accept);
    assert_eq!(set.test(&req("10.0.0.0,tcp:80,192.168.1.0/24")).unwrap(), TestResult::Accept);
}

#[test]
fn test_partial_port_range_tests_first_port() {
    let set = new_set("hash:net,port,net", Family::Inet);
    set.add(&req("10.0.0.0/24,tcp:81,192.168.1.0/24")).unwrap();
    assert_eq!(
        set.test(&req("10.0.0.0/24,tcp:80-81,192.168.1.0/24")).unwrap(),
        TestResult::NotFound
    );

    set.add(&req("10.0.0.0/24,tcp:80,192.168.1.0/24")).unwrap();
    assert_eq!(
        set.test(&req("10.0.0.0/24,tcp:80-81,192.168.1.0/24")).unwrap(),
        TestResult::Accept
    );
}

#[test]
fn test_same_prefix_nomatch_replaces() {
    let set = new_set("hash:net,port", Family::Inet);
    set.add(&req("10.0.0.0/24,tcp:22")).unwrap();
    let outcome = set.add(&req("10.0.0.0/24,tcp:22").with_nomatch(true)).unwrap();
    assert_eq!(outcome.replaced, 1);
    assert_eq!(set.len(), 1);
    assert_eq!(set.test(&req("10.0.0.1,tcp:22")).unwrap(), TestResult::Reject);
}

#[test]
fn test_strict_collision_leaves_set_unchanged() {
    let set = new_set("hash:net,port", Family::Inet);
    set.add(&req("10.0.0.0/24,tcp:22-23")).unwrap();

    // the second port collides; the first must not be applied either
    let err = set
        .add(&req("10.0.0.0/24,tcp:21-22").with_nomatch(true).strict())
        .unwrap_err();
    assert!(matches!(err, SetError::KeyCollision(_)));
    assert_eq!(set.len(), 2);
    assert_eq!(set.test(&req("10.0.0.1,tcp:21")).unwrap(), TestResult::NotFound);
    assert_eq!(set.test(&req("10.0.0.1,tcp:22")).unwrap(), TestResult::Accept);
}

#[test]
fn test_inverse() {
    let set = new_set("hash:net,port,net", Family::Inet);
    let entry = req("10.0.0.3-10.0.0.17,tcp:80-82,192.168.1.0/24");
    set.add(&entry).unwrap();
    let outcome = set.del(&entry).unwrap();
    assert_eq!(outcome.missing, 0);
    assert!(set.is_empty());
    for host in 3..=17u32 {
        let probe = format!("{},tcp:81,192.168.1.1", v4(0x0a00_0000 + host));
        assert_eq!(set.test(&req(&probe)).unwrap(), TestResult::NotFound);
    }
}

#[test]
fn test_family_isolation() {
    let set = new_set("hash:net,port,net", Family::Inet);
    set.add(&req("0.0.0.0/0,tcp:80,0.0.0.0/0")).unwrap();
    assert_eq!(
        set.test(&req("2001:db8::1,tcp:80,2001:db8::2")),
        Err(SetError::FamilyMismatch { set: Family::Inet, request: Family::Inet6 })
    );
    assert!(matches!(
        set.add(&req("2001:db8::/64,tcp:80")),
        Err(SetError::FamilyMismatch { .. })
    ));
}

#[test]
fn test_ipv6_requires_prefix_for_ranges() {
    let set = new_set("hash:net,port,net", Family::Inet6);
    set.add(&req("2001:db8::/64,tcp:80-81,2001:db8:ffff::/48")).unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(
        set.test(&req("2001:db8::42,tcp:81,2001:db8:ffff:1::1")).unwrap(),
        TestResult::Accept
    );

    let err = set.add(&req("2001:db8::1-2001:db8::ff,tcp:80")).unwrap_err();
    assert!(matches!(err, SetError::UnsupportedOperation(_)));
    assert_eq!(set.len(), 2);
}

#[test]
fn test_misaligned_prefix_rejected() {
    let set = new_set("hash:net", Family::Inet);
    assert!(matches!(set.add(&req("10.0.0.1/24")), Err(SetError::InvalidRange(_))));
    assert!(matches!(set.add(&req("10.0.0.0/33")), Err(SetError::InvalidRange(_))));
    assert!(set.is_empty());
}

#[test]
fn test_capacity_cap() {
    let options = SetOptions {
        max_request_elements: 1000,
        ..SetOptions::default()
    };
    let set = new_set_with("hash:net,port,net", Family::Inet, options);
    let err = set.add(&req("10.0.0.0/24,tcp:1-2000,0.0.0.0/0")).unwrap_err();
    assert_eq!(err, SetError::CapacityExceeded { requested: 2000, limit: 1000 });
    assert!(set.is_empty());
}

#[test]
fn test_list_round_trips_through_entry_syntax() {
    let set = new_set_with(
        "hash:net,port,net",
        Family::Inet,
        SetOptions { comment: true, ..SetOptions::default() },
    );
    set.add(&req("10.0.0.0/24,udp:53,192.168.1.0/24").with_comment("dns")).unwrap();
    set.add(&req("10.0.0.128/25,udp:53,192.168.1.0/24").with_nomatch(true)).unwrap();

    assert_eq!(
        members(&set),
        vec![
            "10.0.0.0/24,udp:53,192.168.1.0/24 comment \"dns\"",
            "10.0.0.128/25,udp:53,192.168.1.0/24 nomatch",
        ]
    );

    let copy = new_set("hash:net,port,net", Family::Inet);
    for member in set.list() {
        let entry = member.to_string();
        let net_part = entry.split(' ').next().unwrap();
        copy.add(&req(net_part).with_nomatch(member.nomatch)).unwrap();
    }
    assert_eq!(copy.len(), set.len());
}

#[test]
fn test_packet_path_matches_control_test() {
    let set = new_set("hash:net,port,net", Family::Inet);
    set.add(&req("10.0.0.0/24,tcp:80-81,192.168.1.0/24")).unwrap();
    set.add(&req("10.0.0.128/25,tcp:80,192.168.1.0/24").with_nomatch(true)).unwrap();

    let cases = [
        ("10.0.0.5", 80, "192.168.1.9", TestResult::Accept),
        ("10.0.0.5", 82, "192.168.1.9", TestResult::NotFound),
        ("10.0.0.200", 80, "192.168.1.9", TestResult::Reject),
        ("10.0.0.200", 81, "192.168.1.9", TestResult::Accept),
        ("10.0.1.5", 80, "192.168.1.9", TestResult::NotFound),
    ];
    for (src, port, dst, expected) in cases {
        // the classified port is the first word past the network header
        let raw = common::ipv4_packet(src, dst, proto::TCP, port, 40000);
        let pkt = Packet::parse(&raw).unwrap();
        assert_eq!(set.test_packet(&pkt), expected, "{src}:{port}");
        assert_eq!(
            set.test(&req(&format!("{src},tcp:{port},{dst}"))).unwrap(),
            expected
        );
    }
}

#[test]
fn test_packet_path_degrades_to_not_found() {
    let set = new_set("hash:net,port,net", Family::Inet);
    set.add(&req("0.0.0.0/0,any:0-65535,0.0.0.0/0")).unwrap();

    let v6 = common::ipv6_packet("2001:db8::1", "2001:db8::2", proto::UDP, 53, 53);
    assert_eq!(set.test_packet(&Packet::parse(&v6).unwrap()), TestResult::NotFound);

    // header but no transport bytes
    let v4 = common::ipv4_packet("10.0.0.1", "10.0.0.2", proto::UDP, 53, 53);
    assert_eq!(set.test_packet(&Packet::parse(&v4[..20]).unwrap()), TestResult::NotFound);

    assert_eq!(set.test_packet(&Packet::parse(&v4).unwrap()), TestResult::Accept);
}

#[test]
fn test_ipv6_packet_path() {
    let set = new_set("hash:net,port", Family::Inet6);
    set.add(&req("2001:db8::/32,udp:53")).unwrap();
    let raw = common::ipv6_packet("2001:db8:1::1", "2001:4860::8888", proto::UDP, 53, 3333);
    assert_eq!(set.test_packet(&Packet::parse(&raw).unwrap()), TestResult::Accept);
    let raw = common::ipv6_packet("2001:db9::1", "2001:4860::8888", proto::UDP, 53, 3333);
    assert_eq!(set.test_packet(&Packet::parse(&raw).unwrap()), TestResult::NotFound);
}
