//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use holo_mgmt::client::ClientId;
use holo_mgmt::xpath::{is_root, match_len};
use holo_mgmt::xpath_map::{XpathMap, XpathMapReg, XpathSubscrFlags};

//
// Helper functions.
//

const STATICD_XPATH: &str = "/frr-routing:routing/control-plane-protocols/control-plane-protocol[type='frr-staticd:staticd'][name='staticd'][vrf='default']/frr-staticd:staticd";

static NESTED_REGISTRY: &[XpathMapReg] = &[
    XpathMapReg {
        xpath: "/a/*",
        clients: &[ClientId::Staticd],
    },
    XpathMapReg {
        xpath: "/a/b/*",
        clients: &[],
    },
];

static DUPLICATE_REGISTRY: &[XpathMapReg] = &[
    XpathMapReg {
        xpath: "/a/b/*",
        clients: &[],
    },
    XpathMapReg {
        xpath: "/a/b/*",
        clients: &[ClientId::Staticd],
    },
];

//
// Glob matching.
//

#[test]
fn test_match_exact() {
    assert_eq!(match_len("/a/b/c", "/a/b/c"), 2);
    assert_eq!(match_len("/a/b/c", "/a/b"), 2);
    assert_eq!(match_len("/a/b", "/a/b/c"), 1);
}

#[test]
fn test_match_wildcard() {
    assert_eq!(match_len("/a/*/c", "/a/b/c"), 2);
    assert_eq!(match_len("/a/*", "/a/b/c"), 1);
    assert_eq!(match_len("/a/*", "/a"), 1);
}

#[test]
fn test_match_partial_credit() {
    // Delimiters crossed before the mismatch still count.
    assert_eq!(match_len("/a/*/c", "/a/b/d"), 2);
    assert_eq!(match_len("/a/b/*", "/a/c"), 1);
}

#[test]
fn test_match_none() {
    assert_eq!(match_len("/x/*", "/a/b"), 0);
    assert_eq!(match_len("/frr-vrf:lib/*", "/frr-interface:lib"), 0);
    assert_eq!(match_len("", "/a"), 0);
    assert_eq!(match_len("/a", ""), 0);
}

#[test]
fn test_match_symmetric_wildcard() {
    // The wildcard may also appear in the path being looked up.
    assert_eq!(match_len("/a/b/c", "/a/*/c"), 2);
}

#[test]
fn test_is_root() {
    assert!(is_root("/"));
    assert!(is_root("/*"));
    assert!(!is_root("/a"));
    assert!(!is_root(""));
}

//
// Registration table lookups.
//

#[test]
fn test_lookup_staticd() {
    let xpath_map = XpathMap::new();
    assert_eq!(xpath_map.len(), 3);

    let xpath = format!(
        "{STATICD_XPATH}/route-list[prefix='10.0.0.0/8'][afi-safi='frr-routing:ipv4-unicast']"
    );
    let subscr_info = xpath_map.subscribers(&xpath);
    assert!(subscr_info.is_subscribed(ClientId::Staticd));
    assert_eq!(subscr_info.get(ClientId::Staticd), XpathSubscrFlags::all());

    let subscr_info =
        xpath_map.subscribers("/frr-vrf:lib/vrf[name='default']");
    assert!(subscr_info.is_subscribed(ClientId::Staticd));

    let subscr_info = xpath_map
        .subscribers("/frr-interface:lib/interface[name='eth0']/description");
    assert!(subscr_info.is_subscribed(ClientId::Staticd));
}

#[test]
fn test_lookup_unregistered() {
    let xpath_map = XpathMap::new();

    let subscr_info =
        xpath_map.subscribers("/frr-isisd:isis/instance[area-tag='a']");
    assert!(subscr_info.is_empty());
    assert!(!subscr_info.is_subscribed(ClientId::Staticd));
}

#[test]
fn test_lookup_root() {
    let xpath_map = XpathMap::new();

    for xpath in ["/", "/*"] {
        let subscr_info = xpath_map.subscribers(xpath);
        assert!(subscr_info.is_subscribed(ClientId::Staticd));
        assert_eq!(subscr_info.subscribed().count(), 1);
    }
}

#[test]
fn test_lookup_most_specific() {
    let xpath_map = XpathMap::with_registry(NESTED_REGISTRY);

    // Only the most specific pattern contributes.
    let subscr_info = xpath_map.subscribers("/a/b/c");
    assert!(subscr_info.is_empty());

    let subscr_info = xpath_map.subscribers("/a/c");
    assert!(subscr_info.is_subscribed(ClientId::Staticd));
}

#[test]
fn test_lookup_ties() {
    let xpath_map = XpathMap::with_registry(DUPLICATE_REGISTRY);

    // Patterns tying for the best score are merged.
    let subscr_info = xpath_map.subscribers("/a/b/c");
    assert!(subscr_info.is_subscribed(ClientId::Staticd));
}
