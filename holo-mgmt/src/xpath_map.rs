//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::client::ClientId;
use crate::debug::Debug;
use crate::xpath;

// Static mapping of YANG XPath glob patterns to the backend clients
// interested in them.
//
// Client lists are compiled in according to the enabled backend client
// features.
pub static XPATH_STATIC_MAP: &[XpathMapReg] = &[
    XpathMapReg {
        xpath: "/frr-vrf:lib/*",
        clients: &[
            #[cfg(feature = "staticd")]
            ClientId::Staticd,
        ],
    },
    XpathMapReg {
        xpath: "/frr-interface:lib/*",
        clients: &[
            #[cfg(feature = "staticd")]
            ClientId::Staticd,
        ],
    },
    XpathMapReg {
        xpath: "/frr-routing:routing/control-plane-protocols/control-plane-protocol[type='frr-staticd:staticd'][name='staticd'][vrf='default']/frr-staticd:staticd/*",
        clients: &[
            #[cfg(feature = "staticd")]
            ClientId::Staticd,
        ],
    },
];

// Static registration entry.
#[derive(Debug)]
pub struct XpathMapReg {
    pub xpath: &'static str,
    pub clients: &'static [ClientId],
}

// Registration table built from the static registration entries.
#[derive(Debug)]
pub struct XpathMap {
    entries: Vec<XpathMapEntry>,
}

#[derive(Debug)]
pub struct XpathMapEntry {
    pub xpath: &'static str,
    pub subscr: SubscrInfo,
}

// Per-client interest in a given path.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct SubscrInfo {
    pub xpath_subscr: [XpathSubscrFlags; ClientId::MAX],
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct XpathSubscrFlags: u8 {
        const VALIDATE_CONFIG = 0x01;
        const NOTIFY_CONFIG = 0x02;
        const OWN_OPER_DATA = 0x04;
    }
}

// ===== impl XpathMap =====

impl XpathMap {
    pub fn new() -> XpathMap {
        XpathMap::with_registry(XPATH_STATIC_MAP)
    }

    pub fn with_registry(registry: &[XpathMapReg]) -> XpathMap {
        let entries = registry
            .iter()
            .map(|reg| {
                Debug::XpathMapInit(reg.xpath, reg.clients).log();

                let mut subscr = SubscrInfo::default();
                for client in reg.clients {
                    subscr.set(*client, XpathSubscrFlags::all());
                }
                XpathMapEntry {
                    xpath: reg.xpath,
                    subscr,
                }
            })
            .collect();

        XpathMap { entries }
    }

    // Returns the per-client union of the interest flags of the registered
    // patterns that best match the given path.
    //
    // Only the patterns that tie for the highest non-zero specificity score
    // contribute. The root paths `/` and `/*` select every pattern.
    pub fn subscribers(&self, xpath: &str) -> SubscrInfo {
        let mut subscr_info = SubscrInfo::default();

        let root = xpath::is_root(xpath);
        let mut max_match = 0;
        let mut best = vec![];
        for entry in &self.entries {
            if !root {
                let score = xpath::match_len(entry.xpath, xpath);
                if score == 0 || score < max_match {
                    continue;
                }
                if score > max_match {
                    best.clear();
                    max_match = score;
                }
            }
            best.push(entry);
        }

        for entry in best {
            subscr_info.merge(&entry.subscr);
        }

        Debug::XpathSubscrLookup(xpath, &subscr_info).log();
        subscr_info
    }

    pub fn iter(&self) -> impl Iterator<Item = &XpathMapEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for XpathMap {
    fn default() -> XpathMap {
        XpathMap::new()
    }
}

// ===== impl SubscrInfo =====

impl SubscrInfo {
    pub fn get(&self, client: ClientId) -> XpathSubscrFlags {
        self.xpath_subscr[client.index()]
    }

    pub fn set(&mut self, client: ClientId, flags: XpathSubscrFlags) {
        self.xpath_subscr[client.index()] = flags;
    }

    pub fn is_subscribed(&self, client: ClientId) -> bool {
        self.get(client).is_subscribed()
    }

    pub fn merge(&mut self, other: &SubscrInfo) {
        for (flags, other) in
            self.xpath_subscr.iter_mut().zip(other.xpath_subscr.iter())
        {
            *flags |= *other;
        }
    }

    // Returns the subscribed clients along with their interest flags.
    pub fn subscribed(
        &self,
    ) -> impl Iterator<Item = (ClientId, XpathSubscrFlags)> + '_ {
        ClientId::ALL
            .into_iter()
            .map(|client| (client, self.get(client)))
            .filter(|(_, flags)| flags.is_subscribed())
    }

    pub fn is_empty(&self) -> bool {
        self.subscribed().next().is_none()
    }
}

// ===== impl XpathSubscrFlags =====

impl XpathSubscrFlags {
    pub fn is_subscribed(&self) -> bool {
        !self.is_empty()
    }
}
