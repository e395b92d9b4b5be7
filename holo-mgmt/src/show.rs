//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adapter::{Adapter, AdapterFlags, AdapterState};
use crate::client::ClientId;
use crate::collections::{AdapterId, Adapters};
use crate::xpath_map::{SubscrInfo, XpathMap, XpathSubscrFlags};

// Operator introspection requests.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ShowRequest {
    AdapterStatus,
    XpathRegistry,
    XpathSubscrInfo(String),
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub enum ShowReply {
    AdapterStatus(AdapterStatusReport),
    XpathRegistry(XpathRegistryReport),
    XpathSubscrInfo(XpathSubscrInfoReport),
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct AdapterStatusReport {
    pub adapters: Vec<AdapterStatus>,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct AdapterStatus {
    pub id: AdapterId,
    pub name: String,
    pub fd: i32,
    pub peer: String,
    pub client: Option<ClientId>,
    pub refcount: u32,
    pub state: AdapterState,
    pub flags: AdapterFlags,
    pub msg_recvd: u64,
    pub bytes_recvd: u64,
    pub msg_sent: u64,
    pub bytes_sent: u64,
    pub created: DateTime<Utc>,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct XpathRegistryReport {
    pub entries: Vec<XpathRegistryEntry>,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct XpathRegistryEntry {
    pub xpath: String,
    pub clients: Vec<ClientSubscr>,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct XpathSubscrInfoReport {
    pub xpath: String,
    pub clients: Vec<ClientSubscr>,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct ClientSubscr {
    pub client: ClientId,
    pub flags: XpathSubscrFlags,
    // Name of the adapter currently serving the client, if any.
    pub adapter: Option<String>,
}

// ===== impl ShowRequest =====

impl ShowRequest {
    pub fn process(
        &self,
        adapters: &Adapters,
        xpath_map: &XpathMap,
    ) -> ShowReply {
        match self {
            ShowRequest::AdapterStatus => {
                ShowReply::AdapterStatus(AdapterStatusReport::new(adapters))
            }
            ShowRequest::XpathRegistry => ShowReply::XpathRegistry(
                XpathRegistryReport::new(adapters, xpath_map),
            ),
            ShowRequest::XpathSubscrInfo(xpath) => {
                ShowReply::XpathSubscrInfo(XpathSubscrInfoReport::new(
                    adapters, xpath_map, xpath,
                ))
            }
        }
    }
}

// ===== impl ShowReply =====

impl std::fmt::Display for ShowReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShowReply::AdapterStatus(report) => write!(f, "{report}"),
            ShowReply::XpathRegistry(report) => write!(f, "{report}"),
            ShowReply::XpathSubscrInfo(report) => write!(f, "{report}"),
        }
    }
}

// ===== impl AdapterStatusReport =====

impl AdapterStatusReport {
    pub fn new(adapters: &Adapters) -> AdapterStatusReport {
        AdapterStatusReport {
            adapters: adapters.iter().map(AdapterStatus::from).collect(),
        }
    }
}

impl std::fmt::Display for AdapterStatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Backend Adapters")?;
        for adapter in &self.adapters {
            write!(f, "{adapter}")?;
        }
        writeln!(f, "  Total: {}", self.adapters.len())
    }
}

impl From<&Adapter> for AdapterStatus {
    fn from(adapter: &Adapter) -> AdapterStatus {
        let stats = &adapter.mstate.stats;
        AdapterStatus {
            id: adapter.id,
            name: adapter.name.clone(),
            fd: adapter.fd,
            peer: adapter.peer.clone(),
            client: adapter.client_id,
            refcount: adapter.refcount,
            state: adapter.state,
            flags: adapter.flags,
            msg_recvd: stats.nrxm,
            bytes_recvd: stats.nrxb,
            msg_sent: stats.ntxm,
            bytes_sent: stats.ntxb,
            created: adapter.created,
        }
    }
}

impl std::fmt::Display for AdapterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let client = self
            .client
            .map(|client| client.name())
            .unwrap_or("unknown");
        writeln!(f, "  Client: {}", self.name)?;
        writeln!(f, "    Conn-FD: {}", self.fd)?;
        writeln!(f, "    Client-Id: {}", client)?;
        writeln!(f, "    Ref-Count: {}", self.refcount)?;
        writeln!(f, "    State: {:?}", self.state)?;
        writeln!(f, "    Msg-Recvd: {}", self.msg_recvd)?;
        writeln!(f, "    Bytes-Recvd: {}", self.bytes_recvd)?;
        writeln!(f, "    Msg-Sent: {}", self.msg_sent)?;
        writeln!(f, "    Bytes-Sent: {}", self.bytes_sent)
    }
}

// ===== impl XpathRegistryReport =====

impl XpathRegistryReport {
    pub fn new(
        adapters: &Adapters,
        xpath_map: &XpathMap,
    ) -> XpathRegistryReport {
        let entries = xpath_map
            .iter()
            .map(|entry| XpathRegistryEntry {
                xpath: entry.xpath.to_owned(),
                clients: ClientSubscr::collect(adapters, &entry.subscr),
            })
            .collect();
        XpathRegistryReport { entries }
    }
}

impl std::fmt::Display for XpathRegistryReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Backend XPath Registry")?;
        for entry in &self.entries {
            writeln!(f, " - XPATH: '{}'", entry.xpath)?;
            for client in &entry.clients {
                write!(f, "   {client}")?;
            }
        }
        writeln!(f, "Total XPath Registries: {}", self.entries.len())
    }
}

// ===== impl XpathSubscrInfoReport =====

impl XpathSubscrInfoReport {
    pub fn new(
        adapters: &Adapters,
        xpath_map: &XpathMap,
        xpath: &str,
    ) -> XpathSubscrInfoReport {
        let subscr_info = xpath_map.subscribers(xpath);
        XpathSubscrInfoReport {
            xpath: xpath.to_owned(),
            clients: ClientSubscr::collect(adapters, &subscr_info),
        }
    }
}

impl std::fmt::Display for XpathSubscrInfoReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "XPath: '{}'", self.xpath)?;
        for client in &self.clients {
            write!(f, "  {client}")?;
        }
        Ok(())
    }
}

// ===== impl ClientSubscr =====

impl ClientSubscr {
    fn collect(
        adapters: &Adapters,
        subscr_info: &SubscrInfo,
    ) -> Vec<ClientSubscr> {
        subscr_info
            .subscribed()
            .map(|(client, flags)| ClientSubscr {
                client,
                flags,
                adapter: adapters
                    .get_by_client(client)
                    .map(|(_, adapter)| adapter.name.clone()),
            })
            .collect()
    }
}

impl std::fmt::Display for ClientSubscr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flag = |flag: XpathSubscrFlags| {
            if self.flags.contains(flag) { "T" } else { "F" }
        };
        writeln!(
            f,
            "-- Client: '{}'\tValidate:{}, Notify:{}, Own:{}",
            self.client,
            flag(XpathSubscrFlags::VALIDATE_CONFIG),
            flag(XpathSubscrFlags::NOTIFY_CONFIG),
            flag(XpathSubscrFlags::OWN_OPER_DATA),
        )?;
        if let Some(adapter) = &self.adapter {
            writeln!(f, "     -- Adapter: {adapter}")?;
        }
        Ok(())
    }
}
