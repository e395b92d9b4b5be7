//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::proto::{CfgDataReqType, YangCfgDataReq, YangData};

// Configuration datastore walked when a backend client needs a full
// configuration download.
pub trait Datastore: Send + Sync {
    // Invokes the callback for every configuration node at or below the
    // given base path, in tree order.
    fn iter_data(&self, base: &str, cb: &mut dyn FnMut(&DataNode));
}

// Configuration node as seen by the datastore walk.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(new)]
#[derive(Deserialize, Serialize)]
pub struct DataNode {
    pub xpath: String,
    pub value: Option<String>,
}

// Configuration change queued for download to a backend client.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(new)]
#[derive(Deserialize, Serialize)]
pub struct ConfigChange {
    pub seq: u32,
    pub xpath: String,
    pub value: Option<String>,
    pub op: ConfigChangeOp,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ConfigChangeOp {
    Create,
    Delete,
}

// Pending configuration changes, ordered by sequence number.
pub type ConfigChanges = BTreeMap<u32, ConfigChange>;

// In-memory running datastore.
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    nodes: BTreeMap<String, Option<String>>,
}

// ===== impl ConfigChange =====

impl ConfigChange {
    pub fn to_data_req(&self) -> YangCfgDataReq {
        let req_type = match self.op {
            ConfigChangeOp::Create => CfgDataReqType::SetData,
            ConfigChangeOp::Delete => CfgDataReqType::DeleteData,
        };
        YangCfgDataReq {
            data: Some(YangData::new(self.xpath.clone(), self.value.clone())),
            req_type: req_type as i32,
        }
    }
}

// ===== impl MemoryDatastore =====

impl MemoryDatastore {
    pub fn insert(&mut self, xpath: impl Into<String>, value: Option<String>) {
        self.nodes.insert(xpath.into(), value);
    }

    pub fn remove(&mut self, xpath: &str) -> Option<Option<String>> {
        self.nodes.remove(xpath)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // Loads the datastore from a JSON object mapping instance paths to
    // values (`null` for nodes without a value).
    pub fn from_json(data: &str) -> Result<MemoryDatastore, serde_json::Error> {
        let nodes = serde_json::from_str(data)?;
        Ok(MemoryDatastore { nodes })
    }
}

impl Datastore for MemoryDatastore {
    fn iter_data(&self, base: &str, cb: &mut dyn FnMut(&DataNode)) {
        let base = base.strip_suffix('*').unwrap_or(base);
        let base = base.strip_suffix('/').unwrap_or(base);
        for (xpath, value) in self.nodes.range(base.to_owned()..) {
            if !xpath.starts_with(base) {
                break;
            }
            let node = DataNode::new(xpath.clone(), value.clone());
            (cb)(&node);
        }
    }
}

impl<K> FromIterator<(K, Option<String>)> for MemoryDatastore
where
    K: Into<String>,
{
    fn from_iter<I>(nodes: I) -> MemoryDatastore
    where
        I: IntoIterator<Item = (K, Option<String>)>,
    {
        MemoryDatastore {
            nodes: nodes.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
