//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};

use prost::Message as _;
use prost::encoding::{encoded_len_varint, key_len, message};
use serde::{Deserialize, Serialize};

use crate::collections::AdapterId;
use crate::datastore::ConfigChange;
use crate::debug::Debug;
use crate::error::Error;
use crate::framing::MSG_HDR_LEN;
use crate::master::BackendView;
use crate::proto::{BeCfgDataCreateReq, YangCfgDataReq};

// Protobuf tags of the config data request and of its items.
const CFG_DATA_REQ_TAG: u32 = 6;
const CFG_DATA_ITEM_TAG: u32 = 3;

// Transaction coordinator as seen by the backend adapters.
//
// All methods run on the event loop. The backend view gives access to the
// adapter operations (sending requests, building the configuration set,
// reference counting).
pub trait TxnCoordinator: Send {
    // Returns the session currently holding the configuration lock, if any.
    fn config_txn_in_progress(&self) -> Option<u64>;

    // Notifies that a backend client connected (and completed its handshake)
    // or disconnected.
    fn adapter_conn(
        &mut self,
        be: &mut BackendView<'_>,
        adapter_id: AdapterId,
        connected: bool,
    ) -> Result<(), TxnError>;

    fn txn_reply(
        &mut self,
        be: &mut BackendView<'_>,
        adapter_id: AdapterId,
        txn_id: u64,
        create: bool,
        success: bool,
    );

    fn cfgdata_reply(
        &mut self,
        be: &mut BackendView<'_>,
        adapter_id: AdapterId,
        txn_id: u64,
        batch_id: u64,
        success: bool,
        error: Option<&str>,
    );

    fn cfg_apply_reply(
        &mut self,
        be: &mut BackendView<'_>,
        adapter_id: AdapterId,
        txn_id: u64,
        success: bool,
        batch_ids: &[u64],
        error: Option<&str>,
    );
}

// Coordinator that downloads the running configuration to backend clients
// as they connect.
#[derive(Debug, Default)]
pub struct TxnManager {
    txns: BTreeMap<u64, Txn>,
    // Transaction holding the configuration lock.
    cfg_lock: Option<u64>,
    // Last allocated transaction ID.
    next_txn_id: u64,
}

#[derive(Debug)]
#[derive(Deserialize, Serialize)]
pub struct Txn {
    pub id: u64,
    pub adapter_id: AdapterId,
    pub phase: TxnPhase,
    // Config batches sent and not yet acknowledged.
    pub pending_batches: BTreeSet<u64>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum TxnPhase {
    // Waiting for the client to create the transaction.
    Create,
    // Waiting for the config batches to be acknowledged.
    CfgData,
    // Waiting for the client to apply the configuration.
    CfgApply,
    // Waiting for the client to delete the transaction.
    Delete,
}

#[derive(Debug)]
pub enum TxnError {
    ConfigLocked(u64),
    Backend(Box<Error>),
}

// ===== impl TxnManager =====

impl TxnManager {
    pub fn get(&self, txn_id: u64) -> Option<&Txn> {
        self.txns.get(&txn_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Txn> {
        self.txns.values()
    }

    pub fn cfg_lock(&self) -> Option<u64> {
        self.cfg_lock
    }

    // Sends the whole configuration set in batches, the last one flagged as
    // end of data.
    fn send_cfg(
        &mut self,
        be: &mut BackendView<'_>,
        txn_id: u64,
        adapter_id: AdapterId,
    ) -> Result<(), Error> {
        let max_items = std::cmp::max(be.config().cfg_batch_max_items, 1);
        let max_msg_len = be.config().max_msg_len;
        let items = be
            .get_adapter_config(adapter_id)?
            .values()
            .map(ConfigChange::to_data_req)
            .collect::<Vec<YangCfgDataReq>>();
        let batches = match cfg_batches(items, txn_id, max_items, max_msg_len)
        {
            Ok(batches) => batches,
            Err(len) => {
                let name = be.adapter(adapter_id)?.name.clone();
                return Err(Error::MsgTooLarge(name, len));
            }
        };
        let count = batches.len();

        let mut pending = BTreeSet::new();
        for (idx, batch) in batches.into_iter().enumerate() {
            let batch_id = idx as u64 + 1;
            let end_of_data = idx + 1 == count;
            Debug::TxnCfgBatchTx(txn_id, batch_id, batch.len(), end_of_data)
                .log();
            be.send_cfg_batch(
                adapter_id,
                txn_id,
                batch_id,
                batch,
                end_of_data,
            )?;
            pending.insert(batch_id);
        }

        if let Some(txn) = self.txns.get_mut(&txn_id) {
            txn.phase = TxnPhase::CfgData;
            txn.pending_batches = pending;
        }

        Ok(())
    }

    // Asks the client to delete the transaction. The transaction is deleted
    // locally once the client confirms.
    fn end(&mut self, be: &mut BackendView<'_>, txn_id: u64) {
        let Some(txn) = self.txns.get_mut(&txn_id) else {
            return;
        };
        txn.phase = TxnPhase::Delete;
        let adapter_id = txn.adapter_id;
        if be.end_txn(adapter_id, txn_id).is_err() {
            self.delete(be, txn_id);
        }
    }

    fn delete(&mut self, be: &mut BackendView<'_>, txn_id: u64) {
        let Some(txn) = self.txns.remove(&txn_id) else {
            return;
        };

        if let Ok(adapter) = be.adapter(txn.adapter_id) {
            Debug::TxnDelete(txn_id, &adapter.name).log();
        }
        if self.cfg_lock == Some(txn_id) {
            self.cfg_lock = None;
        }
        if let Err(error) = be.release(txn.adapter_id) {
            error.log();
        }
    }

    fn lookup(&self, adapter_id: AdapterId, txn_id: u64) -> Option<&Txn> {
        self.txns
            .get(&txn_id)
            .filter(|txn| txn.adapter_id == adapter_id)
    }

    fn next_txn_id(&mut self) -> u64 {
        self.next_txn_id += 1;
        self.next_txn_id
    }
}

impl TxnCoordinator for TxnManager {
    fn config_txn_in_progress(&self) -> Option<u64> {
        self.cfg_lock
    }

    fn adapter_conn(
        &mut self,
        be: &mut BackendView<'_>,
        adapter_id: AdapterId,
        connected: bool,
    ) -> Result<(), TxnError> {
        if !connected {
            let txn_ids = self
                .txns
                .values()
                .filter(|txn| txn.adapter_id == adapter_id)
                .map(|txn| txn.id)
                .collect::<Vec<_>>();
            for txn_id in txn_ids {
                self.delete(be, txn_id);
            }
            return Ok(());
        }

        // Nothing to download.
        if be.get_adapter_config(adapter_id)?.is_empty() {
            be.clear_adapter_config(adapter_id)?;
            be.set_cfg_synced(adapter_id)?;
            return Ok(());
        }

        if let Some(txn_id) = self.cfg_lock {
            return Err(TxnError::ConfigLocked(txn_id));
        }

        let txn_id = self.next_txn_id();
        be.begin_txn(adapter_id, txn_id)?;
        be.retain(adapter_id)?;
        self.cfg_lock = Some(txn_id);
        self.txns.insert(txn_id, Txn::new(txn_id, adapter_id));
        Debug::TxnCreate(txn_id, &be.adapter(adapter_id)?.name).log();

        Ok(())
    }

    fn txn_reply(
        &mut self,
        be: &mut BackendView<'_>,
        adapter_id: AdapterId,
        txn_id: u64,
        create: bool,
        success: bool,
    ) {
        if self.lookup(adapter_id, txn_id).is_none() {
            return;
        }

        if !create {
            self.delete(be, txn_id);
            return;
        }

        if !success {
            Debug::TxnAbort(txn_id, None).log();
            self.end(be, txn_id);
            return;
        }

        // Drop the connection if the configuration can't be sent. The
        // transaction goes away along with the adapter, and the client is
        // expected to reconnect and retry.
        if let Err(error) = self.send_cfg(be, txn_id, adapter_id) {
            error.log();
            if be.close_conn(adapter_id).is_err() {
                self.delete(be, txn_id);
            }
        }
    }

    fn cfgdata_reply(
        &mut self,
        be: &mut BackendView<'_>,
        adapter_id: AdapterId,
        txn_id: u64,
        batch_id: u64,
        success: bool,
        error: Option<&str>,
    ) {
        let Some(txn) = self.txns.get_mut(&txn_id) else {
            return;
        };
        if txn.adapter_id != adapter_id || txn.phase != TxnPhase::CfgData {
            return;
        }

        if !success {
            Debug::TxnAbort(txn_id, error).log();
            self.end(be, txn_id);
            return;
        }

        txn.pending_batches.remove(&batch_id);
        if !txn.pending_batches.is_empty() {
            return;
        }

        // All batches acknowledged.
        txn.phase = TxnPhase::CfgApply;
        Debug::TxnCfgApplyTx(txn_id).log();
        if let Err(error) = be.send_cfg_apply(adapter_id, txn_id) {
            error.log();
            self.end(be, txn_id);
        }
    }

    fn cfg_apply_reply(
        &mut self,
        be: &mut BackendView<'_>,
        adapter_id: AdapterId,
        txn_id: u64,
        success: bool,
        _batch_ids: &[u64],
        error: Option<&str>,
    ) {
        match self.lookup(adapter_id, txn_id) {
            Some(txn) if txn.phase == TxnPhase::CfgApply => (),
            _ => return,
        }

        if success {
            let _ = be.clear_adapter_config(adapter_id);
            let _ = be.set_cfg_synced(adapter_id);
            if let Ok(adapter) = be.adapter(adapter_id) {
                Debug::TxnCfgSynced(txn_id, &adapter.name).log();
            }
        } else {
            Debug::TxnAbort(txn_id, error).log();
        }
        self.end(be, txn_id);
    }
}

// ===== impl Txn =====

impl Txn {
    fn new(id: u64, adapter_id: AdapterId) -> Txn {
        Txn {
            id,
            adapter_id,
            phase: TxnPhase::Create,
            pending_batches: Default::default(),
        }
    }
}

// ===== helper functions =====

// Splits the configuration items into batches holding at most `max_items`
// items each, and whose framed request fits in `max_msg_len` bytes.
//
// Returns the framed length of the first item that doesn't fit in a request
// on its own.
fn cfg_batches(
    items: Vec<YangCfgDataReq>,
    txn_id: u64,
    max_items: usize,
    max_msg_len: usize,
) -> Result<Vec<Vec<YangCfgDataReq>>, usize> {
    // Request without items. The batch ID is sized for its largest value.
    let empty_len = BeCfgDataCreateReq {
        txn_id,
        batch_id: u64::MAX,
        data_req: vec![],
        end_of_data: true,
    }
    .encoded_len();
    let frame_len = |req_len: usize| {
        MSG_HDR_LEN
            + key_len(CFG_DATA_REQ_TAG)
            + encoded_len_varint(req_len as u64)
            + req_len
    };

    let mut batches = vec![];
    let mut batch = vec![];
    let mut req_len = empty_len;
    for item in items {
        let item_len = message::encoded_len(CFG_DATA_ITEM_TAG, &item);
        if frame_len(empty_len + item_len) > max_msg_len {
            return Err(frame_len(empty_len + item_len));
        }
        if batch.len() == max_items
            || frame_len(req_len + item_len) > max_msg_len
        {
            batches.push(std::mem::take(&mut batch));
            req_len = empty_len;
        }
        req_len += item_len;
        batch.push(item);
    }
    if !batch.is_empty() {
        batches.push(batch);
    }

    Ok(batches)
}

// ===== impl TxnError =====

impl std::fmt::Display for TxnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxnError::ConfigLocked(txn_id) => {
                write!(f, "configuration locked by transaction {txn_id}")
            }
            TxnError::Backend(..) => {
                write!(f, "backend operation failed")
            }
        }
    }
}

impl std::error::Error for TxnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TxnError::Backend(error) => Some(error.as_ref()),
            _ => None,
        }
    }
}

impl From<Error> for TxnError {
    fn from(error: Error) -> TxnError {
        TxnError::Backend(Box::new(error))
    }
}
