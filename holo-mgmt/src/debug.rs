//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{debug, debug_span};

use crate::adapter::{AdapterEvent, AdapterState};
use crate::client::ClientId;
use crate::collections::AdapterId;
use crate::proto::BeMessage;
use crate::xpath_map::SubscrInfo;

// Backend adapter debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    XpathMapInit(&'a str, &'a [ClientId]),
    XpathSubscrLookup(&'a str, &'a SubscrInfo),
    AdapterCreate(&'a str, &'a str),
    AdapterDelete(&'a str),
    AdapterStateChange(&'a str, AdapterState, AdapterState),
    AdapterHandshake(&'a str, ClientId),
    AdapterZombie(&'a str, AdapterId),
    AdapterConnInitBusy(&'a str, u64),
    AdapterConnInitPending(&'a str),
    AdapterDisconnect(&'a str),
    AdapterCloseConn(&'a str),
    AdapterEventStale(AdapterId, AdapterEvent),
    AdapterWritesOff(&'a str),
    AdapterWritesOn(&'a str, usize),
    AdapterMsgRx(&'a str, &'a BeMessage),
    AdapterMsgTx(&'a str, &'a BeMessage),
    TxnCreate(u64, &'a str),
    TxnDelete(u64, &'a str),
    TxnCfgBatchTx(u64, u64, usize, bool),
    TxnCfgApplyTx(u64),
    TxnCfgSynced(u64, &'a str),
    TxnAbort(u64, Option<&'a str>),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::XpathMapInit(xpath, clients) => {
                debug!(%xpath, ?clients, "{}", self);
            }
            Debug::XpathSubscrLookup(xpath, subscr_info) => {
                let clients = subscr_info
                    .subscribed()
                    .map(|(client, _)| client.name())
                    .collect::<Vec<_>>();
                debug!(%xpath, ?clients, "{}", self);
            }
            Debug::AdapterCreate(name, peer) => {
                debug_span!("adapter", %name).in_scope(|| {
                    debug!(%peer, "{}", self);
                });
            }
            Debug::AdapterDelete(name)
            | Debug::AdapterDisconnect(name)
            | Debug::AdapterCloseConn(name)
            | Debug::AdapterConnInitPending(name)
            | Debug::AdapterWritesOff(name) => {
                debug_span!("adapter", %name).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::AdapterStateChange(name, old_state, new_state) => {
                debug_span!("adapter", %name).in_scope(|| {
                    debug!(?old_state, ?new_state, "{}", self);
                });
            }
            Debug::AdapterHandshake(name, client) => {
                debug_span!("adapter", %name).in_scope(|| {
                    debug!(%client, "{}", self);
                });
            }
            Debug::AdapterZombie(name, adapter_id) => {
                debug_span!("adapter", %name).in_scope(|| {
                    debug!(%adapter_id, "{}", self);
                });
            }
            Debug::AdapterConnInitBusy(name, session_id) => {
                debug_span!("adapter", %name).in_scope(|| {
                    debug!(%session_id, "{}", self);
                });
            }
            Debug::AdapterEventStale(adapter_id, event) => {
                debug!(%adapter_id, ?event, "{}", self);
            }
            Debug::AdapterWritesOn(name, pending) => {
                debug_span!("adapter", %name).in_scope(|| {
                    debug!(%pending, "{}", self);
                });
            }
            Debug::AdapterMsgRx(name, msg) => {
                debug_span!("adapter", %name).in_scope(|| {
                    debug_span!("input").in_scope(|| {
                        debug!(r#type = %msg.kind(), ?msg, "{}", self);
                    })
                });
            }
            Debug::AdapterMsgTx(name, msg) => {
                debug_span!("adapter", %name).in_scope(|| {
                    debug_span!("output").in_scope(|| {
                        debug!(r#type = %msg.kind(), ?msg, "{}", self);
                    })
                });
            }
            Debug::TxnCreate(txn_id, name)
            | Debug::TxnDelete(txn_id, name)
            | Debug::TxnCfgSynced(txn_id, name) => {
                debug_span!("txn", %txn_id).in_scope(|| {
                    debug!(adapter = %name, "{}", self);
                });
            }
            Debug::TxnCfgBatchTx(txn_id, batch_id, items, end_of_data) => {
                debug_span!("txn", %txn_id).in_scope(|| {
                    debug!(%batch_id, %items, %end_of_data, "{}", self);
                });
            }
            Debug::TxnCfgApplyTx(txn_id) => {
                debug_span!("txn", %txn_id).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::TxnAbort(txn_id, error) => {
                debug_span!("txn", %txn_id).in_scope(|| {
                    debug!(error = error.unwrap_or("none"), "{}", self);
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::XpathMapInit(..) => {
                write!(f, "xpath registration")
            }
            Debug::XpathSubscrLookup(..) => {
                write!(f, "xpath subscription lookup")
            }
            Debug::AdapterCreate(..) => {
                write!(f, "adapter created")
            }
            Debug::AdapterDelete(..) => {
                write!(f, "adapter deleted")
            }
            Debug::AdapterStateChange(..) => {
                write!(f, "state transition")
            }
            Debug::AdapterHandshake(..) => {
                write!(f, "client subscribed")
            }
            Debug::AdapterZombie(..) => {
                write!(f, "evicting stale adapter with the same name")
            }
            Debug::AdapterConnInitBusy(..) => {
                write!(f, "config transaction in progress, retrying later")
            }
            Debug::AdapterConnInitPending(..) => {
                write!(f, "handshake not completed, deferring config download")
            }
            Debug::AdapterDisconnect(..) => {
                write!(f, "disconnecting")
            }
            Debug::AdapterCloseConn(..) => {
                write!(f, "closing connection")
            }
            Debug::AdapterEventStale(..) => {
                write!(f, "discarding event for deleted adapter")
            }
            Debug::AdapterWritesOff(..) => {
                write!(f, "pausing writes")
            }
            Debug::AdapterWritesOn(..) => {
                write!(f, "resuming writes")
            }
            Debug::AdapterMsgRx(..) => {
                write!(f, "message")
            }
            Debug::AdapterMsgTx(..) => {
                write!(f, "message")
            }
            Debug::TxnCreate(..) => {
                write!(f, "transaction created")
            }
            Debug::TxnDelete(..) => {
                write!(f, "transaction deleted")
            }
            Debug::TxnCfgBatchTx(..) => {
                write!(f, "sending config batch")
            }
            Debug::TxnCfgApplyTx(..) => {
                write!(f, "sending config apply")
            }
            Debug::TxnCfgSynced(..) => {
                write!(f, "configuration synchronized")
            }
            Debug::TxnAbort(..) => {
                write!(f, "transaction aborted")
            }
        }
    }
}
