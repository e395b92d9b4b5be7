//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::{Arc, Mutex};

use holo_mgmt::adapter::{AdapterFlags, AdapterState};
use holo_mgmt::client::ClientId;
use holo_mgmt::collections::AdapterId;
use holo_mgmt::datastore::MemoryDatastore;
use holo_mgmt::master::BackendView;
use holo_mgmt::proto::{BeTxnReq, be_message};
use holo_mgmt::txn::{TxnCoordinator, TxnError};

use crate::common::*;

// Transaction coordinator recording the connection notifications it gets.
#[derive(Clone, Debug, Default)]
struct RecordingTxn {
    state: Arc<Mutex<RecordingState>>,
}

#[derive(Debug, Default)]
struct RecordingState {
    busy: Option<u64>,
    conns: Vec<(AdapterId, bool)>,
}

impl TxnCoordinator for RecordingTxn {
    fn config_txn_in_progress(&self) -> Option<u64> {
        self.state.lock().unwrap().busy
    }

    fn adapter_conn(
        &mut self,
        _be: &mut BackendView<'_>,
        adapter_id: AdapterId,
        connected: bool,
    ) -> Result<(), TxnError> {
        self.state.lock().unwrap().conns.push((adapter_id, connected));
        Ok(())
    }

    fn txn_reply(
        &mut self,
        _be: &mut BackendView<'_>,
        _adapter_id: AdapterId,
        _txn_id: u64,
        _create: bool,
        _success: bool,
    ) {
    }

    fn cfgdata_reply(
        &mut self,
        _be: &mut BackendView<'_>,
        _adapter_id: AdapterId,
        _txn_id: u64,
        _batch_id: u64,
        _success: bool,
        _error: Option<&str>,
    ) {
    }

    fn cfg_apply_reply(
        &mut self,
        _be: &mut BackendView<'_>,
        _adapter_id: AdapterId,
        _txn_id: u64,
        _success: bool,
        _batch_ids: &[u64],
        _error: Option<&str>,
    ) {
    }
}

#[tokio::test(start_paused = true)]
async fn test_handshake() {
    let (mut master, mut rx) = default_master(MemoryDatastore::default());
    let conn = MockConn::new(7);

    let adapter_id = connect(&mut master, &conn);
    let adapter = master.by_id(adapter_id).unwrap();
    assert_eq!(adapter.name, "Unknown-FD-7");
    assert_eq!(adapter.state, AdapterState::New);
    assert_eq!(adapter.refcount, 1);

    conn.push_subscribe("staticd");
    settle(&mut master, &mut rx).await;

    let adapter = master.by_id(adapter_id).unwrap();
    assert_eq!(adapter.name, "staticd");
    assert_eq!(adapter.client_id, Some(ClientId::Staticd));
    assert_eq!(adapter.state, AdapterState::Active);
    assert_eq!(adapter.mstate.stats.nrxm, 1);
    assert_eq!(
        master.by_client(ClientId::Staticd).map(|adapter| adapter.id),
        Some(adapter_id)
    );
    assert_eq!(
        master.by_name("staticd").map(|adapter| adapter.id),
        Some(adapter_id)
    );
    assert_eq!(master.by_fd(7).map(|adapter| adapter.id), Some(adapter_id));

    // The handshake isn't acknowledged.
    assert!(conn.take_msgs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_handshake_empty_name() {
    let (mut master, mut rx) = default_master(MemoryDatastore::default());
    let conn = MockConn::new(7);

    let adapter_id = connect(&mut master, &conn);
    conn.push_subscribe("");
    settle(&mut master, &mut rx).await;

    let adapter = master.by_id(adapter_id).unwrap();
    assert_eq!(adapter.name, "Unknown-FD-7");
    assert_eq!(adapter.client_id, None);
    assert_eq!(adapter.state, AdapterState::Handshaking);
    assert!(master.by_client(ClientId::Staticd).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_handshake_unknown_client() {
    let (mut master, mut rx) = default_master(MemoryDatastore::default());
    let conn = MockConn::new(7);

    let adapter_id = connect(&mut master, &conn);
    conn.push_subscribe("bgpd");
    settle(&mut master, &mut rx).await;

    assert!(conn.is_closed());
    assert!(master.by_id(adapter_id).is_none());
    assert!(master.adapters.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_zombie_eviction() {
    let (mut master, mut rx) = default_master(MemoryDatastore::default());
    let conn1 = MockConn::new(7);
    let conn2 = MockConn::new(9);

    let adapter1_id = connect(&mut master, &conn1);
    conn1.push_subscribe("staticd");
    settle(&mut master, &mut rx).await;

    // The client reconnects without the old connection being noticed.
    let adapter2_id = connect(&mut master, &conn2);
    conn2.push_subscribe("staticd");
    settle(&mut master, &mut rx).await;

    assert!(conn1.is_closed());
    assert!(!conn2.is_closed());
    assert!(master.by_id(adapter1_id).is_none());
    assert_eq!(master.adapters.len(), 1);
    assert_eq!(
        master.by_client(ClientId::Staticd).map(|adapter| adapter.id),
        Some(adapter2_id)
    );
    assert_eq!(
        master.by_name("staticd").map(|adapter| adapter.fd),
        Some(9)
    );
}

#[tokio::test(start_paused = true)]
async fn test_create_adapter_same_fd() {
    let (mut master, mut rx) = default_master(MemoryDatastore::default());
    let conn = MockConn::new(7);

    let adapter_id1 = connect(&mut master, &conn);
    let adapter_id2 = connect(&mut master, &conn);
    settle(&mut master, &mut rx).await;

    assert_eq!(adapter_id1, adapter_id2);
    assert_eq!(master.adapters.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_peer_close() {
    let txn = RecordingTxn::default();
    let (mut master, mut rx) =
        test_master(test_config(), MemoryDatastore::default(), txn.clone());
    let conn = MockConn::new(7);

    let adapter_id = connect(&mut master, &conn);
    conn.push_subscribe("staticd");
    settle(&mut master, &mut rx).await;

    conn.push_eof();
    settle(&mut master, &mut rx).await;

    assert!(conn.is_closed());
    assert!(master.by_id(adapter_id).is_none());
    assert!(master.by_client(ClientId::Staticd).is_none());
    assert_eq!(txn.state.lock().unwrap().conns, vec![(adapter_id, false)]);
}

#[tokio::test(start_paused = true)]
async fn test_corrupt_frame() {
    let (mut master, mut rx) = default_master(MemoryDatastore::default());
    let conn = MockConn::new(7);

    let adapter_id = connect(&mut master, &conn);
    conn.push(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x00, 0x00, 0x10]);
    settle(&mut master, &mut rx).await;

    assert!(conn.is_closed());
    assert!(master.by_id(adapter_id).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_conn_init() {
    let txn = RecordingTxn::default();
    let (mut master, mut rx) =
        test_master(test_config(), MemoryDatastore::default(), txn.clone());
    let conn = MockConn::new(7);

    // Nothing happens before the handshake completes.
    let adapter_id = connect(&mut master, &conn);
    advance(&mut master, &mut rx, 50).await;
    assert!(txn.state.lock().unwrap().conns.is_empty());
    assert!(master.by_id(adapter_id).unwrap().tasks.conn_init.is_none());

    conn.push_subscribe("staticd");
    settle(&mut master, &mut rx).await;

    // Another configuration transaction is in progress.
    txn.state.lock().unwrap().busy = Some(5);
    advance(&mut master, &mut rx, 50).await;
    assert!(txn.state.lock().unwrap().conns.is_empty());

    txn.state.lock().unwrap().busy = None;
    advance(&mut master, &mut rx, 50).await;
    assert_eq!(txn.state.lock().unwrap().conns, vec![(adapter_id, true)]);

    // No further attempts once the client was notified.
    advance(&mut master, &mut rx, 50).await;
    assert_eq!(txn.state.lock().unwrap().conns.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_writes_off() {
    let (mut master, mut rx) = default_master(MemoryDatastore::default());
    let conn = MockConn::new(7);

    let adapter_id = connect(&mut master, &conn);
    conn.push_subscribe("staticd");
    settle(&mut master, &mut rx).await;

    // The peer stops draining its socket.
    conn.set_tx_capacity(Some(0));
    master.view().begin_txn(adapter_id, 1).unwrap();
    settle(&mut master, &mut rx).await;

    let adapter = master.by_id(adapter_id).unwrap();
    assert!(adapter.flags.contains(AdapterFlags::WRITES_OFF));
    assert!(adapter.mstate.has_pending_output());
    assert_eq!(conn.write_calls(), 1);

    // No write attempts while writes are paused.
    master.view().begin_txn(adapter_id, 2).unwrap();
    settle(&mut master, &mut rx).await;
    assert_eq!(conn.write_calls(), 1);

    // Writes resume once the cooldown expires.
    conn.set_tx_capacity(None);
    advance(&mut master, &mut rx, 1).await;

    let adapter = master.by_id(adapter_id).unwrap();
    assert!(!adapter.flags.contains(AdapterFlags::WRITES_OFF));
    assert!(!adapter.mstate.has_pending_output());
    assert_eq!(conn.write_calls(), 2);
    assert_eq!(
        conn.take_msgs(),
        vec![
            be_message::Message::TxnReq(BeTxnReq {
                txn_id: 1,
                create: true,
            }),
            be_message::Message::TxnReq(BeTxnReq {
                txn_id: 2,
                create: true,
            }),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_writes_on_without_output() {
    let (mut master, mut rx) = default_master(MemoryDatastore::default());
    let conn = MockConn::new(7);

    let adapter_id = connect(&mut master, &conn);
    conn.push_subscribe("staticd");
    settle(&mut master, &mut rx).await;

    conn.set_tx_capacity(Some(0));
    master.view().begin_txn(adapter_id, 1).unwrap();
    settle(&mut master, &mut rx).await;
    assert_eq!(conn.write_calls(), 1);

    // Pending output is dropped while writes are paused.
    let (_, adapter) = master.adapters.get_mut_by_id(adapter_id).unwrap();
    adapter.mstate.clear();

    // Resuming writes doesn't schedule a write with nothing to send.
    conn.set_tx_capacity(None);
    advance(&mut master, &mut rx, 1).await;

    let adapter = master.by_id(adapter_id).unwrap();
    assert!(!adapter.flags.contains(AdapterFlags::WRITES_OFF));
    assert!(adapter.tasks.write.is_none());
    assert_eq!(conn.write_calls(), 1);
    assert!(conn.take_msgs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_partial_write() {
    let (mut master, mut rx) = default_master(MemoryDatastore::default());
    let conn = MockConn::new(7);

    let adapter_id = connect(&mut master, &conn);
    conn.push_subscribe("staticd");
    settle(&mut master, &mut rx).await;

    // Room for the frame header only.
    conn.set_tx_capacity(Some(8));
    master.view().begin_txn(adapter_id, 1).unwrap();
    settle(&mut master, &mut rx).await;

    let adapter = master.by_id(adapter_id).unwrap();
    assert!(adapter.mstate.has_pending_output());

    conn.set_tx_capacity(None);
    advance(&mut master, &mut rx, 1).await;
    let adapter = master.by_id(adapter_id).unwrap();
    assert!(!adapter.mstate.has_pending_output());
    assert_eq!(conn.take_msgs().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retain_release() {
    let (mut master, mut rx) = default_master(MemoryDatastore::default());
    let conn = MockConn::new(7);

    let adapter_id = connect(&mut master, &conn);
    settle(&mut master, &mut rx).await;

    master.view().retain(adapter_id).unwrap();
    assert_eq!(master.by_id(adapter_id).unwrap().refcount, 2);
    master.view().release(adapter_id).unwrap();
    assert_eq!(master.by_id(adapter_id).unwrap().refcount, 1);

    // Unknown adapters are left alone.
    assert!(master.view().release(adapter_id + 100).is_err());
    assert_eq!(master.adapters.len(), 1);

    // The registry reference is the last one.
    master.view().release(adapter_id).unwrap();
    assert!(master.by_id(adapter_id).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_destroy() {
    let (mut master, mut rx) = default_master(MemoryDatastore::default());
    let conn1 = MockConn::new(7);
    let conn2 = MockConn::new(9);

    connect(&mut master, &conn1);
    connect(&mut master, &conn2);
    conn1.push_subscribe("staticd");
    settle(&mut master, &mut rx).await;

    master.destroy();
    assert!(conn1.is_closed());
    assert!(conn2.is_closed());
    assert!(master.adapters.is_empty());
    assert!(master.by_client(ClientId::Staticd).is_none());
}
