//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use holo_mgmt::adapter::AdapterFlags;
use holo_mgmt::datastore::MemoryDatastore;
use holo_mgmt::framing::MSG_HDR_LEN;
use holo_mgmt::proto::{
    BeCfgDataApplyReply, BeCfgDataApplyReq, BeCfgDataCreateReply,
    BeCfgDataCreateReq, BeMessage, BeTxnReply, BeTxnReq, CfgDataReqType,
    be_message,
};
use holo_mgmt::txn::TxnManager;
use maplit::btreemap;
use prost::Message as _;

use crate::common::*;

//
// Helper functions.
//

const STATICD_BASE: &str = "/frr-routing:routing/control-plane-protocols/control-plane-protocol[type='frr-staticd:staticd'][name='staticd'][vrf='default']/frr-staticd:staticd";

fn route_xpath(prefix: &str) -> String {
    format!(
        "{STATICD_BASE}/route-list[prefix='{prefix}'][afi-safi='frr-routing:ipv4-unicast']"
    )
}

const VRF_XPATH: &str = "/frr-vrf:lib/vrf[name='default']";
const ISIS_XPATH: &str = "/frr-isisd:isis/instance[area-tag='a'][vrf='default']";

// Running configuration with three nodes of interest to staticd and one
// that isn't.
fn test_datastore() -> MemoryDatastore {
    btreemap! {
        route_xpath("10.0.0.0/8") => None,
        route_xpath("172.16.0.0/12") => None,
        VRF_XPATH.to_owned() => Some("default".to_owned()),
        ISIS_XPATH.to_owned() => None,
    }
    .into_iter()
    .collect()
}

fn cfg_xpaths(req: &BeCfgDataCreateReq) -> Vec<&str> {
    req.data_req
        .iter()
        .map(|item| {
            assert_eq!(item.req_type, CfgDataReqType::SetData as i32);
            item.data.as_ref().unwrap().xpath.as_str()
        })
        .collect()
}

fn txn_reply(txn_id: u64, create: bool) -> be_message::Message {
    be_message::Message::TxnReply(BeTxnReply {
        txn_id,
        create,
        success: true,
    })
}

fn cfgdata_reply(txn_id: u64, batch_id: u64) -> be_message::Message {
    be_message::Message::CfgDataReply(BeCfgDataCreateReply {
        txn_id,
        batch_id,
        success: true,
        error_if_any: None,
    })
}

//
// Tests.
//

#[tokio::test(start_paused = true)]
async fn test_config_download() {
    let mut config = test_config();
    config.cfg_batch_max_items = 2;
    let (mut master, mut rx) =
        test_master(config, test_datastore(), TxnManager::default());
    let conn = MockConn::new(7);

    let adapter_id = connect(&mut master, &conn);
    conn.push_subscribe("staticd");
    settle(&mut master, &mut rx).await;

    // The download starts once the connection init delay expires.
    advance(&mut master, &mut rx, 50).await;
    assert_eq!(
        conn.take_msgs(),
        vec![be_message::Message::TxnReq(BeTxnReq {
            txn_id: 1,
            create: true,
        })]
    );
    assert_eq!(master.txn.config_txn_in_progress(), Some(1));
    assert_eq!(master.by_id(adapter_id).unwrap().refcount, 2);

    // Configuration is sent in batches, in datastore order.
    conn.push_msg(txn_reply(1, true));
    settle(&mut master, &mut rx).await;
    let msgs = conn.take_msgs();
    assert_eq!(msgs.len(), 2);
    let be_message::Message::CfgDataReq(batch1) = &msgs[0] else {
        panic!("unexpected message: {:?}", msgs[0]);
    };
    let be_message::Message::CfgDataReq(batch2) = &msgs[1] else {
        panic!("unexpected message: {:?}", msgs[1]);
    };
    let route1 = route_xpath("10.0.0.0/8");
    let route2 = route_xpath("172.16.0.0/12");
    assert_eq!((batch1.txn_id, batch1.batch_id), (1, 1));
    assert!(!batch1.end_of_data);
    assert_eq!(cfg_xpaths(batch1), vec![route1.as_str(), route2.as_str()]);
    assert_eq!((batch2.txn_id, batch2.batch_id), (1, 2));
    assert!(batch2.end_of_data);
    assert_eq!(cfg_xpaths(batch2), vec![VRF_XPATH]);

    // Apply is requested once every batch is acknowledged.
    conn.push_msg(cfgdata_reply(1, 1));
    settle(&mut master, &mut rx).await;
    assert!(conn.take_msgs().is_empty());
    conn.push_msg(cfgdata_reply(1, 2));
    settle(&mut master, &mut rx).await;
    assert_eq!(
        conn.take_msgs(),
        vec![be_message::Message::CfgApplyReq(BeCfgDataApplyReq {
            txn_id: 1
        })]
    );

    conn.push_msg(be_message::Message::CfgApplyReply(BeCfgDataApplyReply {
        txn_id: 1,
        batch_ids: vec![1, 2],
        success: true,
        error_if_any: None,
    }));
    settle(&mut master, &mut rx).await;
    let adapter = master.by_id(adapter_id).unwrap();
    assert!(adapter.flags.contains(AdapterFlags::CFG_SYNCED));
    assert!(adapter.cfg_chgs.is_none());
    assert_eq!(
        conn.take_msgs(),
        vec![be_message::Message::TxnReq(BeTxnReq {
            txn_id: 1,
            create: false,
        })]
    );

    // The transaction goes away once the client confirms its deletion.
    conn.push_msg(txn_reply(1, false));
    settle(&mut master, &mut rx).await;
    assert_eq!(master.txn.config_txn_in_progress(), None);
    assert_eq!(master.by_id(adapter_id).unwrap().refcount, 1);
}

#[tokio::test(start_paused = true)]
async fn test_replies_in_order() {
    let (mut master, mut rx) = default_master(test_datastore());
    let conn = MockConn::new(7);

    let adapter_id = connect(&mut master, &conn);
    conn.push_subscribe("staticd");
    settle(&mut master, &mut rx).await;
    advance(&mut master, &mut rx, 50).await;
    conn.take_msgs();

    // Several replies arriving in a single read.
    let mut bytes = vec![];
    for msg in [txn_reply(1, true), cfgdata_reply(1, 1)] {
        bytes.extend_from_slice(&holo_mgmt::framing::encode_msg(
            &holo_mgmt::proto::BeMessage::from(msg),
        ));
    }
    conn.push(&bytes);
    settle(&mut master, &mut rx).await;

    let msgs = conn.take_msgs();
    assert!(matches!(msgs[0], be_message::Message::CfgDataReq(_)));
    assert!(matches!(msgs[1], be_message::Message::CfgApplyReq(_)));
    assert_eq!(msgs.len(), 2);
    assert_eq!(master.by_id(adapter_id).unwrap().mstate.stats.nrxm, 3);
}

#[tokio::test(start_paused = true)]
async fn test_empty_config() {
    let (mut master, mut rx) = default_master(MemoryDatastore::default());
    let conn = MockConn::new(7);

    let adapter_id = connect(&mut master, &conn);
    conn.push_subscribe("staticd");
    settle(&mut master, &mut rx).await;
    advance(&mut master, &mut rx, 50).await;

    let adapter = master.by_id(adapter_id).unwrap();
    assert!(adapter.flags.contains(AdapterFlags::CFG_SYNCED));
    assert!(conn.take_msgs().is_empty());
    assert_eq!(master.txn.config_txn_in_progress(), None);
}

#[tokio::test(start_paused = true)]
async fn test_create_failure() {
    let (mut master, mut rx) = default_master(test_datastore());
    let conn = MockConn::new(7);

    let adapter_id = connect(&mut master, &conn);
    conn.push_subscribe("staticd");
    settle(&mut master, &mut rx).await;
    advance(&mut master, &mut rx, 50).await;
    conn.take_msgs();

    conn.push_msg(be_message::Message::TxnReply(BeTxnReply {
        txn_id: 1,
        create: true,
        success: false,
    }));
    settle(&mut master, &mut rx).await;
    assert_eq!(
        conn.take_msgs(),
        vec![be_message::Message::TxnReq(BeTxnReq {
            txn_id: 1,
            create: false,
        })]
    );

    conn.push_msg(txn_reply(1, false));
    settle(&mut master, &mut rx).await;
    let adapter = master.by_id(adapter_id).unwrap();
    assert!(!adapter.flags.contains(AdapterFlags::CFG_SYNCED));
    assert_eq!(adapter.refcount, 1);
    assert_eq!(master.txn.config_txn_in_progress(), None);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_txn() {
    let (mut master, mut rx) = default_master(test_datastore());
    let conn = MockConn::new(7);

    let adapter_id = connect(&mut master, &conn);
    conn.push_subscribe("staticd");
    settle(&mut master, &mut rx).await;
    advance(&mut master, &mut rx, 50).await;
    assert_eq!(master.txn.config_txn_in_progress(), Some(1));

    conn.push_eof();
    settle(&mut master, &mut rx).await;

    assert!(master.by_id(adapter_id).is_none());
    assert!(master.adapters.is_empty());
    assert_eq!(master.txn.config_txn_in_progress(), None);
}

#[tokio::test(start_paused = true)]
async fn test_large_config() {
    // 64 routes that don't fit in a single message.
    let datastore = (0..64)
        .map(|i| {
            let xpath = route_xpath(&format!("10.0.{i}.0/24"));
            (xpath, Some("x".repeat(400)))
        })
        .collect::<MemoryDatastore>();
    let (mut master, mut rx) = default_master(datastore);
    let max_msg_len = master.config.max_msg_len;
    let conn = MockConn::new(7);

    let adapter_id = connect(&mut master, &conn);
    conn.push_subscribe("staticd");
    settle(&mut master, &mut rx).await;
    advance(&mut master, &mut rx, 50).await;
    conn.take_msgs();

    // Batches are split to fit the maximum message length.
    conn.push_msg(txn_reply(1, true));
    settle(&mut master, &mut rx).await;
    let msgs = conn.take_msgs();
    assert!(msgs.len() > 1);
    let mut items = 0;
    for (idx, msg) in msgs.iter().enumerate() {
        let len = MSG_HDR_LEN + BeMessage::from(msg.clone()).encoded_len();
        assert!(len <= max_msg_len);
        let be_message::Message::CfgDataReq(batch) = msg else {
            panic!("unexpected message: {msg:?}");
        };
        assert_eq!(batch.batch_id, idx as u64 + 1);
        assert_eq!(batch.end_of_data, idx + 1 == msgs.len());
        items += batch.data_req.len();
    }
    assert_eq!(items, 64);

    for batch_id in 1..=msgs.len() as u64 {
        conn.push_msg(cfgdata_reply(1, batch_id));
    }
    settle(&mut master, &mut rx).await;
    assert_eq!(
        conn.take_msgs(),
        vec![be_message::Message::CfgApplyReq(BeCfgDataApplyReq {
            txn_id: 1
        })]
    );
    assert!(master.by_id(adapter_id).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_oversized_item() {
    let datastore = btreemap! {
        route_xpath("10.0.0.0/8") => Some("x".repeat(20000)),
    }
    .into_iter()
    .collect::<MemoryDatastore>();
    let (mut master, mut rx) = default_master(datastore);
    let conn = MockConn::new(7);

    let adapter_id = connect(&mut master, &conn);
    conn.push_subscribe("staticd");
    settle(&mut master, &mut rx).await;
    advance(&mut master, &mut rx, 50).await;
    conn.take_msgs();

    // The configuration can't be sent, so the client is disconnected.
    conn.push_msg(txn_reply(1, true));
    settle(&mut master, &mut rx).await;
    assert!(conn.take_msgs().is_empty());
    assert!(conn.is_closed());
    assert!(master.by_id(adapter_id).is_none());
    assert_eq!(master.txn.config_txn_in_progress(), None);
}
