//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use bytes::BytesMut;
use holo_mgmt::framing::{
    FrameError, FrameHdr, MSG_HDR_LEN, MSG_MARKER, MsgState, ReadVerdict,
    WriteVerdict, encode_msg,
};
use holo_mgmt::proto::{BeMessage, BeTxnReq, be_message};
use prost::Message as _;

use crate::common::MockConn;

//
// Helper functions.
//

fn txn_req(txn_id: u64) -> BeMessage {
    be_message::Message::TxnReq(BeTxnReq {
        txn_id,
        create: true,
    })
    .into()
}

//
// Tests.
//

#[test]
fn test_frame_hdr() {
    let mut buf = BytesMut::new();
    FrameHdr::new(4).encode(&mut buf);
    assert_eq!(buf.as_ref(), [0x23, 0x23, 0x23, 0x00, 0x00, 0x00, 0x00, 0x0c]);

    let hdr = FrameHdr::decode(&buf, 16384).unwrap();
    assert_eq!(hdr.marker, MSG_MARKER);
    assert_eq!(hdr.len, 12);
}

#[test]
fn test_frame_hdr_invalid() {
    let buf = [0x23, 0x23, 0x23, 0x01, 0x00, 0x00, 0x00, 0x0c];
    assert_eq!(
        FrameHdr::decode(&buf, 16384),
        Err(FrameError::InvalidMarker(0x23232301))
    );

    // Shorter than the header itself.
    let buf = [0x23, 0x23, 0x23, 0x00, 0x00, 0x00, 0x00, 0x04];
    assert_eq!(
        FrameHdr::decode(&buf, 16384),
        Err(FrameError::InvalidLength(4))
    );

    // Longer than the maximum frame length.
    let buf = [0x23, 0x23, 0x23, 0x00, 0x00, 0x00, 0x40, 0x01];
    assert_eq!(
        FrameHdr::decode(&buf, 16384),
        Err(FrameError::InvalidLength(16385))
    );
}

#[test]
fn test_read_partial() {
    let conn = MockConn::new(7);
    let mut mstate = MsgState::new(16384, 100);
    let frame = encode_msg(&txn_req(1));

    // Nothing available yet.
    assert_eq!(mstate.read(conn.as_ref()), ReadVerdict::ScheduleRead);

    // Incomplete header, then incomplete payload.
    conn.push(&frame[..5]);
    assert_eq!(mstate.read(conn.as_ref()), ReadVerdict::ScheduleRead);
    conn.push(&frame[5..MSG_HDR_LEN + 1]);
    assert_eq!(mstate.read(conn.as_ref()), ReadVerdict::ScheduleRead);
    assert!(!mstate.has_pending_input());

    // Rest of the frame along with a second complete frame.
    let mut rest = frame[MSG_HDR_LEN + 1..].to_vec();
    rest.extend_from_slice(&encode_msg(&txn_req(2)));
    conn.push(&rest);
    assert_eq!(mstate.read(conn.as_ref()), ReadVerdict::ScheduleProcess);
    assert_eq!(mstate.stats.nrxm, 2);

    let msgs = mstate.take_batch(1);
    assert_eq!(msgs.len(), 1);
    assert_eq!(BeMessage::decode(msgs[0].clone()).unwrap(), txn_req(1));
    assert!(mstate.has_pending_input());
    let msgs = mstate.take_batch(10);
    assert_eq!(BeMessage::decode(msgs[0].clone()).unwrap(), txn_req(2));
    assert!(!mstate.has_pending_input());
}

#[test]
fn test_read_disconnect() {
    // Corrupt marker.
    let conn = MockConn::new(7);
    let mut mstate = MsgState::new(16384, 100);
    conn.push(&[0x00; MSG_HDR_LEN]);
    assert_eq!(mstate.read(conn.as_ref()), ReadVerdict::Disconnect);

    // Oversized frame.
    let conn = MockConn::new(7);
    let mut mstate = MsgState::new(64, 100);
    conn.push(&[0x23, 0x23, 0x23, 0x00, 0x00, 0x00, 0x00, 0x41]);
    assert_eq!(mstate.read(conn.as_ref()), ReadVerdict::Disconnect);

    // End of stream.
    let conn = MockConn::new(7);
    let mut mstate = MsgState::new(16384, 100);
    conn.push_eof();
    assert_eq!(mstate.read(conn.as_ref()), ReadVerdict::Disconnect);
}

#[test]
fn test_write() {
    let conn = MockConn::new(7);
    let mut mstate = MsgState::new(16384, 100);

    assert_eq!(mstate.write(conn.as_ref()), WriteVerdict::Idle);

    mstate.send_msg(&txn_req(1)).unwrap();
    mstate.send_msg(&txn_req(2)).unwrap();
    assert_eq!(mstate.stats.ntxm, 2);
    assert_eq!(mstate.write(conn.as_ref()), WriteVerdict::Idle);
    assert!(!mstate.has_pending_output());
    assert_eq!(conn.take_msgs().len(), 2);
}

#[test]
fn test_write_backpressure() {
    let conn = MockConn::new(7);
    let mut mstate = MsgState::new(16384, 100);
    mstate.send_msg(&txn_req(1)).unwrap();
    let len = mstate.pending_output_len();

    // Some progress before the socket fills up.
    conn.set_tx_capacity(Some(4));
    assert_eq!(mstate.write(conn.as_ref()), WriteVerdict::ScheduleMore);
    assert_eq!(mstate.pending_output_len(), len - 4);

    // No progress at all.
    assert_eq!(mstate.write(conn.as_ref()), WriteVerdict::WritesOff);

    conn.set_tx_capacity(None);
    assert_eq!(mstate.write(conn.as_ref()), WriteVerdict::Idle);
    assert_eq!(mstate.stats.ntxb, len as u64);
}

#[test]
fn test_write_budget() {
    let conn = MockConn::new(7);
    let mut mstate = MsgState::new(16384, 1);
    mstate.send_msg(&txn_req(1)).unwrap();

    // The single write attempt allowed leaves output pending.
    conn.set_tx_capacity(Some(4));
    assert_eq!(mstate.write(conn.as_ref()), WriteVerdict::WritesOff);
    assert!(mstate.has_pending_output());
}

#[test]
fn test_send_too_large() {
    let mut mstate = MsgState::new(MSG_HDR_LEN + 4, 100);
    let msg = txn_req(u64::MAX);
    assert_eq!(mstate.send_msg(&msg), Err(msg.encoded_len()));
    assert!(!mstate.has_pending_output());
    assert_eq!(mstate.stats.ntxm, 0);
}

#[test]
fn test_clear() {
    let conn = MockConn::new(7);
    let mut mstate = MsgState::new(16384, 100);
    conn.push(&encode_msg(&txn_req(1)));
    mstate.read(conn.as_ref());
    mstate.send_msg(&txn_req(2)).unwrap();

    mstate.clear();
    assert!(!mstate.has_pending_input());
    assert!(!mstate.has_pending_output());
}
