//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use prost::Message as _;

use crate::adapter::{AdapterEvent, AdapterFlags, AdapterState};
use crate::client::ClientId;
use crate::collections::AdapterId;
use crate::debug::Debug;
use crate::error::Error;
use crate::framing::{ReadVerdict, WriteVerdict};
use crate::master::Master;
use crate::proto::{BeMessage, BeSubscribeReq, be_message};

// ===== adapter events =====

pub(crate) fn process_adapter_event(
    master: &mut Master,
    adapter_id: AdapterId,
    event: AdapterEvent,
) {
    // Lookup adapter. Events queued before the adapter went away are
    // discarded.
    let Ok((_, adapter)) = master.adapters.get_mut_by_id(adapter_id) else {
        Debug::AdapterEventStale(adapter_id, event).log();
        return;
    };
    adapter.clear_event(event);
    if adapter.is_dead() {
        Debug::AdapterEventStale(adapter_id, event).log();
        return;
    }

    match event {
        AdapterEvent::ConnInit => process_conn_init(master, adapter_id),
        AdapterEvent::Read => process_conn_read(master, adapter_id),
        AdapterEvent::Write => process_conn_write(master, adapter_id),
        AdapterEvent::WritesOn => process_writes_on(master, adapter_id),
        AdapterEvent::ProcMsg => process_msgs(master, adapter_id),
    }
}

// Starts the configuration download to a newly connected client.
fn process_conn_init(master: &mut Master, adapter_id: AdapterId) {
    let session_id = master.txn.config_txn_in_progress();
    let Ok((_, adapter)) = master.adapters.get_mut_by_id(adapter_id) else {
        return;
    };

    // Retry later if another configuration transaction is in progress.
    if let Some(session_id) = session_id {
        Debug::AdapterConnInitBusy(&adapter.name, session_id).log();
        adapter.register_event(
            AdapterEvent::ConnInit,
            &master.config,
            &master.tx.adapter_event,
        );
        return;
    }
    // The handshake arms the event again once the client is identified.
    if !adapter.is_active() {
        Debug::AdapterConnInitPending(&adapter.name).log();
        return;
    }

    // Disconnect if the transaction can't be created. The client is expected
    // to reconnect later.
    let name = adapter.name.clone();
    let (mut be, txn) = master.split();
    if let Err(error) = txn.adapter_conn(&mut be, adapter_id, true) {
        Error::TxnOpenFailed(name, error).log();
        disconnect(master, adapter_id);
    }
}

fn process_conn_read(master: &mut Master, adapter_id: AdapterId) {
    let Ok((_, adapter)) = master.adapters.get_mut_by_id(adapter_id) else {
        return;
    };

    let verdict = adapter.mstate.read(adapter.conn.as_ref());
    if adapter.state == AdapterState::New && adapter.mstate.stats.nrxm > 0 {
        adapter.set_state(AdapterState::Handshaking);
    }

    match verdict {
        ReadVerdict::Disconnect => {
            Error::ConnClosed(adapter.name.clone()).log();
            disconnect(master, adapter_id);
        }
        ReadVerdict::ScheduleProcess => {
            adapter.register_event(
                AdapterEvent::ProcMsg,
                &master.config,
                &master.tx.adapter_event,
            );
            adapter.register_event(
                AdapterEvent::Read,
                &master.config,
                &master.tx.adapter_event,
            );
        }
        ReadVerdict::ScheduleRead => {
            adapter.register_event(
                AdapterEvent::Read,
                &master.config,
                &master.tx.adapter_event,
            );
        }
    }
}

fn process_conn_write(master: &mut Master, adapter_id: AdapterId) {
    let Ok((_, adapter)) = master.adapters.get_mut_by_id(adapter_id) else {
        return;
    };

    match adapter.mstate.write(adapter.conn.as_ref()) {
        WriteVerdict::ScheduleMore => {
            adapter.register_event(
                AdapterEvent::Write,
                &master.config,
                &master.tx.adapter_event,
            );
        }
        WriteVerdict::Idle => (),
        WriteVerdict::WritesOff => {
            adapter.writes_off();
            adapter.register_event(
                AdapterEvent::WritesOn,
                &master.config,
                &master.tx.adapter_event,
            );
        }
        WriteVerdict::Disconnect => {
            Error::ConnClosed(adapter.name.clone()).log();
            disconnect(master, adapter_id);
        }
    }
}

fn process_writes_on(master: &mut Master, adapter_id: AdapterId) {
    let Ok((_, adapter)) = master.adapters.get_mut_by_id(adapter_id) else {
        return;
    };

    adapter.writes_on(&master.config, &master.tx.adapter_event);
}

// Processes a batch of received messages, in arrival order.
fn process_msgs(master: &mut Master, adapter_id: AdapterId) {
    let Ok((_, adapter)) = master.adapters.get_mut_by_id(adapter_id) else {
        return;
    };
    let msgs = adapter.mstate.take_batch(master.config.max_msg_proc);

    for data in msgs {
        // Stop if the adapter was disconnected by a previous message.
        let adapter = match master.adapters.get_by_id(adapter_id) {
            Ok((_, adapter)) if !adapter.is_dead() => adapter,
            _ => return,
        };

        match BeMessage::decode(data) {
            Ok(msg) => {
                Debug::AdapterMsgRx(&adapter.name, &msg).log();
                process_be_msg(master, adapter_id, msg);
            }
            Err(error) => {
                Error::MsgDecodeError(adapter.name.clone(), error).log();
            }
        }
    }

    // Schedule another pass if more messages are queued.
    if let Ok((_, adapter)) = master.adapters.get_mut_by_id(adapter_id)
        && !adapter.is_dead()
        && adapter.mstate.has_pending_input()
    {
        adapter.register_event(
            AdapterEvent::ProcMsg,
            &master.config,
            &master.tx.adapter_event,
        );
    }
}

// ===== backend messages =====

fn process_be_msg(master: &mut Master, adapter_id: AdapterId, msg: BeMessage) {
    use be_message::Message;

    let Some(msg) = msg.message else {
        return;
    };
    match msg {
        Message::SubscrReq(req) => {
            process_subscr_req(master, adapter_id, req);
        }
        Message::TxnReply(reply) => {
            let (mut be, txn) = master.split();
            txn.txn_reply(
                &mut be,
                adapter_id,
                reply.txn_id,
                reply.create,
                reply.success,
            );
        }
        Message::CfgDataReply(reply) => {
            let (mut be, txn) = master.split();
            txn.cfgdata_reply(
                &mut be,
                adapter_id,
                reply.txn_id,
                reply.batch_id,
                reply.success,
                reply.error_if_any.as_deref(),
            );
        }
        Message::CfgApplyReply(reply) => {
            let (mut be, txn) = master.split();
            txn.cfg_apply_reply(
                &mut be,
                adapter_id,
                reply.txn_id,
                reply.success,
                &reply.batch_ids,
                reply.error_if_any.as_deref(),
            );
        }
        // Requests and operational data aren't expected from backend
        // clients.
        _ => (),
    }
}

// Handshake: the client identifies itself by name.
fn process_subscr_req(
    master: &mut Master,
    adapter_id: AdapterId,
    req: BeSubscribeReq,
) {
    if req.client_name.is_empty() {
        return;
    }

    let Ok((adapter_idx, adapter)) = master.adapters.get_mut_by_id(adapter_id)
    else {
        return;
    };
    adapter.name = req.client_name;

    let Some(client_id) = ClientId::from_name(&adapter.name) else {
        Error::UnknownClient(adapter.name.clone()).log();
        disconnect(master, adapter_id);
        return;
    };
    adapter.client_id = Some(client_id);
    Debug::AdapterHandshake(&adapter.name, client_id).log();
    let name = adapter.name.clone();

    // A client that reconnects may leave its old connection behind. Evict
    // any other adapter using the same name before taking over the client
    // slot.
    //
    // Matching by name is only sound because handshakes are processed one
    // at a time by the single event loop task. Processing them in parallel
    // would require a per-connection generation number to tell the old
    // connection from the new one.
    let zombies = master
        .adapters
        .iter()
        .filter(|old| old.id != adapter_id && old.name == name)
        .map(|old| old.id)
        .collect::<Vec<_>>();
    for old_id in zombies {
        Debug::AdapterZombie(&name, old_id).log();
        disconnect(master, old_id);
    }

    master.adapters.set_client(client_id, adapter_idx);
    let adapter = &mut master.adapters[adapter_idx];
    let identified = adapter.is_active();
    adapter.set_state(AdapterState::Active);

    // Start the configuration download for a newly identified client.
    if !identified && !adapter.flags.contains(AdapterFlags::CFG_SYNCED) {
        adapter.register_event(
            AdapterEvent::ConnInit,
            &master.config,
            &master.tx.adapter_event,
        );
    }
}

// ===== helper functions =====

// Tears down the connection of the given adapter.
//
// The adapter is unlinked from the registry right away. It's deleted once
// the last reference to it is released.
pub(crate) fn disconnect(master: &mut Master, adapter_id: AdapterId) {
    let Ok((adapter_idx, adapter)) = master.adapters.get_mut_by_id(adapter_id)
    else {
        return;
    };
    if adapter.is_dead() {
        return;
    }

    Debug::AdapterDisconnect(&adapter.name).log();
    adapter.conn.shutdown();
    adapter.cancel_events();
    adapter.mstate.clear();
    adapter.set_state(AdapterState::Dead);
    let client_id = adapter.client_id;

    // Unlink from the registry.
    if let Some(client_id) = client_id {
        master.adapters.clear_client(client_id, adapter_idx);
    }
    master.adapters.unlink(adapter_idx);

    // Notify the transaction coordinator and drop the registry reference.
    let (mut be, txn) = master.split();
    if let Err(error) = txn.adapter_conn(&mut be, adapter_id, false)
        && let Ok(adapter) = be.adapter(adapter_id)
    {
        Error::TxnOpenFailed(adapter.name.clone(), error).log();
    }
    if let Err(error) = be.release(adapter_id) {
        error.log();
    }
}
