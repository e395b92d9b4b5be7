//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;

use holo_utils::task::Task;
use holo_utils::{Receiver, Sender};
use tokio::sync::mpsc;

use crate::adapter::{Adapter, AdapterEvent, AdapterFlags};
use crate::client::ClientId;
use crate::collections::{AdapterId, Adapters};
use crate::config::BackendCfg;
use crate::datastore::{
    ConfigChange, ConfigChangeOp, ConfigChanges, Datastore,
};
use crate::debug::Debug;
use crate::error::Error;
use crate::events;
use crate::network::{self, Connection};
use crate::proto::{
    BeCfgDataApplyReq, BeCfgDataCreateReq, BeMessage, BeTxnReq,
    YangCfgDataReq, be_message,
};
use crate::tasks;
use crate::tasks::messages::ProtocolInputMsg;
use crate::tasks::messages::input::{AdapterEventMsg, ConnAcceptMsg, ShowMsg};
use crate::txn::TxnCoordinator;
use crate::xpath_map::XpathMap;

// Backend adapter registry and event loop state.
pub struct Master {
    pub config: BackendCfg,
    pub xpath_map: XpathMap,
    pub adapters: Adapters,
    pub datastore: Box<dyn Datastore>,
    pub txn: Box<dyn TxnCoordinator>,
    pub tx: ProtocolInputChannelsTx,
    listener: Option<Task<()>>,
}

#[derive(Clone, Debug)]
pub struct ProtocolInputChannelsTx {
    // Connection accepted.
    pub conn_accept: Sender<ConnAcceptMsg>,
    // Adapter scheduled event.
    pub adapter_event: Sender<AdapterEventMsg>,
    // Operator introspection request.
    pub show: Sender<ShowMsg>,
}

#[derive(Debug)]
pub struct ProtocolInputChannelsRx {
    // Connection accepted.
    pub conn_accept: Receiver<ConnAcceptMsg>,
    // Adapter scheduled event.
    pub adapter_event: Receiver<AdapterEventMsg>,
    // Operator introspection request.
    pub show: Receiver<ShowMsg>,
}

// Adapter operations available to the transaction coordinator.
pub struct BackendView<'a> {
    config: &'a BackendCfg,
    xpath_map: &'a XpathMap,
    adapters: &'a mut Adapters,
    datastore: &'a dyn Datastore,
    adapter_eventp: &'a Sender<AdapterEventMsg>,
}

// ===== impl Master =====

impl Master {
    pub fn new(
        config: BackendCfg,
        datastore: Box<dyn Datastore>,
        txn: Box<dyn TxnCoordinator>,
    ) -> (Master, ProtocolInputChannelsRx) {
        let (tx, rx) = protocol_input_channels();
        let master = Master {
            config,
            xpath_map: XpathMap::new(),
            adapters: Default::default(),
            datastore,
            txn,
            tx,
            listener: None,
        };

        (master, rx)
    }

    // Starts accepting backend connections on the configured socket.
    pub fn listen(&mut self) -> Result<(), Error> {
        if self.listener.is_some() {
            return Ok(());
        }

        let listener = network::listen_socket(&self.config.socket_path)?;
        let listener = Arc::new(listener);
        self.listener =
            Some(tasks::listener(&listener, &self.tx.conn_accept));

        Ok(())
    }

    // Runs the event loop until all input channels are closed.
    pub async fn run(&mut self, mut rx: ProtocolInputChannelsRx) {
        while let Some(msg) = rx.recv().await {
            self.process_protocol_msg(msg);
        }
    }

    pub fn process_protocol_msg(&mut self, msg: ProtocolInputMsg) {
        match msg {
            ProtocolInputMsg::ConnAccept(msg) => {
                self.create_adapter(msg.conn, msg.peer);
            }
            ProtocolInputMsg::AdapterEvent(msg) => {
                events::process_adapter_event(self, msg.adapter_id, msg.event);
            }
            ProtocolInputMsg::Show(msg) => {
                let reply =
                    msg.request.process(&self.adapters, &self.xpath_map);
                let _ = msg.responder.send(reply);
            }
        }
    }

    // Creates an adapter for a freshly accepted connection.
    //
    // If the connection is already known, the existing adapter is reused and
    // its configuration download is scheduled again.
    pub fn create_adapter(
        &mut self,
        conn: Arc<dyn Connection>,
        peer: String,
    ) -> AdapterId {
        let existing = self
            .adapters
            .get_by_fd(conn.fd())
            .map(|(adapter_idx, _)| adapter_idx);
        let adapter = match existing {
            Some(adapter_idx) => &mut self.adapters[adapter_idx],
            None => {
                let (_, adapter) =
                    self.adapters.insert(conn, peer, &self.config);
                adapter.register_event(
                    AdapterEvent::Read,
                    &self.config,
                    &self.tx.adapter_event,
                );
                adapter
            }
        };

        if let Err(error) = adapter.setup_conn(&self.config) {
            error.log();
        }

        // Trigger config resync with the new adapter.
        adapter.register_event(
            AdapterEvent::ConnInit,
            &self.config,
            &self.tx.adapter_event,
        );

        adapter.id
    }

    // Disconnects all adapters.
    pub fn destroy(&mut self) {
        self.listener = None;
        let adapter_ids = self
            .adapters
            .iter()
            .map(|adapter| adapter.id)
            .collect::<Vec<_>>();
        for adapter_id in adapter_ids {
            events::disconnect(self, adapter_id);
        }
    }

    pub fn by_id(&self, adapter_id: AdapterId) -> Option<&Adapter> {
        self.adapters
            .get_by_id(adapter_id)
            .ok()
            .map(|(_, adapter)| adapter)
    }

    pub fn by_client(&self, client_id: ClientId) -> Option<&Adapter> {
        self.adapters
            .get_by_client(client_id)
            .map(|(_, adapter)| adapter)
    }

    pub fn by_name(&self, name: &str) -> Option<&Adapter> {
        self.adapters.get_by_name(name).map(|(_, adapter)| adapter)
    }

    pub fn by_fd(&self, fd: std::os::fd::RawFd) -> Option<&Adapter> {
        self.adapters.get_by_fd(fd).map(|(_, adapter)| adapter)
    }

    // Returns the backend view along with the transaction coordinator.
    pub fn split(&mut self) -> (BackendView<'_>, &mut dyn TxnCoordinator) {
        let be = BackendView {
            config: &self.config,
            xpath_map: &self.xpath_map,
            adapters: &mut self.adapters,
            datastore: self.datastore.as_ref(),
            adapter_eventp: &self.tx.adapter_event,
        };
        (be, self.txn.as_mut())
    }

    pub fn view(&mut self) -> BackendView<'_> {
        self.split().0
    }
}

// ===== impl BackendView =====

impl BackendView<'_> {
    pub fn config(&self) -> &BackendCfg {
        self.config
    }

    pub fn adapter(&self, adapter_id: AdapterId) -> Result<&Adapter, Error> {
        self.adapters
            .get_by_id(adapter_id)
            .map(|(_, adapter)| adapter)
    }

    pub fn begin_txn(
        &mut self,
        adapter_id: AdapterId,
        txn_id: u64,
    ) -> Result<(), Error> {
        let msg = be_message::Message::TxnReq(BeTxnReq {
            txn_id,
            create: true,
        });
        self.send_msg(adapter_id, msg.into())
    }

    pub fn end_txn(
        &mut self,
        adapter_id: AdapterId,
        txn_id: u64,
    ) -> Result<(), Error> {
        let msg = be_message::Message::TxnReq(BeTxnReq {
            txn_id,
            create: false,
        });
        self.send_msg(adapter_id, msg.into())
    }

    pub fn send_cfg_batch(
        &mut self,
        adapter_id: AdapterId,
        txn_id: u64,
        batch_id: u64,
        data_req: Vec<YangCfgDataReq>,
        end_of_data: bool,
    ) -> Result<(), Error> {
        let msg = be_message::Message::CfgDataReq(BeCfgDataCreateReq {
            txn_id,
            batch_id,
            data_req,
            end_of_data,
        });
        self.send_msg(adapter_id, msg.into())
    }

    pub fn send_cfg_apply(
        &mut self,
        adapter_id: AdapterId,
        txn_id: u64,
    ) -> Result<(), Error> {
        let msg =
            be_message::Message::CfgApplyReq(BeCfgDataApplyReq { txn_id });
        self.send_msg(adapter_id, msg.into())
    }

    // Returns the configuration to download to the adapter's client.
    //
    // The set is built from the datastore on first use and cached until
    // explicitly cleared.
    pub fn get_adapter_config(
        &mut self,
        adapter_id: AdapterId,
    ) -> Result<&ConfigChanges, Error> {
        let (_, adapter) = self.adapters.get_mut_by_id(adapter_id)?;
        if adapter.cfg_chgs.is_none() {
            let mut cfg_chgs = ConfigChanges::new();
            if let Some(client_id) = adapter.client_id {
                let mut seq = 0;
                self.datastore.iter_data("/", &mut |node| {
                    let subscr_info = self.xpath_map.subscribers(&node.xpath);
                    if !subscr_info.is_subscribed(client_id) {
                        return;
                    }
                    seq += 1;
                    let chg = ConfigChange::new(
                        seq,
                        node.xpath.clone(),
                        node.value.clone(),
                        ConfigChangeOp::Create,
                    );
                    cfg_chgs.insert(seq, chg);
                });
            }
            adapter.cfg_chgs = Some(cfg_chgs);
        }

        Ok(adapter.cfg_chgs.get_or_insert_with(Default::default))
    }

    pub fn clear_adapter_config(
        &mut self,
        adapter_id: AdapterId,
    ) -> Result<(), Error> {
        let (_, adapter) = self.adapters.get_mut_by_id(adapter_id)?;
        adapter.cfg_chgs = None;
        Ok(())
    }

    pub fn set_cfg_synced(
        &mut self,
        adapter_id: AdapterId,
    ) -> Result<(), Error> {
        let (_, adapter) = self.adapters.get_mut_by_id(adapter_id)?;
        adapter.flags.insert(AdapterFlags::CFG_SYNCED);
        Ok(())
    }

    // Shuts down the connection to the adapter's client. The adapter is torn
    // down once the event loop notices the closed connection.
    pub fn close_conn(&self, adapter_id: AdapterId) -> Result<(), Error> {
        let (_, adapter) = self.adapters.get_by_id(adapter_id)?;
        Debug::AdapterCloseConn(&adapter.name).log();
        adapter.conn.shutdown();
        Ok(())
    }

    pub fn retain(&mut self, adapter_id: AdapterId) -> Result<(), Error> {
        let (_, adapter) = self.adapters.get_mut_by_id(adapter_id)?;
        adapter.refcount += 1;
        Ok(())
    }

    // Drops a reference to the adapter, deleting it when no references are
    // left.
    pub fn release(&mut self, adapter_id: AdapterId) -> Result<(), Error> {
        let (adapter_idx, adapter) = self.adapters.get_mut_by_id(adapter_id)?;
        adapter.refcount = adapter.refcount.saturating_sub(1);
        if adapter.refcount == 0 {
            adapter.cancel_events();
            self.adapters.delete(adapter_idx);
        }
        Ok(())
    }

    fn send_msg(
        &mut self,
        adapter_id: AdapterId,
        msg: BeMessage,
    ) -> Result<(), Error> {
        let (_, adapter) = self.adapters.get_mut_by_id(adapter_id)?;
        adapter.send_msg(&msg, self.config, self.adapter_eventp)
    }
}

// ===== impl ProtocolInputChannelsRx =====

impl ProtocolInputChannelsRx {
    pub async fn recv(&mut self) -> Option<ProtocolInputMsg> {
        tokio::select! {
            msg = self.conn_accept.recv() => {
                msg.map(ProtocolInputMsg::ConnAccept)
            }
            msg = self.adapter_event.recv() => {
                msg.map(ProtocolInputMsg::AdapterEvent)
            }
            msg = self.show.recv() => {
                msg.map(ProtocolInputMsg::Show)
            }
        }
    }

    // Returns a pending message without waiting.
    pub fn try_recv(&mut self) -> Option<ProtocolInputMsg> {
        if let Ok(msg) = self.conn_accept.try_recv() {
            return Some(ProtocolInputMsg::ConnAccept(msg));
        }
        if let Ok(msg) = self.adapter_event.try_recv() {
            return Some(ProtocolInputMsg::AdapterEvent(msg));
        }
        if let Ok(msg) = self.show.try_recv() {
            return Some(ProtocolInputMsg::Show(msg));
        }
        None
    }
}

// ===== global functions =====

pub fn protocol_input_channels()
-> (ProtocolInputChannelsTx, ProtocolInputChannelsRx) {
    let (conn_acceptp, conn_acceptc) = mpsc::channel(4);
    let (adapter_eventp, adapter_eventc) = mpsc::channel(4);
    let (showp, showc) = mpsc::channel(4);

    let tx = ProtocolInputChannelsTx {
        conn_accept: conn_acceptp,
        adapter_event: adapter_eventp,
        show: showp,
    };
    let rx = ProtocolInputChannelsRx {
        conn_accept: conn_acceptc,
        adapter_event: adapter_eventc,
        show: showc,
    };

    (tx, rx)
}
