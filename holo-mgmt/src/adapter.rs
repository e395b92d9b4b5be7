//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::os::fd::RawFd;
use std::sync::Arc;

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use holo_utils::Sender;
use holo_utils::task::{Task, TimeoutTask};
use serde::{Deserialize, Serialize};

use crate::client::ClientId;
use crate::collections::AdapterId;
use crate::config::BackendCfg;
use crate::datastore::ConfigChanges;
use crate::debug::Debug;
use crate::error::{Error, IoError};
use crate::framing::MsgState;
use crate::network::Connection;
use crate::proto::BeMessage;
use crate::tasks;
use crate::tasks::messages::input::AdapterEventMsg;

// Connection to a single backend client.
pub struct Adapter {
    // Registry-internal ID, never reused.
    pub id: AdapterId,
    pub name: String,
    pub client_id: Option<ClientId>,
    pub conn: Arc<dyn Connection>,
    pub fd: RawFd,
    pub peer: String,
    pub refcount: u32,
    pub flags: AdapterFlags,
    pub state: AdapterState,
    pub mstate: MsgState,
    pub tasks: AdapterTasks,
    // Configuration waiting to be downloaded to the client.
    pub cfg_chgs: Option<ConfigChanges>,
    pub created: DateTime<Utc>,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct AdapterFlags: u8 {
        const WRITES_OFF = 0x01;
        const CFG_SYNCED = 0x02;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum AdapterState {
    // Accepted, nothing received yet.
    New,
    // Receiving, client not identified yet.
    Handshaking,
    // Client identified and registered.
    Active,
    // Disconnected, waiting for the last reference to go away.
    Dead,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum AdapterEvent {
    ConnInit,
    Read,
    Write,
    WritesOn,
    ProcMsg,
}

// Scheduled events of an adapter. Dropping a handle cancels the event.
#[derive(Debug, Default)]
pub struct AdapterTasks {
    pub conn_init: Option<TimeoutTask>,
    pub read: Option<Task<()>>,
    pub write: Option<Task<()>>,
    pub writes_on: Option<TimeoutTask>,
    pub proc_msg: Option<TimeoutTask>,
}

// ===== impl Adapter =====

impl Adapter {
    pub(crate) fn new(
        id: AdapterId,
        conn: Arc<dyn Connection>,
        peer: String,
        config: &BackendCfg,
    ) -> Adapter {
        let fd = conn.fd();
        let name = format!("Unknown-FD-{fd}");
        Debug::AdapterCreate(&name, &peer).log();

        Adapter {
            id,
            name,
            client_id: None,
            conn,
            fd,
            peer,
            refcount: 1,
            flags: AdapterFlags::empty(),
            state: AdapterState::New,
            mstate: MsgState::new(config.max_msg_len, config.max_msg_write),
            tasks: Default::default(),
            cfg_chgs: None,
            created: Utc::now(),
        }
    }

    // Applies the configured socket options to the connection.
    pub(crate) fn setup_conn(&self, config: &BackendCfg) -> Result<(), Error> {
        self.conn
            .setup(config.sndbuf, config.rcvbuf)
            .map_err(IoError::UnixSockOptError)
            .map_err(Error::from)
    }

    pub(crate) fn set_state(&mut self, state: AdapterState) {
        if self.state != state {
            Debug::AdapterStateChange(&self.name, self.state, state).log();
            self.state = state;
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == AdapterState::Active
    }

    pub fn is_dead(&self) -> bool {
        self.state == AdapterState::Dead
    }

    // Arms the given event unless it's already armed.
    pub(crate) fn register_event(
        &mut self,
        event: AdapterEvent,
        config: &BackendCfg,
        adapter_eventp: &Sender<AdapterEventMsg>,
    ) {
        if self.is_dead() {
            return;
        }

        let id = self.id;
        match event {
            AdapterEvent::ConnInit => {
                if self.tasks.conn_init.is_none() {
                    let task = tasks::adapter_timer(
                        id,
                        event,
                        config.conn_init_delay(),
                        adapter_eventp,
                    );
                    self.tasks.conn_init = Some(task);
                }
            }
            AdapterEvent::Read => {
                if self.tasks.read.is_none() {
                    let task = tasks::conn_read(id, &self.conn, adapter_eventp);
                    self.tasks.read = Some(task);
                }
            }
            AdapterEvent::Write => {
                if self.flags.contains(AdapterFlags::WRITES_OFF) {
                    return;
                }
                if self.tasks.write.is_none() {
                    let task =
                        tasks::conn_write(id, &self.conn, adapter_eventp);
                    self.tasks.write = Some(task);
                }
            }
            AdapterEvent::WritesOn => {
                if self.tasks.writes_on.is_none() {
                    let task = tasks::adapter_timer(
                        id,
                        event,
                        config.writes_on_delay(),
                        adapter_eventp,
                    );
                    self.tasks.writes_on = Some(task);
                }
            }
            AdapterEvent::ProcMsg => {
                if self.tasks.proc_msg.is_none() {
                    let task = tasks::adapter_timer(
                        id,
                        event,
                        config.msg_proc_delay(),
                        adapter_eventp,
                    );
                    self.tasks.proc_msg = Some(task);
                }
            }
        }
    }

    // Marks the given event as no longer armed.
    pub(crate) fn clear_event(&mut self, event: AdapterEvent) {
        match event {
            AdapterEvent::ConnInit => self.tasks.conn_init = None,
            AdapterEvent::Read => self.tasks.read = None,
            AdapterEvent::Write => self.tasks.write = None,
            AdapterEvent::WritesOn => self.tasks.writes_on = None,
            AdapterEvent::ProcMsg => self.tasks.proc_msg = None,
        }
    }

    // Cancels all scheduled events.
    pub(crate) fn cancel_events(&mut self) {
        self.tasks = Default::default();
    }

    // Pauses writes until the resume timer fires.
    pub(crate) fn writes_off(&mut self) {
        Debug::AdapterWritesOff(&self.name).log();
        self.flags.insert(AdapterFlags::WRITES_OFF);
        self.tasks.write = None;
    }

    // Resumes writes, re-arming the write event if output is pending.
    pub(crate) fn writes_on(
        &mut self,
        config: &BackendCfg,
        adapter_eventp: &Sender<AdapterEventMsg>,
    ) {
        Debug::AdapterWritesOn(&self.name, self.mstate.pending_output_len())
            .log();
        self.flags.remove(AdapterFlags::WRITES_OFF);
        if self.mstate.has_pending_output() {
            self.register_event(AdapterEvent::Write, config, adapter_eventp);
        }
    }

    // Queues a message for transmission to the client.
    pub(crate) fn send_msg(
        &mut self,
        msg: &BeMessage,
        config: &BackendCfg,
        adapter_eventp: &Sender<AdapterEventMsg>,
    ) -> Result<(), Error> {
        if self.is_dead() {
            return Err(Error::ConnectionClosed(self.name.clone()));
        }

        Debug::AdapterMsgTx(&self.name, msg).log();
        self.mstate
            .send_msg(msg)
            .map_err(|len| Error::MsgTooLarge(self.name.clone(), len))?;
        self.register_event(AdapterEvent::Write, config, adapter_eventp);

        Ok(())
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("client_id", &self.client_id)
            .field("fd", &self.fd)
            .field("refcount", &self.refcount)
            .field("flags", &self.flags)
            .field("state", &self.state)
            .finish()
    }
}

impl Drop for Adapter {
    fn drop(&mut self) {
        Debug::AdapterDelete(&self.name).log();
    }
}
