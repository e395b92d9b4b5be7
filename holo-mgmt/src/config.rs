//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// Backend adapter configuration.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendCfg {
    // Path of the Unix socket backend clients connect to.
    pub socket_path: PathBuf,
    // Socket buffer sizes (SO_SNDBUF/SO_RCVBUF).
    pub sndbuf: Option<usize>,
    pub rcvbuf: Option<usize>,
    // Delay before starting the config download to a new client (ms).
    pub conn_init_delay: u64,
    // Delay before processing received messages (µs).
    pub msg_proc_delay: u64,
    // Write pause after the peer stopped draining its socket (ms).
    pub writes_on_delay: u64,
    // Maximum number of messages processed per pass.
    pub max_msg_proc: usize,
    // Maximum number of write attempts per pass.
    pub max_msg_write: usize,
    // Maximum frame length, header included.
    pub max_msg_len: usize,
    // Maximum number of config items per data request.
    pub cfg_batch_max_items: usize,
}

// ===== impl BackendCfg =====

impl BackendCfg {
    pub fn conn_init_delay(&self) -> Duration {
        Duration::from_millis(self.conn_init_delay)
    }

    pub fn msg_proc_delay(&self) -> Duration {
        Duration::from_micros(self.msg_proc_delay)
    }

    pub fn writes_on_delay(&self) -> Duration {
        Duration::from_millis(self.writes_on_delay)
    }
}

impl Default for BackendCfg {
    fn default() -> BackendCfg {
        BackendCfg {
            socket_path: PathBuf::from("/var/run/holo-mgmtd_be.sock"),
            sndbuf: Some(65535),
            rcvbuf: Some(65535),
            conn_init_delay: 50,
            msg_proc_delay: 10,
            writes_on_delay: 1,
            max_msg_proc: 500,
            max_msg_write: 100,
            max_msg_len: 16 * 1024,
            cfg_batch_max_items: 64,
        }
    }
}
