//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;
use std::time::Duration;

use holo_utils::Sender;
use holo_utils::socket::UnixListener;
use holo_utils::task::{Task, TimeoutTask};
use tracing::{Instrument, debug_span};

use crate::adapter::AdapterEvent;
use crate::collections::AdapterId;
use crate::network::{self, Connection};

//
// Backend adapter tasks diagram:
//                                +--------------+
//                                |    daemon    |
//                                +--------------+
//                                        |
//                                show (1x) V
//                                +--------------+
//            listener (1x) ->    |              |
//           conn_read (Nx) ->    |    master    |
//          conn_write (Nx) ->    |              |
//       adapter_timer (Nx) ->    |              |
//                                +--------------+
//

// Backend adapter inter-task message types.
pub mod messages {
    use super::*;

    // Type aliases.
    pub type ProtocolInputMsg = input::ProtocolMsg;

    // Input messages (child task -> main task).
    pub mod input {
        use super::*;
        use crate::show::{ShowReply, ShowRequest};

        #[derive(Debug)]
        pub enum ProtocolMsg {
            ConnAccept(ConnAcceptMsg),
            AdapterEvent(AdapterEventMsg),
            Show(ShowMsg),
        }

        pub struct ConnAcceptMsg {
            pub conn: Arc<dyn Connection>,
            pub peer: String,
        }

        #[derive(Clone, Copy, Debug)]
        pub struct AdapterEventMsg {
            pub adapter_id: AdapterId,
            pub event: AdapterEvent,
        }

        #[derive(Debug)]
        pub struct ShowMsg {
            pub request: ShowRequest,
            pub responder: holo_utils::Responder<ShowReply>,
        }

        impl std::fmt::Debug for ConnAcceptMsg {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct("ConnAcceptMsg")
                    .field("fd", &self.conn.fd())
                    .field("peer", &self.peer)
                    .finish()
            }
        }
    }
}

// ===== backend adapter tasks =====

// Unix socket accept task.
pub(crate) fn listener(
    listener: &Arc<UnixListener>,
    conn_acceptp: &Sender<messages::input::ConnAcceptMsg>,
) -> Task<()> {
    let span = debug_span!("backend");
    let _span_guard = span.enter();

    let listener = listener.clone();
    let conn_acceptp = conn_acceptp.clone();
    Task::spawn(
        async move {
            let _ = network::listen_loop(listener, conn_acceptp).await;
        }
        .in_current_span(),
    )
}

// Waits for the connection to become readable.
pub(crate) fn conn_read(
    adapter_id: AdapterId,
    conn: &Arc<dyn Connection>,
    adapter_eventp: &Sender<messages::input::AdapterEventMsg>,
) -> Task<()> {
    let conn = conn.clone();
    let adapter_eventp = adapter_eventp.clone();
    Task::spawn(
        async move {
            // Errors are picked up by the read attempt that follows.
            let _ = conn.readable().await;
            let msg = messages::input::AdapterEventMsg {
                adapter_id,
                event: AdapterEvent::Read,
            };
            let _ = adapter_eventp.send(msg).await;
        }
        .in_current_span(),
    )
}

// Waits for the connection to become writable.
pub(crate) fn conn_write(
    adapter_id: AdapterId,
    conn: &Arc<dyn Connection>,
    adapter_eventp: &Sender<messages::input::AdapterEventMsg>,
) -> Task<()> {
    let conn = conn.clone();
    let adapter_eventp = adapter_eventp.clone();
    Task::spawn(
        async move {
            let _ = conn.writable().await;
            let msg = messages::input::AdapterEventMsg {
                adapter_id,
                event: AdapterEvent::Write,
            };
            let _ = adapter_eventp.send(msg).await;
        }
        .in_current_span(),
    )
}

// One-shot adapter timer.
pub(crate) fn adapter_timer(
    adapter_id: AdapterId,
    event: AdapterEvent,
    delay: Duration,
    adapter_eventp: &Sender<messages::input::AdapterEventMsg>,
) -> TimeoutTask {
    let adapter_eventp = adapter_eventp.clone();
    TimeoutTask::new(delay, move || async move {
        let msg = messages::input::AdapterEventMsg { adapter_id, event };
        let _ = adapter_eventp.send(msg).await;
    })
}
