//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::path::Path;
use std::sync::Arc;

use futures::future::BoxFuture;
use holo_utils::Sender;
use holo_utils::socket::{StreamSocketExt, UnixListener, UnixStream};
use tokio::io::Interest;
use tokio::sync::mpsc::error::SendError;
use tracing::{Instrument, debug_span};

use crate::error::{Error, IoError};
use crate::tasks::messages::input::ConnAcceptMsg;

// Non-blocking byte stream shared between the adapter and its readiness
// tasks.
pub trait Connection: Send + Sync + 'static {
    // Returns the file descriptor identifying this connection.
    fn fd(&self) -> RawFd;

    // Attempts to read without blocking.
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize>;

    // Attempts to write without blocking.
    fn try_write(&self, buf: &[u8]) -> io::Result<usize>;

    // Waits for the connection to become readable.
    fn readable(&self) -> BoxFuture<'_, io::Result<()>>;

    // Waits for the connection to become writable.
    fn writable(&self) -> BoxFuture<'_, io::Result<()>>;

    // Applies the configured socket options.
    fn setup(&self, sndbuf: Option<usize>, rcvbuf: Option<usize>)
    -> io::Result<()>;

    // Shuts down both directions of the connection.
    fn shutdown(&self);
}

// ===== impl UnixStream =====

impl Connection for UnixStream {
    fn fd(&self) -> RawFd {
        self.as_raw_fd()
    }

    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        UnixStream::try_read(self, buf)
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        UnixStream::try_write(self, buf)
    }

    fn readable(&self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            self.ready(Interest::READABLE).await.map(|_| ())
        })
    }

    fn writable(&self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            self.ready(Interest::WRITABLE).await.map(|_| ())
        })
    }

    fn setup(
        &self,
        sndbuf: Option<usize>,
        rcvbuf: Option<usize>,
    ) -> io::Result<()> {
        self.set_nonblocking()?;
        if let Some(size) = sndbuf {
            self.set_send_buffer_size(size)?;
        }
        if let Some(size) = rcvbuf {
            self.set_recv_buffer_size(size)?;
        }
        Ok(())
    }

    fn shutdown(&self) {
        let _ = self.shutdown_both();
    }
}

// ===== global functions =====

pub(crate) fn listen_socket(path: &Path) -> Result<UnixListener, Error> {
    holo_utils::socket::unix_listener_bind(path)
        .map_err(IoError::UnixSocketError)
        .map_err(Error::from)
}

pub(crate) async fn listen_loop(
    listener: Arc<UnixListener>,
    conn_acceptp: Sender<ConnAcceptMsg>,
) -> Result<(), SendError<ConnAcceptMsg>> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let peer = addr
                    .as_pathname()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "unnamed".to_owned());
                let conn: Arc<dyn Connection> = Arc::new(stream);
                let msg = ConnAcceptMsg { conn, peer };
                conn_acceptp
                    .send(msg)
                    .instrument(debug_span!("accept"))
                    .await?;
            }
            Err(error) => {
                IoError::UnixAcceptError(error).log();
            }
        }
    }
}
