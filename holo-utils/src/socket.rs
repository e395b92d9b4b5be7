//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::io::Result;
use std::net::Shutdown;
use std::os::fd::AsFd;
use std::path::Path;

use socket2::SockRef;
pub use tokio::net::{UnixListener, UnixStream};

// Extension methods for stream sockets.
pub trait StreamSocketExt {
    // Sets the O_NONBLOCK flag on the underlying file descriptor.
    fn set_nonblocking(&self) -> Result<()>;

    // Sets the value of the SO_SNDBUF option on this socket.
    fn set_send_buffer_size(&self, size: usize) -> Result<()>;

    // Sets the value of the SO_RCVBUF option on this socket.
    fn set_recv_buffer_size(&self, size: usize) -> Result<()>;

    // Shuts down both halves of the connection.
    fn shutdown_both(&self) -> Result<()>;
}

// ===== impl T =====

impl<T> StreamSocketExt for T
where
    T: AsFd,
{
    fn set_nonblocking(&self) -> Result<()> {
        SockRef::from(self).set_nonblocking(true)
    }

    fn set_send_buffer_size(&self, size: usize) -> Result<()> {
        SockRef::from(self).set_send_buffer_size(size)
    }

    fn set_recv_buffer_size(&self, size: usize) -> Result<()> {
        SockRef::from(self).set_recv_buffer_size(size)
    }

    fn shutdown_both(&self) -> Result<()> {
        SockRef::from(self).shutdown(Shutdown::Both)
    }
}

// ===== global functions =====

// Binds a Unix stream listener to the given path, removing any stale socket
// file left behind by a previous run.
pub fn unix_listener_bind<P: AsRef<Path>>(path: P) -> Result<UnixListener> {
    let path = path.as_ref();
    match std::fs::remove_file(path) {
        Ok(()) => (),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => (),
        Err(error) => return Err(error),
    }
    UnixListener::bind(path)
}
