//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{error, warn, warn_span};

use crate::collections::AdapterId;
use crate::txn::TxnError;

// Backend adapter errors.
#[derive(Debug)]
pub enum Error {
    // I/O errors
    IoError(IoError),
    // Inter-task communication
    AdapterIdNotFound(AdapterId),
    // Adapter
    ConnClosed(String),
    ConnectionClosed(String),
    MsgDecodeError(String, prost::DecodeError),
    MsgTooLarge(String, usize),
    UnknownClient(String),
    // Transactions
    TxnOpenFailed(String, TxnError),
}

// Backend adapter I/O errors.
#[derive(Debug)]
pub enum IoError {
    UnixSocketError(std::io::Error),
    UnixAcceptError(std::io::Error),
    UnixSockOptError(std::io::Error),
}

// ===== impl Error =====

impl Error {
    pub(crate) fn log(&self) {
        match self {
            Error::IoError(error) => {
                error.log();
            }
            Error::AdapterIdNotFound(adapter_id) => {
                warn!(?adapter_id, "{}", self);
            }
            Error::ConnClosed(name)
            | Error::ConnectionClosed(name)
            | Error::UnknownClient(name) => {
                warn_span!("adapter", %name).in_scope(|| {
                    warn!("{}", self);
                });
            }
            Error::MsgDecodeError(name, error) => {
                warn_span!("adapter", %name).in_scope(|| {
                    warn!(error = %with_source(error), "{}", self);
                });
            }
            Error::MsgTooLarge(name, len) => {
                warn_span!("adapter", %name).in_scope(|| {
                    warn!(%len, "{}", self);
                });
            }
            Error::TxnOpenFailed(name, error) => {
                warn_span!("adapter", %name).in_scope(|| {
                    error!(error = %with_source(error), "{}", self);
                });
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(error) => error.fmt(f),
            Error::AdapterIdNotFound(..) => {
                write!(f, "adapter ID not found")
            }
            Error::ConnClosed(..) => {
                write!(f, "connection closed by remote end")
            }
            Error::ConnectionClosed(..) => {
                write!(f, "attempt to send on a closed connection")
            }
            Error::MsgDecodeError(..) => {
                write!(f, "failed to decode message")
            }
            Error::MsgTooLarge(..) => {
                write!(f, "message exceeds the maximum frame length")
            }
            Error::UnknownClient(..) => {
                write!(f, "unknown backend client")
            }
            Error::TxnOpenFailed(..) => {
                write!(f, "failed to open configuration transaction")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(error) => Some(error),
            Error::MsgDecodeError(_, error) => Some(error),
            Error::TxnOpenFailed(_, error) => Some(error),
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::IoError(error)
    }
}

// ===== impl IoError =====

impl IoError {
    pub(crate) fn log(&self) {
        match self {
            IoError::UnixSocketError(error) => {
                error!(error = %with_source(error), "{}", self);
            }
            IoError::UnixAcceptError(error)
            | IoError::UnixSockOptError(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
        }
    }
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::UnixSocketError(..) => {
                write!(f, "failed to create backend socket")
            }
            IoError::UnixAcceptError(..) => {
                write!(f, "failed to accept connection request")
            }
            IoError::UnixSockOptError(..) => {
                write!(f, "failed to set socket option")
            }
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoError::UnixSocketError(error)
            | IoError::UnixAcceptError(error)
            | IoError::UnixSockOptError(error) => Some(error),
        }
    }
}

// ===== global functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
