// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! RPMSG endpoints as seen by the protocol clients.
//!
//! The virtio rings and the name service live below this layer. Clients only
//! need two shapes of endpoint:
//!
//! - [`RemoteCall`]: the ambafs endpoint, request and reply in one buffer
//! - [`Channel`]: a raw datagram endpoint (link-control)

#[cfg(any(test, feature = "mock"))]
mod mock;

#[cfg(test)]
mod mock_test;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockChannel, MockNode, MockRemoteFs};

use core::fmt;
use std::sync::Arc;

use ambalink_abi::ambafs::MSG_HEADER_SIZE;

/// Runs once the peer answers a fire-and-forget message, with the reply.
pub type SendCallback = Box<dyn FnOnce(&[u8]) + Send>;

/// Transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The peer did not answer.
    NoReply,
    /// The message does not fit its buffer or an RPMSG buffer.
    TooLarge {
        /// Requested length.
        len: usize,
        /// Largest length accepted.
        max: usize,
    },
    /// The endpoint is gone.
    Disconnected,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoReply => write!(f, "no reply from remote core"),
            Self::TooLarge { len, max } => {
                write!(f, "message of {len} bytes exceeds {max} bytes")
            }
            Self::Disconnected => write!(f, "endpoint disconnected"),
        }
    }
}

impl core::error::Error for TransportError {}

/// The ambafs remote-call endpoint.
///
/// A message is a header followed by `len` payload bytes. At most one call
/// may be outstanding per buffer; callers own their buffer for the duration.
pub trait RemoteCall: Send + Sync {
    /// Send `msg` and block until the reply has overwritten it in place.
    ///
    /// An empty reply (record count 0) is `Ok`; [`TransportError::NoReply`]
    /// means nothing came back at all.
    fn exec(&self, msg: &mut [u8], len: usize) -> Result<(), TransportError>;

    /// Send `msg` without waiting. `done` receives the reply, if any.
    fn send(&self, msg: &[u8], len: usize, done: Option<SendCallback>)
    -> Result<(), TransportError>;
}

impl<T: RemoteCall + ?Sized> RemoteCall for Arc<T> {
    fn exec(&self, msg: &mut [u8], len: usize) -> Result<(), TransportError> {
        (**self).exec(msg, len)
    }

    fn send(
        &self,
        msg: &[u8],
        len: usize,
        done: Option<SendCallback>,
    ) -> Result<(), TransportError> {
        (**self).send(msg, len, done)
    }
}

/// A raw datagram endpoint.
pub trait Channel: Send + Sync {
    /// Queue `data` for the peer.
    fn send(&self, data: &[u8]) -> Result<(), TransportError>;
}

impl<T: Channel + ?Sized> Channel for Arc<T> {
    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        (**self).send(data)
    }
}

/// Bytes on the wire for a message with `len` payload bytes.
///
/// Fails if that exceeds the buffer the message lives in.
pub fn wire_len(buf_len: usize, len: usize) -> Result<usize, TransportError> {
    let total = MSG_HEADER_SIZE.saturating_add(len);
    if total > buf_len {
        return Err(TransportError::TooLarge {
            len: total,
            max: buf_len,
        });
    }
    Ok(total)
}
