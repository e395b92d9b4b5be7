//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Length-prefixed message framing over a non-blocking byte stream.
//!
//! Every message is preceded by an 8-byte header holding a fixed marker and
//! the total frame length (header included), both in network byte order.

use std::collections::VecDeque;
use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::network::Connection;

// Frame header marker.
pub const MSG_MARKER: u32 = 0x23232300;

// Frame header length.
pub const MSG_HDR_LEN: usize = 8;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FrameHdr {
    pub marker: u32,
    pub len: u32,
}

// Framing state of a single connection.
#[derive(Debug)]
pub struct MsgState {
    // Partially received input.
    ins: BytesMut,
    // Complete input messages waiting to be processed.
    inq: VecDeque<Bytes>,
    // Encoded output waiting to be sent.
    outs: BytesMut,
    // Limits.
    max_msg_len: usize,
    max_read_buf: usize,
    max_write: usize,
    // Statistics.
    pub stats: MsgStats,
}

#[derive(Clone, Copy, Debug, Default)]
#[derive(Deserialize, Serialize)]
pub struct MsgStats {
    pub nrxm: u64,
    pub nrxb: u64,
    pub ntxm: u64,
    pub ntxb: u64,
}

// What the owner of the connection should do after a read attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadVerdict {
    // Connection closed or corrupt input.
    Disconnect,
    // Complete messages are queued; keep reading as well.
    ScheduleProcess,
    // Keep reading.
    ScheduleRead,
}

// What the owner of the connection should do after a write attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WriteVerdict {
    // Connection closed or write error.
    Disconnect,
    // Output still pending; try again when writable.
    ScheduleMore,
    // Nothing left to send.
    Idle,
    // Peer isn't draining its socket; pause writes for a while.
    WritesOff,
}

#[derive(Debug, Eq, PartialEq)]
pub enum FrameError {
    InvalidMarker(u32),
    InvalidLength(u32),
}

// ===== impl FrameHdr =====

impl FrameHdr {
    pub fn new(payload_len: usize) -> FrameHdr {
        FrameHdr {
            marker: MSG_MARKER,
            len: (MSG_HDR_LEN + payload_len) as u32,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.marker);
        buf.put_u32(self.len);
    }

    // Decodes and validates the header at the start of the given buffer.
    pub fn decode(
        mut buf: &[u8],
        max_msg_len: usize,
    ) -> Result<FrameHdr, FrameError> {
        let marker = buf.get_u32();
        let len = buf.get_u32();
        if marker != MSG_MARKER {
            return Err(FrameError::InvalidMarker(marker));
        }
        if (len as usize) < MSG_HDR_LEN || len as usize > max_msg_len {
            return Err(FrameError::InvalidLength(len));
        }
        Ok(FrameHdr { marker, len })
    }
}

// ===== impl MsgState =====

impl MsgState {
    pub fn new(max_msg_len: usize, max_write: usize) -> MsgState {
        MsgState {
            ins: BytesMut::with_capacity(max_msg_len),
            inq: Default::default(),
            outs: BytesMut::new(),
            max_msg_len,
            max_read_buf: max_msg_len,
            max_write,
            stats: Default::default(),
        }
    }

    // Reads whatever is available on the connection and queues the complete
    // messages found.
    pub fn read(&mut self, conn: &dyn Connection) -> ReadVerdict {
        let mut buf = vec![0; self.max_read_buf];
        match conn.try_read(&mut buf) {
            Ok(0) => return ReadVerdict::Disconnect,
            Ok(n) => self.ins.extend_from_slice(&buf[..n]),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => (),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => (),
            Err(_) => return ReadVerdict::Disconnect,
        }

        while self.ins.len() >= MSG_HDR_LEN {
            let hdr = match FrameHdr::decode(&self.ins, self.max_msg_len) {
                Ok(hdr) => hdr,
                Err(_) => return ReadVerdict::Disconnect,
            };
            let len = hdr.len as usize;
            if self.ins.len() < len {
                break;
            }
            let mut frame = self.ins.split_to(len);
            frame.advance(MSG_HDR_LEN);
            self.inq.push_back(frame.freeze());
            self.stats.nrxm += 1;
            self.stats.nrxb += len as u64;
        }

        if self.inq.is_empty() {
            ReadVerdict::ScheduleRead
        } else {
            ReadVerdict::ScheduleProcess
        }
    }

    // Dequeues up to `max` received messages.
    pub fn take_batch(&mut self, max: usize) -> Vec<Bytes> {
        let count = std::cmp::min(max, self.inq.len());
        self.inq.drain(..count).collect()
    }

    pub fn has_pending_input(&self) -> bool {
        !self.inq.is_empty()
    }

    pub fn has_pending_output(&self) -> bool {
        !self.outs.is_empty()
    }

    pub fn pending_output_len(&self) -> usize {
        self.outs.len()
    }

    // Writes as much pending output as the connection takes.
    pub fn write(&mut self, conn: &dyn Connection) -> WriteVerdict {
        let mut progress = false;

        for _ in 0..self.max_write {
            if self.outs.is_empty() {
                return WriteVerdict::Idle;
            }

            match conn.try_write(&self.outs) {
                Ok(0) => return WriteVerdict::Disconnect,
                Ok(n) => {
                    self.outs.advance(n);
                    self.stats.ntxb += n as u64;
                    progress = true;
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    return if progress {
                        WriteVerdict::ScheduleMore
                    } else {
                        WriteVerdict::WritesOff
                    };
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {
                    return WriteVerdict::ScheduleMore;
                }
                Err(_) => return WriteVerdict::Disconnect,
            }
        }

        // Write budget exhausted while output is still pending.
        if self.outs.is_empty() {
            WriteVerdict::Idle
        } else {
            WriteVerdict::WritesOff
        }
    }

    // Frames and queues an encoded message for transmission.
    pub fn send_msg<M: prost::Message>(
        &mut self,
        msg: &M,
    ) -> Result<(), usize> {
        let len = msg.encoded_len();
        if MSG_HDR_LEN + len > self.max_msg_len {
            return Err(len);
        }
        self.outs.reserve(MSG_HDR_LEN + len);
        FrameHdr::new(len).encode(&mut self.outs);
        // Encoding into a buffer with enough reserved capacity can't fail.
        let _ = msg.encode(&mut self.outs);
        self.stats.ntxm += 1;
        Ok(())
    }

    // Discards all buffered input and output.
    pub fn clear(&mut self) {
        self.ins.clear();
        self.inq.clear();
        self.outs.clear();
    }
}

// ===== global functions =====

// Returns the framed encoding of the given message.
pub fn encode_msg<M: prost::Message>(msg: &M) -> Bytes {
    let len = msg.encoded_len();
    let mut buf = BytesMut::with_capacity(MSG_HDR_LEN + len);
    FrameHdr::new(len).encode(&mut buf);
    let _ = msg.encode(&mut buf);
    buf.freeze()
}
