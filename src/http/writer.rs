use std::cell::RefCell;
use std::fmt::Write as _;

use bytes::{Bytes, BytesMut};
use tokio::sync::Notify;

use crate::http::headers::Headers;
use crate::http::status::reason_phrase;

/// Terminating chunk of a chunked body.
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

/// Serializes a status line and header block, blank line included.
pub fn serialize_head(minor_version: u8, status: u16, headers: &Headers) -> Vec<u8> {
    let mut head = String::with_capacity(256);

    let _ = write!(
        head,
        "HTTP/1.{} {} {}\r\n",
        minor_version,
        status,
        reason_phrase(status)
    );

    for (name, value) in headers.iter() {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }

    head.push_str("\r\n");
    head.into_bytes()
}

/// Frames `data` as one chunk of a chunked body.
pub fn encode_chunk(data: &[u8]) -> Vec<u8> {
    let mut buf = format!("{:x}\r\n", data.len()).into_bytes();
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
    buf
}

#[derive(Default)]
struct WireState {
    out: BytesMut,
    exchange_ended: bool,
}

/// Outgoing side of one connection.
///
/// Responses append serialized bytes here and flag when their exchange
/// has ended; the connection drains both. Every change wakes the driver,
/// so a response completed outside the connection's own call stack is
/// still flushed.
#[derive(Default)]
pub struct Wire {
    state: RefCell<WireState>,
    notify: Notify,
}

impl Wire {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, bytes: &[u8]) {
        self.state.borrow_mut().out.extend_from_slice(bytes);
        self.notify.notify_one();
    }

    pub(crate) fn mark_ended(&self) {
        self.state.borrow_mut().exchange_ended = true;
        self.notify.notify_one();
    }

    /// Returns and clears the "exchange ended" flag.
    pub(crate) fn take_ended(&self) -> bool {
        std::mem::take(&mut self.state.borrow_mut().exchange_ended)
    }

    /// Takes everything written so far.
    pub fn take_output(&self) -> Option<Bytes> {
        let mut state = self.state.borrow_mut();
        if state.out.is_empty() {
            None
        } else {
            Some(state.out.split().freeze())
        }
    }

    /// Resolves once something was written or an exchange ended.
    pub async fn notified(&self) {
        self.notify.notified().await
    }
}
