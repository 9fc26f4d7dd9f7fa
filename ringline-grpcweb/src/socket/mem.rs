//! In-memory scripted socket.
//!
//! Records every message written and replays events pushed by the test or
//! harness driving it. Enforces the same contract as a real socket: writes
//! before the `Connect` event has been polled fail, and `close` is idempotent.

use std::collections::VecDeque;

use tracing::trace;

use super::{Socket, SocketEvent};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum MemState {
    #[default]
    Idle,
    Opening,
    Connected,
    Closed,
}

/// A [`Socket`] backed by in-memory queues.
#[derive(Debug, Default)]
pub struct MemSocket {
    state: MemState,
    url: Option<String>,
    inbound: VecDeque<SocketEvent>,
    sent: Vec<Vec<u8>>,
    close_calls: usize,
}

impl MemSocket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script an event to be returned by a later `poll_event`.
    pub fn push(&mut self, event: SocketEvent) {
        self.inbound.push_back(event);
    }

    /// Script one binary message from the peer.
    pub fn push_message(&mut self, data: impl Into<Vec<u8>>) {
        self.push(SocketEvent::Message(data.into()));
    }

    /// The URL passed to `open`, if it has been called.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Messages written so far, in order.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Take the messages written so far.
    pub fn take_sent(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sent)
    }

    /// Number of times `close` was called.
    pub fn close_calls(&self) -> usize {
        self.close_calls
    }

    pub fn is_connected(&self) -> bool {
        self.state == MemState::Connected
    }

    pub fn is_closed(&self) -> bool {
        self.state == MemState::Closed
    }

    /// Scripted events not yet polled.
    pub fn pending_events(&self) -> usize {
        self.inbound.len()
    }
}

impl Socket for MemSocket {
    fn open(&mut self, url: &str) {
        self.url = Some(url.to_string());
        if self.state == MemState::Idle {
            self.state = MemState::Opening;
        }
    }

    fn send_binary(&mut self, data: Vec<u8>) -> Result<()> {
        if self.state != MemState::Connected {
            return Err(Error::NotConnected);
        }
        trace!(len = data.len(), "mem socket send");
        self.sent.push(data);
        Ok(())
    }

    fn close(&mut self) {
        self.close_calls += 1;
        self.state = MemState::Closed;
    }

    fn poll_event(&mut self) -> Option<SocketEvent> {
        if self.state == MemState::Idle {
            return None;
        }
        let event = self.inbound.pop_front()?;
        match &event {
            SocketEvent::Connect if self.state == MemState::Opening => {
                self.state = MemState::Connected;
            }
            SocketEvent::Error(_) | SocketEvent::Close { .. } => {
                self.state = MemState::Closed;
            }
            _ => {}
        }
        Some(event)
    }
}
