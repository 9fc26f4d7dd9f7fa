//! Per-call lifecycle state.

/// Local (client to server) half of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// Messages may still be sent.
    Open,
    /// The half-close marker has been written; no more messages.
    HalfClosedLocal,
}

/// Remote (server to client) half of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvState {
    /// Waiting for the server's header block.
    AwaitingHeaders,
    /// Headers received; data frames flow until the trailer.
    Streaming,
    /// Terminal: trailer received, socket failed, or cancelled.
    Ended,
}

/// Lifecycle record owned by one call.
#[derive(Debug, Clone)]
pub(crate) struct CallState {
    pub send: SendState,
    pub recv: RecvState,
    pub started: bool,
    /// The socket delivered its `Connect` event.
    pub connected: bool,
    /// The terminal event has been queued. Set once, never cleared.
    pub end_fired: bool,
}

impl CallState {
    pub fn new() -> Self {
        Self {
            send: SendState::Open,
            recv: RecvState::AwaitingHeaders,
            started: false,
            connected: false,
            end_fired: false,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.recv == RecvState::Ended
    }
}
