//! Message-oriented socket adapters.
//!
//! A [`Socket`] is one bidirectional connection. Operations never report
//! outcomes inline: `open` and `send_binary` return immediately and what
//! happens next is surfaced through [`poll_event`](Socket::poll_event).
//!
//! Event order per connection:
//!
//! ```text
//!   Connect | Error          exactly one of these first
//!   Message*                 only after Connect, in receipt order
//!   Close | Error, Close     exactly one terminal sequence
//! ```

pub mod mem;
pub mod ws;

pub use mem::MemSocket;
pub use ws::WsSocket;

use crate::error::Result;

/// Close code reported when the connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Close code reported when a close frame carried no status.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Something that happened on a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// The connection is established; writes are now allowed.
    Connect,
    /// One binary message from the peer.
    Message(Vec<u8>),
    /// The connection failed. A `Close` follows if the socket had connected.
    Error(String),
    /// The connection is closed.
    Close { code: u16, was_clean: bool },
}

/// A single bidirectional message-oriented connection.
pub trait Socket {
    /// Begin connecting to `url`. Failure is reported as an `Error` event.
    fn open(&mut self, url: &str);

    /// Queue one binary message.
    ///
    /// Fails with [`Error::NotConnected`](crate::Error::NotConnected) before
    /// the `Connect` event has been delivered.
    fn send_binary(&mut self, data: Vec<u8>) -> Result<()>;

    /// Close the connection. Safe to call repeatedly or after the peer closed.
    fn close(&mut self);

    /// Next event, or `None` if nothing is available right now.
    fn poll_event(&mut self) -> Option<SocketEvent>;
}
