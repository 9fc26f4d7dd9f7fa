use std::io;

use protocol_grpcweb::{Code, ParseError, Status};

use crate::codec::DecodeError;

/// Result type for gRPC-Web call operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by a gRPC-Web call.
///
/// Contract violations (see [`Error::is_contract_violation`]) are returned
/// synchronously from the method that was misused and leave the call
/// untouched. Every other kind ends the call and reaches the application
/// only as the status of the terminal event.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The socket never connected.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Out-of-order or malformed frame or header data.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A message payload failed application deserialization.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The socket closed before the trailer frame arrived.
    #[error("socket closed before trailers (code {code}, clean: {was_clean})")]
    AbnormalClosure { code: u16, was_clean: bool },

    /// The socket reported an error after connecting.
    #[error("transport error: {0}")]
    Transport(String),

    /// `start()` was called more than once.
    #[error("call already started")]
    AlreadyStarted,

    /// An operation that needs a started call was invoked before `start()`.
    #[error("call not started")]
    NotStarted,

    /// `send()` after `finish_send()`.
    #[error("stream closed for sending")]
    StreamClosedForSending,

    /// `send()` after the call ended.
    #[error("call already ended")]
    CallEnded,

    /// A socket write was attempted before the connect event.
    #[error("socket not connected")]
    NotConnected,

    /// Request metadata or a request message cannot be put on the wire.
    #[error("cannot encode request: {0}")]
    Encode(ParseError),

    /// Invalid configuration (bad host, malformed env var).
    #[error("config error: {0}")]
    Config(String),

    /// I/O error on the underlying socket.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether this error reports misuse of the call API.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::AlreadyStarted
                | Error::NotStarted
                | Error::StreamClosedForSending
                | Error::CallEnded
                | Error::NotConnected
                | Error::Encode(_)
        )
    }

    /// The status the terminal event carries when the call fails with this error.
    pub fn to_status(&self) -> Status {
        let code = match self {
            Error::Connection(_) => Code::Unavailable,
            Error::Config(_) | Error::Encode(_) => Code::InvalidArgument,
            _ => Code::Internal,
        };
        Status::new(code, self.to_string())
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::ProtocolViolation(e.to_string())
    }
}
