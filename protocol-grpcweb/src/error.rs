//! Error types for gRPC-Web frame and header block parsing.

/// Error type for gRPC-Web parsing operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Need more data to complete the frame.
    /// This is not a fatal error - the caller should buffer more data and retry.
    #[error("incomplete frame")]
    Incomplete,

    /// The frame flag byte is neither a data nor a trailer flag.
    #[error("malformed frame: unrecognized flag {0:#04x}")]
    MalformedFrame(u8),

    /// Declared frame length exceeds the configured limit.
    #[error("frame too large: {len} bytes exceeds {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    /// Header block is not valid UTF-8.
    #[error("header block is not valid utf-8")]
    InvalidUtf8,

    /// A header line has no `:` separator or an empty name.
    #[error("invalid header line: {0:?}")]
    InvalidHeader(String),

    /// A header name is empty or contains `:`, whitespace or control bytes.
    #[error("invalid header name: {0:?}")]
    InvalidHeaderName(String),

    /// A header value contains a line break. Carries the header name.
    #[error("invalid value for header {0:?}: contains a line break")]
    InvalidHeaderValue(String),
}

impl ParseError {
    /// Returns true if this error indicates more data is needed.
    #[inline]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ParseError::Incomplete)
    }
}
