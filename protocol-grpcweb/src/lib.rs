//! gRPC-Web wire codecs for message-oriented transports.
//!
//! This crate has no I/O. It provides the two encodings a gRPC-Web stream
//! carried over a WebSocket is made of:
//!
//! - **Frames**: 1 byte flag + 4 byte big-endian length + payload. Flag
//!   `0x00` is a data frame (one serialized message), flag `0x80` the trailer
//!   frame. [`FrameDecoder`] reassembles frames split across, or coalesced
//!   within, socket messages.
//! - **Header blocks**: `name: value\r\n` lines carrying request headers,
//!   response headers and trailers. Trailer parsing lifts the reserved
//!   `grpc-status` / `grpc-message` entries into a [`Status`].
//!
//! # Example
//!
//! ```
//! use protocol_grpcweb::{Code, Frame, FrameDecoder, Metadata, headers};
//!
//! // Server side: a message followed by an OK trailer.
//! let mut wire = Vec::new();
//! Frame::Data(b"pong".to_vec()).encode(&mut wire).unwrap();
//! Frame::Trailer(Metadata::new().with("grpc-status", "0"))
//!     .encode(&mut wire)
//!     .unwrap();
//!
//! // Client side: feed bytes, drain frames.
//! let mut decoder = FrameDecoder::new();
//! decoder.push(&wire);
//! assert_eq!(decoder.try_decode().unwrap(), Some(Frame::Data(b"pong".to_vec())));
//! match decoder.try_decode().unwrap() {
//!     Some(Frame::Trailer(trailers)) => {
//!         let (status, rest) = headers::split_status(trailers);
//!         assert_eq!(status.code(), Code::Ok);
//!         assert!(rest.is_empty());
//!     }
//!     other => panic!("expected trailer, got {other:?}"),
//! }
//! ```

mod error;
pub mod frame;
pub mod headers;
mod metadata;
mod status;

pub use error::ParseError;
pub use frame::{
    DATA_FLAG, DEFAULT_MAX_FRAME_LEN, EMPTY_DATA_FRAME, FRAME_HEADER_LEN, Frame, FrameDecoder,
    TRAILER_FLAG,
};
pub use headers::{GRPC_MESSAGE, GRPC_STATUS};
pub use metadata::Metadata;
pub use status::{Code, Status, percent_decode, percent_encode};
