//! gRPC-Web client calls over a single WebSocket.
//!
//! Each call owns one socket. The client sends a header block, then
//! length-prefixed message frames, then an empty data frame to half-close.
//! The server replies with a header block, data frames and a trailer frame
//! carrying `grpc-status`. Server streaming and client streaming work in
//! both directions over the same connection.
//!
//! # Architecture
//!
//! ```text
//!   application
//!        |  start / send / finish_send / cancel      poll_event -> CallEvent
//!   +----v--------------------------------------------------+
//!   | Call            lifecycle state machine + observer    |
//!   +----+--------------------------------------------------+
//!        |  protocol-grpcweb: header blocks, frames
//!   +----v-----------+
//!   | Socket         |  WsSocket (tungstenite) or MemSocket
//!   +----------------+
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use ringline_grpcweb::{BytesCodec, Call, CallEvent, Config, MethodDescriptor, MethodKind};
//!
//! let config = Config::new("http://localhost:8080");
//! let descriptor = MethodDescriptor::new("my.Service", "Chat", MethodKind::BidiStreaming);
//! let mut call = Call::websocket(&config, descriptor, BytesCodec)?;
//!
//! call.start()?;
//! call.send(&b"hello".to_vec())?;
//! call.finish_send()?;
//!
//! // `None` only means nothing arrived within the read timeout; `End` is
//! // always the last event.
//! loop {
//!     match call.poll_event() {
//!         Some(CallEvent::Headers(headers)) => println!("headers: {}", headers.len()),
//!         Some(CallEvent::Message(bytes)) => println!("message: {} bytes", bytes.len()),
//!         Some(CallEvent::End { status, .. }) => {
//!             println!("done: {status}");
//!             break;
//!         }
//!         None => {}
//!     }
//! }
//! # Ok::<(), ringline_grpcweb::Error>(())
//! ```

pub mod call;
pub mod codec;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod observer;
pub mod socket;
pub mod stream;

pub use call::{CONTENT_TYPE, Call, CallEvent, CallProperties};
pub use codec::{BytesCodec, DecodeError, MessageCodec};
pub use config::{Config, TlsClientConfig};
pub use descriptor::{MethodDescriptor, MethodKind};
pub use error::{Error, Result};
pub use observer::{CallObserver, NoopObserver, RecordingObserver, TracingObserver};
pub use protocol_grpcweb::{Code, Metadata, Status};
pub use socket::{MemSocket, Socket, SocketEvent, WsSocket};
pub use stream::{RecvState, SendState};
