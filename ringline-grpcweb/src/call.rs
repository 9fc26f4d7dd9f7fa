//! gRPC-Web call state machine.
//!
//! `Call` drives one RPC over one [`Socket`]. Application actions
//! (`start`, `send`, `finish_send`, `cancel`) return immediately; the call's
//! lifecycle is read back with [`Call::poll_event`], which pulls socket
//! events on demand and translates them into [`CallEvent`]s.
//!
//! ```text
//!   recv:  AwaitingHeaders --header block--> Streaming --trailer--> Ended
//!             |                                 |
//!             +------ close / error / cancel ---+-------------------> Ended
//!
//!   send:  Open --finish_send--> HalfClosedLocal
//! ```
//!
//! Guarantees: `Headers` is delivered at most once and before any
//! `Message`; `End` is delivered exactly once and is always the last event.

use std::collections::VecDeque;

use protocol_grpcweb::frame::{
    self, DATA_FLAG, DEFAULT_MAX_FRAME_LEN, EMPTY_DATA_FRAME, FRAME_HEADER_LEN, TRAILER_FLAG,
};
use protocol_grpcweb::{Code, Frame, FrameDecoder, Metadata, Status, headers};
use tracing::{debug, trace, warn};

use crate::codec::MessageCodec;
use crate::config::Config;
use crate::descriptor::MethodDescriptor;
use crate::error::{Error, Result};
use crate::observer::{CallObserver, NoopObserver};
use crate::socket::{Socket, SocketEvent, WsSocket};
use crate::stream::{CallState, RecvState, SendState};

/// Content type sent with every call.
pub const CONTENT_TYPE: &str = "application/grpc-web+proto";

/// Invocation properties of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallProperties {
    pub descriptor: MethodDescriptor,
    /// Socket URL the call connects to.
    pub url: String,
    /// Request metadata sent in the header block.
    pub metadata: Metadata,
    /// Largest frame payload accepted from the server.
    pub max_frame_len: usize,
}

impl CallProperties {
    pub fn new(descriptor: MethodDescriptor, url: impl Into<String>) -> Self {
        Self {
            descriptor,
            url: url.into(),
            metadata: Metadata::new(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    pub fn with_metadata(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.metadata.append(name, value);
        self
    }

    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    /// The header block sent on connect: the call metadata plus the
    /// gRPC-Web defaults for any name it does not set.
    fn request_headers(&self) -> Metadata {
        let mut md = self.metadata.clone();
        md.merge_missing(
            &Metadata::new()
                .with("content-type", CONTENT_TYPE)
                .with("x-grpc-web", "1"),
        );
        md
    }
}

/// Lifecycle events delivered to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent<M> {
    /// Response headers from the server.
    Headers(Metadata),
    /// One response message.
    Message(M),
    /// The call is over.
    End { status: Status, trailers: Metadata },
}

/// One gRPC-Web call over a message-oriented socket.
pub struct Call<S, C: MessageCodec, O = NoopObserver> {
    props: CallProperties,
    socket: S,
    codec: C,
    observer: O,
    state: CallState,
    decoder: FrameDecoder,
    /// Socket messages written before the socket connected: the header
    /// block, then any frames. Flushed in order on connect.
    pending: Vec<Vec<u8>>,
    events: VecDeque<CallEvent<C::Response>>,
}

impl<S: Socket, C: MessageCodec> Call<S, C> {
    pub fn new(props: CallProperties, socket: S, codec: C) -> Self {
        Self {
            decoder: FrameDecoder::with_max_len(props.max_frame_len),
            props,
            socket,
            codec,
            observer: NoopObserver,
            state: CallState::new(),
            pending: Vec::new(),
            events: VecDeque::new(),
        }
    }
}

impl<C: MessageCodec> Call<WsSocket, C> {
    /// Build a call to `descriptor` on `config.host` over a WebSocket.
    pub fn websocket(config: &Config, descriptor: MethodDescriptor, codec: C) -> Result<Self> {
        let url = descriptor.url(&config.host)?;
        let mut props =
            CallProperties::new(descriptor, url).with_max_frame_len(config.max_frame_len);
        props.metadata = config.metadata.clone();
        Ok(Call::new(props, WsSocket::from_config(config), codec))
    }
}

impl<S, C: MessageCodec, O> Call<S, C, O> {
    /// Attach an observer. Call before `start` to see every notification.
    pub fn with_observer<O2: CallObserver<C::Response>>(self, observer: O2) -> Call<S, C, O2> {
        Call {
            props: self.props,
            socket: self.socket,
            codec: self.codec,
            observer,
            state: self.state,
            decoder: self.decoder,
            pending: self.pending,
            events: self.events,
        }
    }

    pub fn properties(&self) -> &CallProperties {
        &self.props
    }

    /// Mutable access to the request metadata. Only meaningful before `start`.
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.props.metadata
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    pub fn socket_mut(&mut self) -> &mut S {
        &mut self.socket
    }

    pub fn send_state(&self) -> SendState {
        self.state.send
    }

    pub fn recv_state(&self) -> RecvState {
        self.state.recv
    }

    /// Whether the call reached `Ended`. Its `End` event may still be queued.
    pub fn is_ended(&self) -> bool {
        self.state.is_ended()
    }
}

impl<S, C, O> Call<S, C, O>
where
    S: Socket,
    C: MessageCodec,
    O: CallObserver<C::Response>,
{
    /// Open the socket. The header block is sent once it connects.
    ///
    /// Request metadata that cannot be written as a header block fails with
    /// [`Error::Encode`] and leaves the call unstarted.
    pub fn start(&mut self) -> Result<()> {
        if self.state.started {
            return Err(Error::AlreadyStarted);
        }
        let mut block = Vec::new();
        headers::encode(&self.props.request_headers(), &mut block).map_err(Error::Encode)?;
        self.pending.push(block);

        self.state.started = true;
        self.observer.on_start(&self.props);
        debug!(path = %self.props.descriptor.path(), url = %self.props.url, "call start");
        self.socket.open(&self.props.url);
        Ok(())
    }

    /// Send one request message.
    ///
    /// Unary and server-streaming calls half-close right after it.
    pub fn send(&mut self, message: &C::Request) -> Result<()> {
        if !self.state.started {
            return Err(Error::NotStarted);
        }
        if self.state.send == SendState::HalfClosedLocal {
            return Err(Error::StreamClosedForSending);
        }
        if self.state.is_ended() {
            return Err(Error::CallEnded);
        }

        let payload = self.codec.serialize(message);
        let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame::encode_data(&payload, &mut buf).map_err(Error::Encode)?;
        trace!(len = payload.len(), "call send");
        self.write(buf);

        if !self.props.descriptor.kind.client_streams() {
            self.finish_send()?;
        }
        Ok(())
    }

    /// Signal that no more messages follow. Repeated calls are no-ops.
    pub fn finish_send(&mut self) -> Result<()> {
        if !self.state.started {
            return Err(Error::NotStarted);
        }
        if self.state.send == SendState::HalfClosedLocal || self.state.is_ended() {
            return Ok(());
        }

        self.state.send = SendState::HalfClosedLocal;
        debug!(path = %self.props.descriptor.path(), "call half-closed");
        self.observer.on_finish_send();

        self.write(EMPTY_DATA_FRAME.to_vec());
        Ok(())
    }

    /// Abort the call. A no-op before `start`.
    ///
    /// Events already queued are still delivered, followed by a `CANCELLED`
    /// end unless the call had already ended.
    pub fn cancel(&mut self) {
        if !self.state.started {
            return;
        }
        if !self.state.end_fired {
            debug!(path = %self.props.descriptor.path(), "call cancelled");
        }
        self.socket.close();
        self.end(Status::new(Code::Cancelled, "cancelled by client"), Metadata::new());
    }

    /// Next lifecycle event, or `None` if none is available yet (or the call
    /// is over and drained).
    pub fn poll_event(&mut self) -> Option<CallEvent<C::Response>> {
        loop {
            if let Some(event) = self.events.pop_front() {
                self.observe(&event);
                return Some(event);
            }
            if !self.state.started || self.state.is_ended() {
                return None;
            }
            let socket_event = self.socket.poll_event()?;
            self.on_socket_event(socket_event);
        }
    }

    fn observe(&mut self, event: &CallEvent<C::Response>) {
        match event {
            CallEvent::Headers(md) => self.observer.on_headers(md),
            CallEvent::Message(msg) => self.observer.on_message(msg),
            CallEvent::End { status, trailers } => self.observer.on_end(status, trailers),
        }
    }

    fn write(&mut self, buf: Vec<u8>) {
        if !self.state.connected {
            self.pending.push(buf);
            return;
        }
        if let Err(e) = self.socket.send_binary(buf) {
            self.fail(Error::Transport(e.to_string()));
        }
    }

    fn on_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Connect => self.on_connect(),
            SocketEvent::Message(data) => self.on_data(data),
            SocketEvent::Error(msg) => {
                if self.state.connected {
                    self.fail(Error::Transport(msg));
                } else {
                    self.fail(Error::Connection(msg));
                }
            }
            SocketEvent::Close { code, was_clean } => {
                if self.state.connected {
                    self.fail(Error::AbnormalClosure { code, was_clean });
                } else {
                    self.fail(Error::Connection(format!(
                        "socket closed before connecting (code {code})"
                    )));
                }
            }
        }
    }

    fn on_connect(&mut self) {
        if self.state.connected {
            return;
        }
        self.state.connected = true;
        debug!(url = %self.props.url, queued = self.pending.len(), "call connected");

        for buf in std::mem::take(&mut self.pending) {
            if let Err(e) = self.socket.send_binary(buf) {
                self.fail(Error::Transport(e.to_string()));
                return;
            }
        }
    }

    fn on_data(&mut self, data: Vec<u8>) {
        match self.state.recv {
            RecvState::AwaitingHeaders => {
                if matches!(data.first(), Some(&DATA_FLAG) | Some(&TRAILER_FLAG)) {
                    self.fail(Error::ProtocolViolation(
                        "frame received before response headers".into(),
                    ));
                    return;
                }
                match headers::parse(&data) {
                    Ok(md) => {
                        trace!(count = md.len(), "call headers");
                        self.state.recv = RecvState::Streaming;
                        self.events.push_back(CallEvent::Headers(md));
                    }
                    Err(e) => self.fail(Error::ProtocolViolation(format!(
                        "invalid response headers: {e}"
                    ))),
                }
            }
            RecvState::Streaming => {
                // At a frame boundary, anything but a frame flag is a second header block.
                let frame_flag =
                    matches!(data.first(), None | Some(&DATA_FLAG) | Some(&TRAILER_FLAG));
                if self.decoder.is_empty() && !frame_flag {
                    self.fail(Error::ProtocolViolation(
                        "header block received after response headers".into(),
                    ));
                    return;
                }
                self.decoder.push(&data);
                self.drain_frames();
            }
            RecvState::Ended => {}
        }
    }

    fn drain_frames(&mut self) {
        loop {
            match self.decoder.try_decode() {
                Ok(Some(Frame::Data(payload))) => match self.codec.deserialize(&payload) {
                    Ok(msg) => {
                        trace!(len = payload.len(), "call message");
                        self.events.push_back(CallEvent::Message(msg));
                    }
                    Err(e) => {
                        self.fail(e.into());
                        return;
                    }
                },
                Ok(Some(Frame::Trailer(md))) => {
                    let (status, trailers) = headers::split_status(md);
                    self.socket.close();
                    self.end(status, trailers);
                    return;
                }
                Ok(None) => return,
                Err(e) => {
                    self.fail(e.into());
                    return;
                }
            }
        }
    }

    /// Synthesize the terminal event for a failed call.
    fn fail(&mut self, err: Error) {
        if self.state.end_fired {
            return;
        }
        warn!(path = %self.props.descriptor.path(), error = %err, "call failed");
        self.socket.close();
        self.end(err.to_status(), Metadata::new());
    }

    /// Move to `Ended` and queue the terminal event unless one was queued already.
    fn end(&mut self, status: Status, trailers: Metadata) {
        self.state.recv = RecvState::Ended;
        self.pending.clear();
        self.decoder.clear();
        if self.state.end_fired {
            return;
        }
        self.state.end_fired = true;
        debug!(path = %self.props.descriptor.path(), %status, "call end");
        self.events.push_back(CallEvent::End { status, trailers });
    }
}
