//! Pass-through observers of a call's lifecycle.
//!
//! An observer sees the call's properties when it starts, every event
//! delivered to the application (in delivery order, just before the
//! application receives it) and the client's half-close. It only gets
//! shared references and cannot alter or suppress anything.

use protocol_grpcweb::{Metadata, Status};
use tracing::{debug, trace};

use crate::call::CallProperties;

/// Observes one call.
pub trait CallObserver<M> {
    /// The call is starting with these properties.
    fn on_start(&mut self, _props: &CallProperties) {}

    fn on_headers(&mut self, _headers: &Metadata) {}

    fn on_message(&mut self, _message: &M) {}

    /// The client half-closed. Fires at most once per call.
    fn on_finish_send(&mut self) {}

    fn on_end(&mut self, _status: &Status, _trailers: &Metadata) {}
}

/// Observes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl<M> CallObserver<M> for NoopObserver {}

/// Logs every notification through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    path: String,
}

impl<M> CallObserver<M> for TracingObserver {
    fn on_start(&mut self, props: &CallProperties) {
        self.path = props.descriptor.path();
        debug!(path = %self.path, url = %props.url, "call start");
    }

    fn on_headers(&mut self, headers: &Metadata) {
        debug!(path = %self.path, count = headers.len(), "call headers");
    }

    fn on_message(&mut self, _message: &M) {
        trace!(path = %self.path, "call message");
    }

    fn on_finish_send(&mut self) {
        debug!(path = %self.path, "call finish send");
    }

    fn on_end(&mut self, status: &Status, trailers: &Metadata) {
        debug!(path = %self.path, %status, trailers = trailers.len(), "call end");
    }
}

/// Captures every notification for later inspection.
#[derive(Debug, Clone)]
pub struct RecordingObserver<M> {
    pub props: Option<CallProperties>,
    pub headers: Option<Metadata>,
    pub messages: Vec<M>,
    pub finish_sends: usize,
    pub end: Option<(Status, Metadata)>,
    /// Notification names in the order received.
    pub log: Vec<&'static str>,
}

impl<M> Default for RecordingObserver<M> {
    fn default() -> Self {
        Self {
            props: None,
            headers: None,
            messages: Vec::new(),
            finish_sends: 0,
            end: None,
            log: Vec::new(),
        }
    }
}

impl<M> RecordingObserver<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the client half-close was observed.
    pub fn finished_send(&self) -> bool {
        self.finish_sends > 0
    }
}

impl<M: Clone> CallObserver<M> for RecordingObserver<M> {
    fn on_start(&mut self, props: &CallProperties) {
        self.log.push("start");
        self.props = Some(props.clone());
    }

    fn on_headers(&mut self, headers: &Metadata) {
        self.log.push("headers");
        self.headers = Some(headers.clone());
    }

    fn on_message(&mut self, message: &M) {
        self.log.push("message");
        self.messages.push(message.clone());
    }

    fn on_finish_send(&mut self) {
        self.log.push("finish_send");
        self.finish_sends += 1;
    }

    fn on_end(&mut self, status: &Status, trailers: &Metadata) {
        self.log.push("end");
        self.end = Some((status.clone(), trailers.clone()));
    }
}
