//! Static method descriptors and endpoint construction.

use crate::error::{Error, Result};

/// Streaming shape of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Unary,
    ClientStreaming,
    ServerStreaming,
    BidiStreaming,
}

impl MethodKind {
    /// Whether the client may send more than one message.
    pub fn client_streams(self) -> bool {
        matches!(self, MethodKind::ClientStreaming | MethodKind::BidiStreaming)
    }

    /// Whether the server may reply with more than one message.
    pub fn server_streams(self) -> bool {
        matches!(self, MethodKind::ServerStreaming | MethodKind::BidiStreaming)
    }
}

/// Identifies the method a call invokes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub service: String,
    pub method: String,
    pub kind: MethodKind,
}

impl MethodDescriptor {
    pub fn new(service: impl Into<String>, method: impl Into<String>, kind: MethodKind) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            kind,
        }
    }

    /// Request path, `/{service}/{method}`.
    pub fn path(&self) -> String {
        format!("/{}/{}", self.service, self.method)
    }

    /// WebSocket URL for this method on `host`.
    ///
    /// `http` and `https` hosts are rewritten to `ws` and `wss`; `ws` and
    /// `wss` hosts are used as-is. A host without a scheme is rejected.
    pub fn url(&self, host: &str) -> Result<String> {
        let host = host.trim_end_matches('/');
        let (scheme, rest) = host
            .split_once("://")
            .ok_or_else(|| Error::Config(format!("host has no scheme: {host}")))?;
        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(Error::Config(format!("unsupported scheme: {other}"))),
        };
        if rest.is_empty() {
            return Err(Error::Config(format!("host has no authority: {host}")));
        }
        Ok(format!("{scheme}://{rest}{}", self.path()))
    }
}
