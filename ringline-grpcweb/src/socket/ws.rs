//! Blocking WebSocket adapter built on `tungstenite`.
//!
//! `open` only records the target; the TCP connect and WebSocket handshake
//! run on the next [`poll_event`](Socket::poll_event), so a failure surfaces
//! as an `Error` event like any other socket outcome. After connecting, each
//! poll blocks on one read, bounded by the configured read timeout.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, trace};
use tungstenite::client::IntoClientRequest;
use tungstenite::error::ProtocolError;
use tungstenite::http::HeaderValue;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Connector, HandshakeError, Message, WebSocket};

use super::{CLOSE_ABNORMAL, CLOSE_NO_STATUS, Socket, SocketEvent};
use crate::config::{Config, TlsClientConfig};
use crate::error::{Error, Result};

/// WebSocket sub-protocol spoken by gRPC-Web servers.
pub const SUBPROTOCOL: &str = "grpc-websockets";

type Ws = WebSocket<MaybeTlsStream<TcpStream>>;

enum WsState {
    Idle,
    Opening(String),
    Open(Box<Ws>),
    /// Failed after connecting: emit the pending error (if any), then the
    /// implied close.
    Failed(Option<String>),
    Closed,
}

/// A [`Socket`] over a blocking `tungstenite` client connection.
pub struct WsSocket {
    state: WsState,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    tls: Option<TlsClientConfig>,
}

impl Default for WsSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl WsSocket {
    pub fn new() -> Self {
        Self {
            state: WsState::Idle,
            connect_timeout: None,
            read_timeout: None,
            tls: None,
        }
    }

    /// Create a socket using the timeouts and TLS settings from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            state: WsState::Idle,
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
            tls: config.tls.clone(),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, WsState::Open(_))
    }

    fn connect(&self, url: &str) -> Result<Ws> {
        let mut request = url
            .into_client_request()
            .map_err(|e| Error::Connection(format!("invalid url {url}: {e}")))?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(SUBPROTOCOL),
        );

        let uri = request.uri();
        let host = uri
            .host()
            .ok_or_else(|| Error::Connection(format!("url has no host: {url}")))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = uri
            .port_u16()
            .unwrap_or(if uri.scheme_str() == Some("wss") { 443 } else { 80 });

        let tcp = self.connect_tcp(&host, port)?;
        tcp.set_nodelay(true)?;
        tcp.set_read_timeout(self.read_timeout)?;

        let connector = self
            .tls
            .as_ref()
            .map(|tls| Connector::Rustls(tls.client_config.clone()));

        match tungstenite::client_tls_with_config(request, tcp, None, connector) {
            Ok((ws, _response)) => Ok(ws),
            Err(HandshakeError::Failure(e)) => Err(Error::Connection(e.to_string())),
            Err(HandshakeError::Interrupted(_)) => {
                Err(Error::Connection("handshake timed out".into()))
            }
        }
    }

    fn connect_tcp(&self, host: &str, port: u16) -> Result<TcpStream> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            let attempt = match self.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(tcp) => return Ok(tcp),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses resolved"))
            .into())
    }
}

impl Socket for WsSocket {
    fn open(&mut self, url: &str) {
        if let WsState::Idle = self.state {
            debug!(url = %url, "websocket opening");
            self.state = WsState::Opening(url.to_string());
        }
    }

    fn send_binary(&mut self, data: Vec<u8>) -> Result<()> {
        let WsState::Open(ws) = &mut self.state else {
            return Err(Error::NotConnected);
        };
        trace!(len = data.len(), "websocket send");
        if let Err(e) = ws.send(Message::Binary(data.into())) {
            // Reported through poll_event like every other socket outcome.
            self.state = WsState::Failed(Some(format!("websocket send: {e}")));
        }
        Ok(())
    }

    fn close(&mut self) {
        if let WsState::Open(mut ws) = std::mem::replace(&mut self.state, WsState::Closed) {
            debug!("websocket closing");
            let _ = ws.close(None);
            let _ = ws.flush();
        }
    }

    fn poll_event(&mut self) -> Option<SocketEvent> {
        match &mut self.state {
            WsState::Idle | WsState::Closed => None,
            WsState::Opening(url) => {
                let url = std::mem::take(url);
                match self.connect(&url) {
                    Ok(ws) => {
                        debug!(url = %url, "websocket connected");
                        self.state = WsState::Open(Box::new(ws));
                        Some(SocketEvent::Connect)
                    }
                    Err(e) => {
                        debug!(url = %url, error = %e, "websocket connect failed");
                        self.state = WsState::Closed;
                        Some(SocketEvent::Error(e.to_string()))
                    }
                }
            }
            WsState::Failed(pending) => match pending.take() {
                Some(msg) => Some(SocketEvent::Error(msg)),
                None => {
                    self.state = WsState::Closed;
                    Some(SocketEvent::Close {
                        code: CLOSE_ABNORMAL,
                        was_clean: false,
                    })
                }
            },
            WsState::Open(ws) => loop {
                match ws.read() {
                    Ok(Message::Binary(data)) => {
                        trace!(len = data.len(), "websocket recv");
                        return Some(SocketEvent::Message(data.to_vec()));
                    }
                    Ok(Message::Close(frame)) => {
                        let code = frame
                            .map(|f| u16::from(f.code))
                            .unwrap_or(CLOSE_NO_STATUS);
                        // Flush the automatic close reply before dropping.
                        let _ = ws.flush();
                        debug!(code, "websocket closed by peer");
                        self.state = WsState::Closed;
                        return Some(SocketEvent::Close {
                            code,
                            was_clean: true,
                        });
                    }
                    // Ping, pong and text messages carry no call data.
                    Ok(_) => continue,
                    Err(tungstenite::Error::Io(e))
                        if matches!(
                            e.kind(),
                            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                        ) =>
                    {
                        return None;
                    }
                    Err(tungstenite::Error::ConnectionClosed)
                    | Err(tungstenite::Error::AlreadyClosed) => {
                        self.state = WsState::Closed;
                        return Some(SocketEvent::Close {
                            code: CLOSE_NO_STATUS,
                            was_clean: true,
                        });
                    }
                    Err(tungstenite::Error::Protocol(
                        ProtocolError::ResetWithoutClosingHandshake,
                    )) => {
                        debug!("websocket dropped without close handshake");
                        self.state = WsState::Closed;
                        return Some(SocketEvent::Close {
                            code: CLOSE_ABNORMAL,
                            was_clean: false,
                        });
                    }
                    Err(e) => {
                        debug!(error = %e, "websocket read failed");
                        self.state = WsState::Failed(None);
                        return Some(SocketEvent::Error(e.to_string()));
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_socket_has_no_events() {
        let mut sock = WsSocket::new();
        assert_eq!(sock.poll_event(), None);
        assert!(matches!(
            sock.send_binary(b"x".to_vec()),
            Err(Error::NotConnected)
        ));
    }

    #[test]
    fn connect_failure_is_an_event() {
        // Bind then drop to get a port with nothing listening.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let mut sock = WsSocket::from_config(
            &Config::new("http://127.0.0.1").with_connect_timeout(Duration::from_secs(1)),
        );
        sock.open(&format!("ws://127.0.0.1:{port}/svc/Method"));
        match sock.poll_event() {
            Some(SocketEvent::Error(_)) => {}
            other => panic!("expected error event, got {other:?}"),
        }
        assert_eq!(sock.poll_event(), None);
        assert!(!sock.is_open());
    }

    #[test]
    fn invalid_url_is_an_event() {
        let mut sock = WsSocket::new();
        sock.open("not a url");
        assert!(matches!(sock.poll_event(), Some(SocketEvent::Error(_))));
    }

    #[test]
    fn close_before_connect() {
        let mut sock = WsSocket::new();
        sock.open("ws://127.0.0.1:1/svc/M");
        sock.close();
        sock.close();
        assert_eq!(sock.poll_event(), None);
    }
}
