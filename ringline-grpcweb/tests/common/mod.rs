//! Mock gRPC-Web WebSocket server and test message codec.
//!
//! The server speaks just enough of the protocol to drive the client:
//! it reads the request header block, decodes request frames until the
//! half-close marker and answers per method.
//!
//! | path                        | behavior                                        |
//! |-----------------------------|-------------------------------------------------|
//! | `/test.TestService/Ping`     | echo the single request                          |
//! | `/test.TestService/PingList` | three replies `value-0..2` for one request       |
//! | `/test.TestService/PingStream` | one reply joining all request values with `,` |
//! | `/test.TestService/PingPongBidi` | echo every request; `error_code` ends the call |
//! | `/test.TestService/PingAbort` | one reply, then drop the TCP connection         |

#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::{Duration, Instant};

use protocol_grpcweb::frame::{self, Frame};
use protocol_grpcweb::{Code, FrameDecoder, Metadata, Status, headers};
use ringline_grpcweb::{CallEvent, Config, DecodeError, MessageCodec, MethodDescriptor, MethodKind};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::HeaderValue;
use tungstenite::{Message, WebSocket};

pub const SERVICE: &str = "test.TestService";

// -- Test messages --

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PingRequest {
    pub value: String,
    pub send_headers: bool,
    pub send_trailers: bool,
    /// Ask the bidi handler to end the call with this status.
    pub error_code: Option<u32>,
}

impl PingRequest {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn with_flags(mut self, send_headers: bool, send_trailers: bool) -> Self {
        self.send_headers = send_headers;
        self.send_trailers = send_trailers;
        self
    }

    pub fn with_error_code(mut self, code: u32) -> Self {
        self.error_code = Some(code);
        self
    }

    fn encode(&self) -> Vec<u8> {
        let code = self.error_code.map(|c| c.to_string()).unwrap_or_default();
        format!(
            "{}\n{}\n{}\n{}",
            self.value, self.send_headers as u8, self.send_trailers as u8, code
        )
        .into_bytes()
    }

    fn decode(payload: &[u8]) -> Self {
        let text = std::str::from_utf8(payload).unwrap();
        let mut parts = text.splitn(4, '\n');
        let value = parts.next().unwrap().to_string();
        let send_headers = parts.next() == Some("1");
        let send_trailers = parts.next() == Some("1");
        let error_code = parts.next().and_then(|c| c.parse().ok());
        Self {
            value,
            send_headers,
            send_trailers,
            error_code,
        }
    }
}

/// Requests are `PingRequest`s, responses plain UTF-8 strings.
pub struct PingCodec;

impl MessageCodec for PingCodec {
    type Request = PingRequest;
    type Response = String;

    fn serialize(&self, request: &PingRequest) -> Vec<u8> {
        request.encode()
    }

    fn deserialize(&self, payload: &[u8]) -> Result<String, DecodeError> {
        String::from_utf8(payload.to_vec()).map_err(|e| DecodeError::new(e.to_string()))
    }
}

// -- Expected server metadata --

pub fn expected_headers() -> Metadata {
    Metadata::new()
        .with("HeaderTestKey1", "ServerValue1")
        .with("HeaderTestKey2", "ServerValue2")
}

pub fn expected_trailers() -> Metadata {
    Metadata::new()
        .with("TrailerTestKey1", "ServerValue1")
        .with("TrailerTestKey2", "ServerValue2")
}

// -- Server --

pub struct TestServer {
    pub addr: SocketAddr,
}

impl TestServer {
    pub fn start() -> Self {
        let port = free_port();
        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        let listener = TcpListener::bind(addr).unwrap();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                std::thread::spawn(move || serve(stream));
            }
        });
        wait_for_server(addr);
        Self { addr }
    }

    pub fn host(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> Config {
        Config::new(self.host())
            .with_connect_timeout(Duration::from_secs(2))
            .with_read_timeout(Duration::from_secs(5))
    }
}

pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn wait_for_server(addr: SocketAddr) {
    for _ in 0..200 {
        if TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("server did not start on {addr}");
}

struct Conn {
    ws: WebSocket<TcpStream>,
    decoder: FrameDecoder,
    /// Request headers from the client's first message.
    request_headers: Metadata,
    headers_sent: bool,
}

enum Inbound {
    Request(PingRequest),
    HalfClose,
    Gone,
}

impl Conn {
    fn recv(&mut self) -> Inbound {
        loop {
            match self.decoder.try_decode().unwrap() {
                Some(Frame::Data(payload)) if payload.is_empty() => return Inbound::HalfClose,
                Some(Frame::Data(payload)) => {
                    return Inbound::Request(PingRequest::decode(&payload));
                }
                Some(Frame::Trailer(_)) => panic!("client sent a trailer frame"),
                None => {}
            }
            match self.ws.read() {
                Ok(Message::Binary(data)) => self.decoder.push(&data),
                Ok(Message::Close(_)) | Err(_) => return Inbound::Gone,
                Ok(_) => {}
            }
        }
    }

    fn send_raw(&mut self, data: Vec<u8>) {
        self.ws.send(Message::Binary(data.into())).unwrap();
    }

    fn send_headers(&mut self, first: &PingRequest) {
        if self.headers_sent {
            return;
        }
        self.headers_sent = true;
        let mut md = if first.send_headers {
            expected_headers()
        } else {
            Metadata::new()
        };
        for value in self.request_headers.get("x-echo").to_vec() {
            md.append("x-echo", value);
        }
        let mut block = Vec::new();
        headers::encode(&md, &mut block).unwrap();
        self.send_raw(block);
    }

    fn send_message(&mut self, value: &str) {
        let mut buf = Vec::new();
        frame::encode_data(value.as_bytes(), &mut buf).unwrap();
        self.send_raw(buf);
    }

    fn finish(&mut self, status: Status, with_trailers: bool) {
        let extra = if with_trailers {
            expected_trailers()
        } else {
            Metadata::new()
        };
        let mut buf = Vec::new();
        frame::encode_trailer(&headers::status_trailers(&status, &extra), &mut buf).unwrap();
        self.send_raw(buf);
        let _ = self.ws.close(None);
        // Drain until the client's close reply completes the handshake.
        while self.ws.read().is_ok() {}
    }
}

fn serve(stream: TcpStream) {
    let mut path = String::new();
    let callback = |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
        path = req.uri().path().to_string();
        resp.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static("grpc-websockets"),
        );
        Ok(resp)
    };
    // Readiness checks connect without a handshake.
    let Ok(mut ws) = tungstenite::accept_hdr(stream, callback) else {
        return;
    };

    let request_headers = match ws.read() {
        Ok(Message::Binary(block)) => headers::parse(&block).unwrap(),
        _ => return,
    };
    assert_eq!(
        request_headers.get_first("content-type"),
        Some("application/grpc-web+proto")
    );

    let mut conn = Conn {
        ws,
        decoder: FrameDecoder::new(),
        request_headers,
        headers_sent: false,
    };

    match path.trim_start_matches(&format!("/{SERVICE}/")) {
        "Ping" => ping(&mut conn),
        "PingList" => ping_list(&mut conn),
        "PingStream" => ping_stream(&mut conn),
        "PingPongBidi" => ping_pong_bidi(&mut conn),
        "PingAbort" => ping_abort(conn),
        other => {
            let status = Status::new(Code::Unimplemented, format!("unknown method {other}"));
            conn.send_headers(&PingRequest::default());
            conn.finish(status, false);
        }
    }
}

fn ping(conn: &mut Conn) {
    let Inbound::Request(req) = conn.recv() else { return };
    conn.send_headers(&req);
    conn.send_message(&req.value);
    conn.finish(Status::ok(), req.send_trailers);
}

fn ping_list(conn: &mut Conn) {
    let Inbound::Request(req) = conn.recv() else { return };
    conn.send_headers(&req);
    for i in 0..3 {
        conn.send_message(&format!("{}-{i}", req.value));
    }
    conn.finish(Status::ok(), req.send_trailers);
}

fn ping_stream(conn: &mut Conn) {
    let mut requests = Vec::new();
    loop {
        match conn.recv() {
            Inbound::Request(req) => requests.push(req),
            Inbound::HalfClose => break,
            Inbound::Gone => return,
        }
    }
    let first = requests.first().cloned().unwrap_or_default();
    let joined = requests
        .iter()
        .map(|r| r.value.as_str())
        .collect::<Vec<_>>()
        .join(",");
    conn.send_headers(&first);
    conn.send_message(&joined);
    conn.finish(Status::ok(), first.send_trailers);
}

fn ping_pong_bidi(conn: &mut Conn) {
    let mut send_trailers = false;
    loop {
        match conn.recv() {
            Inbound::Request(req) => {
                conn.send_headers(&req);
                send_trailers = req.send_trailers;
                if let Some(code) = req.error_code {
                    let status = Status::new(Code::from_u32(code), "");
                    conn.finish(status, send_trailers);
                    return;
                }
                conn.send_message(&req.value);
            }
            Inbound::HalfClose => {
                conn.send_headers(&PingRequest::default());
                conn.finish(Status::ok(), send_trailers);
                return;
            }
            Inbound::Gone => return,
        }
    }
}

fn ping_abort(mut conn: Conn) {
    let Inbound::Request(req) = conn.recv() else { return };
    conn.send_headers(&req);
    conn.send_message(&req.value);
    // Drop the TCP connection without a close frame or trailer.
    drop(conn);
}

// -- Client helpers --

pub fn descriptor(method: &str, kind: MethodKind) -> MethodDescriptor {
    MethodDescriptor::new(SERVICE, method, kind)
}

/// Poll until the terminal event, failing the test after `timeout`.
pub fn next_event<S, C, O>(
    call: &mut ringline_grpcweb::Call<S, C, O>,
    timeout: Duration,
) -> CallEvent<C::Response>
where
    S: ringline_grpcweb::Socket,
    C: MessageCodec,
    O: ringline_grpcweb::CallObserver<C::Response>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(event) = call.poll_event() {
            return event;
        }
        assert!(!call.is_ended(), "call ended without a pending event");
        assert!(Instant::now() < deadline, "timed out waiting for call event");
    }
}

/// Collect events up to and including `End`.
pub fn run_to_end<S, C, O>(
    call: &mut ringline_grpcweb::Call<S, C, O>,
) -> Vec<CallEvent<C::Response>>
where
    S: ringline_grpcweb::Socket,
    C: MessageCodec,
    O: ringline_grpcweb::CallObserver<C::Response>,
{
    let mut events = Vec::new();
    loop {
        let event = next_event(call, Duration::from_secs(10));
        let done = matches!(event, CallEvent::End { .. });
        events.push(event);
        if done {
            return events;
        }
    }
}
