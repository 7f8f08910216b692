//! Shared harness for the integration tests: a server-over-mock-bridge
//! fixture and a raw-TCP HTTP client that keeps full control over how the
//! request bytes hit the wire.

use anyhow::{anyhow, Context};
use debugport::api;
use debugport::bridge::mock::MockBridge;
use debugport::bridge::SharedBridge;
use debugport::http::{HttpServer, Router};
use serde_json::Value;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestServer {
    server: HttpServer,
    pub addr: SocketAddr,
    pub bridge: Arc<MockBridge>,
}

impl TestServer {
    /// Start a server over a fresh mock bridge on an ephemeral port.
    pub fn start() -> anyhow::Result<Self> {
        Self::start_with(Arc::new(MockBridge::new()))
    }

    pub fn start_with(bridge: Arc<MockBridge>) -> anyhow::Result<Self> {
        let shared: SharedBridge = bridge.clone();
        let mut router = Router::new();
        api::register_all(&mut router, &shared);

        let mut server = HttpServer::new();
        server
            .start("127.0.0.1", 0, Arc::new(router))
            .context("start test server")?;
        let addr = server.local_addr().ok_or_else(|| anyhow!("no local addr"))?;

        Ok(TestServer {
            server,
            addr,
            bridge,
        })
    }

    pub fn stop(&mut self) {
        self.server.stop();
    }
}

#[derive(Debug)]
pub struct HttpReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpReply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> anyhow::Result<Value> {
        serde_json::from_str(&self.body).context("response body is not json")
    }

    /// The `data` payload of a success envelope.
    pub fn data(&self) -> anyhow::Result<Value> {
        let body = self.json()?;
        if body["success"] != Value::Bool(true) {
            return Err(anyhow!("not a success envelope: {body}"));
        }
        Ok(body["data"].clone())
    }
}

/// Send pre-built request bytes, optionally dribbled in `chunks` with small
/// pauses between them, and read the full reply.
pub fn send_raw(addr: SocketAddr, chunks: &[&[u8]]) -> anyhow::Result<HttpReply> {
    let mut stream = TcpStream::connect(addr).context("connect")?;
    stream.set_read_timeout(Some(CLIENT_TIMEOUT))?;
    stream.set_write_timeout(Some(CLIENT_TIMEOUT))?;

    for (i, chunk) in chunks.iter().enumerate() {
        stream.write_all(chunk)?;
        stream.flush()?;
        if i + 1 < chunks.len() {
            std::thread::sleep(Duration::from_millis(30));
        }
    }
    stream.shutdown(Shutdown::Write).ok();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).context("read reply")?;
    parse_reply(&raw)
}

pub fn get(addr: SocketAddr, path: &str) -> anyhow::Result<HttpReply> {
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    send_raw(addr, &[request.as_bytes()])
}

pub fn post(addr: SocketAddr, path: &str, body: &str) -> anyhow::Result<HttpReply> {
    let request = format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len(),
    );
    send_raw(addr, &[request.as_bytes()])
}

pub fn options(addr: SocketAddr, path: &str) -> anyhow::Result<HttpReply> {
    let request = format!("OPTIONS {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    send_raw(addr, &[request.as_bytes()])
}

fn parse_reply(raw: &[u8]) -> anyhow::Result<HttpReply> {
    let text = std::str::from_utf8(raw).context("reply is not utf-8")?;
    let (head, body) = text
        .split_once("\r\n\r\n")
        .ok_or_else(|| anyhow!("no header terminator in reply"))?;

    let mut lines = head.split("\r\n");
    let status_line = lines.next().ok_or_else(|| anyhow!("empty reply"))?;
    let status: u16 = status_line
        .split(' ')
        .nth(1)
        .ok_or_else(|| anyhow!("malformed status line: {status_line}"))?
        .parse()
        .context("parse status code")?;

    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.to_string(), value.trim().to_string()))
        .collect();

    Ok(HttpReply {
        status,
        headers,
        body: body.to_string(),
    })
}
