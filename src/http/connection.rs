//! Per-connection unit of work: receive and frame one request, dispatch it,
//! write the response back, close. Connections are never reused.

use super::request::{find_header_end, Request};
use super::response::Response;
use super::router::Router;
use crate::weak_error;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const READ_CHUNK_SIZE: usize = 4096;
/// Hard cap on one request, headers and body included.
const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Serve a single accepted connection to completion. I/O failures are
/// terminal for this connection only and are logged, never propagated.
pub(crate) fn handle(stream: TcpStream, router: &Router) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());
    if let Err(err) = serve(stream, router) {
        log::debug!(target: "server", "connection {peer} closed with error: {err}");
    }
}

fn serve(mut stream: TcpStream, router: &Router) -> std::io::Result<()> {
    // The stream may inherit non-blocking mode from the listener.
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(RECV_TIMEOUT))?;
    stream.set_write_timeout(Some(SEND_TIMEOUT))?;
    stream.set_nodelay(true)?;
    weak_error!(nix::sys::socket::setsockopt(
        &stream,
        nix::sys::socket::sockopt::KeepAlive,
        &true
    ));

    let raw = read_request_bytes(&mut stream)?;

    let response = match Request::parse(&raw) {
        Ok(request) => router.dispatch(&request),
        Err(err) => Response::bad_request(err.to_string()),
    };

    stream.write_all(&response.serialize())?;
    stream.shutdown(Shutdown::Write)
}

/// Accumulate bytes until a full HTTP message is framed: header terminator
/// seen and `Content-Length` body bytes received (0 when absent or
/// unparsable). Stops early when the peer closes or the size cap is hit.
/// Tolerates the terminator and the body arriving split across reads.
fn read_request_bytes(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut raw: Vec<u8> = Vec::with_capacity(READ_CHUNK_SIZE);
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    let mut content_length: Option<usize> = None;

    loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                // A timeout with a framed request already buffered is not
                // an error worth dropping the request for.
                if raw.is_empty() {
                    return Err(err);
                }
                break;
            }
        };
        raw.extend_from_slice(&chunk[..n]);

        if let Some(header_end) = find_header_end(&raw) {
            let expected = *content_length.get_or_insert_with(|| parse_content_length(&raw[..header_end]));
            if raw.len() - (header_end + 4) >= expected {
                break;
            }
        }

        if raw.len() > MAX_REQUEST_SIZE {
            break;
        }
    }

    Ok(raw)
}

/// `Content-Length` from a raw header block, case-insensitive, 0 when the
/// header is absent or its value does not parse.
fn parse_content_length(head: &[u8]) -> usize {
    let Ok(head) = std::str::from_utf8(head) else {
        return 0;
    };
    head.split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}
