//! Minimal HTTP/1.1 core: request/response value types, exact-match
//! routing with fault containment, per-connection framing, and the
//! thread-per-connection server.
//!
//! Deliberately not a general-purpose web server: no TLS, no chunked
//! transfer-encoding, no keep-alive pipelining. One trusted local client.

mod connection;
pub mod request;
pub mod response;
pub mod router;
pub mod server;

pub use request::{Method, Request, RequestError};
pub use response::Response;
pub use router::Router;
pub use server::{HttpServer, ServerError};
