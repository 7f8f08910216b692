//! HTTP response value type and the JSON envelope convention.
//!
//! Every body produced here is one of two shapes:
//! `{"success": true, "data": <payload>}` for 2xx, or
//! `{"success": false, "error": {"code": <status>, "message": <text>}}`
//! for everything else. Handlers never build envelopes by hand.

use serde_json::{json, Value};

#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl Response {
    /// 200 with the success envelope around `data`.
    pub fn ok(data: Value) -> Self {
        let envelope = json!({ "success": true, "data": data });
        Response {
            status: 200,
            content_type: "application/json".to_string(),
            body: envelope.to_string(),
        }
    }

    /// Bare bodiless 200, used only for the CORS preflight.
    pub fn preflight() -> Self {
        Response {
            status: 200,
            content_type: "application/json".to_string(),
            body: String::new(),
        }
    }

    /// Error envelope with `code` mirroring the HTTP status.
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        let envelope = json!({
            "success": false,
            "error": { "code": code, "message": message.into() },
        });
        Response {
            status: code,
            content_type: "application/json".to_string(),
            body: envelope.to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::error(400, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::error(404, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::error(409, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::error(500, message)
    }

    /// Render the wire form: status line, fixed header set (content type,
    /// length, close, permissive CORS), blank line, body.
    pub fn serialize(&self) -> Vec<u8> {
        let head = format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
             Access-Control-Allow-Headers: Content-Type\r\n\
             \r\n",
            self.status,
            status_text(self.status),
            self.content_type,
            self.body.len(),
        );
        let mut out = head.into_bytes();
        out.extend_from_slice(self.body.as_bytes());
        out
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
