//! Parsed HTTP request value type.
//!
//! A [`Request`] is constructed exactly once, by [`Request::parse`] over the
//! bytes accumulated by the connection handler, and is immutable afterwards.

use std::collections::HashMap;
use std::str::FromStr;

/// HTTP method token.
///
/// Covers the common verbs so a well-formed request with an unregistered
/// method dispatches to a 404 instead of failing to parse. The API itself
/// only registers `GET` and `POST`; `OPTIONS` is answered by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Options,
    Put,
    Delete,
    Head,
    Patch,
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("empty request")]
    Empty,
    #[error("malformed request line")]
    MalformedRequestLine,
    #[error("unknown method `{0}`")]
    UnknownMethod(String),
    #[error("malformed headers")]
    MalformedHeaders,
    #[error("request is not valid utf-8 up to the body")]
    NotUtf8,
}

#[derive(Debug)]
pub struct Request {
    pub method: Method,
    /// Path component only, query string stripped.
    pub path: String,
    /// Raw query string (without the leading `?`), empty if absent.
    pub query_string: String,
    /// Decoded query parameters. Duplicate keys: last occurrence wins.
    pub query: HashMap<String, String>,
    /// Header map with lowercased keys.
    pub headers: HashMap<String, String>,
    /// Raw body bytes, exactly as received after the header terminator.
    pub body: Vec<u8>,
}

impl Request {
    /// Parse a complete raw HTTP message (request line, headers, body).
    pub fn parse(raw: &[u8]) -> Result<Self, RequestError> {
        if raw.is_empty() {
            return Err(RequestError::Empty);
        }

        let header_end = find_header_end(raw).ok_or(RequestError::MalformedHeaders)?;
        let head = std::str::from_utf8(&raw[..header_end]).map_err(|_| RequestError::NotUtf8)?;
        let body = raw[header_end + 4..].to_vec();

        let mut lines = head.split("\r\n");
        let request_line = lines.next().ok_or(RequestError::MalformedRequestLine)?;

        let mut parts = request_line.split(' ');
        let method_tok = parts.next().ok_or(RequestError::MalformedRequestLine)?;
        let target = parts.next().ok_or(RequestError::MalformedRequestLine)?;
        if method_tok.is_empty() || target.is_empty() {
            return Err(RequestError::MalformedRequestLine);
        }
        let method = Method::from_str(method_tok)
            .map_err(|_| RequestError::UnknownMethod(method_tok.to_string()))?;

        let (path, query_string) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), query.to_string()),
            None => (target.to_string(), String::new()),
        };
        let query = parse_query_string(&query_string);

        let mut headers = HashMap::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            headers.insert(key.to_ascii_lowercase(), value.trim_start().to_string());
        }

        Ok(Request {
            method,
            path,
            query_string,
            query,
            headers,
            body,
        })
    }

    /// Query parameter by key, or `default` when absent.
    pub fn get_query<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.query.get(key).map(String::as_str).unwrap_or(default)
    }

    /// Header value by lowercased key, or `default` when absent.
    pub fn get_header<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.headers.get(key).map(String::as_str).unwrap_or(default)
    }
}

/// Position of the `\r\n\r\n` header terminator, if present.
pub(crate) fn find_header_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parse an `&`-separated query string into a map. Duplicate keys keep the
/// last occurrence; a key without `=` maps to the empty value.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    if query.is_empty() {
        return out;
    }
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some((key, value)) => out.insert(url_decode(key), url_decode(value)),
            None => out.insert(url_decode(pair), String::new()),
        };
    }
    out
}

/// Percent-decode a query component. `+` becomes a space; a malformed
/// `%XX` escape is passed through literally.
fn url_decode(encoded: &str) -> String {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match decoded {
                    Some(b) => {
                        out.push(b);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_simple_get() {
        let raw = b"GET /api/health HTTP/1.1\r\nHost: x\r\n\r\n";
        let req = Request::parse(raw).unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path, "/api/health");
        assert_eq!(req.query_string, "");
        assert!(req.query.is_empty());
        assert_eq!(req.get_header("host", ""), "x");
        assert!(req.body.is_empty());
    }

    #[test]
    fn test_parse_query_decoding() {
        let raw =
            b"GET /api/memory/read?address=0x401000&size=64&expr=a%2Bb+c&flag HTTP/1.1\r\n\r\n";
        let req = Request::parse(raw).unwrap();
        assert_eq!(req.path, "/api/memory/read");
        assert_eq!(req.get_query("address", ""), "0x401000");
        assert_eq!(req.get_query("size", ""), "64");
        assert_eq!(req.get_query("expr", ""), "a+b c");
        assert_eq!(req.get_query("flag", "-"), "");
        assert_eq!(req.get_query("missing", "default"), "default");
    }

    #[test]
    fn test_duplicate_query_key_last_wins() {
        let raw = b"GET /x?k=1&k=2 HTTP/1.1\r\n\r\n";
        let req = Request::parse(raw).unwrap();
        assert_eq!(req.get_query("k", ""), "2");
    }

    #[test]
    fn test_header_keys_lowercased_values_trimmed() {
        let raw = b"POST /x HTTP/1.1\r\nContent-Type:  application/json\r\nX-CUSTOM: Value\r\n\r\n";
        let req = Request::parse(raw).unwrap();
        assert_eq!(req.get_header("content-type", ""), "application/json");
        assert_eq!(req.get_header("x-custom", ""), "Value");
    }

    #[test]
    fn test_body_bytes_exact() {
        let mut raw = b"POST /x HTTP/1.1\r\nContent-Length: 4\r\n\r\n".to_vec();
        raw.extend_from_slice(&[0x00, 0xff, b'a', b'b']);
        let req = Request::parse(&raw).unwrap();
        assert_eq!(req.body, vec![0x00, 0xff, b'a', b'b']);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Request::parse(b""), Err(RequestError::Empty)));
        assert!(matches!(
            Request::parse(b"GET /x HTTP/1.1\r\nHost: x"),
            Err(RequestError::MalformedHeaders)
        ));
        assert!(matches!(
            Request::parse(b"BOGUS /x HTTP/1.1\r\n\r\n"),
            Err(RequestError::UnknownMethod(_))
        ));
        assert!(matches!(
            Request::parse(b"GET\r\n\r\n"),
            Err(RequestError::MalformedRequestLine)
        ));
    }

    #[test]
    fn test_method_tokens() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::from_str("OPTIONS").unwrap(), Method::Options);
        assert!(Method::from_str("get").is_err());
    }
}
