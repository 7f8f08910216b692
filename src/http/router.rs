//! Method+path router with uniform fault containment.
//!
//! The route table is filled once at startup and read-only afterwards.
//! Lookup is an exact match on `(method, path)`; the table preserves
//! registration order and keeps the first handler registered for a key,
//! matching first-match semantics of a linear scan.

use super::request::{Method, Request};
use super::response::Response;
use std::panic::{self, AssertUnwindSafe};

use indexmap::map::Entry;
use indexmap::IndexMap;

/// A route handler. Returning `Err` is the handler fault channel: the
/// router renders it as a 500 and never propagates it further.
pub type Handler = Box<dyn Fn(&Request) -> anyhow::Result<Response> + Send + Sync>;

#[derive(Default)]
pub struct Router {
    routes: IndexMap<(Method, String), Handler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an exact `(method, path)` pair. A duplicate
    /// registration keeps the first handler.
    pub fn register<H>(&mut self, method: Method, path: &str, handler: H)
    where
        H: Fn(&Request) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        match self.routes.entry((method, path.to_string())) {
            Entry::Vacant(e) => {
                e.insert(Box::new(handler));
            }
            Entry::Occupied(_) => {
                log::warn!(target: "server", "duplicate route {method} {path} ignored");
            }
        }
    }

    pub fn get<H>(&mut self, path: &str, handler: H)
    where
        H: Fn(&Request) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        self.register(Method::Get, path, handler);
    }

    pub fn post<H>(&mut self, path: &str, handler: H)
    where
        H: Fn(&Request) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        self.register(Method::Post, path, handler);
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Dispatch a parsed request. `OPTIONS` is answered generically before
    /// the table is consulted (CORS preflight). A handler error or panic
    /// becomes a 500; an unmatched route a 404 naming method and path.
    pub fn dispatch(&self, request: &Request) -> Response {
        if request.method == Method::Options {
            return Response::preflight();
        }

        let key = (request.method, request.path.clone());
        let Some(handler) = self.routes.get(&key) else {
            return Response::not_found(format!(
                "No route for {} {}",
                request.method, request.path
            ));
        };

        match panic::catch_unwind(AssertUnwindSafe(|| handler(request))) {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => Response::internal_error(format!("Handler error: {err:#}")),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Response::internal_error(format!("Handler panicked: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::{json, Value};

    fn request(method: Method, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap()
    }

    fn body(resp: &Response) -> Value {
        serde_json::from_str(&resp.body).unwrap()
    }

    #[test]
    fn test_exact_match_dispatch() {
        let mut router = Router::new();
        router.get("/a", |_| Ok(Response::ok(json!("get-a"))));
        router.post("/a", |_| Ok(Response::ok(json!("post-a"))));
        router.get("/b", |_| Ok(Response::ok(json!("get-b"))));

        assert_eq!(body(&router.dispatch(&request(Method::Get, "/a")))["data"], json!("get-a"));
        assert_eq!(body(&router.dispatch(&request(Method::Post, "/a")))["data"], json!("post-a"));
        assert_eq!(body(&router.dispatch(&request(Method::Get, "/b")))["data"], json!("get-b"));
    }

    #[test]
    fn test_first_registration_wins() {
        let mut router = Router::new();
        router.get("/dup", |_| Ok(Response::ok(json!("first"))));
        router.get("/dup", |_| Ok(Response::ok(json!("second"))));
        assert_eq!(router.route_count(), 1);
        let resp = router.dispatch(&request(Method::Get, "/dup"));
        assert_eq!(body(&resp)["data"], json!("first"));
    }

    #[test]
    fn test_options_short_circuit() {
        let mut router = Router::new();
        router.get("/a", |_| Ok(Response::ok(json!(1))));

        for path in ["/a", "/never/registered"] {
            let resp = router.dispatch(&request(Method::Options, path));
            assert_eq!(resp.status, 200);
            assert!(resp.body.is_empty());
        }
    }

    #[test]
    fn test_unmatched_route_names_method_and_path() {
        let router = Router::new();
        let resp = router.dispatch(&request(Method::Post, "/api/unknown"));
        assert_eq!(resp.status, 404);
        let message = body(&resp)["error"]["message"].as_str().unwrap().to_string();
        assert!(message.contains("POST"));
        assert!(message.contains("/api/unknown"));
    }

    #[test]
    fn test_handler_error_contained_as_500() {
        let mut router = Router::new();
        router.get("/fail", |_| anyhow::bail!("engine exploded"));
        let resp = router.dispatch(&request(Method::Get, "/fail"));
        assert_eq!(resp.status, 500);
        let b = body(&resp);
        assert_eq!(b["error"]["code"], json!(500));
        assert!(b["error"]["message"].as_str().unwrap().contains("engine exploded"));
    }

    #[test]
    fn test_handler_panic_contained_as_500() {
        let mut router = Router::new();
        router.get("/panic", |_| panic!("boom"));
        let resp = router.dispatch(&request(Method::Get, "/panic"));
        assert_eq!(resp.status, 500);
        assert!(body(&resp)["error"]["message"]
            .as_str()
            .unwrap()
            .contains("boom"));
    }

    #[test]
    fn test_envelope_code_equals_status() {
        let mut router = Router::new();
        router.get("/ok", |_| Ok(Response::ok(json!(null))));
        router.get("/conflict", |_| Ok(Response::conflict("must be paused")));

        for (method, path, status) in [
            (Method::Get, "/ok", 200),
            (Method::Get, "/conflict", 409),
            (Method::Get, "/missing", 404),
        ] {
            let resp = router.dispatch(&request(method, path));
            assert_eq!(resp.status, status);
            let b = body(&resp);
            if status == 200 {
                assert_eq!(b["success"], json!(true));
            } else {
                assert_eq!(b["error"]["code"], json!(status));
            }
        }
    }
}
