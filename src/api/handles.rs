//! OS object enumeration in the debugged process: handles, TCP
//! connections, windows, heaps.

use super::{body_str, json_body, query_param, require_debugging};
use crate::bridge::SharedBridge;
use crate::format::format_address;
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.get("/api/handles/list", move |_req| {
        require_debugging!(b);
        let handles = b.handles().unwrap_or_default();
        Ok(Response::ok(json!({
            "count": handles.len(),
            "handles": handles,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/handles/get", move |req| {
        require_debugging!(b);
        let handle_expr = query_param!(req, "handle");
        let handle = b.eval(&handle_expr);

        let named = b.handle_name(handle);
        let (name, type_name) = named.clone().unwrap_or_default();
        Ok(Response::ok(json!({
            "handle": format_address(handle),
            "name": name,
            "type_name": type_name,
            "found": named.is_some(),
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/handles/tcp", move |_req| {
        require_debugging!(b);
        let connections = b.tcp_connections().unwrap_or_default();
        Ok(Response::ok(json!({
            "count": connections.len(),
            "connections": connections,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/handles/windows", move |_req| {
        require_debugging!(b);
        let windows = b.windows().unwrap_or_default();
        Ok(Response::ok(json!({
            "count": windows.len(),
            "windows": windows,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/handles/heaps", move |_req| {
        require_debugging!(b);
        let heaps = b.heaps().unwrap_or_default();
        Ok(Response::ok(json!({
            "count": heaps.len(),
            "heaps": heaps,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/handles/close", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let handle = body_str!(body, "handle");
        let success = b.exec_command(&format!("HandleClose {handle}"));
        Ok(Response::ok(json!({
            "success": success,
            "handle": handle,
        })))
    });
}
