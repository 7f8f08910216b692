//! Target memory access: reads with hex/ASCII rendering, writes,
//! validity/page queries, allocation and protection changes.

use super::{body_str, json_body, query_param, require_debugging};
use crate::bridge::SharedBridge;
use crate::format::{ascii_preview, format_address, format_bytes_hex, parse_hex_bytes};
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.get("/api/memory/read", move |req| {
        require_debugging!(b);
        let address_expr = query_param!(req, "address");
        let size: usize = match req.get_query("size", "256").parse() {
            Ok(size) => size,
            Err(_) => return Ok(Response::bad_request("Invalid 'size' query parameter")),
        };

        let address = b.eval(&address_expr);
        let bytes = match b.read_memory(address, size) {
            Ok(bytes) => bytes,
            Err(err) => return Ok(Response::internal_error(err.to_string())),
        };

        Ok(Response::ok(json!({
            "address": format_address(address),
            "size": bytes.len(),
            "hex": format_bytes_hex(&bytes),
            "ascii": ascii_preview(&bytes),
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/memory/write", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let address_expr = body_str!(body, "address");
        let hex = body_str!(body, "bytes");

        let address = b.eval(&address_expr);
        let bytes = parse_hex_bytes(&hex);
        if bytes.is_empty() {
            return Ok(Response::bad_request("No valid bytes to write"));
        }

        if let Err(err) = b.write_memory(address, &bytes) {
            return Ok(Response::internal_error(err.to_string()));
        }

        Ok(Response::ok(json!({
            "address": format_address(address),
            "bytes_written": bytes.len(),
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/memory/is_valid", move |req| {
        require_debugging!(b);
        let address_expr = query_param!(req, "address");
        let address = b.eval(&address_expr);
        Ok(Response::ok(json!({
            "address": format_address(address),
            "valid": b.is_valid_read_ptr(address),
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/memory/page_info", move |req| {
        require_debugging!(b);
        let address_expr = query_param!(req, "address");
        let address = b.eval(&address_expr);

        let Some((base, region_size)) = b.region_at(address) else {
            return Ok(Response::not_found(format!("No memory region at {address_expr}")));
        };

        Ok(Response::ok(json!({
            "address": format_address(address),
            "base": format_address(base),
            "region_size": region_size,
            "module": b.module_at(address).unwrap_or_default(),
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/memory/allocate", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let size = body
            .get("size")
            .and_then(|v| v.as_str())
            .unwrap_or("0x1000")
            .to_string();

        b.exec_command(&format!("alloc {size}"));

        let result = b.eval("$result");
        if result == 0 {
            return Ok(Response::internal_error("Memory allocation failed"));
        }

        Ok(Response::ok(json!({
            "address": format_address(result),
            "size": size,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/memory/free", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let address = body_str!(body, "address");
        b.exec_command(&format!("free {address}"));
        Ok(Response::ok(json!({
            "message": format!("Memory freed at {address}"),
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/memory/protect", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let address = body_str!(body, "address");
        let protection = body_str!(body, "protection");
        let size = body
            .get("size")
            .and_then(|v| v.as_str())
            .unwrap_or("0x1000")
            .to_string();

        b.exec_command(&format!("VirtualProtect {address}, {size}, {protection}"));

        Ok(Response::ok(json!({
            "address": address,
            "size": size,
            "protection": protection,
        })))
    });
}
