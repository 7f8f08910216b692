//! Call stack, raw stack reads and the SEH chain.

use super::require_paused;
use crate::bridge::SharedBridge;
use crate::format::format_address;
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.get("/api/stack/trace", move |_req| {
        require_paused!(b);
        let frames: Vec<_> = b
            .call_stack()?
            .iter()
            .enumerate()
            .map(|(index, frame)| {
                json!({
                    "index": index,
                    "address": format_address(frame.address),
                    "from": format_address(frame.from),
                    "to": format_address(frame.to),
                    "label": b.label_at(frame.to).unwrap_or_default(),
                    "module": b.module_at(frame.to).unwrap_or_default(),
                    "comment": frame.comment,
                })
            })
            .collect();

        Ok(Response::ok(json!({
            "count": frames.len(),
            "frames": frames,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/stack/read", move |req| {
        require_paused!(b);
        let address_expr = req.get_query("address", "csp").to_string();
        let size: usize = match req.get_query("size", "256").parse() {
            Ok(size) => size,
            Err(_) => return Ok(Response::bad_request("Invalid 'size' query parameter")),
        };

        let address = b.eval(&address_expr);
        let bytes = match b.read_memory(address, size) {
            Ok(bytes) => bytes,
            Err(err) => return Ok(Response::internal_error(err.to_string())),
        };

        // Render pointer-sized entries with label/module annotations.
        let entries: Vec<_> = bytes
            .chunks_exact(8)
            .enumerate()
            .map(|(i, chunk)| {
                let value = chunk.try_into().map(u64::from_le_bytes).unwrap_or(0);
                json!({
                    "address": format_address(address + (i * 8) as u64),
                    "value": format_address(value),
                    "label": b.label_at(value).unwrap_or_default(),
                    "module": b.module_at(value).unwrap_or_default(),
                })
            })
            .collect();

        Ok(Response::ok(json!({
            "base": format_address(address),
            "size": bytes.len(),
            "entries": entries,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/stack/pointers", move |_req| {
        require_paused!(b);
        Ok(Response::ok(json!({
            "rsp": format_address(b.eval("csp")),
            "rbp": format_address(b.eval("cbp")),
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/stack/seh_chain", move |_req| {
        require_paused!(b);
        let chain: Vec<_> = b
            .seh_chain()?
            .iter()
            .map(|record| {
                json!({
                    "address": format_address(record.address),
                    "handler": format_address(record.handler),
                    "label": b.label_at(record.handler).unwrap_or_default(),
                    "module": b.module_at(record.handler).unwrap_or_default(),
                })
            })
            .collect();

        Ok(Response::ok(json!({
            "count": chain.len(),
            "chain": chain,
        })))
    });
}
