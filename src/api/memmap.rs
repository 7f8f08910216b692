//! Memory map enumeration and point queries.

use super::{query_param, require_debugging};
use crate::bridge::SharedBridge;
use crate::format::format_address;
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.get("/api/memmap/list", move |_req| {
        require_debugging!(b);
        let regions = b.memory_map()?;
        Ok(Response::ok(json!({
            "count": regions.len(),
            "regions": regions,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/memmap/at", move |req| {
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
            "module": b.module_at(base).unwrap_or_default(),
        })))
    });
}
