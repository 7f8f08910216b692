//! Symbol resolution in both directions plus pattern search.

use super::{query_param, require_debugging};
use crate::bridge::SharedBridge;
use crate::format::format_address;
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.get("/api/symbols/resolve", move |req| {
        require_debugging!(b);
        let name = query_param!(req, "name");

        if !b.is_valid_expression(&name) {
            return Ok(Response::not_found(format!("Cannot resolve: {name}")));
        }
        let address = b.eval(&name);
        if address == 0 {
            return Ok(Response::not_found(format!("Symbol not found: {name}")));
        }

        Ok(Response::ok(json!({
            "name": name,
            "address": format_address(address),
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/symbols/at", move |req| {
        require_debugging!(b);
        let address_expr = query_param!(req, "address");
        let address = b.eval(&address_expr);

        Ok(Response::ok(json!({
            "address": format_address(address),
            "label": b.label_at(address).unwrap_or_default(),
            "module": b.module_at(address).unwrap_or_default(),
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/symbols/search", move |req| {
        require_debugging!(b);
        let pattern = query_param!(req, "pattern");
        let module = req.get_query("module", "").to_string();

        let search_expr = if module.is_empty() {
            pattern.clone()
        } else {
            format!("{module}.{pattern}")
        };
        // symfind reports into the engine's own symbol view.
        b.exec_command(&format!("symfind {search_expr}"));

        Ok(Response::ok(json!({
            "pattern": pattern,
            "module": module,
            "message": "Symbol search initiated. Check the debugger symbol view for results.",
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/symbols/list", move |req| {
        require_debugging!(b);
        let module = query_param!(req, "module");

        let Some(base) = b.module_base(&module) else {
            return Ok(Response::not_found(format!("Module not found: {module}")));
        };

        b.exec_command(&format!("symload {module}"));

        Ok(Response::ok(json!({
            "module": module,
            "base": format_address(base),
            "message": "Symbols loaded. Use symbol search to find specific symbols.",
        })))
    });
}
