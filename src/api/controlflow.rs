//! Control flow graph queries and function markers.

use super::{body_str, json_body, require_paused};
use crate::bridge::SharedBridge;
use crate::format::format_address;
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.get("/api/cfg/function", move |req| {
        require_paused!(b);
        let address_expr = req.get_query("address", "cip").to_string();
        let address = b.eval(&address_expr);

        let Some(graph) = b.analyze_function(address) else {
            return Ok(Response::not_found(format!(
                "Failed to analyze function at {address_expr}"
            )));
        };

        Ok(Response::ok(json!({
            "entry_point": format_address(graph.entry_point),
            "node_count": graph.nodes.len(),
            "nodes": graph.nodes,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/cfg/branch_dest", move |req| {
        require_paused!(b);
        let address_expr = req.get_query("address", "cip").to_string();
        let address = b.eval(&address_expr);
        let dest = b.branch_destination(address);

        Ok(Response::ok(json!({
            "address": format_address(address),
            "destination": format_address(dest),
            "label": b.label_at(dest).unwrap_or_default(),
            "module": b.module_at(dest).unwrap_or_default(),
            "has_dest": dest != 0,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/cfg/is_jump_taken", move |req| {
        require_paused!(b);
        let address_expr = req.get_query("address", "cip").to_string();
        let address = b.eval(&address_expr);
        Ok(Response::ok(json!({
            "address": format_address(address),
            "will_execute": b.is_jump_taken(address),
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/cfg/loops", move |req| {
        require_paused!(b);
        let address_expr = req.get_query("address", "cip").to_string();
        let address = b.eval(&address_expr);

        let mut loops = Vec::new();
        for depth in 0..10 {
            let Some((start, end)) = b.loop_bounds(depth, address) else {
                break;
            };
            loops.push(json!({
                "depth": depth,
                "start": format_address(start),
                "end": format_address(end),
                "size": end - start,
            }));
        }

        Ok(Response::ok(json!({
            "address": format_address(address),
            "count": loops.len(),
            "loops": loops,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/cfg/add_function", move |req| {
        require_paused!(b);
        let body = json_body!(req);
        let start = b.eval(&body_str!(body, "start"));
        let end = b.eval(&body_str!(body, "end"));

        let success = b.exec_command(&format!(
            "functionadd {}, {}",
            format_address(start),
            format_address(end)
        ));

        Ok(Response::ok(json!({
            "success": success,
            "start": format_address(start),
            "end": format_address(end),
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/cfg/delete_function", move |req| {
        require_paused!(b);
        let body = json_body!(req);
        let address = b.eval(&body_str!(body, "address"));

        let success = b.exec_command(&format!("functiondel {}", format_address(address)));

        Ok(Response::ok(json!({
            "success": success,
            "address": format_address(address),
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/cfg/func_type", move |req| {
        require_paused!(b);
        let address_expr = req.get_query("address", "cip").to_string();
        let address = b.eval(&address_expr);
        let func_type = b.function_type_at(address);

        Ok(Response::ok(json!({
            "address": format_address(address),
            "func_type": func_type.to_string(),
            "type_id": func_type as u8,
        })))
    });
}
