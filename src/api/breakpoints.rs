//! Breakpoint management over all engine breakpoint kinds.

use super::{body_str, json_body, query_param, require_debugging};
use crate::bridge::{BreakpointInfo, BreakpointKind, SharedBridge};
use crate::http::{Response, Router};
use serde_json::{json, Value};
use std::sync::Arc;

const LISTED_KINDS: [BreakpointKind; 3] = [
    BreakpointKind::Software,
    BreakpointKind::Hardware,
    BreakpointKind::Memory,
];

/// Render a breakpoint record, resolving an empty name to the symbol label
/// at its address.
fn breakpoint_json(bridge: &SharedBridge, bp: &BreakpointInfo) -> Value {
    let mut value = serde_json::to_value(bp).unwrap_or_else(|_| json!({}));
    let label = if bp.name.is_empty() {
        bridge.label_at(bp.address).unwrap_or_default()
    } else {
        bp.name.clone()
    };
    value["label"] = json!(label);
    value
}

/// Apply every configurable breakpoint field present in `body` via the
/// engine's SetBreakpointXxx commands. Only explicitly provided fields are
/// touched.
fn apply_config(bridge: &SharedBridge, address: &str, body: &Value) {
    let string_fields = [
        ("break_condition", "SetBreakpointCondition"),
        ("command_condition", "SetBreakpointCommandCondition"),
        ("command_text", "SetBreakpointCommand"),
        ("log_text", "SetBreakpointLog"),
        ("log_condition", "SetBreakpointLogCondition"),
        ("name", "SetBreakpointName"),
    ];
    for (field, command) in string_fields {
        if let Some(text) = body.get(field).and_then(|v| v.as_str()) {
            bridge.exec_command(&format!("{command} {address}, \"{text}\""));
        }
    }
    if let Some(silent) = body.get("silent").and_then(|v| v.as_bool()) {
        bridge.exec_command(&format!("SetBreakpointSilent {address}, {}", u8::from(silent)));
    }
    if let Some(fast) = body.get("fast_resume").and_then(|v| v.as_bool()) {
        bridge.exec_command(&format!("SetBreakpointFastResume {address}, {}", u8::from(fast)));
    }
}

/// Create the breakpoint described by `entry` (software unless `bp_type`
/// says otherwise), then apply its optional config fields.
fn create_with_config(bridge: &SharedBridge, address: &str, entry: &Value) -> String {
    let bp_type = entry
        .get("bp_type")
        .and_then(|v| v.as_str())
        .unwrap_or("software")
        .to_string();
    match bp_type.as_str() {
        "hardware" => {
            let hw_type = entry.get("hw_type").and_then(|v| v.as_str()).unwrap_or("x");
            let hw_size = entry.get("hw_size").and_then(|v| v.as_str()).unwrap_or("1");
            bridge.exec_command(&format!("bphws {address}, {hw_type}, {hw_size}"));
        }
        "memory" => {
            let mem_type = entry.get("mem_type").and_then(|v| v.as_str()).unwrap_or("a");
            bridge.exec_command(&format!("bpm {address}, {mem_type}"));
        }
        _ => {
            if entry.get("singleshot").and_then(|v| v.as_bool()).unwrap_or(false) {
                bridge.exec_command(&format!("bp {address}, ss"));
            } else {
                bridge.exec_command(&format!("bp {address}"));
            }
        }
    }
    apply_config(bridge, address, entry);
    bp_type
}

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.get("/api/breakpoints/list", move |_req| {
        let mut all = Vec::new();
        for kind in LISTED_KINDS {
            for bp in b.breakpoint_list(kind)? {
                let mut value = breakpoint_json(&b, &bp);
                value["type_name"] = json!(kind.to_string());
                all.push(value);
            }
        }
        Ok(Response::ok(json!({
            "count": all.len(),
            "breakpoints": all,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/breakpoints/get", move |req| {
        let address_expr = query_param!(req, "address");
        let address = b.eval(&address_expr);

        for kind in LISTED_KINDS {
            if let Some(bp) = b
                .breakpoint_list(kind)?
                .into_iter()
                .find(|bp| bp.address == address)
            {
                return Ok(Response::ok(breakpoint_json(&b, &bp)));
            }
        }

        Ok(Response::not_found(format!("No breakpoint at {address_expr}")))
    });

    let b = Arc::clone(bridge);
    router.post("/api/breakpoints/set", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let address = body_str!(body, "address");
        let singleshot = body
            .get("singleshot")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        if singleshot {
            b.exec_command(&format!("bp {address}, ss"));
        } else {
            b.exec_command(&format!("bp {address}"));
        }

        Ok(Response::ok(json!({
            "address": address,
            "type": "software",
            "singleshot": singleshot,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/breakpoints/set_hardware", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let address = body_str!(body, "address");
        let hw_type = body.get("type").and_then(|v| v.as_str()).unwrap_or("x");
        let hw_size = body.get("size").and_then(|v| v.as_str()).unwrap_or("1");

        b.exec_command(&format!("bphws {address}, {hw_type}, {hw_size}"));

        Ok(Response::ok(json!({
            "address": address,
            "type": "hardware",
            "hw_type": hw_type,
            "hw_size": hw_size,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/breakpoints/set_memory", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let address = body_str!(body, "address");
        let mem_type = body.get("type").and_then(|v| v.as_str()).unwrap_or("a");

        b.exec_command(&format!("bpm {address}, {mem_type}"));

        Ok(Response::ok(json!({
            "address": address,
            "type": "memory",
            "mem_type": mem_type,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/breakpoints/delete", move |req| {
        let body = json_body!(req);
        let address = body_str!(body, "address");
        let command = match body.get("type").and_then(|v| v.as_str()).unwrap_or("software") {
            "hardware" => "bphwc",
            "memory" => "bpmc",
            _ => "bc",
        };
        b.exec_command(&format!("{command} {address}"));
        Ok(Response::ok(json!({ "address": address, "deleted": true })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/breakpoints/enable", move |req| {
        let body = json_body!(req);
        let address = body_str!(body, "address");
        b.exec_command(&format!("bpe {address}"));
        Ok(Response::ok(json!({ "address": address, "enabled": true })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/breakpoints/disable", move |req| {
        let body = json_body!(req);
        let address = body_str!(body, "address");
        b.exec_command(&format!("bpd {address}"));
        Ok(Response::ok(json!({ "address": address, "enabled": false })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/breakpoints/toggle", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let address = body_str!(body, "address");
        b.exec_command(&format!("bptoggle {address}"));
        Ok(Response::ok(json!({ "address": address, "toggled": true })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/breakpoints/set_condition", move |req| {
        let body = json_body!(req);
        let address = body_str!(body, "address");
        let condition = body_str!(body, "condition");
        b.exec_command(&format!("SetBreakpointCondition {address}, \"{condition}\""));
        Ok(Response::ok(json!({
            "address": address,
            "condition": condition,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/breakpoints/set_log", move |req| {
        let body = json_body!(req);
        let address = body_str!(body, "address");
        let text = body_str!(body, "text");
        b.exec_command(&format!("SetBreakpointLog {address}, \"{text}\""));
        Ok(Response::ok(json!({ "address": address, "log": text })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/breakpoints/configure", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let address = body_str!(body, "address");
        let bp_type = create_with_config(&b, &address, &body);
        Ok(Response::ok(json!({
            "address": address,
            "bp_type": bp_type,
            "configured": true,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/breakpoints/configure_batch", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let Some(entries) = body.get("breakpoints").and_then(|v| v.as_array()) else {
            return Ok(Response::bad_request("Missing 'breakpoints' array field"));
        };

        let mut results = Vec::new();
        let mut succeeded = 0;
        let mut failed = 0;

        for entry in entries {
            let Some(address) = entry.get("address").and_then(|v| v.as_str()) else {
                results.push(json!({ "error": "missing address", "success": false }));
                failed += 1;
                continue;
            };
            create_with_config(&b, address, entry);
            results.push(json!({ "address": address, "success": true }));
            succeeded += 1;
        }

        Ok(Response::ok(json!({
            "results": results,
            "total": entries.len(),
            "succeeded": succeeded,
            "failed": failed,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/breakpoints/reset_hit_count", move |req| {
        let body = json_body!(req);
        let address = body_str!(body, "address");
        b.exec_command(&format!("ResetBreakpointHitCount {address}"));
        Ok(Response::ok(json!({ "address": address, "hit_count": 0 })))
    });
}
