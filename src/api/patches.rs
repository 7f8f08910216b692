//! Byte patches: apply, restore, export.

use super::{body_str, json_body, require_debugging};
use crate::bridge::SharedBridge;
use crate::format::{format_address, format_bytes_hex, format_hex, parse_hex_bytes};
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.get("/api/patches/list", move |_req| {
        require_debugging!(b);
        b.exec_command("patchlist");
        Ok(Response::ok(json!({
            "message": "Patch list displayed in the debugger log. Use the patches dialog for full patch management.",
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/patches/apply", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let address = b.eval(&body_str!(body, "address"));
        let bytes = parse_hex_bytes(&body_str!(body, "bytes"));
        if bytes.is_empty() {
            return Ok(Response::bad_request("No valid bytes to patch"));
        }

        // Capture the original bytes before overwriting them.
        let original = b.read_memory(address, bytes.len()).ok();

        if let Err(err) = b.write_memory(address, &bytes) {
            return Ok(Response::internal_error(err.to_string()));
        }

        let mut data = json!({
            "address": format_address(address),
            "bytes_patched": bytes.len(),
            "new_bytes": format_bytes_hex(&bytes),
        });
        if let Some(original) = original {
            data["original_bytes"] = json!(format_bytes_hex(&original));
        }

        Ok(Response::ok(data))
    });

    let b = Arc::clone(bridge);
    router.post("/api/patches/restore", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let address = body_str!(body, "address");
        b.exec_command(&format!("patchrestore {address}"));
        Ok(Response::ok(json!({
            "address": address,
            "message": "Patch restore requested",
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/patches/export", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let path = body_str!(body, "path");
        let module = body
            .get("module")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let command = if module.is_empty() {
            format!("savedata \"{path}\"")
        } else {
            let base = b.module_base(&module).unwrap_or(0);
            let size = b.eval(&format!("mod.size({module})"));
            format!(
                "savedata \"{path}\", {}, {}",
                format_address(base),
                format_hex(size)
            )
        };
        b.exec_command(&command);

        Ok(Response::ok(json!({
            "module": module,
            "path": path,
            "message": "Module export initiated",
        })))
    });
}
