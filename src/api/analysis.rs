//! Static analysis: function boundaries, cross-references, basic blocks,
//! string references.

use super::{query_param, require_debugging, require_paused};
use crate::bridge::SharedBridge;
use crate::format::format_address;
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.get("/api/analysis/function", move |req| {
        require_paused!(b);
        let address_expr = req.get_query("address", "cip").to_string();
        let address = b.eval(&address_expr);

        let Some(bounds) = b.function_bounds(address) else {
            return Ok(Response::not_found(format!("No function at {address_expr}")));
        };

        Ok(Response::ok(json!({
            "start": format_address(bounds.start),
            "end": format_address(bounds.end),
            "size": bounds.size,
            "label": b.label_at(bounds.start).unwrap_or_default(),
            "module": b.module_at(bounds.start).unwrap_or_default(),
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/analysis/xrefs_to", move |req| {
        require_paused!(b);
        let address_expr = query_param!(req, "address");
        let address = b.eval(&address_expr);

        let xrefs: Vec<_> = b
            .xrefs_at(address)?
            .iter()
            .map(|xref| {
                json!({
                    "address": format_address(xref.address),
                    "type": xref.kind.to_string(),
                    "label": b.label_at(xref.address).unwrap_or_default(),
                    "module": b.module_at(xref.address).unwrap_or_default(),
                })
            })
            .collect();

        Ok(Response::ok(json!({
            "target": format_address(address),
            "count": xrefs.len(),
            "xrefs": xrefs,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/analysis/xrefs_from", move |req| {
        require_paused!(b);
        let address_expr = query_param!(req, "address");
        let address = b.eval(&address_expr);

        let info = match b.instruction_at(address) {
            Ok(info) => info,
            Err(err) => return Ok(Response::internal_error(err.to_string())),
        };

        let mut refs = Vec::new();
        if (info.is_call || info.is_branch) && info.branch_destination != 0 {
            let target = info.branch_destination;
            let kind = if info.is_call { "call" } else { "branch" };
            refs.push(json!({
                "address": format_address(target),
                "type": kind,
                "label": b.label_at(target).unwrap_or_default(),
                "module": b.module_at(target).unwrap_or_default(),
            }));
        }

        Ok(Response::ok(json!({
            "source": format_address(address),
            "count": refs.len(),
            "refs": refs,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/analysis/basic_blocks", move |req| {
        require_paused!(b);
        let address_expr = req.get_query("address", "cip").to_string();
        let address = b.eval(&address_expr);

        let Some(bounds) = b.function_bounds(address) else {
            return Ok(Response::not_found(format!("No function at {address_expr}")));
        };

        // Walk the function instruction by instruction; a branch or call
        // terminates the current block.
        let mut blocks = Vec::new();
        let mut block_start = bounds.start;
        let mut current = bounds.start;
        while current <= bounds.end {
            let Ok(info) = b.instruction_at(current) else {
                break;
            };
            if info.size == 0 {
                break;
            }
            let next = current + info.size as u64;
            if info.is_branch || info.is_call || next > bounds.end {
                blocks.push(json!({
                    "start": format_address(block_start),
                    "end": format_address(current),
                    "size": next - block_start,
                }));
                block_start = next;
            }
            current = next;
        }

        Ok(Response::ok(json!({
            "function_start": format_address(bounds.start),
            "function_end": format_address(bounds.end),
            "count": blocks.len(),
            "blocks": blocks,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/analysis/strings", move |req| {
        require_debugging!(b);
        let module = query_param!(req, "module");

        let Some(base) = b.module_base(&module) else {
            return Ok(Response::not_found(format!("Module not found: {module}")));
        };

        b.exec_command(&format!("strref {}", format_address(base)));

        Ok(Response::ok(json!({
            "module": module,
            "base": format_address(base),
            "message": "String references displayed in the debugger references view",
        })))
    });
}
