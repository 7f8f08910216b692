//! Disassembly views and in-place assembly.

use super::{body_str, json_body, require_paused};
use crate::bridge::SharedBridge;
use crate::format::format_address;
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.get("/api/disasm/at", move |req| {
        require_paused!(b);
        let address_expr = req.get_query("address", "cip").to_string();
        let count: usize = req
            .get_query("count", "10")
            .parse()
            .unwrap_or(10)
            .clamp(1, 1000);

        let address = b.eval(&address_expr);
        let instructions = match b.disassemble_at(address, count) {
            Ok(instructions) => instructions,
            Err(err) => return Ok(Response::internal_error(err.to_string())),
        };

        Ok(Response::ok(json!({
            "address": format_address(address),
            "count": instructions.len(),
            "instructions": instructions,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/disasm/function", move |req| {
        require_paused!(b);
        let address_expr = req.get_query("address", "cip").to_string();
        let address = b.eval(&address_expr);

        let Some(bounds) = b.function_bounds(address) else {
            // No function boundary known, fall back to a fixed window.
            let instructions = match b.disassemble_at(address, 50) {
                Ok(instructions) => instructions,
                Err(err) => return Ok(Response::internal_error(err.to_string())),
            };
            return Ok(Response::ok(json!({
                "address": format_address(address),
                "note": "No function boundary found, showing 50 instructions",
                "instructions": instructions,
            })));
        };

        let estimate = ((bounds.end - bounds.start) / 2 + 1).min(5000) as usize;
        let instructions = match b.disassemble_at(bounds.start, estimate) {
            Ok(instructions) => instructions,
            Err(err) => return Ok(Response::internal_error(err.to_string())),
        };
        let within: Vec<_> = instructions
            .into_iter()
            .take_while(|instr| instr.address <= bounds.end)
            .collect();

        Ok(Response::ok(json!({
            "function_start": format_address(bounds.start),
            "function_end": format_address(bounds.end),
            "function_size": bounds.size,
            "count": within.len(),
            "instructions": within,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/disasm/basic", move |req| {
        require_paused!(b);
        let address_expr = req.get_query("address", "cip").to_string();
        let address = b.eval(&address_expr);
        match b.instruction_at(address) {
            Ok(info) => Ok(Response::ok(serde_json::to_value(&info)?)),
            Err(err) => Ok(Response::internal_error(err.to_string())),
        }
    });

    let b = Arc::clone(bridge);
    router.post("/api/disasm/assemble", move |req| {
        require_paused!(b);
        let body = json_body!(req);
        let address = body_str!(body, "address");
        let instruction = body_str!(body, "instruction");

        if !b.exec_command(&format!("asm {address}, \"{instruction}\"")) {
            return Ok(Response::internal_error("Failed to assemble instruction"));
        }

        Ok(Response::ok(json!({
            "address": address,
            "instruction": instruction,
        })))
    });
}
