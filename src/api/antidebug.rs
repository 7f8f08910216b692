//! Anti-debug inspection: PEB/TEB fields and the knobs malware checks.
//!
//! Offsets are the 64-bit PEB/TEB layouts.

use super::require_debugging;
use crate::bridge::SharedBridge;
use crate::format::{format_address, format_hex};
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;

const PEB_BEING_DEBUGGED: u64 = 0x2;
const PEB_NT_GLOBAL_FLAG: u64 = 0xbc;
const PEB_PROCESS_HEAP: u64 = 0x30;
const TEB_STACK_BASE: u64 = 0x8;
const TEB_STACK_LIMIT: u64 = 0x10;
const TEB_PEB_POINTER: u64 = 0x60;

fn read_ptr(bridge: &SharedBridge, address: u64) -> Option<u64> {
    let bytes = bridge.read_memory(address, 8).ok()?;
    bytes.try_into().map(u64::from_le_bytes).ok()
}

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.get("/api/antidebug/peb", move |req| {
        require_debugging!(b);
        let pid = match req.query.get("pid") {
            Some(pid) => match pid.parse::<u32>() {
                Ok(pid) => pid,
                Err(_) => return Ok(Response::bad_request("Invalid 'pid' query parameter")),
            },
            None => b.eval("$pid") as u32,
        };

        let peb = b.peb_address(pid);
        if peb == 0 {
            return Ok(Response::not_found("Failed to get PEB address"));
        }

        let mut data = json!({
            "peb_address": format_address(peb),
            "pid": pid,
        });

        if let Ok(bytes) = b.read_memory(peb + PEB_BEING_DEBUGGED, 1) {
            data["being_debugged"] = json!(bytes[0]);
        }
        if let Ok(bytes) = b.read_memory(peb + PEB_NT_GLOBAL_FLAG, 4) {
            let flags = bytes.try_into().map(u32::from_le_bytes).unwrap_or(0);
            data["nt_global_flag"] = json!(format_address(flags.into()));
            data["nt_global_flag_decimal"] = json!(flags);
        }
        if let Some(heap) = read_ptr(&b, peb + PEB_PROCESS_HEAP) {
            data["process_heap"] = json!(format_address(heap));
        }

        Ok(Response::ok(data))
    });

    let b = Arc::clone(bridge);
    router.get("/api/antidebug/teb", move |req| {
        require_debugging!(b);
        let tid = match req.query.get("tid") {
            Some(tid) => match tid.parse::<u32>() {
                Ok(tid) => tid,
                Err(_) => return Ok(Response::bad_request("Invalid 'tid' query parameter")),
            },
            None => b.eval("$tid") as u32,
        };

        let teb = b.teb_address(tid);
        if teb == 0 {
            return Ok(Response::not_found("Failed to get TEB address"));
        }

        let mut data = json!({
            "teb_address": format_address(teb),
            "tid": tid,
        });

        // SEH chain head sits at TEB offset 0.
        if let Some(seh) = read_ptr(&b, teb) {
            data["seh_frame"] = json!(format_address(seh));
        }
        if let Some(stack_base) = read_ptr(&b, teb + TEB_STACK_BASE) {
            data["stack_base"] = json!(format_address(stack_base));
        }
        if let Some(stack_limit) = read_ptr(&b, teb + TEB_STACK_LIMIT) {
            data["stack_limit"] = json!(format_address(stack_limit));
        }
        if let Some(peb) = read_ptr(&b, teb + TEB_PEB_POINTER) {
            data["peb_address"] = json!(format_address(peb));
        }

        Ok(Response::ok(data))
    });

    let b = Arc::clone(bridge);
    router.post("/api/antidebug/hide_debugger", move |_req| {
        require_debugging!(b);
        let pid = b.eval("$pid") as u32;
        let peb = b.peb_address(pid);
        if peb == 0 {
            return Ok(Response::internal_error("Failed to get PEB address"));
        }

        let mut changes = Vec::new();
        if b.write_memory(peb + PEB_BEING_DEBUGGED, &[0x00]).is_ok() {
            changes.push(json!({ "field": "BeingDebugged", "offset": "0x2", "value": 0 }));
        }
        if b
            .write_memory(peb + PEB_NT_GLOBAL_FLAG, &[0x00, 0x00, 0x00, 0x00])
            .is_ok()
        {
            changes.push(json!({
                "field": "NtGlobalFlag",
                "offset": format_hex(PEB_NT_GLOBAL_FLAG),
                "value": 0,
            }));
        }

        Ok(Response::ok(json!({
            "peb_address": format_address(peb),
            "changes": changes,
            "message": "Debugger hidden from PEB checks",
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/antidebug/dep_status", move |_req| {
        require_debugging!(b);
        Ok(Response::ok(json!({ "dep_enabled": b.is_dep_enabled() })))
    });
}
