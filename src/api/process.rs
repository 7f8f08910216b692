//! Debugged-process facts: identity, command line, privileges.

use super::{body_str, json_body, require_debugging};
use crate::bridge::SharedBridge;
use crate::format::format_address;
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.get("/api/process/details", move |_req| {
        require_debugging!(b);
        let pid = b.eval("$pid");
        let peb = b.peb_address(pid as u32);
        let entry = b.eval("mod.entry(0)");

        Ok(Response::ok(json!({
            "pid": pid,
            "peb_address": format_address(peb),
            "entry_point": format_address(entry),
            "debugger_state": b.run_state().to_string(),
            "is_elevated": b.is_elevated(),
            "dep_enabled": b.is_dep_enabled(),
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/process/cmdline", move |_req| {
        require_debugging!(b);
        let cmdline = b.cmdline()?;
        Ok(Response::ok(json!({ "cmdline": cmdline })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/process/set_cmdline", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let cmdline = body_str!(body, "cmdline");
        let success = b.set_cmdline(&cmdline);
        Ok(Response::ok(json!({
            "success": success,
            "cmdline": cmdline,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/process/elevated", move |_req| {
        require_debugging!(b);
        Ok(Response::ok(json!({ "elevated": b.is_elevated() })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/process/dbversion", move |_req| {
        Ok(Response::ok(json!({ "version": b.debugger_version() })))
    });
}
