//! Exception breakpoints and exception handling control.

use super::{body_str, json_body, require_debugging, require_paused};
use crate::bridge::{BreakpointKind, SharedBridge};
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.post("/api/exceptions/set_bp", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let code = body_str!(body, "code");
        let chance = body
            .get("chance")
            .and_then(|v| v.as_str())
            .unwrap_or("first")
            .to_string();

        let mut command = format!("SetExceptionBPX {code}");
        if chance == "second" {
            command.push_str(", 1");
        }
        let success = b.exec_command(&command);

        Ok(Response::ok(json!({
            "success": success,
            "code": code,
            "chance": chance,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/exceptions/delete_bp", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let code = body_str!(body, "code");
        let success = b.exec_command(&format!("DeleteExceptionBPX {code}"));
        Ok(Response::ok(json!({
            "success": success,
            "code": code,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/exceptions/list_bps", move |_req| {
        require_debugging!(b);
        let breakpoints = b.breakpoint_list(BreakpointKind::Exception)?;
        Ok(Response::ok(json!({
            "count": breakpoints.len(),
            "breakpoints": breakpoints,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/exceptions/list_codes", move |_req| {
        let codes = b.exception_codes();
        Ok(Response::ok(json!({
            "count": codes.len(),
            "exceptions": codes,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/exceptions/skip", move |_req| {
        require_paused!(b);
        let success = b.exec_command("skip");
        Ok(Response::ok(json!({
            "success": success,
            "message": "Exception skipped",
        })))
    });
}
