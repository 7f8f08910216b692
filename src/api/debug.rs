//! Execution control: run state, run/pause/stop/restart and stepping.

use super::{body_str, json_body, require_debugging, require_paused};
use crate::bridge::{RunState, SharedBridge, COMMAND_WAIT_TIMEOUT, STEP_OUT_WAIT_TIMEOUT};
use crate::format::format_address;
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.get("/api/debug/state", move |_req| {
        let state = b.run_state();
        let mut data = json!({ "state": state.to_string() });

        if state == RunState::Paused {
            let cip = b.eval("cip");
            data["cip"] = json!(format_address(cip));
            if let Some(module) = b.module_at(cip) {
                data["module"] = json!(module);
            }
            if let Some(label) = b.label_at(cip) {
                data["label"] = json!(label);
            }
        }

        Ok(Response::ok(data))
    });

    let b = Arc::clone(bridge);
    router.post("/api/debug/run", move |_req| {
        require_paused!(b);
        b.exec_command("run");
        Ok(Response::ok(json!({ "message": "Execution resumed" })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/debug/pause", move |_req| {
        require_debugging!(b);
        if b.is_paused() {
            return Ok(Response::ok(json!({ "message": "Already paused" })));
        }
        b.exec_command("pause");
        Ok(Response::ok(json!({ "message": "Pause requested" })))
    });

    register_step(router, bridge, "/api/debug/step_into", "StepInto", "Stepped into", COMMAND_WAIT_TIMEOUT);
    register_step(router, bridge, "/api/debug/step_over", "StepOver", "Stepped over", COMMAND_WAIT_TIMEOUT);
    register_step(router, bridge, "/api/debug/step_out", "StepOut", "Stepped out", STEP_OUT_WAIT_TIMEOUT);

    let b = Arc::clone(bridge);
    router.post("/api/debug/stop", move |_req| {
        if !b.is_debugging() {
            return Ok(Response::ok(json!({ "message": "Not debugging" })));
        }
        b.exec_command("stop");
        Ok(Response::ok(json!({ "message": "Debug session stopped" })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/debug/restart", move |_req| {
        require_debugging!(b);
        b.exec_command("restart");
        Ok(Response::ok(json!({ "message": "Restart initiated" })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/debug/run_to", move |req| {
        require_paused!(b);
        let body = json_body!(req);
        let address = body_str!(body, "address");

        // Single-shot breakpoint at the target, then resume.
        b.exec_command(&format!("bp {address}, ss"));
        b.exec_command("run");

        Ok(Response::ok(json!({
            "message": format!("Running to {address}"),
            "target": address,
        })))
    });
}

fn register_step(
    router: &mut Router,
    bridge: &SharedBridge,
    path: &str,
    command: &'static str,
    message: &'static str,
    timeout: Duration,
) {
    let b = Arc::clone(bridge);
    router.post(path, move |_req| {
        require_paused!(b);
        if !b.exec_command_and_wait(command, timeout) {
            return Ok(Response::internal_error(format!("{command} timed out")));
        }
        let cip = b.eval("cip");
        Ok(Response::ok(json!({
            "cip": format_address(cip),
            "message": message,
        })))
    });
}
