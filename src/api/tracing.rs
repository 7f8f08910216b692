//! Conditional tracing, trace recording and animation.

use super::{body_str, json_body, query_param, require_debugging, require_paused};
use crate::bridge::{SharedBridge, TraceRecordType};
use crate::format::format_address;
use crate::http::{Response, Router};
use serde_json::{json, Value};
use std::sync::Arc;

fn opt_str(body: &Value, field: &str) -> String {
    body.get(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Assemble a `Trace{Into,Over}Conditional` command from the optional
/// condition/step/log fields of a request body.
fn conditional_trace_command(base: &str, body: &Value) -> String {
    let mut command = base.to_string();
    let condition = opt_str(body, "condition");
    let max_steps = opt_str(body, "max_steps");
    let log_text = opt_str(body, "log_text");

    if !condition.is_empty() {
        command.push(' ');
        command.push_str(&condition);
    }
    if !max_steps.is_empty() {
        command.push_str(", ");
        command.push_str(&max_steps);
    }
    if !log_text.is_empty() {
        command.push_str(", ");
        command.push_str(&log_text);
    }
    command
}

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.post("/api/trace/into", move |req| {
        require_paused!(b);
        let body = json_body!(req);
        let command = conditional_trace_command("TraceIntoConditional", &body);
        let success = b.exec_command_async(&command);
        Ok(Response::ok(json!({
            "success": success,
            "command": command,
            "message": "Trace into started (async)",
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/trace/over", move |req| {
        require_paused!(b);
        let body = json_body!(req);
        let command = conditional_trace_command("TraceOverConditional", &body);
        let success = b.exec_command_async(&command);
        Ok(Response::ok(json!({
            "success": success,
            "command": command,
            "message": "Trace over started (async)",
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/trace/run", move |req| {
        require_paused!(b);
        let body = json_body!(req);
        let party = body.get("party").and_then(|v| v.as_str()).unwrap_or("0");
        let command = format!("RunToParty {party}");
        let success = b.exec_command_async(&command);
        Ok(Response::ok(json!({
            "success": success,
            "command": command,
            "message": "Run to party started (async)",
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/trace/stop", move |_req| {
        require_debugging!(b);
        let success = b.exec_command("StopRunTrace");
        Ok(Response::ok(json!({
            "success": success,
            "message": "Trace stopped",
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/trace/record/hitcount", move |req| {
        require_debugging!(b);
        let address_expr = query_param!(req, "address");
        let address = b.eval(&address_expr);
        Ok(Response::ok(json!({
            "address": format_address(address),
            "hit_count": b.trace_hit_count(address),
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/trace/record/type", move |req| {
        require_debugging!(b);
        let address_expr = query_param!(req, "address");
        let address = b.eval(&address_expr);
        let kind = b.trace_record_type(address);
        Ok(Response::ok(json!({
            "address": format_address(address),
            "type": kind.to_string(),
            "type_id": kind as u8,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/trace/record/set_type", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let address = b.eval(&body_str!(body, "address"));
        let type_id = body.get("type").and_then(|v| v.as_u64()).unwrap_or(0);

        let Some(kind) = TraceRecordType::from_repr(type_id as u8) else {
            return Ok(Response::bad_request(format!("Unknown trace record type: {type_id}")));
        };
        let success = b.set_trace_record_type(address, kind);

        Ok(Response::ok(json!({
            "success": success,
            "address": format_address(address),
            "type": type_id,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/trace/animate", move |req| {
        require_paused!(b);
        let body = json_body!(req);
        let command = body_str!(body, "command");
        let success = b.animate_command(&command);
        Ok(Response::ok(json!({
            "success": success,
            "command": command,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/trace/conditional_run", move |req| {
        require_paused!(b);
        let body = json_body!(req);
        let trace_type = body.get("type").and_then(|v| v.as_str()).unwrap_or("into");
        let base = if trace_type == "over" {
            "TraceOverConditional"
        } else {
            "TraceIntoConditional"
        };

        let mut command = base.to_string();
        let break_condition = opt_str(&body, "break_condition");
        if !break_condition.is_empty() {
            command.push(' ');
            command.push_str(&break_condition);
        }

        let success = b.exec_command_async(&command);
        Ok(Response::ok(json!({
            "success": success,
            "command": command,
            "type": trace_type,
            "message": "Conditional trace started (async)",
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/trace/log", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let file = opt_str(&body, "file");
        if file.is_empty() {
            return Ok(Response::bad_request("Missing 'file' field for trace log output"));
        }
        let text = opt_str(&body, "text");

        let mut command = format!("StartRunTrace {file}");
        if !text.is_empty() {
            command.push_str(", ");
            command.push_str(&text);
        }
        let success = b.exec_command(&command);

        Ok(Response::ok(json!({
            "success": success,
            "command": command,
            "file": file,
        })))
    });
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_conditional_trace_command_assembly() {
        let body = json!({ "condition": "rax==0", "max_steps": "1000" });
        assert_eq!(
            conditional_trace_command("TraceIntoConditional", &body),
            "TraceIntoConditional rax==0, 1000"
        );
        assert_eq!(
            conditional_trace_command("TraceOverConditional", &json!({})),
            "TraceOverConditional"
        );
    }
}
