//! Raw engine command execution and expression evaluation.

use super::{body_str, json_body};
use crate::bridge::SharedBridge;
use crate::format::format_address;
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.post("/api/command/exec", move |req| {
        let body = json_body!(req);
        let command = body_str!(body, "command");
        let success = b.exec_command(&command);
        Ok(Response::ok(json!({
            "command": command,
            "success": success,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/command/eval", move |req| {
        let body = json_body!(req);
        let expression = body_str!(body, "expression");

        if !b.is_valid_expression(&expression) {
            return Ok(Response::bad_request(format!("Invalid expression: {expression}")));
        }

        let value = b.eval(&expression);
        Ok(Response::ok(json!({
            "expression": expression,
            "value": format_address(value),
            "decimal": value,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/command/script", move |req| {
        let body = json_body!(req);
        let Some(commands) = body.get("commands").and_then(|v| v.as_array()) else {
            return Ok(Response::bad_request(
                "Missing 'commands' field (array of strings)",
            ));
        };

        let mut results = Vec::new();
        let mut succeeded = 0;
        let mut failed = 0;

        for command in commands {
            let Some(command) = command.as_str() else {
                return Ok(Response::bad_request("'commands' must be an array of strings"));
            };
            let success = b.exec_command(command);
            results.push(json!({ "command": command, "success": success }));
            if success {
                succeeded += 1;
            } else {
                failed += 1;
            }
        }

        Ok(Response::ok(json!({
            "results": results,
            "total": commands.len(),
            "succeeded": succeeded,
            "failed": failed,
        })))
    });
}
