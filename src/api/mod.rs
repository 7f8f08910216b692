//! Route surface of the debugger API.
//!
//! One module per domain, each contributing its routes through a
//! `register(router, bridge)` function. The whole catalogue is static:
//! [`register_all`] runs once before the server starts accepting and the
//! table is read-only afterwards.
//!
//! Conventions shared by every handler: `GET` routes read query
//! parameters, `POST` routes read a JSON object body; addresses are engine
//! expressions evaluated through the bridge; 400 for client input
//! problems, 404 for absent resources, 409 for wrong run-state, 500 for
//! engine failures.

pub mod analysis;
pub mod annotations;
pub mod antidebug;
pub mod breakpoints;
pub mod command;
pub mod controlflow;
pub mod debug;
pub mod disasm;
pub mod dumping;
pub mod exceptions;
pub mod handles;
pub mod memmap;
pub mod memory;
pub mod modules;
pub mod patches;
pub mod process;
pub mod registers;
pub mod search;
pub mod stack;
pub mod symbols;
pub mod threads;
pub mod tracing;

use crate::bridge::SharedBridge;
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;

/// Early-return a 409 unless a debug session exists.
macro_rules! require_debugging {
    ($bridge:expr) => {
        if !$bridge.is_debugging() {
            return Ok($crate::http::Response::conflict("No active debug session"));
        }
    };
}

/// Early-return a 409 unless the target is paused.
macro_rules! require_paused {
    ($bridge:expr) => {
        if !$bridge.is_paused() {
            return Ok($crate::http::Response::conflict("Debugger must be paused"));
        }
    };
}

/// Parse the request body as a JSON object, early-returning a 400 on
/// malformed input.
macro_rules! json_body {
    ($req:expr) => {
        match serde_json::from_slice::<serde_json::Value>(&$req.body) {
            Ok(value) => value,
            Err(_) => return Ok($crate::http::Response::bad_request("Invalid JSON body")),
        }
    };
}

/// Required string field of a JSON body, early-returning a 400 when absent.
macro_rules! body_str {
    ($body:expr, $field:literal) => {
        match $body.get($field).and_then(|v| v.as_str()) {
            Some(value) => value.to_string(),
            None => {
                return Ok($crate::http::Response::bad_request(concat!(
                    "Missing '",
                    $field,
                    "' field"
                )))
            }
        }
    };
}

/// Required query parameter, early-returning a 400 when absent.
macro_rules! query_param {
    ($req:expr, $param:literal) => {
        match $req.query.get($param) {
            Some(value) if !value.is_empty() => value.clone(),
            _ => {
                return Ok($crate::http::Response::bad_request(concat!(
                    "Missing '",
                    $param,
                    "' query parameter"
                )))
            }
        }
    };
}

pub(crate) use {body_str, json_body, query_param, require_debugging, require_paused};

/// Register the complete route catalogue against `bridge`.
pub fn register_all(router: &mut Router, bridge: &SharedBridge) {
    router.get("/api/health", |_req| {
        Ok(Response::ok(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "plugin": env!("CARGO_PKG_NAME"),
            "status": "ok",
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/process/info", move |_req| {
        require_debugging!(b);
        let pid = b.eval("$pid");
        let peb = b.eval("peb()");
        let entry = b.eval("mod.entry(0)");
        Ok(Response::ok(json!({
            "pid": pid,
            "peb": crate::format::format_address(peb),
            "entry_point": crate::format::format_address(entry),
            "debugger_state": b.run_state().to_string(),
        })))
    });

    debug::register(router, bridge);
    registers::register(router, bridge);
    memory::register(router, bridge);
    breakpoints::register(router, bridge);
    disasm::register(router, bridge);
    modules::register(router, bridge);
    threads::register(router, bridge);
    stack::register(router, bridge);
    symbols::register(router, bridge);
    annotations::register(router, bridge);
    search::register(router, bridge);
    patches::register(router, bridge);
    memmap::register(router, bridge);
    command::register(router, bridge);
    analysis::register(router, bridge);
    controlflow::register(router, bridge);
    tracing::register(router, bridge);
    dumping::register(router, bridge);
    antidebug::register(router, bridge);
    process::register(router, bridge);
    handles::register(router, bridge);
    exceptions::register(router, bridge);

    log::info!(target: "api", "registered {} routes", router.route_count());
}
