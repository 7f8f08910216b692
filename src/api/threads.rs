//! Thread enumeration and per-thread control.

use super::{json_body, query_param, require_debugging, require_paused};
use crate::bridge::SharedBridge;
use crate::format::format_address;
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.get("/api/threads/list", move |_req| {
        require_debugging!(b);
        let list = b.thread_list()?;
        Ok(Response::ok(json!({
            "count": list.threads.len(),
            "current_thread": list.current_thread,
            "threads": list.threads,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/threads/current", move |_req| {
        require_debugging!(b);
        let list = b.thread_list()?;
        let current = list
            .threads
            .iter()
            .find(|t| t.number == list.current_thread)
            .or_else(|| list.threads.first());
        match current {
            Some(thread) => Ok(Response::ok(serde_json::to_value(thread)?)),
            None => Ok(Response::not_found("No current thread")),
        }
    });

    let b = Arc::clone(bridge);
    router.get("/api/threads/get", move |req| {
        require_debugging!(b);
        let id_str = query_param!(req, "id");
        let Ok(tid) = id_str.parse::<u32>() else {
            return Ok(Response::bad_request("Invalid 'id' query parameter"));
        };

        let list = b.thread_list()?;
        match list.threads.iter().find(|t| t.id == tid) {
            Some(thread) => Ok(Response::ok(serde_json::to_value(thread)?)),
            None => Ok(Response::not_found(format!("Thread not found: {id_str}"))),
        }
    });

    let b = Arc::clone(bridge);
    router.post("/api/threads/switch", move |req| {
        require_paused!(b);
        let body = json_body!(req);
        let Some(tid) = body.get("id").and_then(|v| v.as_u64()) else {
            return Ok(Response::bad_request("Missing 'id' field"));
        };
        b.exec_command(&format!("switchthread {tid}"));
        Ok(Response::ok(json!({
            "switched_to": tid,
            "message": format!("Switched to thread {tid}"),
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/threads/suspend", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let Some(tid) = body.get("id").and_then(|v| v.as_u64()) else {
            return Ok(Response::bad_request("Missing 'id' field"));
        };
        b.exec_command(&format!("suspendthread {tid}"));
        Ok(Response::ok(json!({ "id": tid, "suspended": true })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/threads/resume", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let Some(tid) = body.get("id").and_then(|v| v.as_u64()) else {
            return Ok(Response::bad_request("Missing 'id' field"));
        };
        b.exec_command(&format!("resumethread {tid}"));
        Ok(Response::ok(json!({ "id": tid, "resumed": true })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/threads/count", move |_req| {
        require_debugging!(b);
        let list = b.thread_list()?;
        Ok(Response::ok(json!({ "count": list.threads.len() })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/threads/teb", move |req| {
        require_debugging!(b);
        let tid_str = query_param!(req, "tid");
        let Ok(tid) = tid_str.parse::<u32>() else {
            return Ok(Response::bad_request("Invalid 'tid' query parameter"));
        };

        let teb = b.teb_address(tid);
        Ok(Response::ok(json!({
            "tid": tid,
            "teb": format_address(teb),
            "found": teb != 0,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/threads/name", move |req| {
        require_debugging!(b);
        let tid_str = query_param!(req, "tid");
        let Ok(tid) = tid_str.parse::<u32>() else {
            return Ok(Response::bad_request("Invalid 'tid' query parameter"));
        };

        let name = b.thread_name(tid);
        Ok(Response::ok(json!({
            "tid": tid,
            "name": name.clone().unwrap_or_default(),
            "found": name.is_some(),
        })))
    });
}
