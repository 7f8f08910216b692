//! User annotations: labels, comments, bookmarks.

use super::{body_str, json_body, query_param, require_debugging};
use crate::bridge::SharedBridge;
use crate::format::format_address;
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.get("/api/labels/get", move |req| {
        require_debugging!(b);
        let address_expr = query_param!(req, "address");
        let address = b.eval(&address_expr);
        Ok(Response::ok(json!({
            "address": format_address(address),
            "label": b.label_at(address).unwrap_or_default(),
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/labels/set", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let address = b.eval(&body_str!(body, "address"));
        let text = body_str!(body, "text");

        if !b.set_label_at(address, &text) {
            return Ok(Response::internal_error("Failed to set label"));
        }

        Ok(Response::ok(json!({
            "address": format_address(address),
            "label": text,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/comments/get", move |req| {
        require_debugging!(b);
        let address_expr = query_param!(req, "address");
        let address = b.eval(&address_expr);
        Ok(Response::ok(json!({
            "address": format_address(address),
            "comment": b.comment_at(address).unwrap_or_default(),
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/comments/set", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let address = b.eval(&body_str!(body, "address"));
        let text = body_str!(body, "text");

        if !b.set_comment_at(address, &text) {
            return Ok(Response::internal_error("Failed to set comment"));
        }

        Ok(Response::ok(json!({
            "address": format_address(address),
            "comment": text,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/bookmarks/set", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let address = b.eval(&body_str!(body, "address"));
        let set = body.get("set").and_then(|v| v.as_bool()).unwrap_or(true);

        if !b.set_bookmark_at(address, set) {
            return Ok(Response::internal_error("Failed to set bookmark"));
        }

        Ok(Response::ok(json!({
            "address": format_address(address),
            "bookmarked": set,
        })))
    });
}
