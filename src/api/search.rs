//! Byte pattern (AOB) and string searches over target memory.

use super::{body_str, json_body, require_debugging};
use crate::bridge::SharedBridge;
use crate::format::{format_address, format_hex};
use crate::http::{Response, Router};
use itertools::Itertools;
use serde_json::json;
use std::sync::Arc;

/// Render text as the engine's space-separated byte-pattern syntax.
/// UTF-16 variants interleave a zero byte per character.
fn string_to_pattern(text: &str, utf16: bool) -> String {
    text.bytes()
        .map(|b| {
            if utf16 {
                format!("{b:02X} 00")
            } else {
                format!("{b:02X}")
            }
        })
        .join(" ")
}

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.post("/api/search/pattern", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let pattern = body_str!(body, "pattern");
        let address = body
            .get("address")
            .and_then(|v| v.as_str())
            .unwrap_or("0")
            .to_string();
        let size = body
            .get("size")
            .and_then(|v| v.as_str())
            .unwrap_or("0")
            .to_string();

        let command = if address == "0" && size == "0" {
            // No range given, scan all mapped memory.
            format!("findall 0, {pattern}")
        } else if size == "0" {
            format!("find {address}, {pattern}")
        } else {
            format!("find {address}, {pattern}, {size}")
        };
        b.exec_command(&command);

        let first_match = b.eval("$result");
        let first_match_str = match first_match {
            0 => String::new(),
            addr => format_address(addr),
        };
        let mut data = json!({
            "pattern": pattern,
            "found": first_match != 0,
            "first_match": first_match_str,
        });
        if first_match != 0 {
            data["message"] =
                json!("Pattern found. Use 'findall' in the debugger to list every match.");
        }

        Ok(Response::ok(data))
    });

    let b = Arc::clone(bridge);
    router.post("/api/search/string", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let text = body_str!(body, "text");
        let module = body
            .get("module")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let encoding = body
            .get("encoding")
            .and_then(|v| v.as_str())
            .unwrap_or("utf8")
            .to_string();

        let utf16 = matches!(encoding.as_str(), "unicode" | "utf16");
        let pattern = string_to_pattern(&text, utf16);

        let command = if module.is_empty() {
            format!("findall 0, {pattern}")
        } else {
            let base = b.module_base(&module).unwrap_or(0);
            let size = b.eval(&format!("mod.size({module})"));
            format!("find {}, {pattern}, {}", format_address(base), format_hex(size))
        };
        b.exec_command(&command);

        let first_match = b.eval("$result");
        let first_match_str = match first_match {
            0 => String::new(),
            addr => format_address(addr),
        };
        Ok(Response::ok(json!({
            "text": text,
            "encoding": encoding,
            "pattern": pattern,
            "found": first_match != 0,
            "first_match": first_match_str,
        })))
    });
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_string_to_pattern() {
        assert_eq!(string_to_pattern("AB", false), "41 42");
        assert_eq!(string_to_pattern("AB", true), "41 00 42 00");
        assert_eq!(string_to_pattern("", false), "");
    }
}
