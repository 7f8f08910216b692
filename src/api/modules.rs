//! Loaded module enumeration and lookup.

use super::{query_param, require_debugging};
use crate::bridge::SharedBridge;
use crate::format::format_address;
use crate::http::{Response, Router};
use indexmap::IndexMap;
use serde_json::json;
use std::sync::Arc;

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.get("/api/modules/list", move |_req| {
        require_debugging!(b);

        // The engine has no direct module list; derive one from the memory
        // map, deduplicated by module name.
        let mut modules: IndexMap<String, serde_json::Value> = IndexMap::new();
        for region in b.memory_map()? {
            if region.info.is_empty() {
                continue;
            }
            let Some(name) = b.module_at(region.base) else {
                continue;
            };
            if modules.contains_key(&name) {
                continue;
            }
            let base = b.module_base(&name).unwrap_or(region.base);
            let size = b.eval(&format!("mod.size({name})"));
            let entry = b.eval(&format!("mod.entry({name})"));
            modules.insert(
                name.clone(),
                json!({
                    "name": name,
                    "base": format_address(base),
                    "size": size,
                    "entry": format_address(entry),
                }),
            );
        }

        let list: Vec<_> = modules.into_values().collect();
        Ok(Response::ok(json!({
            "count": list.len(),
            "modules": list,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/modules/get", move |req| {
        require_debugging!(b);
        let name = query_param!(req, "name");

        let Some(base) = b.module_base(&name) else {
            return Ok(Response::not_found(format!("Module not found: {name}")));
        };

        let size = b.eval(&format!("mod.size({name})"));
        let entry = b.eval(&format!("mod.entry({name})"));
        let party = b.eval(&format!("mod.party({name})"));

        Ok(Response::ok(json!({
            "name": name,
            "base": format_address(base),
            "size": size,
            "entry": format_address(entry),
            // 0 = user module, 1 = system module
            "party": party,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/modules/base", move |req| {
        require_debugging!(b);
        let name = query_param!(req, "name");

        let Some(base) = b.module_base(&name) else {
            return Ok(Response::not_found(format!("Module not found: {name}")));
        };

        Ok(Response::ok(json!({
            "name": name,
            "base": format_address(base),
        })))
    });
}
