//! Register file access: full dumps, single registers, decoded flags.

use super::{body_str, json_body, query_param, require_paused};
use crate::bridge::{RegisterDump, SharedBridge};
use crate::format::format_address;
use crate::http::{Response, Router};
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn dump_to_json(dump: &RegisterDump) -> Value {
    let mut regs = Map::new();
    for (name, value) in &dump.gpr {
        regs.insert(name.clone(), json!(format_address(*value)));
    }
    regs.insert("eflags".to_string(), json!(format_address(dump.eflags)));
    for (name, value) in &dump.segments {
        regs.insert(name.clone(), json!(value));
    }
    for (name, value) in &dump.debug {
        regs.insert(name.clone(), json!(format_address(*value)));
    }
    Value::Object(regs)
}

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.get("/api/registers/all", move |_req| {
        require_paused!(b);
        let dump = b.register_dump()?;
        Ok(Response::ok(dump_to_json(&dump)))
    });

    let b = Arc::clone(bridge);
    router.get("/api/registers/get", move |req| {
        require_paused!(b);
        let name = query_param!(req, "name");
        if !b.is_valid_expression(&name) {
            return Ok(Response::bad_request(format!("Invalid register name: {name}")));
        }
        let value = b.eval(&name);
        Ok(Response::ok(json!({
            "name": name,
            "value": format_address(value),
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/registers/set", move |req| {
        require_paused!(b);
        let body = json_body!(req);
        let name = body_str!(body, "name");
        let value = body_str!(body, "value");

        if !b.exec_command(&format!("mov {name}, {value}")) {
            return Ok(Response::internal_error(format!("Failed to set register {name}")));
        }

        let new_value = b.eval(&name);
        Ok(Response::ok(json!({
            "name": name,
            "value": format_address(new_value),
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/registers/flags", move |_req| {
        require_paused!(b);
        let dump = b.register_dump()?;
        let flags = dump.flags;
        Ok(Response::ok(json!({
            "CF": flags.c,
            "PF": flags.p,
            "AF": flags.a,
            "ZF": flags.z,
            "SF": flags.s,
            "TF": flags.t,
            "IF": flags.i,
            "DF": flags.d,
            "OF": flags.o,
            "eflags": format_address(dump.eflags),
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/registers/avx512", move |_req| {
        require_paused!(b);
        let dump = match b.avx512_register_dump() {
            Ok(dump) => dump,
            Err(err) => return Ok(Response::internal_error(err.to_string())),
        };
        let mut data = dump_to_json(&dump);
        data["avx512_supported"] = json!(true);
        Ok(Response::ok(data))
    });
}
