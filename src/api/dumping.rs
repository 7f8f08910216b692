//! Module dumping and PE structure parsing from target memory.

use super::{body_str, json_body, query_param, require_debugging, require_paused};
use crate::bridge::SharedBridge;
use crate::format::{format_address, format_hex};
use crate::http::{Response, Router};
use serde_json::json;
use std::sync::Arc;

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    bytes
        .get(offset..offset + 2)
        .and_then(|b| b.try_into().ok())
        .map(u16::from_le_bytes)
        .unwrap_or(0)
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    bytes
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .unwrap_or(0)
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    bytes
        .get(offset..offset + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
        .unwrap_or(0)
}

pub fn register(router: &mut Router, bridge: &SharedBridge) {
    let b = Arc::clone(bridge);
    router.post("/api/dump/module", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let module = body_str!(body, "module");
        let file = body
            .get("file")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let Some(base) = b.module_base(&module) else {
            return Ok(Response::not_found(format!("Module not found: {module}")));
        };

        let size = b.eval(&format!("mod.size({module})"));
        let target = if file.is_empty() { ":memdump:" } else { file.as_str() };
        let command = format!(
            "savedata {target}, {}, {}",
            format_address(base),
            format_hex(size)
        );
        let success = b.exec_command(&command);

        let file_label = if file.is_empty() {
            "(prompted)".to_string()
        } else {
            file
        };
        Ok(Response::ok(json!({
            "success": success,
            "module": module,
            "base": format_address(base),
            "size": size,
            "file": file_label,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/dump/pe_header", move |req| {
        require_debugging!(b);
        let address_expr = query_param!(req, "address");
        let base = b.eval(&address_expr);

        let Ok(dos) = b.read_memory(base, 64) else {
            return Ok(Response::internal_error("Failed to read DOS header"));
        };
        if dos.len() < 64 || dos[0] != b'M' || dos[1] != b'Z' {
            return Ok(Response::bad_request("Not a valid PE file (no MZ signature)"));
        }
        let e_lfanew = read_u32(&dos, 0x3c) as u64;

        let Ok(pe) = b.read_memory(base + e_lfanew, 264) else {
            return Ok(Response::internal_error("Failed to read PE header"));
        };
        if pe.len() < 4 || pe[0] != b'P' || pe[1] != b'E' {
            return Ok(Response::bad_request("Invalid PE signature"));
        }

        // COFF header follows the 4-byte PE signature.
        let machine = read_u16(&pe, 4);
        let num_sections = read_u16(&pe, 6);
        let timestamp = read_u32(&pe, 8);
        let size_of_optional = read_u16(&pe, 20);
        let characteristics = read_u16(&pe, 22);

        let mut data = json!({
            "base": format_address(base),
            "e_lfanew": format_address(e_lfanew),
            "machine": format_address(machine.into()),
            "number_of_sections": num_sections,
            "timestamp": timestamp,
            "characteristics": format_address(characteristics.into()),
            "size_of_optional_header": size_of_optional,
        });

        // Optional header starts at offset 24.
        if pe.len() >= 28 {
            let magic = read_u16(&pe, 24);
            data["magic"] = json!(format_address(magic.into()));
            data["is_pe32plus"] = json!(magic == 0x20b);

            if magic == 0x10b && pe.len() >= 64 {
                data["address_of_entry_point"] = json!(format_address(read_u32(&pe, 40).into()));
                data["image_base"] = json!(format_address(read_u32(&pe, 52).into()));
                data["size_of_image"] = json!(read_u32(&pe, 80));
            } else if magic == 0x20b && pe.len() >= 88 {
                data["address_of_entry_point"] = json!(format_address(read_u32(&pe, 40).into()));
                data["image_base"] = json!(format_address(read_u64(&pe, 48)));
                data["size_of_image"] = json!(read_u32(&pe, 80));
            }
        }

        Ok(Response::ok(data))
    });

    let b = Arc::clone(bridge);
    router.get("/api/dump/sections", move |req| {
        require_debugging!(b);
        let module = query_param!(req, "module");

        let Some(base) = b.module_base(&module) else {
            return Ok(Response::not_found(format!("Module not found: {module}")));
        };

        let Ok(dos) = b.read_memory(base, 64) else {
            return Ok(Response::internal_error("Failed to read DOS header"));
        };
        let e_lfanew = read_u32(&dos, 0x3c) as u64;

        let Ok(pe) = b.read_memory(base + e_lfanew, 24) else {
            return Ok(Response::internal_error("Failed to read PE header"));
        };
        let num_sections = read_u16(&pe, 6) as usize;
        let optional_size = read_u16(&pe, 20) as u64;

        // Section headers sit after the COFF and optional headers,
        // IMAGE_SECTION_HEADER is 40 bytes.
        let section_offset = e_lfanew + 24 + optional_size;
        let Ok(section_data) = b.read_memory(base + section_offset, num_sections * 40) else {
            return Ok(Response::internal_error("Failed to read section headers"));
        };

        let sections: Vec<_> = section_data
            .chunks_exact(40)
            .map(|sec| {
                let name: String = sec[..8]
                    .iter()
                    .take_while(|&&c| c != 0)
                    .map(|&c| c as char)
                    .collect();
                json!({
                    "name": name,
                    "virtual_address": format_address(read_u32(sec, 12).into()),
                    "virtual_size": read_u32(sec, 8),
                    "raw_size": read_u32(sec, 16),
                    "raw_offset": format_address(read_u32(sec, 20).into()),
                    "characteristics": format_address(read_u32(sec, 36).into()),
                })
            })
            .collect();

        Ok(Response::ok(json!({
            "module": module,
            "base": format_address(base),
            "count": sections.len(),
            "sections": sections,
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/dump/imports", move |req| {
        require_debugging!(b);
        let module = query_param!(req, "module");

        let Some(base) = b.module_base(&module) else {
            return Ok(Response::not_found(format!("Module not found: {module}")));
        };

        b.exec_command(&format!("modimports {}", format_address(base)));

        Ok(Response::ok(json!({
            "module": module,
            "base": format_address(base),
            "message": "Import table displayed in the debugger references view",
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/dump/exports", move |req| {
        require_debugging!(b);
        let module = query_param!(req, "module");

        let Some(base) = b.module_base(&module) else {
            return Ok(Response::not_found(format!("Module not found: {module}")));
        };

        b.exec_command(&format!("modexports {}", format_address(base)));

        Ok(Response::ok(json!({
            "module": module,
            "base": format_address(base),
            "message": "Export table displayed in the debugger references view",
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/dump/fix_iat", move |req| {
        require_paused!(b);
        let body = json_body!(req);
        let oep = body
            .get("oep")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        if oep.is_empty() {
            return Ok(Response::bad_request("Missing 'oep' (original entry point) field"));
        }

        let success = b.exec_command(&format!("scylla iatAutoFix {oep}"));

        Ok(Response::ok(json!({
            "success": success,
            "oep": oep,
            "message": "IAT fix attempted via Scylla",
        })))
    });

    let b = Arc::clone(bridge);
    router.get("/api/dump/relocations", move |req| {
        require_debugging!(b);
        let address_expr = query_param!(req, "address");
        let address = b.eval(&address_expr);

        let relocations = b.relocations_at(address)?;
        if relocations.is_empty() {
            return Ok(Response::ok(json!({
                "address": format_address(address),
                "relocations": [],
                "count": 0,
                "message": "No relocations found or relocation data unavailable",
            })));
        }

        Ok(Response::ok(json!({
            "address": format_address(address),
            "count": relocations.len(),
            "relocations": relocations,
        })))
    });

    let b = Arc::clone(bridge);
    router.post("/api/patches/export_file", move |req| {
        require_debugging!(b);
        let body = json_body!(req);
        let filename = body_str!(body, "filename");

        match b.export_patches(&filename) {
            Ok(0) => Ok(Response::ok(json!({
                "success": false,
                "message": "No patches to export",
            }))),
            Ok(count) => Ok(Response::ok(json!({
                "success": true,
                "patch_count": count,
                "filename": filename,
            }))),
            Err(err) => Ok(Response::internal_error(err.to_string())),
        }
    });

    let b = Arc::clone(bridge);
    router.get("/api/dump/entry_point", move |req| {
        require_debugging!(b);
        let module = query_param!(req, "module");

        let Some(base) = b.module_base(&module) else {
            return Ok(Response::not_found(format!("Module not found: {module}")));
        };

        let entry = b.eval(&format!("mod.entry({module})"));

        Ok(Response::ok(json!({
            "module": module,
            "base": format_address(base),
            "entry_point": format_address(entry),
            "rva": format_address(entry.saturating_sub(base)),
        })))
    });
}
