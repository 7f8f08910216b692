//! Route-level behavior against the mock bridge, exercised through
//! `Router::dispatch` without sockets: status mapping, envelope payloads,
//! and the engine state transitions the handlers drive.

use debugport::api;
use debugport::bridge::mock::{MockBridge, ENTRY_POINT, MODULE_BASE, MODULE_NAME};
use debugport::bridge::{Bridge, RunState, SharedBridge};
use debugport::http::{Request, Response, Router};
use serde_json::{json, Value};
use std::sync::Arc;

struct Fixture {
    router: Router,
    bridge: Arc<MockBridge>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_bridge(MockBridge::new())
    }

    fn with_bridge(bridge: MockBridge) -> Self {
        let bridge = Arc::new(bridge);
        let shared: SharedBridge = bridge.clone();
        let mut router = Router::new();
        api::register_all(&mut router, &shared);
        Fixture { router, bridge }
    }

    fn get(&self, path_and_query: &str) -> Response {
        let raw = format!("GET {path_and_query} HTTP/1.1\r\n\r\n");
        self.router.dispatch(&Request::parse(raw.as_bytes()).unwrap())
    }

    fn post(&self, path: &str, body: &str) -> Response {
        let raw = format!(
            "POST {path} HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        self.router.dispatch(&Request::parse(raw.as_bytes()).unwrap())
    }
}

fn data(resp: &Response) -> Value {
    let body: Value = serde_json::from_str(&resp.body).expect("json body");
    assert_eq!(body["success"], json!(true), "expected success: {body}");
    body["data"].clone()
}

fn error_message(resp: &Response) -> String {
    let body: Value = serde_json::from_str(&resp.body).expect("json body");
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"]["code"], json!(resp.status));
    body["error"]["message"].as_str().unwrap_or_default().to_string()
}

#[test]
fn debug_state_reports_paused_location() {
    let f = Fixture::new();
    let resp = f.get("/api/debug/state");
    assert_eq!(resp.status, 200);
    let data = data(&resp);
    assert_eq!(data["state"], json!("paused"));
    assert_eq!(data["cip"], json!("0x0000000000401000"));
    assert_eq!(data["module"], json!(MODULE_NAME));
    assert_eq!(data["label"], json!("EntryPoint"));
}

#[test]
fn debug_run_then_state_reports_running() {
    let f = Fixture::new();
    assert_eq!(f.post("/api/debug/run", "{}").status, 200);
    assert_eq!(f.bridge.run_state(), RunState::Running);

    // A second run is now invalid: the target is no longer paused.
    let resp = f.post("/api/debug/run", "{}");
    assert_eq!(resp.status, 409);
    assert!(error_message(&resp).contains("paused"));

    let state = data(&f.get("/api/debug/state"));
    assert_eq!(state["state"], json!("running"));
    assert!(state.get("cip").is_none());
}

#[test]
fn debug_step_returns_new_cip() {
    let f = Fixture::new();
    let resp = f.post("/api/debug/step_into", "{}");
    assert_eq!(resp.status, 200);
    let data = data(&resp);
    assert_eq!(data["message"], json!("Stepped into"));
    assert_eq!(f.bridge.eval("cip"), ENTRY_POINT + 1);
    assert_eq!(data["cip"], json!("0x0000000000401001"));
}

#[test]
fn run_to_sets_singleshot_breakpoint_then_runs() {
    let f = Fixture::new();
    let resp = f.post("/api/debug/run_to", r#"{"address": "0x402000"}"#);
    assert_eq!(resp.status, 200);
    let journal = f.bridge.command_journal();
    assert_eq!(journal, vec!["bp 0x402000, ss".to_string(), "run".to_string()]);
}

#[test]
fn missing_body_field_is_400() {
    let f = Fixture::new();
    let resp = f.post("/api/debug/run_to", "{}");
    assert_eq!(resp.status, 400);
    assert!(error_message(&resp).contains("address"));

    let resp = f.post("/api/debug/run_to", "not json");
    assert_eq!(resp.status, 400);
}

#[test]
fn registers_roundtrip_through_mov() {
    let f = Fixture::new();
    let all = data(&f.get("/api/registers/all"));
    assert_eq!(all["rip"], json!("0x0000000000401000"));

    let resp = f.post(
        "/api/registers/set",
        r#"{"name": "rax", "value": "0xdead"}"#,
    );
    assert_eq!(resp.status, 200);
    assert_eq!(data(&resp)["value"], json!("0x000000000000DEAD"));

    let single = data(&f.get("/api/registers/get?name=rax"));
    assert_eq!(single["value"], json!("0x000000000000DEAD"));
}

#[test]
fn registers_flags_are_decoded() {
    let f = Fixture::new();
    let flags = data(&f.get("/api/registers/flags"));
    assert_eq!(flags["ZF"], json!(true));
    assert_eq!(flags["CF"], json!(false));
}

#[test]
fn memory_read_renders_hex_and_ascii() {
    let f = Fixture::new();
    let resp = f.get("/api/memory/read?address=0x400000&size=2");
    let data = data(&resp);
    assert_eq!(data["size"], json!(2));
    assert_eq!(data["hex"], json!("4D 5A"));
    assert_eq!(data["ascii"], json!("MZ"));
}

#[test]
fn memory_write_then_read_back() {
    let f = Fixture::new();
    let resp = f.post(
        "/api/memory/write",
        r#"{"address": "0x400100", "bytes": "90 90 CC"}"#,
    );
    assert_eq!(resp.status, 200);
    assert_eq!(data(&resp)["bytes_written"], json!(3));

    let read = data(&f.get("/api/memory/read?address=0x400100&size=3"));
    assert_eq!(read["hex"], json!("90 90 CC"));
}

#[test]
fn memory_read_missing_address_is_400() {
    let f = Fixture::new();
    let resp = f.get("/api/memory/read");
    assert_eq!(resp.status, 400);
    assert!(error_message(&resp).contains("address"));
}

#[test]
fn unmapped_memory_read_is_500() {
    let f = Fixture::new();
    let resp = f.get("/api/memory/read?address=0x1&size=16");
    assert_eq!(resp.status, 500);
}

#[test]
fn breakpoint_set_list_get_delete_flow() {
    let f = Fixture::new();
    assert_eq!(
        f.post("/api/breakpoints/set", r#"{"address": "0x401000"}"#).status,
        200
    );

    let list = data(&f.get("/api/breakpoints/list"));
    assert_eq!(list["count"], json!(1));
    let bp = &list["breakpoints"][0];
    assert_eq!(bp["address"], json!("0x0000000000401000"));
    assert_eq!(bp["type_name"], json!("software"));
    // Unnamed breakpoint resolves its label from the symbol store.
    assert_eq!(bp["label"], json!("EntryPoint"));

    let got = data(&f.get("/api/breakpoints/get?address=0x401000"));
    assert_eq!(got["address"], json!("0x0000000000401000"));

    assert_eq!(
        f.post("/api/breakpoints/delete", r#"{"address": "0x401000"}"#).status,
        200
    );
    let resp = f.get("/api/breakpoints/get?address=0x401000");
    assert_eq!(resp.status, 404);
    assert!(error_message(&resp).contains("0x401000"));
}

#[test]
fn breakpoint_configure_applies_all_fields() {
    let f = Fixture::new();
    let resp = f.post(
        "/api/breakpoints/configure",
        r#"{"address": "0x401000", "break_condition": "rax==1", "name": "entry_bp"}"#,
    );
    assert_eq!(resp.status, 200);

    let list = data(&f.get("/api/breakpoints/list"));
    let bp = &list["breakpoints"][0];
    assert_eq!(bp["break_condition"], json!("rax==1"));
    assert_eq!(bp["name"], json!("entry_bp"));
}

#[test]
fn breakpoint_configure_batch_reports_totals() {
    let f = Fixture::new();
    let resp = f.post(
        "/api/breakpoints/configure_batch",
        r#"{"breakpoints": [
            {"address": "0x401000"},
            {"no_address": true},
            {"address": "0x401010", "bp_type": "hardware"}
        ]}"#,
    );
    assert_eq!(resp.status, 200);
    let data = data(&resp);
    assert_eq!(data["total"], json!(3));
    assert_eq!(data["succeeded"], json!(2));
    assert_eq!(data["failed"], json!(1));
}

#[test]
fn threads_list_and_lookup() {
    let f = Fixture::new();
    let list = data(&f.get("/api/threads/list"));
    assert_eq!(list["count"], json!(2));

    let current = data(&f.get("/api/threads/current"));
    assert_eq!(current["name"], json!("main"));

    let worker = data(&f.get("/api/threads/get?id=1101"));
    assert_eq!(worker["name"], json!("worker"));

    let resp = f.get("/api/threads/get?id=9999");
    assert_eq!(resp.status, 404);
}

#[test]
fn stack_trace_resolves_labels() {
    let f = Fixture::new();
    let trace = data(&f.get("/api/stack/trace"));
    assert_eq!(trace["count"], json!(2));
    assert_eq!(trace["frames"][0]["label"], json!("EntryPoint"));
    assert_eq!(trace["frames"][1]["label"], json!("process_input"));
}

#[test]
fn modules_list_and_get() {
    let f = Fixture::new();
    let list = data(&f.get("/api/modules/list"));
    assert_eq!(list["count"], json!(1));
    assert_eq!(list["modules"][0]["name"], json!(MODULE_NAME));

    let module = data(&f.get(&format!("/api/modules/get?name={MODULE_NAME}")));
    assert_eq!(module["base"], json!("0x0000000000400000"));

    let resp = f.get("/api/modules/get?name=missing.dll");
    assert_eq!(resp.status, 404);
}

#[test]
fn annotations_roundtrip() {
    let f = Fixture::new();
    assert_eq!(
        f.post(
            "/api/labels/set",
            r#"{"address": "0x400500", "text": "decrypt_loop"}"#
        )
        .status,
        200
    );
    let label = data(&f.get("/api/labels/get?address=0x400500"));
    assert_eq!(label["label"], json!("decrypt_loop"));

    assert_eq!(
        f.post(
            "/api/comments/set",
            r#"{"address": "0x400500", "text": "xor layer"}"#
        )
        .status,
        200
    );
    let comment = data(&f.get("/api/comments/get?address=0x400500"));
    assert_eq!(comment["comment"], json!("xor layer"));
}

#[test]
fn command_eval_and_script() {
    let f = Fixture::new();
    let eval = data(&f.post(
        "/api/command/eval",
        r#"{"expression": "EntryPoint"}"#,
    ));
    assert_eq!(eval["decimal"], json!(ENTRY_POINT));

    let script = data(&f.post(
        "/api/command/script",
        r#"{"commands": ["bp 0x401000", "bpd 0x401000"]}"#,
    ));
    assert_eq!(script["total"], json!(2));
    assert_eq!(script["succeeded"], json!(2));
}

#[test]
fn search_string_builds_utf16_pattern() {
    let f = Fixture::new();
    let resp = f.post(
        "/api/search/string",
        r#"{"text": "AB", "encoding": "utf16"}"#,
    );
    assert_eq!(resp.status, 200);
    assert_eq!(data(&resp)["pattern"], json!("41 00 42 00"));
}

#[test]
fn pe_header_parses_mock_image() {
    let f = Fixture::new();
    let header = data(&f.get("/api/dump/pe_header?address=0x400000"));
    assert_eq!(header["machine"], json!("0x0000000000008664"));
    assert_eq!(header["is_pe32plus"], json!(true));
    assert_eq!(header["number_of_sections"], json!(2));
    assert_eq!(header["image_base"], json!("0x0000000000400000"));
    assert_eq!(header["address_of_entry_point"], json!("0x0000000000001000"));
}

#[test]
fn pe_sections_are_enumerated() {
    let f = Fixture::new();
    let sections = data(&f.get(&format!("/api/dump/sections?module={MODULE_NAME}")));
    assert_eq!(sections["count"], json!(2));
    assert_eq!(sections["sections"][0]["name"], json!(".text"));
    assert_eq!(sections["sections"][1]["name"], json!(".data"));
}

#[test]
fn pe_header_rejects_non_image_memory() {
    let f = Fixture::new();
    // Mapped memory without an MZ signature.
    let resp = f.get("/api/dump/pe_header?address=0x400200");
    assert_eq!(resp.status, 400);
    assert!(error_message(&resp).contains("MZ"));
}

#[test]
fn antidebug_peb_reads_being_debugged_byte() {
    let f = Fixture::new();
    // The mock PEB is not inside the mapped module, so field reads are
    // skipped, but the PEB address itself must resolve.
    let peb = data(&f.get("/api/antidebug/peb"));
    assert_eq!(peb["pid"], json!(4242));
    assert!(peb["peb_address"].as_str().unwrap().starts_with("0x"));
}

#[test]
fn memmap_list_and_at() {
    let f = Fixture::new();
    let list = data(&f.get("/api/memmap/list"));
    assert_eq!(list["count"], json!(2));
    assert_eq!(list["regions"][0]["base"], json!("0x0000000000400000"));
    assert_eq!(list["regions"][0]["protect"], json!("PAGE_EXECUTE_READ"));

    let at = data(&f.get("/api/memmap/at?address=0x400800"));
    assert_eq!(at["base"], json!("0x0000000000400000"));

    let resp = f.get("/api/memmap/at?address=0x1");
    assert_eq!(resp.status, 404);
}

#[test]
fn analysis_function_and_basic_blocks() {
    let f = Fixture::new();
    let function = data(&f.get("/api/analysis/function?address=0x402010"));
    assert_eq!(function["start"], json!("0x0000000000402000"));
    assert_eq!(function["label"], json!("process_input"));

    let resp = f.get("/api/analysis/function?address=0x401000");
    assert_eq!(resp.status, 404);

    let blocks = data(&f.get("/api/analysis/basic_blocks?address=0x402010"));
    assert!(blocks["count"].as_u64().unwrap() >= 1);
}

#[test]
fn cfg_function_returns_nodes() {
    let f = Fixture::new();
    let graph = data(&f.get("/api/cfg/function?address=0x402010"));
    assert_eq!(graph["entry_point"], json!("0x0000000000402000"));
    assert_eq!(graph["node_count"], json!(2));
}

#[test]
fn exceptions_list_codes_without_session() {
    let f = Fixture::with_bridge(MockBridge::detached());
    let codes = data(&f.get("/api/exceptions/list_codes"));
    assert_eq!(codes["count"], json!(2));
    assert_eq!(
        codes["exceptions"][0]["name"],
        json!("EXCEPTION_ACCESS_VIOLATION")
    );
}

#[test]
fn detached_bridge_maps_to_409_everywhere() {
    let f = Fixture::with_bridge(MockBridge::detached());
    for (method, path) in [
        ("GET", "/api/memory/read?address=0x400000"),
        ("GET", "/api/threads/list"),
        ("GET", "/api/registers/all"),
        ("POST", "/api/debug/step_into"),
        ("POST", "/api/breakpoints/set"),
    ] {
        let resp = match method {
            "GET" => f.get(path),
            _ => f.post(path, "{}"),
        };
        assert_eq!(resp.status, 409, "{method} {path}");
    }
}

#[test]
fn running_target_rejects_paused_only_routes() {
    let f = Fixture::new();
    f.bridge.force_run_state(RunState::Running);
    for path in [
        "/api/registers/all",
        "/api/stack/trace",
        "/api/disasm/at",
    ] {
        let resp = f.get(path);
        assert_eq!(resp.status, 409, "{path}");
    }
}

#[test]
fn process_details_and_cmdline() {
    let f = Fixture::new();
    let details = data(&f.get("/api/process/details"));
    assert_eq!(details["pid"], json!(4242));
    assert_eq!(details["debugger_state"], json!("paused"));

    let cmdline = data(&f.get("/api/process/cmdline"));
    assert!(cmdline["cmdline"].as_str().unwrap().contains(MODULE_NAME));

    let resp = f.post("/api/process/set_cmdline", r#"{"cmdline": "target.exe -x"}"#);
    assert_eq!(resp.status, 200);
    let cmdline = data(&f.get("/api/process/cmdline"));
    assert_eq!(cmdline["cmdline"], json!("target.exe -x"));
}

#[test]
fn handles_and_heaps_enumerate() {
    let f = Fixture::new();
    let handles = data(&f.get("/api/handles/list"));
    assert_eq!(handles["count"], json!(1));
    assert_eq!(handles["handles"][0]["type_name"], json!("File"));

    let heaps = data(&f.get("/api/handles/heaps"));
    assert_eq!(heaps["count"], json!(1));
}

#[test]
fn symbols_resolve_both_directions() {
    let f = Fixture::new();
    let resolved = data(&f.get("/api/symbols/resolve?name=process_input"));
    assert_eq!(resolved["address"], json!("0x0000000000402000"));

    let at = data(&f.get(&format!("/api/symbols/at?address={MODULE_BASE:#x}")));
    assert_eq!(at["module"], json!(MODULE_NAME));

    let resp = f.get("/api/symbols/resolve?name=no_such_symbol");
    assert_eq!(resp.status, 404);
}

#[test]
fn trace_record_queries() {
    let f = Fixture::new();
    let hit = data(&f.get("/api/trace/record/hitcount?address=0x401000"));
    assert_eq!(hit["hit_count"], json!(1));

    let kind = data(&f.get("/api/trace/record/type?address=0x401000"));
    assert_eq!(kind["type"], json!("InstructionHeading"));

    let resp = f.post(
        "/api/trace/record/set_type",
        r#"{"address": "0x401000", "type": 255}"#,
    );
    assert_eq!(resp.status, 400);
}

#[test]
fn patches_apply_reports_original_bytes() {
    let f = Fixture::new();
    let resp = f.post(
        "/api/patches/apply",
        r#"{"address": "0x400000", "bytes": "90 90"}"#,
    );
    assert_eq!(resp.status, 200);
    let data = data(&resp);
    assert_eq!(data["original_bytes"], json!("4D 5A"));
    assert_eq!(data["new_bytes"], json!("90 90"));
}
