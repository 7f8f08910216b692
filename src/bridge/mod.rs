//! The debugger bridge: a thread-safe façade over the underlying debugger
//! engine, consumed by every route handler.
//!
//! Handlers receive the bridge as an `Arc<dyn Bridge>` at registration time
//! so a scripted implementation can stand in for the engine in tests (see
//! [`mock::MockBridge`]). Individual queries are safe to call from any
//! connection thread concurrently; the one compound operation
//! ([`Bridge::exec_command_and_wait`]) must be atomic with respect to other
//! compound calls, which is the implementation's responsibility.

pub mod mock;

use crate::format::{serialize_address, Address};
use indexmap::IndexMap;
use serde::Serialize;
use std::time::Duration;

/// Largest memory read served in one call.
pub const MAX_READ_SIZE: usize = 10 * 1024 * 1024;

/// Default wait for a command to bring the engine into the paused state.
pub const COMMAND_WAIT_TIMEOUT: Duration = Duration::from_secs(5);
/// Longer wait for slow operations (step out can run a long tail of code).
pub const STEP_OUT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("invalid read size (must be 1 byte to 10MB)")]
    InvalidReadSize,
    #[error("no data to write")]
    EmptyWrite,
    #[error("failed to read memory at {0:#x}")]
    MemoryRead(Address),
    #[error("failed to write memory at {0:#x}")]
    MemoryWrite(Address),
    #[error("engine call failed: {0}")]
    Engine(String),
}

/// Debugger run-state as rendered on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum RunState {
    /// No debug session (the original reports this as "stopped").
    #[strum(serialize = "stopped")]
    NotAttached,
    #[strum(serialize = "running")]
    Running,
    #[strum(serialize = "paused")]
    Paused,
}

/// Breakpoint kind, matching the engine's breakpoint tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BreakpointKind {
    Software,
    Hardware,
    Memory,
    Exception,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum XrefKind {
    Call,
    Jmp,
    Data,
    Unknown,
}

/// Function marker at an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum FunctionType {
    None,
    Begin,
    Middle,
    End,
    Single,
}

/// Trace-record classification of a byte, as tracked by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::FromRepr)]
#[repr(u8)]
pub enum TraceRecordType {
    None,
    InstructionBody,
    InstructionHeading,
    InstructionTailing,
    InstructionOverlapped,
    DataByte,
    DataWord,
    DataDWord,
    DataQWord,
    DataMixed,
    InstructionDataMixed,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakpointInfo {
    #[serde(serialize_with = "serialize_address")]
    pub address: Address,
    pub enabled: bool,
    pub active: bool,
    pub singleshoot: bool,
    pub name: String,
    pub module: String,
    pub hit_count: u32,
    pub fast_resume: bool,
    pub silent: bool,
    pub break_condition: String,
    pub log_text: String,
    pub log_condition: String,
    pub command_text: String,
    pub command_condition: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadInfo {
    pub number: i32,
    pub id: u32,
    #[serde(serialize_with = "serialize_address")]
    pub entry: Address,
    #[serde(serialize_with = "serialize_address")]
    pub teb: Address,
    #[serde(serialize_with = "serialize_address")]
    pub cip: Address,
    pub suspend_count: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadList {
    pub current_thread: i32,
    pub threads: Vec<ThreadInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemRegion {
    #[serde(serialize_with = "serialize_address")]
    pub base: Address,
    #[serde(serialize_with = "serialize_address")]
    pub allocation_base: Address,
    pub size: u64,
    pub state: String,
    pub protect: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub info: String,
}

/// Ordered register file snapshot. The map iteration order is the
/// architectural presentation order.
#[derive(Debug, Clone)]
pub struct RegisterDump {
    pub gpr: IndexMap<String, Address>,
    pub eflags: u64,
    pub flags: EflagsBits,
    pub segments: IndexMap<String, u16>,
    pub debug: IndexMap<String, Address>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EflagsBits {
    pub c: bool,
    pub p: bool,
    pub a: bool,
    pub z: bool,
    pub s: bool,
    pub t: bool,
    pub i: bool,
    pub d: bool,
    pub o: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Instruction {
    #[serde(serialize_with = "serialize_address")]
    pub address: Address,
    pub size: usize,
    pub text: String,
}

/// Fast single-instruction info.
#[derive(Debug, Clone, Serialize)]
pub struct InstructionInfo {
    #[serde(serialize_with = "serialize_address")]
    pub address: Address,
    pub size: usize,
    pub text: String,
    pub is_branch: bool,
    pub is_call: bool,
    #[serde(serialize_with = "serialize_address")]
    pub branch_destination: Address,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FunctionBounds {
    #[serde(serialize_with = "serialize_address")]
    pub start: Address,
    #[serde(serialize_with = "serialize_address")]
    pub end: Address,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StackFrame {
    #[serde(serialize_with = "serialize_address")]
    pub address: Address,
    #[serde(serialize_with = "serialize_address")]
    pub from: Address,
    #[serde(serialize_with = "serialize_address")]
    pub to: Address,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SehRecord {
    #[serde(serialize_with = "serialize_address")]
    pub address: Address,
    #[serde(serialize_with = "serialize_address")]
    pub handler: Address,
}

#[derive(Debug, Clone, Serialize)]
pub struct HandleRecord {
    #[serde(serialize_with = "serialize_address")]
    pub handle: Address,
    pub type_number: u32,
    #[serde(serialize_with = "serialize_address")]
    pub granted_access: Address,
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TcpConnectionRecord {
    pub remote_address: String,
    pub remote_port: u16,
    pub local_address: String,
    pub local_port: u16,
    pub state_text: String,
    pub state: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowRecord {
    #[serde(serialize_with = "serialize_address")]
    pub handle: Address,
    #[serde(serialize_with = "serialize_address")]
    pub parent: Address,
    pub thread_id: u32,
    #[serde(serialize_with = "serialize_address")]
    pub wnd_proc: Address,
    pub enabled: bool,
    pub title: String,
    pub class_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeapRecord {
    #[serde(serialize_with = "serialize_address")]
    pub address: Address,
    pub size: u64,
    #[serde(serialize_with = "serialize_address")]
    pub flags: Address,
}

#[derive(Debug, Clone, Serialize)]
pub struct XrefRecord {
    #[serde(serialize_with = "serialize_address")]
    pub address: Address,
    #[serde(serialize_with = "strum_serialize")]
    #[serde(rename = "type")]
    pub kind: XrefKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExceptionCode {
    pub name: String,
    #[serde(serialize_with = "serialize_address")]
    pub value: Address,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelocationRecord {
    #[serde(serialize_with = "serialize_address")]
    pub rva: Address,
    #[serde(rename = "type")]
    pub kind: u8,
    pub size: u8,
}

/// One basic block of a control flow graph.
#[derive(Debug, Clone, Serialize)]
pub struct CfgNode {
    #[serde(serialize_with = "serialize_address")]
    pub start: Address,
    #[serde(serialize_with = "serialize_address")]
    pub end: Address,
    #[serde(serialize_with = "serialize_address")]
    pub brtrue: Address,
    #[serde(serialize_with = "serialize_address")]
    pub brfalse: Address,
    pub terminal: bool,
    pub split: bool,
    pub indirectcall: bool,
    pub exits: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CfGraph {
    #[serde(serialize_with = "serialize_address")]
    pub entry_point: Address,
    pub nodes: Vec<CfgNode>,
}

fn strum_serialize<T: std::fmt::Display, S: serde::Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

/// Thread-safe façade over the debugger engine.
///
/// Every method is a synchronous, possibly slow, engine call; a blocked
/// call blocks only the connection thread that issued it.
pub trait Bridge: Send + Sync {
    // ------------------------------- state -----------------------------------
    fn run_state(&self) -> RunState;

    /// A debug session exists (target running or paused).
    fn is_debugging(&self) -> bool {
        self.run_state() != RunState::NotAttached
    }

    /// Target is attached and paused at an instruction.
    fn is_paused(&self) -> bool {
        self.run_state() == RunState::Paused
    }

    // ----------------------------- commands ----------------------------------
    /// Execute a textual engine command. The command dialect passes through
    /// this crate opaquely.
    fn exec_command(&self, cmd: &str) -> bool;

    /// Execute a command without waiting for completion (traces, animations).
    fn exec_command_async(&self, cmd: &str) -> bool;

    /// Execute a command, then block until the engine reports the paused
    /// state or the timeout elapses. Compound-atomic: two concurrent calls
    /// must not interleave their command-then-wait sequences. A timeout
    /// stops the wait but cannot cancel the engine command.
    fn exec_command_and_wait(&self, cmd: &str, timeout: Duration) -> bool;

    // ---------------------------- expressions --------------------------------
    /// Evaluate an engine expression to an address-sized integer; 0 when
    /// the expression does not resolve.
    fn eval(&self, expr: &str) -> Address;

    fn is_valid_expression(&self, expr: &str) -> bool;

    // ------------------------------ memory -----------------------------------
    fn read_memory(&self, address: Address, size: usize) -> Result<Vec<u8>, BridgeError>;

    fn write_memory(&self, address: Address, data: &[u8]) -> Result<(), BridgeError>;

    fn is_valid_read_ptr(&self, address: Address) -> bool;

    /// Base and size of the memory region containing `address`, if mapped.
    fn region_at(&self, address: Address) -> Option<(Address, u64)>;

    fn memory_map(&self) -> Result<Vec<MemRegion>, BridgeError>;

    // ----------------------------- registers ---------------------------------
    fn register_dump(&self) -> Result<RegisterDump, BridgeError>;

    /// Extended dump including AVX-512 state; fails when unsupported.
    fn avx512_register_dump(&self) -> Result<RegisterDump, BridgeError>;

    // ---------------------------- breakpoints --------------------------------
    fn breakpoint_list(&self, kind: BreakpointKind) -> Result<Vec<BreakpointInfo>, BridgeError>;

    // ------------------------------ threads ----------------------------------
    fn thread_list(&self) -> Result<ThreadList, BridgeError>;

    fn teb_address(&self, tid: u32) -> Address;

    fn thread_name(&self, tid: u32) -> Option<String>;

    // ---------------------------- annotations --------------------------------
    fn label_at(&self, address: Address) -> Option<String>;

    fn set_label_at(&self, address: Address, text: &str) -> bool;

    fn comment_at(&self, address: Address) -> Option<String>;

    fn set_comment_at(&self, address: Address, text: &str) -> bool;

    fn set_bookmark_at(&self, address: Address, set: bool) -> bool;

    // ------------------------------ modules ----------------------------------
    fn module_base(&self, name: &str) -> Option<Address>;

    fn module_at(&self, address: Address) -> Option<String>;

    // ----------------------------- disassembly -------------------------------
    fn disassemble_at(&self, address: Address, count: usize)
        -> Result<Vec<Instruction>, BridgeError>;

    fn instruction_at(&self, address: Address) -> Result<InstructionInfo, BridgeError>;

    // ------------------------------ analysis ---------------------------------
    fn function_bounds(&self, address: Address) -> Option<FunctionBounds>;

    fn analyze_function(&self, address: Address) -> Option<CfGraph>;

    fn branch_destination(&self, address: Address) -> Address;

    fn is_jump_taken(&self, address: Address) -> bool;

    fn function_type_at(&self, address: Address) -> FunctionType;

    /// Loop bounds at nesting `depth` around `address`, if inside a loop.
    fn loop_bounds(&self, depth: u32, address: Address) -> Option<(Address, Address)>;

    fn xrefs_at(&self, address: Address) -> Result<Vec<XrefRecord>, BridgeError>;

    // ------------------------------- stack -----------------------------------
    fn call_stack(&self) -> Result<Vec<StackFrame>, BridgeError>;

    fn seh_chain(&self) -> Result<Vec<SehRecord>, BridgeError>;

    // ------------------------------ tracing ----------------------------------
    fn trace_hit_count(&self, address: Address) -> u64;

    fn trace_record_type(&self, address: Address) -> TraceRecordType;

    fn set_trace_record_type(&self, address: Address, kind: TraceRecordType) -> bool;

    fn animate_command(&self, cmd: &str) -> bool;

    // ------------------------------ process ----------------------------------
    fn peb_address(&self, pid: u32) -> Address;

    fn cmdline(&self) -> Result<String, BridgeError>;

    fn set_cmdline(&self, cmdline: &str) -> bool;

    fn is_elevated(&self) -> bool;

    fn is_dep_enabled(&self) -> bool;

    fn debugger_version(&self) -> i32;

    // ------------------------------ handles ----------------------------------
    fn handles(&self) -> Result<Vec<HandleRecord>, BridgeError>;

    fn handle_name(&self, handle: Address) -> Option<(String, String)>;

    fn tcp_connections(&self) -> Result<Vec<TcpConnectionRecord>, BridgeError>;

    fn windows(&self) -> Result<Vec<WindowRecord>, BridgeError>;

    fn heaps(&self) -> Result<Vec<HeapRecord>, BridgeError>;

    // ----------------------------- exceptions --------------------------------
    fn exception_codes(&self) -> Vec<ExceptionCode>;

    // ------------------------------ patching ---------------------------------
    fn relocations_at(&self, address: Address) -> Result<Vec<RelocationRecord>, BridgeError>;

    /// Export all applied patches into `file`, returning how many were
    /// written.
    fn export_patches(&self, file: &str) -> Result<usize, BridgeError>;
}

/// Shared bridge handle as passed to route registration.
pub type SharedBridge = std::sync::Arc<dyn Bridge>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_run_state_wire_tokens() {
        assert_eq!(RunState::NotAttached.to_string(), "stopped");
        assert_eq!(RunState::Running.to_string(), "running");
        assert_eq!(RunState::Paused.to_string(), "paused");
    }

    #[test]
    fn test_record_serialization_addresses_are_hex() {
        let bp = BreakpointInfo {
            address: 0x401000,
            enabled: true,
            active: true,
            singleshoot: false,
            name: String::new(),
            module: "target.exe".to_string(),
            hit_count: 2,
            fast_resume: false,
            silent: false,
            break_condition: String::new(),
            log_text: String::new(),
            log_condition: String::new(),
            command_text: String::new(),
            command_condition: String::new(),
        };
        let value = serde_json::to_value(&bp).unwrap();
        assert_eq!(value["address"], serde_json::json!("0x0000000000401000"));
        assert_eq!(value["hit_count"], serde_json::json!(2));
    }

    #[test]
    fn test_xref_kind_serialization() {
        let xref = XrefRecord {
            address: 0x10,
            kind: XrefKind::Call,
        };
        let value = serde_json::to_value(&xref).unwrap();
        assert_eq!(value["type"], serde_json::json!("call"));
    }
}
