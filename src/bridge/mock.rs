//! Scripted in-process [`Bridge`] implementation.
//!
//! Simulates a small paused target: one module mapped at `0x400000` with an
//! MZ/PE image, a register file, two threads, and annotation stores. The
//! command verbs the route handlers actually emit (`run`, `pause`, `bp`,
//! `bc`, `bpe`, `bpd`, the step commands, `mov reg, value`) mutate this
//! state; everything else is journaled as executed. Backs the development
//! binary and the integration tests.

use super::*;
use crate::format::{parse_address, Address};
use indexmap::IndexMap;
use std::sync::Mutex;
use std::time::Duration;

pub const MODULE_NAME: &str = "target.exe";
pub const MODULE_BASE: Address = 0x0040_0000;
pub const MODULE_SIZE: u64 = 0x1_0000;
pub const ENTRY_POINT: Address = MODULE_BASE + 0x1000;
pub const PID: Address = 4242;
pub const MAIN_TID: u32 = 1100;
pub const WORKER_TID: u32 = 1101;
const PEB_ADDRESS: Address = 0x7ffd_f000;
const TEB_ADDRESS: Address = 0x7ffd_e000;
const STACK_BASE: Address = 0x0014_0000;

struct MockState {
    run_state: RunState,
    cip: Address,
    memory: Vec<u8>,
    registers: IndexMap<String, Address>,
    breakpoints: Vec<(BreakpointKind, BreakpointInfo)>,
    labels: IndexMap<Address, String>,
    comments: IndexMap<Address, String>,
    bookmarks: Vec<Address>,
    cmdline: String,
    commands: Vec<String>,
}

/// Scripted bridge over a fake target. All state sits behind one mutex;
/// `exec_command_and_wait` holds it across the command and the wait, which
/// gives the compound-atomicity the trait demands.
pub struct MockBridge {
    state: Mutex<MockState>,
}

impl Default for MockBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBridge {
    /// A paused session at the module entry point.
    pub fn new() -> Self {
        let mut memory = vec![0u8; MODULE_SIZE as usize];
        write_pe_image(&mut memory);

        let mut registers = IndexMap::new();
        for (name, value) in [
            ("rax", 0x1),
            ("rcx", 0x2),
            ("rdx", 0x3),
            ("rbx", 0x4),
            ("rsp", STACK_BASE),
            ("rbp", STACK_BASE + 0x40),
            ("rsi", 0x5),
            ("rdi", 0x6),
            ("r8", 0x0),
            ("r9", 0x0),
            ("r10", 0x0),
            ("r11", 0x0),
            ("r12", 0x0),
            ("r13", 0x0),
            ("r14", 0x0),
            ("r15", 0x0),
            ("rip", ENTRY_POINT),
        ] {
            registers.insert(name.to_string(), value);
        }

        let mut labels = IndexMap::new();
        labels.insert(ENTRY_POINT, "EntryPoint".to_string());
        labels.insert(MODULE_BASE + 0x2000, "process_input".to_string());

        MockBridge {
            state: Mutex::new(MockState {
                run_state: RunState::Paused,
                cip: ENTRY_POINT,
                memory,
                registers,
                breakpoints: Vec::new(),
                labels,
                comments: IndexMap::new(),
                bookmarks: Vec::new(),
                cmdline: format!("C:\\samples\\{MODULE_NAME} --demo"),
                commands: Vec::new(),
            }),
        }
    }

    /// A bridge with no debug session, for wrong-run-state tests.
    pub fn detached() -> Self {
        let bridge = Self::new();
        bridge.state.lock().unwrap().run_state = RunState::NotAttached;
        bridge
    }

    /// Put the fake target into `state` directly (test setup).
    pub fn force_run_state(&self, state: RunState) {
        self.state.lock().unwrap().run_state = state;
    }

    /// Commands executed so far, in order.
    pub fn command_journal(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    fn eval_locked(state: &MockState, expr: &str) -> Address {
        let expr = expr.trim();
        match expr {
            "cip" | "rip" => state.cip,
            "csp" | "rsp" => *state.registers.get("rsp").unwrap_or(&0),
            "cbp" | "rbp" => *state.registers.get("rbp").unwrap_or(&0),
            "$pid" => PID,
            "$tid" => MAIN_TID as Address,
            "peb()" => PEB_ADDRESS,
            "teb()" => TEB_ADDRESS,
            "$result" => 0,
            _ => {
                if let Some(value) = state.registers.get(expr) {
                    return *value;
                }
                if let Some((_, label)) = expr.split_once('.') {
                    // mod.size(x) / mod.entry(x) / mod.party(x)
                    if let Some(inner) = label
                        .strip_prefix("size(")
                        .and_then(|s| s.strip_suffix(')'))
                    {
                        return if known_module(inner) { MODULE_SIZE } else { 0 };
                    }
                    if let Some(inner) = label
                        .strip_prefix("entry(")
                        .and_then(|s| s.strip_suffix(')'))
                    {
                        return if known_module(inner) { ENTRY_POINT } else { 0 };
                    }
                    if label.starts_with("party(") {
                        return 0;
                    }
                }
                if let Some((name, _)) = state.labels.iter().find(|(_, l)| l.as_str() == expr) {
                    return *name;
                }
                parse_address(expr)
                    .or_else(|| expr.parse::<Address>().ok())
                    .unwrap_or(0)
            }
        }
    }

    fn apply_command(state: &mut MockState, cmd: &str) {
        let (verb, rest) = cmd.split_once(' ').unwrap_or((cmd, ""));
        match verb {
            "run" => state.run_state = RunState::Running,
            "pause" => state.run_state = RunState::Paused,
            "stop" => state.run_state = RunState::NotAttached,
            "StepInto" | "StepOver" | "StepOut" => {
                // Steps complete immediately on the fake target.
                state.cip += 1;
                state.registers.insert("rip".to_string(), state.cip);
                state.run_state = RunState::Paused;
            }
            "bp" => {
                let (addr_expr, flags) = rest.split_once(',').unwrap_or((rest, ""));
                let address = Self::eval_locked(state, addr_expr);
                let singleshoot = flags.trim() == "ss";
                state
                    .breakpoints
                    .push((BreakpointKind::Software, blank_breakpoint(address, singleshoot)));
            }
            "bphws" => {
                let address = Self::eval_locked(state, rest.split(',').next().unwrap_or(""));
                state
                    .breakpoints
                    .push((BreakpointKind::Hardware, blank_breakpoint(address, false)));
            }
            "bpm" => {
                let address = Self::eval_locked(state, rest.split(',').next().unwrap_or(""));
                state
                    .breakpoints
                    .push((BreakpointKind::Memory, blank_breakpoint(address, false)));
            }
            "bc" | "bphwc" | "bpmc" => {
                let address = Self::eval_locked(state, rest);
                state.breakpoints.retain(|(_, bp)| bp.address != address);
            }
            "bpe" | "bpd" => {
                let address = Self::eval_locked(state, rest);
                let enabled = verb == "bpe";
                for (_, bp) in &mut state.breakpoints {
                    if bp.address == address {
                        bp.enabled = enabled;
                    }
                }
            }
            "mov" => {
                if let Some((reg, value)) = rest.split_once(',') {
                    let value = Self::eval_locked(state, value.trim());
                    let reg = reg.trim().to_string();
                    if reg == "rip" {
                        state.cip = value;
                    }
                    state.registers.insert(reg, value);
                }
            }
            "SetBreakpointCondition" => {
                if let Some((addr_expr, cond)) = rest.split_once(',') {
                    let address = Self::eval_locked(state, addr_expr.trim());
                    for (_, bp) in &mut state.breakpoints {
                        if bp.address == address {
                            bp.break_condition = cond.trim().trim_matches('"').to_string();
                        }
                    }
                }
            }
            "SetBreakpointName" => {
                if let Some((addr_expr, name)) = rest.split_once(',') {
                    let address = Self::eval_locked(state, addr_expr.trim());
                    for (_, bp) in &mut state.breakpoints {
                        if bp.address == address {
                            bp.name = name.trim().trim_matches('"').to_string();
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn memory_slice(state: &MockState, address: Address, size: usize) -> Option<&[u8]> {
        let start = address.checked_sub(MODULE_BASE)? as usize;
        let end = start.checked_add(size)?;
        state.memory.get(start..end)
    }
}

impl Bridge for MockBridge {
    fn run_state(&self) -> RunState {
        self.state.lock().unwrap().run_state
    }

    fn exec_command(&self, cmd: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        state.commands.push(cmd.to_string());
        Self::apply_command(&mut state, cmd);
        true
    }

    fn exec_command_async(&self, cmd: &str) -> bool {
        self.exec_command(cmd)
    }

    fn exec_command_and_wait(&self, cmd: &str, _timeout: Duration) -> bool {
        // One lock across command + wait keeps the compound atomic. The
        // fake target transitions instantly, so the wait is a state check.
        let mut state = self.state.lock().unwrap();
        state.commands.push(cmd.to_string());
        Self::apply_command(&mut state, cmd);
        state.run_state == RunState::Paused
    }

    fn eval(&self, expr: &str) -> Address {
        let state = self.state.lock().unwrap();
        Self::eval_locked(&state, expr)
    }

    fn is_valid_expression(&self, expr: &str) -> bool {
        self.eval(expr) != 0 || parse_address(expr) == Some(0)
    }

    fn read_memory(&self, address: Address, size: usize) -> Result<Vec<u8>, BridgeError> {
        if size == 0 || size > MAX_READ_SIZE {
            return Err(BridgeError::InvalidReadSize);
        }
        let state = self.state.lock().unwrap();
        Self::memory_slice(&state, address, size)
            .map(|bytes| bytes.to_vec())
            .ok_or(BridgeError::MemoryRead(address))
    }

    fn write_memory(&self, address: Address, data: &[u8]) -> Result<(), BridgeError> {
        if data.is_empty() {
            return Err(BridgeError::EmptyWrite);
        }
        let mut state = self.state.lock().unwrap();
        let start = address
            .checked_sub(MODULE_BASE)
            .ok_or(BridgeError::MemoryWrite(address))? as usize;
        let end = start
            .checked_add(data.len())
            .filter(|&end| end <= state.memory.len())
            .ok_or(BridgeError::MemoryWrite(address))?;
        state.memory[start..end].copy_from_slice(data);
        Ok(())
    }

    fn is_valid_read_ptr(&self, address: Address) -> bool {
        (MODULE_BASE..MODULE_BASE + MODULE_SIZE).contains(&address)
    }

    fn region_at(&self, address: Address) -> Option<(Address, u64)> {
        self.is_valid_read_ptr(address)
            .then_some((MODULE_BASE, MODULE_SIZE))
    }

    fn memory_map(&self) -> Result<Vec<MemRegion>, BridgeError> {
        Ok(vec![
            MemRegion {
                base: MODULE_BASE,
                allocation_base: MODULE_BASE,
                size: MODULE_SIZE,
                state: "MEM_COMMIT".to_string(),
                protect: "PAGE_EXECUTE_READ".to_string(),
                kind: "MEM_IMAGE".to_string(),
                info: MODULE_NAME.to_string(),
            },
            MemRegion {
                base: STACK_BASE,
                allocation_base: STACK_BASE,
                size: 0x20000,
                state: "MEM_COMMIT".to_string(),
                protect: "PAGE_READWRITE".to_string(),
                kind: "MEM_PRIVATE".to_string(),
                info: "stack".to_string(),
            },
        ])
    }

    fn register_dump(&self) -> Result<RegisterDump, BridgeError> {
        let state = self.state.lock().unwrap();
        let mut segments = IndexMap::new();
        for (name, value) in [("cs", 0x33u16), ("ds", 0x2b), ("es", 0x2b), ("fs", 0x53), ("gs", 0x2b), ("ss", 0x2b)] {
            segments.insert(name.to_string(), value);
        }
        let mut debug = IndexMap::new();
        for name in ["dr0", "dr1", "dr2", "dr3", "dr6", "dr7"] {
            debug.insert(name.to_string(), 0);
        }
        Ok(RegisterDump {
            gpr: state.registers.clone(),
            eflags: 0x246,
            flags: EflagsBits {
                c: false,
                p: true,
                a: false,
                z: true,
                s: false,
                t: false,
                i: true,
                d: false,
                o: false,
            },
            segments,
            debug,
        })
    }

    fn avx512_register_dump(&self) -> Result<RegisterDump, BridgeError> {
        Err(BridgeError::Engine(
            "AVX-512 register dump not supported".to_string(),
        ))
    }

    fn breakpoint_list(&self, kind: BreakpointKind) -> Result<Vec<BreakpointInfo>, BridgeError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .breakpoints
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, bp)| bp.clone())
            .collect())
    }

    fn thread_list(&self) -> Result<ThreadList, BridgeError> {
        let state = self.state.lock().unwrap();
        Ok(ThreadList {
            current_thread: 0,
            threads: vec![
                ThreadInfo {
                    number: 0,
                    id: MAIN_TID,
                    entry: ENTRY_POINT,
                    teb: TEB_ADDRESS,
                    cip: state.cip,
                    suspend_count: 0,
                    name: "main".to_string(),
                },
                ThreadInfo {
                    number: 1,
                    id: WORKER_TID,
                    entry: MODULE_BASE + 0x2000,
                    teb: TEB_ADDRESS + 0x1000,
                    cip: MODULE_BASE + 0x2010,
                    suspend_count: 0,
                    name: "worker".to_string(),
                },
            ],
        })
    }

    fn teb_address(&self, tid: u32) -> Address {
        match tid {
            MAIN_TID => TEB_ADDRESS,
            WORKER_TID => TEB_ADDRESS + 0x1000,
            _ => 0,
        }
    }

    fn thread_name(&self, tid: u32) -> Option<String> {
        match tid {
            MAIN_TID => Some("main".to_string()),
            WORKER_TID => Some("worker".to_string()),
            _ => None,
        }
    }

    fn label_at(&self, address: Address) -> Option<String> {
        self.state.lock().unwrap().labels.get(&address).cloned()
    }

    fn set_label_at(&self, address: Address, text: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if text.is_empty() {
            state.labels.shift_remove(&address);
        } else {
            state.labels.insert(address, text.to_string());
        }
        true
    }

    fn comment_at(&self, address: Address) -> Option<String> {
        self.state.lock().unwrap().comments.get(&address).cloned()
    }

    fn set_comment_at(&self, address: Address, text: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .comments
            .insert(address, text.to_string());
        true
    }

    fn set_bookmark_at(&self, address: Address, set: bool) -> bool {
        let mut state = self.state.lock().unwrap();
        if set {
            if !state.bookmarks.contains(&address) {
                state.bookmarks.push(address);
            }
        } else {
            state.bookmarks.retain(|&a| a != address);
        }
        true
    }

    fn module_base(&self, name: &str) -> Option<Address> {
        known_module(name).then_some(MODULE_BASE)
    }

    fn module_at(&self, address: Address) -> Option<String> {
        (MODULE_BASE..MODULE_BASE + MODULE_SIZE)
            .contains(&address)
            .then(|| MODULE_NAME.to_string())
    }

    fn disassemble_at(
        &self,
        address: Address,
        count: usize,
    ) -> Result<Vec<Instruction>, BridgeError> {
        if !self.is_valid_read_ptr(address) {
            return Err(BridgeError::Engine(format!(
                "cannot disassemble at {address:#x}"
            )));
        }
        // Fixed-size placeholder instructions, enough structure for clients.
        Ok((0..count)
            .map(|i| Instruction {
                address: address + i as Address,
                size: 1,
                text: if i == 0 { "push rbp".to_string() } else { "nop".to_string() },
            })
            .collect())
    }

    fn instruction_at(&self, address: Address) -> Result<InstructionInfo, BridgeError> {
        if !self.is_valid_read_ptr(address) {
            return Err(BridgeError::Engine(format!(
                "cannot disassemble at {address:#x}"
            )));
        }
        let is_call = address == MODULE_BASE + 0x2010;
        Ok(InstructionInfo {
            address,
            size: 1,
            text: if is_call { "call process_input".to_string() } else { "nop".to_string() },
            is_branch: false,
            is_call,
            branch_destination: if is_call { MODULE_BASE + 0x2000 } else { 0 },
        })
    }

    fn function_bounds(&self, address: Address) -> Option<FunctionBounds> {
        let start = MODULE_BASE + 0x2000;
        let end = MODULE_BASE + 0x20ff;
        ((start..=end).contains(&address)).then_some(FunctionBounds {
            start,
            end,
            size: end - start + 1,
        })
    }

    fn analyze_function(&self, address: Address) -> Option<CfGraph> {
        let bounds = self.function_bounds(address)?;
        Some(CfGraph {
            entry_point: bounds.start,
            nodes: vec![
                CfgNode {
                    start: bounds.start,
                    end: bounds.start + 0x20,
                    brtrue: bounds.start + 0x21,
                    brfalse: bounds.start + 0x40,
                    terminal: false,
                    split: false,
                    indirectcall: false,
                    exits: vec![
                        crate::format::format_address(bounds.start + 0x21),
                        crate::format::format_address(bounds.start + 0x40),
                    ],
                },
                CfgNode {
                    start: bounds.start + 0x21,
                    end: bounds.end,
                    brtrue: 0,
                    brfalse: 0,
                    terminal: true,
                    split: false,
                    indirectcall: false,
                    exits: vec![],
                },
            ],
        })
    }

    fn branch_destination(&self, address: Address) -> Address {
        if address == MODULE_BASE + 0x2010 {
            MODULE_BASE + 0x2000
        } else {
            0
        }
    }

    fn is_jump_taken(&self, _address: Address) -> bool {
        false
    }

    fn function_type_at(&self, address: Address) -> FunctionType {
        match self.function_bounds(address) {
            Some(bounds) if bounds.start == address => FunctionType::Begin,
            Some(bounds) if bounds.end == address => FunctionType::End,
            Some(_) => FunctionType::Middle,
            None => FunctionType::None,
        }
    }

    fn loop_bounds(&self, depth: u32, address: Address) -> Option<(Address, Address)> {
        (depth == 0 && self.function_bounds(address).is_some())
            .then_some((MODULE_BASE + 0x2020, MODULE_BASE + 0x2040))
    }

    fn xrefs_at(&self, address: Address) -> Result<Vec<XrefRecord>, BridgeError> {
        if address == MODULE_BASE + 0x2000 {
            Ok(vec![XrefRecord {
                address: MODULE_BASE + 0x2010,
                kind: XrefKind::Call,
            }])
        } else {
            Ok(vec![])
        }
    }

    fn call_stack(&self) -> Result<Vec<StackFrame>, BridgeError> {
        let state = self.state.lock().unwrap();
        Ok(vec![
            StackFrame {
                address: STACK_BASE,
                from: state.cip,
                to: ENTRY_POINT,
                comment: String::new(),
            },
            StackFrame {
                address: STACK_BASE + 8,
                from: ENTRY_POINT,
                to: MODULE_BASE + 0x2000,
                comment: "frame 1".to_string(),
            },
        ])
    }

    fn seh_chain(&self) -> Result<Vec<SehRecord>, BridgeError> {
        Ok(vec![SehRecord {
            address: STACK_BASE + 0x100,
            handler: MODULE_BASE + 0x3000,
        }])
    }

    fn trace_hit_count(&self, address: Address) -> u64 {
        u64::from(address == ENTRY_POINT)
    }

    fn trace_record_type(&self, address: Address) -> TraceRecordType {
        if address == ENTRY_POINT {
            TraceRecordType::InstructionHeading
        } else {
            TraceRecordType::None
        }
    }

    fn set_trace_record_type(&self, _address: Address, _kind: TraceRecordType) -> bool {
        true
    }

    fn animate_command(&self, cmd: &str) -> bool {
        self.exec_command(cmd)
    }

    fn peb_address(&self, pid: u32) -> Address {
        if Address::from(pid) == PID {
            PEB_ADDRESS
        } else {
            0
        }
    }

    fn cmdline(&self) -> Result<String, BridgeError> {
        Ok(self.state.lock().unwrap().cmdline.clone())
    }

    fn set_cmdline(&self, cmdline: &str) -> bool {
        self.state.lock().unwrap().cmdline = cmdline.to_string();
        true
    }

    fn is_elevated(&self) -> bool {
        false
    }

    fn is_dep_enabled(&self) -> bool {
        true
    }

    fn debugger_version(&self) -> i32 {
        25
    }

    fn handles(&self) -> Result<Vec<HandleRecord>, BridgeError> {
        Ok(vec![HandleRecord {
            handle: 0x1c,
            type_number: 37,
            granted_access: 0x1f_01ff,
            name: "\\Device\\ConDrv".to_string(),
            type_name: "File".to_string(),
        }])
    }

    fn handle_name(&self, handle: Address) -> Option<(String, String)> {
        (handle == 0x1c).then(|| ("\\Device\\ConDrv".to_string(), "File".to_string()))
    }

    fn tcp_connections(&self) -> Result<Vec<TcpConnectionRecord>, BridgeError> {
        Ok(vec![])
    }

    fn windows(&self) -> Result<Vec<WindowRecord>, BridgeError> {
        Ok(vec![])
    }

    fn heaps(&self) -> Result<Vec<HeapRecord>, BridgeError> {
        Ok(vec![HeapRecord {
            address: 0x0060_0000,
            size: 0x10000,
            flags: 0x2,
        }])
    }

    fn exception_codes(&self) -> Vec<ExceptionCode> {
        vec![
            ExceptionCode {
                name: "EXCEPTION_ACCESS_VIOLATION".to_string(),
                value: 0xc000_0005,
            },
            ExceptionCode {
                name: "EXCEPTION_BREAKPOINT".to_string(),
                value: 0x8000_0003,
            },
        ]
    }

    fn relocations_at(&self, _address: Address) -> Result<Vec<RelocationRecord>, BridgeError> {
        Ok(vec![])
    }

    fn export_patches(&self, _file: &str) -> Result<usize, BridgeError> {
        Ok(0)
    }
}

fn known_module(name: &str) -> bool {
    let name = name.trim();
    name.eq_ignore_ascii_case(MODULE_NAME) || name == "0"
}

fn blank_breakpoint(address: Address, singleshoot: bool) -> BreakpointInfo {
    BreakpointInfo {
        address,
        enabled: true,
        active: true,
        singleshoot,
        name: String::new(),
        module: MODULE_NAME.to_string(),
        hit_count: 0,
        fast_resume: false,
        silent: false,
        break_condition: String::new(),
        log_text: String::new(),
        log_condition: String::new(),
        command_text: String::new(),
        command_condition: String::new(),
    }
}

/// Lay down enough of a DOS/PE image that the PE-header routes can parse it.
fn write_pe_image(memory: &mut [u8]) {
    const E_LFANEW: u32 = 0x80;
    memory[0] = b'M';
    memory[1] = b'Z';
    memory[0x3c..0x40].copy_from_slice(&E_LFANEW.to_le_bytes());

    let pe = E_LFANEW as usize;
    memory[pe..pe + 4].copy_from_slice(b"PE\0\0");
    // COFF: machine (amd64), 2 sections, timestamp, optional header size.
    memory[pe + 4..pe + 6].copy_from_slice(&0x8664u16.to_le_bytes());
    memory[pe + 6..pe + 8].copy_from_slice(&2u16.to_le_bytes());
    memory[pe + 8..pe + 12].copy_from_slice(&0x6650_0000u32.to_le_bytes());
    memory[pe + 20..pe + 22].copy_from_slice(&240u16.to_le_bytes());
    memory[pe + 22..pe + 24].copy_from_slice(&0x22u16.to_le_bytes());
    // Optional header: PE32+ magic, entry point RVA, image base, image size.
    let opt = pe + 24;
    memory[opt..opt + 2].copy_from_slice(&0x20bu16.to_le_bytes());
    memory[opt + 16..opt + 20].copy_from_slice(&0x1000u32.to_le_bytes());
    memory[opt + 24..opt + 32].copy_from_slice(&MODULE_BASE.to_le_bytes());
    memory[opt + 56..opt + 60].copy_from_slice(&(MODULE_SIZE as u32).to_le_bytes());
    // Two section headers directly after the optional header.
    let sections = opt + 240;
    write_section(&mut memory[sections..sections + 40], b".text\0\0\0", 0x1000, 0x3000);
    write_section(&mut memory[sections + 40..sections + 80], b".data\0\0\0", 0x5000, 0x1000);
}

fn write_section(header: &mut [u8], name: &[u8; 8], virtual_address: u32, virtual_size: u32) {
    header[..8].copy_from_slice(name);
    header[8..12].copy_from_slice(&virtual_size.to_le_bytes());
    header[12..16].copy_from_slice(&virtual_address.to_le_bytes());
    header[16..20].copy_from_slice(&virtual_size.to_le_bytes());
    header[20..24].copy_from_slice(&virtual_address.to_le_bytes());
    header[36..40].copy_from_slice(&0x6000_0020u32.to_le_bytes());
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_initial_state_is_paused_at_entry() {
        let bridge = MockBridge::new();
        assert_eq!(bridge.run_state(), RunState::Paused);
        assert_eq!(bridge.eval("cip"), ENTRY_POINT);
    }

    #[test]
    fn test_run_and_pause_commands() {
        let bridge = MockBridge::new();
        assert!(bridge.exec_command("run"));
        assert_eq!(bridge.run_state(), RunState::Running);
        assert!(bridge.exec_command("pause"));
        assert_eq!(bridge.run_state(), RunState::Paused);
    }

    #[test]
    fn test_step_advances_cip_and_waits() {
        let bridge = MockBridge::new();
        let before = bridge.eval("cip");
        assert!(bridge.exec_command_and_wait("StepInto", COMMAND_WAIT_TIMEOUT));
        assert_eq!(bridge.eval("cip"), before + 1);
    }

    #[test]
    fn test_breakpoint_lifecycle() {
        let bridge = MockBridge::new();
        bridge.exec_command("bp 0x401000");
        let bps = bridge.breakpoint_list(BreakpointKind::Software).unwrap();
        assert_eq!(bps.len(), 1);
        assert_eq!(bps[0].address, 0x401000);
        assert!(bps[0].enabled);

        bridge.exec_command("bpd 0x401000");
        assert!(!bridge.breakpoint_list(BreakpointKind::Software).unwrap()[0].enabled);

        bridge.exec_command("bc 0x401000");
        assert!(bridge.breakpoint_list(BreakpointKind::Software).unwrap().is_empty());
    }

    #[test]
    fn test_memory_roundtrip_and_bounds() {
        let bridge = MockBridge::new();
        bridge.write_memory(MODULE_BASE + 0x10, &[0xde, 0xad]).unwrap();
        assert_eq!(bridge.read_memory(MODULE_BASE + 0x10, 2).unwrap(), vec![0xde, 0xad]);

        assert!(matches!(
            bridge.read_memory(MODULE_BASE, 0),
            Err(BridgeError::InvalidReadSize)
        ));
        assert!(matches!(
            bridge.read_memory(0x10, 4),
            Err(BridgeError::MemoryRead(_))
        ));
    }

    #[test]
    fn test_pe_image_parses() {
        let bridge = MockBridge::new();
        let dos = bridge.read_memory(MODULE_BASE, 64).unwrap();
        assert_eq!(&dos[..2], b"MZ");
        let e_lfanew = u32::from_le_bytes(dos[0x3c..0x40].try_into().unwrap());
        let pe = bridge.read_memory(MODULE_BASE + Address::from(e_lfanew), 4).unwrap();
        assert_eq!(&pe[..2], b"PE");
    }

    #[test]
    fn test_eval_module_expressions() {
        let bridge = MockBridge::new();
        assert_eq!(bridge.eval("mod.size(target.exe)"), MODULE_SIZE);
        assert_eq!(bridge.eval("mod.entry(0)"), ENTRY_POINT);
        assert_eq!(bridge.eval("0x401000"), 0x401000);
        assert_eq!(bridge.eval("EntryPoint"), ENTRY_POINT);
    }
}
