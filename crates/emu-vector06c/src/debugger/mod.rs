//! The integrated debugger.
//!
//! Observes every instruction fetch, data read and data write through the
//! hot-path hooks, keeping per-global-address execution/read/write
//! counters, recent-access rings, and the trace log. Breakpoints and
//! watchpoints live in mutex-guarded tables shared with the UI context;
//! the `wpBreak` latch is a plain flag owned by the emulation context.

mod breakpoints;
mod disasm;
mod trace_log;
mod watchpoints;

pub use breakpoints::{Breakpoint, BreakpointStatus, Breakpoints, BREAKPOINT_PAGES_ALL};
pub use disasm::{
    mnemonic_with_operands, opcode_type, DisasmLine, DisasmLineKind, OPCODE_TYPE_MAX,
};
pub use trace_log::{TraceLog, TraceLogEntry, TRACE_LOG_SIZE};
pub use watchpoints::{
    Watchpoint, WatchpointAccess, WatchpointCondition, WatchpointId, WatchpointSpec,
    WatchpointType, Watchpoints,
};

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::debug_data::DebugData;
use crate::memory::GLOBAL_MEMORY_LEN;

/// Capacity of the recent-reads and recent-writes rings.
pub const LAST_RW_MAX: usize = 1024;
/// Marks an unused ring slot.
const LAST_RW_NO_DATA: u32 = u32::MAX;

/// Recent-access rings, written on the hot path and snapshotted by the
/// UI context under the mutex.
pub struct LastRwRings {
    reads: Vec<u32>,
    writes: Vec<u32>,
    reads_idx: usize,
    writes_idx: usize,
}

impl LastRwRings {
    fn new() -> Self {
        Self {
            reads: vec![LAST_RW_NO_DATA; LAST_RW_MAX],
            writes: vec![LAST_RW_NO_DATA; LAST_RW_MAX],
            reads_idx: 0,
            writes_idx: 0,
        }
    }

    fn reset(&mut self) {
        self.reads.fill(LAST_RW_NO_DATA);
        self.writes.fill(LAST_RW_NO_DATA);
        self.reads_idx = 0;
        self.writes_idx = 0;
    }

    fn push_read(&mut self, global: u32) {
        self.reads[self.reads_idx] = global;
        self.reads_idx = (self.reads_idx + 1) % LAST_RW_MAX;
    }

    fn push_write(&mut self, global: u32) {
        self.writes[self.writes_idx] = global;
        self.writes_idx = (self.writes_idx + 1) % LAST_RW_MAX;
    }
}

/// The debugger state attached to the hardware.
pub struct Debugger {
    /// Execution count per global address.
    mem_runs: Vec<u32>,
    /// Read count per global address.
    mem_reads: Vec<u32>,
    /// Write count per global address.
    mem_writes: Vec<u32>,
    /// Packed recency of the last accesses: low 16 bits reads, high 16
    /// bits writes. Rebuilt from the rings by [`Debugger::update_last_rw`].
    mem_last_rw: Vec<u32>,
    /// Global addresses currently marked in `mem_last_rw`.
    last_marked: Vec<usize>,
    last_rw: Arc<Mutex<LastRwRings>>,
    /// Watchpoint-hit latch, consumed at the next instruction boundary.
    wp_break: bool,
    pub trace_log: TraceLog,
    breakpoints: Breakpoints,
    watchpoints: Watchpoints,
    labels: BTreeMap<u16, Vec<String>>,
    consts: BTreeMap<u16, Vec<String>>,
    comments: BTreeMap<u16, String>,
}

impl Debugger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mem_runs: vec![0; GLOBAL_MEMORY_LEN],
            mem_reads: vec![0; GLOBAL_MEMORY_LEN],
            mem_writes: vec![0; GLOBAL_MEMORY_LEN],
            mem_last_rw: vec![0; GLOBAL_MEMORY_LEN],
            last_marked: Vec::new(),
            last_rw: Arc::new(Mutex::new(LastRwRings::new())),
            wp_break: false,
            trace_log: TraceLog::new(),
            breakpoints: Breakpoints::new(),
            watchpoints: Watchpoints::new(),
            labels: BTreeMap::new(),
            consts: BTreeMap::new(),
            comments: BTreeMap::new(),
        }
    }

    /// A handle to the shared breakpoint table (for the UI context).
    #[must_use]
    pub fn breakpoints(&self) -> Breakpoints {
        self.breakpoints.clone()
    }

    /// A handle to the shared watchpoint table (for the UI context).
    #[must_use]
    pub fn watchpoints(&self) -> Watchpoints {
        self.watchpoints.clone()
    }

    /// Clear counters, rings, the trace log and both tables.
    pub fn reset(&mut self) {
        self.mem_runs.fill(0);
        self.mem_reads.fill(0);
        self.mem_writes.fill(0);
        self.mem_last_rw.fill(0);
        self.last_marked.clear();
        self.last_rw.lock().unwrap().reset();
        self.wp_break = false;
        self.trace_log.reset();
        self.breakpoints.clear();
        self.watchpoints.clear();
    }

    // -----------------------------------------------------------------------
    // Hot-path hooks (emulation context)
    // -----------------------------------------------------------------------

    /// Instruction fetched: bump the execution counter, log the trace.
    pub fn on_instr(&mut self, global_addr: usize, opcode: u8, data_h: u8, data_l: u8, hl: u16) {
        self.mem_runs[global_addr] += 1;
        self.trace_log.update(global_addr, opcode, data_h, data_l, hl);
    }

    /// Data read observed.
    pub fn on_read(&mut self, global_addr: usize, val: u8) {
        self.mem_reads[global_addr] += 1;
        self.wp_break |= self
            .watchpoints
            .check(WatchpointAccess::R, global_addr, val);
        self.last_rw.lock().unwrap().push_read(global_addr as u32);
    }

    /// Data write observed.
    pub fn on_write(&mut self, global_addr: usize, val: u8) {
        self.mem_writes[global_addr] += 1;
        self.wp_break |= self
            .watchpoints
            .check(WatchpointAccess::W, global_addr, val);
        self.last_rw.lock().unwrap().push_write(global_addr as u32);
    }

    /// Instruction-boundary verdict. A pending watchpoint hit wins,
    /// clears its latch and resets the one-shot trips; otherwise the
    /// breakpoint table decides.
    pub fn check_break(&mut self, addr: u16, mapping_mode: u8, page: u8) -> bool {
        if self.wp_break {
            self.wp_break = false;
            self.watchpoints.reset_tripped();
            return true;
        }
        self.breakpoints.check(addr, mapping_mode, page)
    }

    // -----------------------------------------------------------------------
    // Queries (request path)
    // -----------------------------------------------------------------------

    /// (runs, reads, writes) counters for a global address.
    #[must_use]
    pub fn stats(&self, global_addr: usize) -> (u32, u32, u32) {
        (
            self.mem_runs[global_addr],
            self.mem_reads[global_addr],
            self.mem_writes[global_addr],
        )
    }

    /// Rebuild the packed last-access recency array from the rings.
    /// Higher values are more recent; zero means not recently touched.
    pub fn update_last_rw(&mut self) {
        for &global in &self.last_marked {
            self.mem_last_rw[global] = 0;
        }
        self.last_marked.clear();

        let rings = self.last_rw.lock().unwrap();
        for age in 0..LAST_RW_MAX {
            let slot = (rings.reads_idx + age) % LAST_RW_MAX;
            let global = rings.reads[slot];
            if global != LAST_RW_NO_DATA {
                let global = global as usize;
                self.mem_last_rw[global] =
                    self.mem_last_rw[global] & 0xFFFF_0000 | (age as u32 + 1);
                self.last_marked.push(global);
            }
        }
        for age in 0..LAST_RW_MAX {
            let slot = (rings.writes_idx + age) % LAST_RW_MAX;
            let global = rings.writes[slot];
            if global != LAST_RW_NO_DATA {
                let global = global as usize;
                self.mem_last_rw[global] =
                    self.mem_last_rw[global] & 0x0000_FFFF | (age as u32 + 1) << 16;
                self.last_marked.push(global);
            }
        }
    }

    /// Packed recency value (call [`Debugger::update_last_rw`] first).
    #[must_use]
    pub fn last_rw_value(&self, global_addr: usize) -> u32 {
        self.mem_last_rw[global_addr]
    }

    /// Trace-log lines, newest first, filtered by opcode type
    /// (`filter = 7` keeps everything, lower values keep only control
    /// flow). Operand addresses resolve through the label tables.
    #[must_use]
    pub fn trace_log_lines(&self, offset: usize, count: usize, filter: u8) -> Vec<String> {
        let filter = filter.min(OPCODE_TYPE_MAX);
        self.trace_log
            .records()
            .filter(|e| opcode_type(e.opcode) <= filter)
            .skip(offset)
            .take(count)
            .map(|e| {
                let text = mnemonic_with_operands(e.opcode, e.data_l, e.data_h);
                let names = self.labels_to_str(e.operand());
                if names.is_empty() {
                    format!("0x{:05X} {text}", e.global_addr)
                } else {
                    format!("0x{:05X} {text} ; {names}", e.global_addr)
                }
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Labels, consts, comments
    // -----------------------------------------------------------------------

    /// Replace the label/const/comment tables (debug-data reload).
    pub fn set_debug_data(&mut self, data: DebugData) {
        self.labels = data.labels;
        self.consts = data.consts;
        self.comments = data.comments;
    }

    pub fn reset_labels(&mut self) {
        self.labels.clear();
        self.consts.clear();
        self.comments.clear();
    }

    #[must_use]
    pub fn comment(&self, addr: u16) -> Option<&str> {
        self.comments.get(&addr).map(String::as_str)
    }

    pub fn set_comment(&mut self, addr: u16, comment: impl Into<String>) {
        self.comments.insert(addr, comment.into());
    }
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Memory;

    #[test]
    fn hooks_update_counters() {
        let mut dbg = Debugger::new();
        dbg.on_instr(0x100, 0x00, 0, 0, 0);
        dbg.on_instr(0x100, 0x00, 0, 0, 0);
        dbg.on_read(0x200, 0x42);
        dbg.on_write(0x300, 0x42);

        assert_eq!(dbg.stats(0x100), (2, 0, 0));
        assert_eq!(dbg.stats(0x200), (0, 1, 0));
        assert_eq!(dbg.stats(0x300), (0, 0, 1));
    }

    #[test]
    fn watchpoint_hit_latches_until_boundary() {
        let mut dbg = Debugger::new();
        dbg.watchpoints().add(
            WatchpointSpec::bytes(WatchpointAccess::W, 0xC000, 4)
                .with_condition(WatchpointCondition::Eq, 0x42),
        );

        dbg.on_write(0xC000, 0x41);
        assert!(!dbg.check_break(0, 0, 0));

        dbg.on_write(0xC002, 0x42);
        assert!(dbg.check_break(0, 0, 0), "latched hit delivered");
        assert!(!dbg.check_break(0, 0, 0), "latch cleared");

        // Trips were reset: the same watchpoint can fire again.
        dbg.on_write(0xC002, 0x42);
        assert!(dbg.check_break(0, 0, 0));
    }

    #[test]
    fn breakpoint_checked_at_boundary() {
        let mut dbg = Debugger::new();
        dbg.breakpoints().add(Breakpoint::new(0x0100));
        assert!(dbg.check_break(0x0100, 0, 0));
        assert!(!dbg.check_break(0x0101, 0, 0));
    }

    #[test]
    fn last_rw_fold_tracks_recency() {
        let mut dbg = Debugger::new();
        dbg.on_read(0x10, 0);
        dbg.on_read(0x20, 0);
        dbg.on_write(0x10, 0);

        dbg.update_last_rw();
        let v10 = dbg.last_rw_value(0x10);
        let v20 = dbg.last_rw_value(0x20);
        assert!(v10 & 0xFFFF > 0, "0x10 was read");
        assert!(v10 >> 16 > 0, "0x10 was written");
        assert!(v20 & 0xFFFF > v10 & 0xFFFF, "0x20 read more recently");
        assert_eq!(v20 >> 16, 0, "0x20 never written");

        // A second fold clears stale marks.
        dbg.update_last_rw();
        assert_eq!(dbg.last_rw_value(0x20) >> 16, 0);
    }

    #[test]
    fn trace_log_filter_keeps_control_flow() {
        let mut dbg = Debugger::new();
        dbg.on_instr(0x0000, 0x3E, 0x00, 0x42, 0); // MVI A
        dbg.on_instr(0x0002, 0xCD, 0x12, 0x34, 0); // CALL 0x1234
        dbg.on_instr(0x1234, 0x00, 0, 0, 0); // NOP

        let all = dbg.trace_log_lines(0, 10, OPCODE_TYPE_MAX);
        assert_eq!(all.len(), 3);
        assert!(all[0].contains("NOP"));

        let calls = dbg.trace_log_lines(0, 10, 0);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains("CALL 0x1234"));
    }

    #[test]
    fn trace_log_resolves_operand_labels() {
        let mut dbg = Debugger::new();
        let mut data = DebugData::default();
        data.labels.insert(0x1234, vec!["entry".to_string()]);
        dbg.set_debug_data(data);

        dbg.on_instr(0x0000, 0xC3, 0x12, 0x34, 0); // JMP 0x1234
        let lines = dbg.trace_log_lines(0, 1, OPCODE_TYPE_MAX);
        assert!(lines[0].contains("entry"), "{}", lines[0]);
    }

    #[test]
    fn disasm_forward_backward_roundtrip() {
        let mut dbg = Debugger::new();
        let mut mem = Memory::new();
        // MVI A,1; LXI H,0x2000; NOP; JMP 0
        mem.load(&[0x3E, 0x01, 0x21, 0x00, 0x20, 0x00, 0xC3, 0x00, 0x00], 0)
            .unwrap();
        // Mark the true starts as executed so the backward search prefers
        // them.
        for addr in [0x0000usize, 0x0002, 0x0005, 0x0006] {
            dbg.mem_runs[addr] = 1;
        }

        let fwd = dbg.disasm_addr(&mem, 0x0000, 3);
        assert_eq!(fwd, 0x0006);
        let back = dbg.disasm_addr(&mem, fwd, -3);
        assert_eq!(back, 0x0000);
    }

    #[test]
    fn disasm_emits_labels_comments_and_code() {
        let mut dbg = Debugger::new();
        let mut mem = Memory::new();
        mem.load(&[0x3E, 0x42, 0xC3, 0x00, 0x00], 0).unwrap();

        let mut data = DebugData::default();
        data.labels.insert(0x0000, vec!["start".to_string()]);
        data.comments.insert(0x0002, "loop forever".to_string());
        dbg.set_debug_data(data);

        let lines = dbg.disasm(&mem, 0x0000, 5, 0);
        assert_eq!(lines[0].kind, DisasmLineKind::Labels);
        assert_eq!(lines[0].text, "start:");
        assert_eq!(lines[1].kind, DisasmLineKind::Code);
        assert_eq!(lines[1].text, "MVI A 0x42");
        assert_eq!(lines[2].kind, DisasmLineKind::Comment);
        assert_eq!(lines[3].kind, DisasmLineKind::Code);
        assert!(
            lines[3].text.starts_with("JMP start"),
            "single label substitutes: {}",
            lines[3].text
        );
    }

    #[test]
    fn operand_substitution_requires_unique_name() {
        let mut dbg = Debugger::new();
        let mut data = DebugData::default();
        data.labels.insert(
            0x1234,
            vec!["a".to_string(), "b".to_string()],
        );
        dbg.set_debug_data(data);

        assert_eq!(dbg.disasm_text(0xC3, 0x34, 0x12), "JMP 0x1234");
    }

    #[test]
    fn disasm_backward_without_valid_sequence_emits_db() {
        let dbg = Debugger::new();
        let mut mem = Memory::new();
        // No instruction run in [0xFD, 0x100) lands exactly on 0x0100:
        // MVI (2 bytes) at 0xFD ends at 0xFF, NOP at 0xFE ends at 0xFF,
        // JMP (3 bytes) at 0xFF overshoots.
        mem.load(&[0x3E, 0x00, 0xC3], 0x00FD).unwrap();
        mem.load(&[0x76], 0x0100).unwrap();

        let lines = dbg.disasm(&mem, 0x0100, 3, -1);
        assert_eq!(lines[0].kind, DisasmLineKind::Db);
        assert_eq!(lines[0].addr, 0x00FF);
        assert_eq!(lines[0].text, "DB 0xC3");
        assert_eq!(lines[1].kind, DisasmLineKind::Code);
        assert_eq!(lines[1].addr, 0x0100);
        assert_eq!(lines[1].text, "HLT");
    }
}
