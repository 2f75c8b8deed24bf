//! Linear 8080 disassembler with label and comment overlays.
//!
//! Static program-lifetime tables (mnemonics, opcode types) plus the
//! window builder: given a start address and a signed instruction offset
//! it emits code lines interleaved with label and comment lines, walking
//! instruction lengths forward or searching candidate starts backward.

use kr580vm80a::{MemKind, INSTR_LENGTHS};

use super::breakpoints::BreakpointStatus;
use super::Debugger;
use crate::memory::Memory;

/// Longest 8080 instruction in bytes.
const CMD_LEN_MAX: u16 = 3;

#[rustfmt::skip]
static MNEMONICS: [&str; 256] = [
    "NOP", "LXI B", "STAX B", "INX B", "INR B", "DCR B", "MVI B", "RLC",
    "DB 0x08", "DAD B", "LDAX B", "DCX B", "INR C", "DCR C", "MVI C", "RRC",
    "DB 0x10", "LXI D", "STAX D", "INX D", "INR D", "DCR D", "MVI D", "RAL",
    "DB 0x18", "DAD D", "LDAX D", "DCX D", "INR E", "DCR E", "MVI E", "RAR",
    "DB 0x20", "LXI H", "SHLD", "INX H", "INR H", "DCR H", "MVI H", "DAA",
    "DB 0x28", "DAD H", "LHLD", "DCX H", "INR L", "DCR L", "MVI L", "CMA",
    "DB 0x30", "LXI SP", "STA", "INX SP", "INR M", "DCR M", "MVI M", "STC",
    "DB 0x38", "DAD SP", "LDA", "DCX SP", "INR A", "DCR A", "MVI A", "CMC",

    "MOV B B", "MOV B C", "MOV B D", "MOV B E", "MOV B H", "MOV B L", "MOV B M", "MOV B A",
    "MOV C B", "MOV C C", "MOV C D", "MOV C E", "MOV C H", "MOV C L", "MOV C M", "MOV C A",
    "MOV D B", "MOV D C", "MOV D D", "MOV D E", "MOV D H", "MOV D L", "MOV D M", "MOV D A",
    "MOV E B", "MOV E C", "MOV E D", "MOV E E", "MOV E H", "MOV E L", "MOV E M", "MOV E A",
    "MOV H B", "MOV H C", "MOV H D", "MOV H E", "MOV H H", "MOV H L", "MOV H M", "MOV H A",
    "MOV L B", "MOV L C", "MOV L D", "MOV L E", "MOV L H", "MOV L L", "MOV L M", "MOV L A",
    "MOV M B", "MOV M C", "MOV M D", "MOV M E", "MOV M H", "MOV M L", "HLT", "MOV M A",
    "MOV A B", "MOV A C", "MOV A D", "MOV A E", "MOV A H", "MOV A L", "MOV A M", "MOV A A",

    "ADD B", "ADD C", "ADD D", "ADD E", "ADD H", "ADD L", "ADD M", "ADD A",
    "ADC B", "ADC C", "ADC D", "ADC E", "ADC H", "ADC L", "ADC M", "ADC A",
    "SUB B", "SUB C", "SUB D", "SUB E", "SUB H", "SUB L", "SUB M", "SUB A",
    "SBB B", "SBB C", "SBB D", "SBB E", "SBB H", "SBB L", "SBB M", "SBB A",
    "ANA B", "ANA C", "ANA D", "ANA E", "ANA H", "ANA L", "ANA M", "ANA A",
    "XRA B", "XRA C", "XRA D", "XRA E", "XRA H", "XRA L", "XRA M", "XRA A",
    "ORA B", "ORA C", "ORA D", "ORA E", "ORA H", "ORA L", "ORA M", "ORA A",
    "CMP B", "CMP C", "CMP D", "CMP E", "CMP H", "CMP L", "CMP M", "CMP A",

    "RNZ", "POP B", "JNZ", "JMP", "CNZ", "PUSH B", "ADI", "RST 0",
    "RZ", "RET", "JZ", "DB 0xCB", "CZ", "CALL", "ACI", "RST 1",
    "RNC", "POP D", "JNC", "OUT", "CNC", "PUSH D", "SUI", "RST 2",
    "RC", "DB 0xD9", "JC", "IN", "CC", "DB 0xDD", "SBI", "RST 3",
    "RPO", "POP H", "JPO", "XTHL", "CPO", "PUSH H", "ANI", "RST 4",
    "RPE", "PCHL", "JPE", "XCHG", "CPE", "DB 0xED", "XRI", "RST 5",
    "RP", "POP PSW", "JP", "DI", "CP", "PUSH PSW", "ORI", "RST 6",
    "RM", "SPHL", "JM", "EI", "CM", "DB 0xFD", "CPI", "RST 7",
];

/// Control-flow classification used by the trace-log filter:
/// 0 call, 1 conditional call, 2 rst, 3 pchl, 4 jmp, 5 conditional jmp,
/// 6 ret family, 7 everything else.
pub const OPCODE_TYPE_MAX: u8 = 7;

#[rustfmt::skip]
static OPCODE_TYPES: [u8; 256] = {
    let mut types = [7u8; 256];
    let mut i = 0xC0;
    while i < 0x100 {
        types[i] = match i as u8 {
            0xCD => 0,                                         // CALL
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => 1,
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => 2,
            0xE9 => 3,                                         // PCHL
            0xC3 => 4,                                         // JMP
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => 5,
            0xC9 | 0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => 6,
            _ => 7,
        };
        i += 1;
    }
    types
};

/// Classify an opcode for the trace-log filter.
#[must_use]
pub fn opcode_type(opcode: u8) -> u8 {
    OPCODE_TYPES[opcode as usize]
}

/// Mnemonic with raw hex operands (no label resolution).
#[must_use]
pub fn mnemonic_with_operands(opcode: u8, data_l: u8, data_h: u8) -> String {
    let mnemonic = MNEMONICS[opcode as usize];
    match INSTR_LENGTHS[opcode as usize] {
        2 => format!("{mnemonic} 0x{data_l:02X}"),
        3 => format!(
            "{mnemonic} 0x{:04X}",
            u16::from(data_h) << 8 | u16::from(data_l)
        ),
        _ => mnemonic.to_string(),
    }
}

/// Kind of an emitted disassembly line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisasmLineKind {
    /// Labels registered at the address.
    Labels,
    /// A user comment at the address.
    Comment,
    /// A decoded instruction.
    Code,
    /// A raw data byte.
    Db,
}

/// One line of a disassembly window.
#[derive(Debug, Clone)]
pub struct DisasmLine {
    pub kind: DisasmLineKind,
    pub addr: u16,
    pub text: String,
    pub runs: u32,
    pub reads: u32,
    pub writes: u32,
    pub breakpoint: BreakpointStatus,
}

impl Debugger {
    /// Shift an address by a signed number of instructions.
    ///
    /// Forward walks sum per-opcode lengths. Backward tries every
    /// candidate start in `[addr + offset*3, addr)` and keeps those that
    /// decode to exactly `|offset|` instructions ending on `addr`,
    /// preferring one the CPU has actually executed; with no valid
    /// candidate the input address comes back unchanged.
    #[must_use]
    pub fn disasm_addr(&self, memory: &Memory, addr: u16, instruction_offset: i32) -> u16 {
        let instructions = instruction_offset.unsigned_abs() as u16;

        if instruction_offset > 0 {
            let mut walk = addr;
            for _ in 0..instructions {
                let opcode = memory.get_byte(walk, MemKind::Read);
                walk = walk.wrapping_add(u16::from(INSTR_LENGTHS[opcode as usize]));
            }
            return walk;
        }
        if instruction_offset == 0 {
            return addr;
        }

        let window = instructions * CMD_LEN_MAX;
        let mut candidates: Vec<u16> = Vec::new();
        for back in (instructions..=window).rev() {
            let candidate = addr.wrapping_sub(back);
            let mut walk = candidate;
            let mut decoded = 0u16;
            while walk != addr && decoded < instructions {
                let opcode = memory.get_byte(walk, MemKind::Read);
                let len = u16::from(INSTR_LENGTHS[opcode as usize]);
                // Detect overshoot past addr (with wrap the walk could
                // step over it).
                let remaining = addr.wrapping_sub(walk);
                if len > remaining {
                    walk = addr.wrapping_add(1); // poison: not a hit
                    break;
                }
                walk = walk.wrapping_add(len);
                decoded += 1;
            }
            if walk == addr && decoded == instructions {
                candidates.push(candidate);
            }
        }

        if candidates.is_empty() {
            return addr;
        }
        for &candidate in &candidates {
            if self.mem_runs[memory.global_addr(candidate, MemKind::Fetch)] > 0 {
                return candidate;
            }
        }
        candidates[0]
    }

    /// Build a disassembly window of `lines_num` lines.
    ///
    /// `instruction_offset` shifts the start: 0 starts at `addr`, -5
    /// starts five instructions earlier. When no instruction sequence
    /// fits the backward range, the gap is rendered as `DB` lines.
    #[must_use]
    pub fn disasm(
        &self,
        memory: &Memory,
        addr: u16,
        lines_num: usize,
        instruction_offset: i32,
    ) -> Vec<DisasmLine> {
        if lines_num == 0 {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(lines_num);
        let start = self.disasm_addr(memory, addr, instruction_offset);
        let mut walk = start;

        if instruction_offset < 0 && start == addr {
            // A data blob precedes addr: render it byte by byte.
            let db_count = instruction_offset.unsigned_abs() as usize;
            let mut db_addr = addr.wrapping_sub(db_count as u16);
            while out.len() < db_count {
                self.push_overlays(&mut out, db_addr);
                let db = memory.get_byte(db_addr, MemKind::Read);
                let global = memory.global_addr(db_addr, MemKind::Read);
                out.push(DisasmLine {
                    kind: DisasmLineKind::Db,
                    addr: db_addr,
                    text: format!("DB 0x{db:02X}"),
                    runs: self.mem_runs[global],
                    reads: self.mem_reads[global],
                    writes: self.mem_writes[global],
                    breakpoint: self.breakpoints.status(db_addr),
                });
                db_addr = db_addr.wrapping_add(1);
            }
            walk = addr;
        }

        while out.len() < lines_num {
            self.push_overlays(&mut out, walk);
            if out.len() >= lines_num {
                break;
            }
            let cmd = memory.get_three_bytes(walk);
            let opcode = (cmd & 0xFF) as u8;
            let data_l = (cmd >> 8 & 0xFF) as u8;
            let data_h = (cmd >> 16 & 0xFF) as u8;
            let global = memory.global_addr(walk, MemKind::Fetch);
            out.push(DisasmLine {
                kind: DisasmLineKind::Code,
                addr: walk,
                text: self.disasm_text(opcode, data_l, data_h),
                runs: self.mem_runs[global],
                reads: self.mem_reads[global],
                writes: self.mem_writes[global],
                breakpoint: self.breakpoints.status(walk),
            });
            walk = walk.wrapping_add(u16::from(INSTR_LENGTHS[opcode as usize]));
        }
        out
    }

    /// Emit label and comment lines registered at an address.
    fn push_overlays(&self, out: &mut Vec<DisasmLine>, addr: u16) {
        if let Some(names) = self.labels.get(&addr) {
            out.push(DisasmLine {
                kind: DisasmLineKind::Labels,
                addr,
                text: format!("{}:", names.join(", ")),
                runs: 0,
                reads: 0,
                writes: 0,
                breakpoint: BreakpointStatus::Deleted,
            });
        }
        if let Some(comment) = self.comments.get(&addr) {
            out.push(DisasmLine {
                kind: DisasmLineKind::Comment,
                addr,
                text: format!("; {comment}"),
                runs: 0,
                reads: 0,
                writes: 0,
                breakpoint: BreakpointStatus::Deleted,
            });
        }
    }

    /// Mnemonic with operands, substituting a name when exactly one
    /// label (or, for 16-bit operands, one const) is registered for the
    /// operand's value.
    #[must_use]
    pub fn disasm_text(&self, opcode: u8, data_l: u8, data_h: u8) -> String {
        let mnemonic = MNEMONICS[opcode as usize];
        match INSTR_LENGTHS[opcode as usize] {
            2 => {
                if let Some(name) = self.single_label(u16::from(data_l)) {
                    format!("{mnemonic} {name} ;0x{data_l:02X}")
                } else {
                    format!("{mnemonic} 0x{data_l:02X}")
                }
            }
            3 => {
                let word = u16::from(data_h) << 8 | u16::from(data_l);
                let name = self
                    .single_label(word)
                    .or_else(|| self.single_const(word));
                if let Some(name) = name {
                    format!("{mnemonic} {name} ;0x{word:04X}")
                } else {
                    format!("{mnemonic} 0x{word:04X}")
                }
            }
            _ => mnemonic.to_string(),
        }
    }

    fn single_label(&self, addr: u16) -> Option<&str> {
        match self.labels.get(&addr) {
            Some(names) if names.len() == 1 => Some(&names[0]),
            _ => None,
        }
    }

    fn single_const(&self, addr: u16) -> Option<&str> {
        match self.consts.get(&addr) {
            Some(names) if names.len() == 1 => Some(&names[0]),
            _ => None,
        }
    }

    /// All labels and consts at an address, comma-joined (trace log /
    /// tooltips).
    #[must_use]
    pub fn labels_to_str(&self, addr: u16) -> String {
        let mut names: Vec<&str> = Vec::new();
        if let Some(labels) = self.labels.get(&addr) {
            names.extend(labels.iter().map(String::as_str));
        }
        if let Some(consts) = self.consts.get(&addr) {
            names.extend(consts.iter().map(String::as_str));
        }
        names.join(", ")
    }
}
