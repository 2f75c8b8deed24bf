//! Instruction dispatch for the 8080.
//!
//! One match arm per opcode group; every arm returns the machine-state
//! count from the 8080 instruction table, including the taken/not-taken
//! variance of conditional calls and returns.

#![allow(clippy::match_same_arms)]
#![allow(clippy::too_many_lines)]

use crate::bus::{Bus, MemKind};
use crate::cpu::I8080;

/// Instruction lengths in bytes, indexed by opcode.
///
/// The twelve undocumented opcodes (0x08, 0x10, ... and 0xCB, 0xD9, 0xDD,
/// 0xED, 0xFD) are treated as one-byte no-ops, matching how the
/// disassembler renders them (`DB`).
pub const INSTR_LENGTHS: [u8; 256] = [
    1, 3, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1, //
    1, 3, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1, //
    1, 3, 3, 1, 1, 1, 2, 1, 1, 1, 3, 1, 1, 1, 2, 1, //
    1, 3, 3, 1, 1, 1, 2, 1, 1, 1, 3, 1, 1, 1, 2, 1, //
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, //
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, //
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, //
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, //
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, //
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, //
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, //
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, //
    1, 1, 3, 3, 3, 1, 2, 1, 1, 1, 3, 1, 3, 3, 2, 1, //
    1, 1, 3, 2, 3, 1, 2, 1, 1, 1, 3, 2, 3, 1, 2, 1, //
    1, 1, 3, 1, 3, 1, 2, 1, 1, 1, 3, 1, 3, 1, 2, 1, //
    1, 1, 3, 1, 3, 1, 2, 1, 1, 1, 3, 1, 3, 1, 2, 1, //
];

impl I8080 {
    /// Read register `idx` (B, C, D, E, H, L, (HL), A).
    fn get_reg<B: Bus>(&mut self, bus: &mut B, idx: u8) -> u8 {
        match idx {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            6 => bus.read(self.regs.hl(), MemKind::Read),
            _ => self.regs.a,
        }
    }

    /// Write register `idx` (B, C, D, E, H, L, (HL), A).
    fn set_reg<B: Bus>(&mut self, bus: &mut B, idx: u8, val: u8) {
        match idx {
            0 => self.regs.b = val,
            1 => self.regs.c = val,
            2 => self.regs.d = val,
            3 => self.regs.e = val,
            4 => self.regs.h = val,
            5 => self.regs.l = val,
            6 => bus.write(self.regs.hl(), val, MemKind::Write),
            _ => self.regs.a = val,
        }
    }

    /// Read register pair `rp` (BC, DE, HL, SP).
    fn get_pair(&self, rp: u8) -> u16 {
        match rp {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            _ => self.regs.sp,
        }
    }

    /// Write register pair `rp` (BC, DE, HL, SP).
    fn set_pair(&mut self, rp: u8, val: u16) {
        match rp {
            0 => self.regs.set_bc(val),
            1 => self.regs.set_de(val),
            2 => self.regs.set_hl(val),
            _ => self.regs.sp = val,
        }
    }

    /// Execute one already-fetched instruction. PC has been advanced past
    /// it; jump-family handlers overwrite PC. Returns the state count.
    pub(crate) fn execute<B: Bus>(
        &mut self,
        bus: &mut B,
        opcode: u8,
        data_l: u8,
        data_h: u8,
    ) -> u64 {
        let imm16 = u16::from(data_h) << 8 | u16::from(data_l);

        match opcode {
            // NOP, documented and undocumented encodings - 4 states
            0x00 | 0x08 | 0x10 | 0x18 | 0x20 | 0x28 | 0x30 | 0x38 => 4,
            0xCB | 0xD9 | 0xDD | 0xED | 0xFD => 4,

            // LXI rp, imm16 - 10 states
            0x01 | 0x11 | 0x21 | 0x31 => {
                self.set_pair((opcode >> 4) & 3, imm16);
                10
            }

            // STAX B / STAX D - 7 states
            0x02 => {
                bus.write(self.regs.bc(), self.regs.a, MemKind::Write);
                7
            }
            0x12 => {
                bus.write(self.regs.de(), self.regs.a, MemKind::Write);
                7
            }

            // LDAX B / LDAX D - 7 states
            0x0A => {
                self.regs.a = bus.read(self.regs.bc(), MemKind::Read);
                7
            }
            0x1A => {
                self.regs.a = bus.read(self.regs.de(), MemKind::Read);
                7
            }

            // INX rp / DCX rp - 5 states, no flags
            0x03 | 0x13 | 0x23 | 0x33 => {
                let rp = (opcode >> 4) & 3;
                self.set_pair(rp, self.get_pair(rp).wrapping_add(1));
                5
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let rp = (opcode >> 4) & 3;
                self.set_pair(rp, self.get_pair(rp).wrapping_sub(1));
                5
            }

            // INR r - 5 states (M: 10)
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let r = (opcode >> 3) & 7;
                let val = self.get_reg(bus, r);
                let val = self.inr(val);
                self.set_reg(bus, r, val);
                if r == 6 { 10 } else { 5 }
            }

            // DCR r - 5 states (M: 10)
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let r = (opcode >> 3) & 7;
                let val = self.get_reg(bus, r);
                let val = self.dcr(val);
                self.set_reg(bus, r, val);
                if r == 6 { 10 } else { 5 }
            }

            // MVI r, imm8 - 7 states (M: 10)
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let r = (opcode >> 3) & 7;
                self.set_reg(bus, r, data_l);
                if r == 6 { 10 } else { 7 }
            }

            // Rotates - 4 states, only CY affected
            0x07 => {
                // RLC
                let carry = self.regs.a >> 7;
                self.regs.a = self.regs.a << 1 | carry;
                self.set_carry_only(carry != 0);
                4
            }
            0x0F => {
                // RRC
                let carry = self.regs.a & 1;
                self.regs.a = self.regs.a >> 1 | carry << 7;
                self.set_carry_only(carry != 0);
                4
            }
            0x17 => {
                // RAL
                let carry = self.regs.a >> 7;
                self.regs.a = self.regs.a << 1 | u8::from(self.regs.flag(crate::CF));
                self.set_carry_only(carry != 0);
                4
            }
            0x1F => {
                // RAR
                let carry = self.regs.a & 1;
                self.regs.a = self.regs.a >> 1 | u8::from(self.regs.flag(crate::CF)) << 7;
                self.set_carry_only(carry != 0);
                4
            }

            // DAD rp - 10 states
            0x09 | 0x19 | 0x29 | 0x39 => {
                self.dad(self.get_pair((opcode >> 4) & 3));
                10
            }

            // SHLD / LHLD - 16 states
            0x22 => {
                bus.write(imm16, self.regs.l, MemKind::Write);
                bus.write(imm16.wrapping_add(1), self.regs.h, MemKind::Write);
                16
            }
            0x2A => {
                let lo = bus.read(imm16, MemKind::Read);
                let hi = bus.read(imm16.wrapping_add(1), MemKind::Read);
                self.regs.l = lo;
                self.regs.h = hi;
                16
            }

            // STA / LDA - 13 states
            0x32 => {
                bus.write(imm16, self.regs.a, MemKind::Write);
                13
            }
            0x3A => {
                self.regs.a = bus.read(imm16, MemKind::Read);
                13
            }

            // DAA / CMA / STC / CMC - 4 states
            0x27 => {
                self.daa();
                4
            }
            0x2F => {
                self.regs.a = !self.regs.a;
                4
            }
            0x37 => {
                self.set_carry_only(true);
                4
            }
            0x3F => {
                let carry = !self.regs.flag(crate::CF);
                self.set_carry_only(carry);
                4
            }

            // HLT - 7 states. PC stays on the halt opcode so the CPU keeps
            // re-fetching it until an interrupt is accepted.
            0x76 => {
                self.set_halted();
                self.regs.pc = self.regs.pc.wrapping_sub(1);
                7
            }

            // MOV dst, src - 5 states (7 when M is involved)
            0x40..=0x7F => {
                let src = opcode & 7;
                let dst = (opcode >> 3) & 7;
                let val = self.get_reg(bus, src);
                self.set_reg(bus, dst, val);
                if src == 6 || dst == 6 { 7 } else { 5 }
            }

            // ALU A, r - 4 states (M: 7)
            0x80..=0xBF => {
                let src = opcode & 7;
                let val = self.get_reg(bus, src);
                let carry = u8::from(self.regs.flag(crate::CF));
                match (opcode >> 3) & 7 {
                    0 => self.add(val, 0),
                    1 => self.add(val, carry),
                    2 => {
                        let r = self.sub(val, 0);
                        self.regs.a = r;
                    }
                    3 => {
                        let r = self.sub(val, carry);
                        self.regs.a = r;
                    }
                    4 => self.and(val),
                    5 => self.xor(val),
                    6 => self.or(val),
                    _ => {
                        self.sub(val, 0); // CMP: flags only
                    }
                }
                if src == 6 { 7 } else { 4 }
            }

            // ALU A, imm8 - 7 states
            0xC6 => {
                self.add(data_l, 0);
                7
            }
            0xCE => {
                let carry = u8::from(self.regs.flag(crate::CF));
                self.add(data_l, carry);
                7
            }
            0xD6 => {
                let r = self.sub(data_l, 0);
                self.regs.a = r;
                7
            }
            0xDE => {
                let carry = u8::from(self.regs.flag(crate::CF));
                let r = self.sub(data_l, carry);
                self.regs.a = r;
                7
            }
            0xE6 => {
                self.and(data_l);
                7
            }
            0xEE => {
                self.xor(data_l);
                7
            }
            0xF6 => {
                self.or(data_l);
                7
            }
            0xFE => {
                self.sub(data_l, 0);
                7
            }

            // Rcc - 11 taken / 5 not taken
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                if self.condition((opcode >> 3) & 7) {
                    self.regs.pc = self.pop16(bus);
                    11
                } else {
                    5
                }
            }

            // RET - 10 states
            0xC9 => {
                self.regs.pc = self.pop16(bus);
                10
            }

            // Jcc - 10 states either way
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                if self.condition((opcode >> 3) & 7) {
                    self.regs.pc = imm16;
                }
                10
            }

            // JMP - 10 states
            0xC3 => {
                self.regs.pc = imm16;
                10
            }

            // Ccc - 17 taken / 11 not taken
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                if self.condition((opcode >> 3) & 7) {
                    self.push16(bus, self.regs.pc);
                    self.regs.pc = imm16;
                    17
                } else {
                    11
                }
            }

            // CALL - 17 states
            0xCD => {
                self.push16(bus, self.regs.pc);
                self.regs.pc = imm16;
                17
            }

            // POP rp - 10 states
            0xC1 | 0xD1 | 0xE1 => {
                let val = self.pop16(bus);
                self.set_pair((opcode >> 4) & 3, val);
                10
            }
            0xF1 => {
                // POP PSW
                let val = self.pop16(bus);
                self.regs.a = (val >> 8) as u8;
                self.regs.set_f(val as u8);
                10
            }

            // PUSH rp - 11 states
            0xC5 | 0xD5 | 0xE5 => {
                self.push16(bus, self.get_pair((opcode >> 4) & 3));
                11
            }
            0xF5 => {
                // PUSH PSW
                let val = u16::from(self.regs.a) << 8 | u16::from(self.regs.f);
                self.push16(bus, val);
                11
            }

            // RST n - 11 states
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.push16(bus, self.regs.pc);
                self.regs.pc = u16::from(opcode & 0x38);
                11
            }

            // OUT / IN - 10 states
            0xD3 => {
                bus.output(data_l, self.regs.a);
                10
            }
            0xDB => {
                self.regs.a = bus.input(data_l);
                10
            }

            // XTHL - 18 states
            0xE3 => {
                let lo = bus.read(self.regs.sp, MemKind::Stack);
                let hi = bus.read(self.regs.sp.wrapping_add(1), MemKind::Stack);
                bus.write(self.regs.sp, self.regs.l, MemKind::Stack);
                bus.write(self.regs.sp.wrapping_add(1), self.regs.h, MemKind::Stack);
                self.regs.l = lo;
                self.regs.h = hi;
                18
            }

            // PCHL - 5 states
            0xE9 => {
                self.regs.pc = self.regs.hl();
                5
            }

            // XCHG - 4 states
            0xEB => {
                std::mem::swap(&mut self.regs.d, &mut self.regs.h);
                std::mem::swap(&mut self.regs.e, &mut self.regs.l);
                4
            }

            // SPHL - 5 states
            0xF9 => {
                self.regs.sp = self.regs.hl();
                5
            }

            // DI / EI - 4 states
            0xF3 => {
                self.set_iff(false);
                4
            }
            0xFB => {
                self.request_iff();
                4
            }
        }
    }

    /// Replace CY, leaving the other flags alone (rotates, STC, CMC).
    fn set_carry_only(&mut self, carry: bool) {
        let mut f = self.regs.f & !crate::CF;
        if carry {
            f |= crate::CF;
        }
        self.regs.set_f(f);
    }
}
