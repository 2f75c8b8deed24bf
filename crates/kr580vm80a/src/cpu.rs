//! 8080 CPU state and the step loop.

use crate::bus::{Bus, MemKind};
use crate::execute::INSTR_LENGTHS;
use crate::registers::{Registers, AF, CF, PF, SF, ZF};

/// Cycle cost of an injected RST (same as a fetched one).
const INT_RST_CYCLES: u64 = 11;

/// The Intel 8080A CPU.
///
/// `step()` executes one whole instruction. Interrupts are accepted only at
/// instruction boundaries; `EI` enables them with a one-instruction delay.
#[derive(Debug)]
pub struct I8080 {
    /// CPU registers.
    pub regs: Registers,

    /// Interrupt enable flip-flop (INTE).
    iff: bool,

    /// Set by EI; becomes `iff = true` only after the following
    /// instruction has executed.
    inte_pending: bool,

    /// Set by HLT; cleared when an interrupt is accepted.
    halted: bool,

    /// An INT has been requested and not yet serviced.
    int_pending: bool,

    /// Cumulative machine-state counter.
    cc: u64,
}

impl I8080 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            iff: false,
            inte_pending: false,
            halted: false,
            int_pending: false,
            cc: 0,
        }
    }

    /// Reset the CPU to its power-on state.
    pub fn reset(&mut self) {
        self.regs = Registers::new();
        self.iff = false;
        self.inte_pending = false;
        self.halted = false;
        self.int_pending = false;
        self.cc = 0;
    }

    /// Request an interrupt. It is accepted at the next instruction
    /// boundary where INTE is set, and stays pending until then.
    pub fn interrupt(&mut self) {
        self.int_pending = true;
    }

    /// Total machine states executed since reset.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cc
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    #[must_use]
    pub fn interrupts_enabled(&self) -> bool {
        self.iff
    }

    /// Execute one instruction and return the machine states it consumed.
    ///
    /// The fetch path reads the opcode and the two following bytes with
    /// `MemKind::Fetch`, reports the instruction to the bus observer once,
    /// advances PC by the instruction length, then executes. A pending
    /// interrupt (with INTE set) instead injects RST 7 at the current PC
    /// without advancing it.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> u64 {
        let activate_inte = self.inte_pending;

        let cycles = if self.int_pending && self.iff {
            self.int_pending = false;
            self.iff = false;
            self.halted = false;
            bus.instr_fetched(self.regs.pc, 0xFF, 0, 0, self.regs.hl());
            self.push16(bus, self.regs.pc);
            self.regs.pc = 0x0038;
            INT_RST_CYCLES
        } else {
            let pc = self.regs.pc;
            let opcode = bus.read(pc, MemKind::Fetch);
            let data_l = bus.read(pc.wrapping_add(1), MemKind::Fetch);
            let data_h = bus.read(pc.wrapping_add(2), MemKind::Fetch);
            bus.instr_fetched(pc, opcode, data_h, data_l, self.regs.hl());
            self.regs.pc = pc.wrapping_add(u16::from(INSTR_LENGTHS[opcode as usize]));
            self.execute(bus, opcode, data_l, data_h)
        };

        // EI takes effect one instruction late; a DI in between cancels it.
        if activate_inte && self.inte_pending {
            self.inte_pending = false;
            self.iff = true;
        }

        self.cc += cycles;
        cycles
    }

    // -----------------------------------------------------------------------
    // Helpers shared with the opcode dispatch
    // -----------------------------------------------------------------------

    pub(crate) fn set_iff(&mut self, enabled: bool) {
        self.iff = enabled;
        if !enabled {
            self.inte_pending = false;
        }
    }

    pub(crate) fn request_iff(&mut self) {
        self.inte_pending = true;
    }

    pub(crate) fn set_halted(&mut self) {
        self.halted = true;
    }

    /// S, Z and P for a result byte.
    pub(crate) fn szp_flags(val: u8) -> u8 {
        let mut f = val & SF;
        if val == 0 {
            f |= ZF;
        }
        if val.count_ones() % 2 == 0 {
            f |= PF;
        }
        f
    }

    /// A ← A + val + carry, all flags.
    pub(crate) fn add(&mut self, val: u8, carry: u8) {
        let a = self.regs.a;
        let r16 = u16::from(a) + u16::from(val) + u16::from(carry);
        let r = r16 as u8;
        let mut f = Self::szp_flags(r);
        if r16 > 0xFF {
            f |= CF;
        }
        if (a ^ val ^ r) & 0x10 != 0 {
            f |= AF;
        }
        self.regs.a = r;
        self.regs.set_f(f);
    }

    /// A − val − borrow, all flags. Returns the result so CMP can discard it.
    ///
    /// On the 8080 the auxiliary carry after a subtract is the complement of
    /// the borrow out of bit 3 (the ALU adds the two's complement).
    pub(crate) fn sub(&mut self, val: u8, borrow: u8) -> u8 {
        let a = self.regs.a;
        let r = a.wrapping_sub(val).wrapping_sub(borrow);
        let mut f = Self::szp_flags(r);
        if u16::from(val) + u16::from(borrow) > u16::from(a) {
            f |= CF;
        }
        if (a ^ val ^ r) & 0x10 == 0 {
            f |= AF;
        }
        self.regs.set_f(f);
        r
    }

    /// A ← A & val. CY cleared; AC is the OR of bit 3 of the operands.
    pub(crate) fn and(&mut self, val: u8) {
        let a = self.regs.a;
        let r = a & val;
        let mut f = Self::szp_flags(r);
        if (a | val) & 0x08 != 0 {
            f |= AF;
        }
        self.regs.a = r;
        self.regs.set_f(f);
    }

    /// A ← A ^ val. CY and AC cleared.
    pub(crate) fn xor(&mut self, val: u8) {
        self.regs.a ^= val;
        let f = Self::szp_flags(self.regs.a);
        self.regs.set_f(f);
    }

    /// A ← A | val. CY and AC cleared.
    pub(crate) fn or(&mut self, val: u8) {
        self.regs.a |= val;
        let f = Self::szp_flags(self.regs.a);
        self.regs.set_f(f);
    }

    /// val + 1 with S, Z, P, AC (CY untouched).
    pub(crate) fn inr(&mut self, val: u8) -> u8 {
        let r = val.wrapping_add(1);
        let mut f = (self.regs.f & CF) | Self::szp_flags(r);
        if r & 0x0F == 0 {
            f |= AF;
        }
        self.regs.set_f(f);
        r
    }

    /// val − 1 with S, Z, P, AC (CY untouched).
    pub(crate) fn dcr(&mut self, val: u8) -> u8 {
        let r = val.wrapping_sub(1);
        let mut f = (self.regs.f & CF) | Self::szp_flags(r);
        if r & 0x0F != 0x0F {
            f |= AF;
        }
        self.regs.set_f(f);
        r
    }

    /// HL ← HL + val. Only CY is affected.
    pub(crate) fn dad(&mut self, val: u16) {
        let r = u32::from(self.regs.hl()) + u32::from(val);
        self.regs.set_hl(r as u16);
        let mut f = self.regs.f & !CF;
        if r > 0xFFFF {
            f |= CF;
        }
        self.regs.set_f(f);
    }

    /// Decimal adjust A, per Intel's published algorithm including the
    /// AC carry-in.
    pub(crate) fn daa(&mut self) {
        let a = self.regs.a;
        let ac = self.regs.flag(AF);
        let cy = self.regs.flag(CF);

        let mut correction = 0u8;
        let mut carry = cy;
        if a & 0x0F > 9 || ac {
            correction |= 0x06;
        }
        if a > 0x99 || cy {
            correction |= 0x60;
            carry = true;
        }

        let new_ac = (a & 0x0F) + (correction & 0x0F) > 0x0F;
        let r = a.wrapping_add(correction);

        let mut f = Self::szp_flags(r);
        if carry {
            f |= CF;
        }
        if new_ac {
            f |= AF;
        }
        self.regs.a = r;
        self.regs.set_f(f);
    }

    pub(crate) fn push16<B: Bus>(&mut self, bus: &mut B, val: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, (val >> 8) as u8, MemKind::Stack);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, val as u8, MemKind::Stack);
    }

    pub(crate) fn pop16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = bus.read(self.regs.sp, MemKind::Stack);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = bus.read(self.regs.sp, MemKind::Stack);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from(hi) << 8 | u16::from(lo)
    }

    /// Evaluate the condition encoded in bits 5-3 of a conditional opcode.
    pub(crate) fn condition(&self, idx: u8) -> bool {
        match idx {
            0 => !self.regs.flag(ZF),
            1 => self.regs.flag(ZF),
            2 => !self.regs.flag(CF),
            3 => self.regs.flag(CF),
            4 => !self.regs.flag(PF),
            5 => self.regs.flag(PF),
            6 => !self.regs.flag(SF),
            _ => self.regs.flag(SF),
        }
    }
}

impl Default for I8080 {
    fn default() -> Self {
        Self::new()
    }
}
