//! The Hardware container and the instruction loop.
//!
//! `Hardware` exclusively owns every component. One instruction step runs
//! the CPU, then distributes the consumed cycles to the IO commit timers,
//! the raster and the 8253; the display IRQ feeds the CPU interrupt gate
//! and the debugger is consulted at the boundary.

use kr1818wg93::FloppyDisk;
use kr580vm80a::{Bus, I8080, MemKind};

use crate::debugger::Debugger;
use crate::display::Display;
use crate::io::Io;
use crate::memory::Memory;

/// The whole machine.
pub struct Hardware {
    pub cpu: I8080,
    pub memory: Memory,
    pub io: Io,
    pub display: Display,
    pub debugger: Debugger,
}

/// Bus adapter the CPU executes against: memory and ports, with the
/// debugger observing every data access and instruction fetch.
struct CpuBus<'a> {
    memory: &'a mut Memory,
    io: &'a mut Io,
    debugger: &'a mut Debugger,
}

impl Bus for CpuBus<'_> {
    fn read(&mut self, addr: u16, kind: MemKind) -> u8 {
        let val = self.memory.get_byte(addr, kind);
        if kind != MemKind::Fetch {
            self.debugger.on_read(self.memory.global_addr(addr, kind), val);
        }
        val
    }

    fn write(&mut self, addr: u16, value: u8, kind: MemKind) {
        self.memory.set_byte(addr, value, kind);
        self.debugger
            .on_write(self.memory.global_addr(addr, kind), value);
    }

    fn input(&mut self, port: u8) -> u8 {
        self.io.port_in(port)
    }

    fn output(&mut self, port: u8, value: u8) {
        self.io.port_out(port, value);
    }

    fn instr_fetched(&mut self, pc: u16, opcode: u8, data_h: u8, data_l: u8, hl: u16) {
        self.debugger.on_instr(
            self.memory.global_addr(pc, MemKind::Fetch),
            opcode,
            data_h,
            data_l,
            hl,
        );
    }
}

impl Hardware {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cpu: I8080::new(),
            memory: Memory::new(),
            io: Io::new(),
            display: Display::new(),
            debugger: Debugger::new(),
        }
    }

    /// Install a boot ROM and restart the machine.
    ///
    /// # Errors
    ///
    /// Fails when the image exceeds 32 KiB; nothing changes.
    pub fn attach_rom(&mut self, bytes: &[u8]) -> Result<(), String> {
        self.memory.set_rom(bytes)?;
        self.reset();
        Ok(())
    }

    /// Mount a raw disk image into a drive.
    ///
    /// # Errors
    ///
    /// Fails when the image is not the exact raw Vector06C size.
    pub fn load_fdd(&mut self, drive: usize, data: Vec<u8>) -> Result<(), String> {
        if drive >= kr1818wg93::DRIVES_MAX {
            return Err(format!("no drive {drive}"));
        }
        let disk = FloppyDisk::from_bytes(data).map_err(|e| e.to_string())?;
        self.io.fdc.insert(drive, disk);
        Ok(())
    }

    /// Execute one instruction and every per-cycle consequence. Returns
    /// true when the debugger requests a break at the new boundary.
    pub fn execute_instruction(&mut self) -> bool {
        let cycles = {
            let mut bus = CpuBus {
                memory: &mut self.memory,
                io: &mut self.io,
                debugger: &mut self.debugger,
            };
            self.cpu.step(&mut bus)
        };

        for _ in 0..cycles {
            self.io.commit_tick(&mut self.memory);
            self.display.tick(&self.memory, &self.io);
        }
        self.io.timer.tick(cycles);

        if self.display.take_irq() {
            self.cpu.interrupt();
        }

        self.debugger.check_break(
            self.cpu.regs.pc,
            self.memory.mapping_mode(),
            self.memory.page(),
        )
    }

    /// Run instructions until end-of-frame. Returns true when a break
    /// interrupted the frame.
    pub fn execute_frame(&mut self) -> bool {
        loop {
            if self.execute_instruction() {
                return true;
            }
            if self.display.take_t50hz() {
                return false;
            }
        }
    }

    /// Full machine reset: ROM restored, mapping dropped, debugger
    /// counters and tables cleared. Mounted disks stay in their drives
    /// with pending transfers aborted.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.memory.reset();
        self.io.reset();
        self.display.reset();
        self.debugger.reset();
    }
}

impl Default for Hardware {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::FRAME_CC;

    #[test]
    fn loaded_program_runs_with_exact_cycles() {
        let mut hw = Hardware::new();
        hw.memory
            .load(&[0x31, 0x00, 0xC0, 0x3E, 0x42, 0x76], 0x0000)
            .unwrap();

        for _ in 0..3 {
            hw.execute_instruction();
        }

        assert_eq!(hw.cpu.regs.sp, 0xC000);
        assert_eq!(hw.cpu.regs.a, 0x42);
        assert_eq!(hw.cpu.regs.pc, 0x0005);
        assert!(hw.cpu.is_halted());
        assert_eq!(hw.cpu.cycles(), 24);
    }

    #[test]
    fn frame_irq_reaches_the_cpu() {
        let mut hw = Hardware::new();
        // EI; HLT; RST7 vector at 0x38: HLT again.
        let mut program = vec![0xFB, 0x76];
        program.resize(0x38, 0x00);
        program.push(0x76);
        hw.memory.load(&program, 0x0000).unwrap();
        hw.cpu.regs.sp = 0x8000;

        let halted = hw.execute_frame();
        assert!(!halted, "no breakpoints set");
        // The frame IRQ woke the CPU out of HLT through RST 7.
        assert_eq!(hw.cpu.regs.pc, 0x0038);
        assert!(hw.cpu.is_halted());
    }

    #[test]
    fn frame_length_in_cycles() {
        let mut hw = Hardware::new();
        // NOP-sled ROM.
        hw.execute_frame();
        let cc = hw.cpu.cycles();
        // Frame ends within one instruction of the nominal length.
        assert!(
            (FRAME_CC as u64..FRAME_CC as u64 + 4).contains(&cc),
            "expected ~{FRAME_CC} cycles, got {cc}"
        );
    }

    #[test]
    fn out_commit_expires_within_the_out_cycle_budget() {
        let mut hw = Hardware::new();
        // MVI A, 0x55; OUT 0x03 (vertical scroll); NOP
        hw.memory.load(&[0x3E, 0x55, 0xD3, 0x03, 0x00], 0).unwrap();

        hw.execute_instruction(); // MVI
        hw.execute_instruction(); // OUT: latch armed, 10 cycles elapse after
        // The 3-cycle commit expires during the OUT's own cycle budget.
        assert_eq!(hw.io.scroll_vert(), 0x55);
    }

    #[test]
    fn reset_restores_rom_and_clears_state() {
        let mut hw = Hardware::new();
        hw.attach_rom(&[0x3E, 0x42, 0x76]).unwrap();

        for _ in 0..2 {
            hw.execute_instruction();
        }
        assert_eq!(hw.cpu.regs.a, 0x42);

        hw.reset();
        assert_eq!(hw.cpu.regs.pc, 0);
        assert_eq!(hw.cpu.regs.a, 0);
        assert_eq!(hw.cpu.cycles(), 0);
        assert_eq!(hw.memory.get_byte(0, kr580vm80a::MemKind::Read), 0x3E);
    }
}
