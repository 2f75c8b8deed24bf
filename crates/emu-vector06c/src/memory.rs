//! Vector06C memory subsystem.
//!
//! A 64 KiB logical window over a 256 KiB physical store organised as four
//! 64 KiB banks. Bank 0 is the main memory (and holds the video planes);
//! writes to port 0x10 remap stack, data-write and data-read/fetch accesses
//! to any bank independently.
//!
//! # Port 0x10 layout
//!
//! ```text
//! bit 7: remap reads and fetches
//! bit 6: remap writes
//! bit 5: remap stack accesses
//! bits 3-2: target bank 0-3
//! ```
//!
//! The ROM region is write-through: the raw store is used for all accesses
//! and the ROM bytes are restored on reset.

use kr580vm80a::MemKind;

/// One logical address space.
pub const MAIN_MEMORY_LEN: usize = 0x1_0000;
/// Number of 64 KiB banks in the physical store.
pub const RAM_BANKS: usize = 4;
/// Physical store length (256 KiB).
pub const GLOBAL_MEMORY_LEN: usize = RAM_BANKS * MAIN_MEMORY_LEN;
/// Largest boot ROM the machine accepts.
pub const ROM_MAX_LEN: usize = 0x8000;

/// Read/fetch remap enable.
const MAPPING_READ: u8 = 0x80;
/// Write remap enable.
const MAPPING_WRITE: u8 = 0x40;
/// Stack remap enable.
const MAPPING_STACK: u8 = 0x20;
/// Any remapping active.
pub const MAPPING_RAM_MODE_MASK: u8 = MAPPING_READ | MAPPING_WRITE | MAPPING_STACK;

/// The physical store plus the RAM-disk mapping state.
pub struct Memory {
    ram: Vec<u8>,
    /// Boot ROM image, restored into bank 0 on reset.
    rom: Vec<u8>,
    mapping_mode: u8,
}

impl Memory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: vec![0; GLOBAL_MEMORY_LEN],
            rom: Vec::new(),
            mapping_mode: 0,
        }
    }

    /// Install a boot ROM (loaded at logical 0x0000 of bank 0 now and on
    /// every reset).
    ///
    /// # Errors
    ///
    /// Fails when the image exceeds 32 KiB; the previous ROM stays.
    pub fn set_rom(&mut self, bytes: &[u8]) -> Result<(), String> {
        if bytes.len() > ROM_MAX_LEN {
            return Err(format!(
                "ROM image too large: {} bytes, limit {ROM_MAX_LEN}",
                bytes.len()
            ));
        }
        self.rom = bytes.to_vec();
        self.ram[..self.rom.len()].copy_from_slice(&self.rom);
        Ok(())
    }

    /// Copy bytes into bank 0 starting at a logical address.
    ///
    /// # Errors
    ///
    /// Fails when the data would run past the top of the logical space.
    pub fn load(&mut self, bytes: &[u8], addr: u16) -> Result<(), String> {
        let start = usize::from(addr);
        if start + bytes.len() > MAIN_MEMORY_LEN {
            return Err(format!(
                "load of {} bytes at 0x{addr:04X} exceeds the 64 KiB space",
                bytes.len()
            ));
        }
        self.ram[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Clear the store, drop the mapping, restore the ROM.
    pub fn reset(&mut self) {
        self.ram.fill(0);
        self.mapping_mode = 0;
        self.ram[..self.rom.len()].copy_from_slice(&self.rom);
    }

    /// Resolve a logical address to its global address for the given
    /// access kind. The result is always inside the physical store.
    #[must_use]
    pub fn global_addr(&self, addr: u16, kind: MemKind) -> usize {
        let remapped = match kind {
            MemKind::Stack => self.mapping_mode & MAPPING_STACK != 0,
            MemKind::Write => self.mapping_mode & MAPPING_WRITE != 0,
            MemKind::Read | MemKind::Fetch => self.mapping_mode & MAPPING_READ != 0,
        };
        let bank = if remapped {
            usize::from(self.mapping_mode >> 2 & 3)
        } else {
            0
        };
        bank * MAIN_MEMORY_LEN + usize::from(addr)
    }

    #[must_use]
    pub fn get_byte(&self, addr: u16, kind: MemKind) -> u8 {
        self.ram[self.global_addr(addr, kind)]
    }

    pub fn set_byte(&mut self, addr: u16, val: u8, kind: MemKind) {
        let global = self.global_addr(addr, kind);
        self.ram[global] = val;
    }

    /// Three consecutive logical bytes packed little-endian, wrapping at
    /// 0x10000. Used by the disassembler.
    #[must_use]
    pub fn get_three_bytes(&self, addr: u16) -> u32 {
        let b0 = self.get_byte(addr, MemKind::Read);
        let b1 = self.get_byte(addr.wrapping_add(1), MemKind::Read);
        let b2 = self.get_byte(addr.wrapping_add(2), MemKind::Read);
        u32::from(b2) << 16 | u32::from(b1) << 8 | u32::from(b0)
    }

    /// Port 0x10 handler.
    pub fn set_ram_disk_mode(&mut self, val: u8) {
        self.mapping_mode = val;
    }

    #[must_use]
    pub fn mapping_mode(&self) -> u8 {
        self.mapping_mode
    }

    /// Currently selected RAM-disk bank.
    #[must_use]
    pub fn page(&self) -> u8 {
        self.mapping_mode >> 2 & 3
    }

    /// Direct view of bank 0 (the raster reads video planes from here).
    #[must_use]
    pub fn bank0(&self) -> &[u8] {
        &self.ram[..MAIN_MEMORY_LEN]
    }

    /// Read a byte by global address.
    #[must_use]
    pub fn get_global(&self, global: usize) -> u8 {
        self.ram[global]
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_maps_everything_to_bank0() {
        let mem = Memory::new();
        for kind in [MemKind::Fetch, MemKind::Read, MemKind::Write, MemKind::Stack] {
            assert_eq!(mem.global_addr(0x1234, kind), 0x1234);
            assert_eq!(mem.global_addr(0xFFFF, kind), 0xFFFF);
        }
    }

    #[test]
    fn mode_0xe8_remaps_all_kinds_to_bank2() {
        // rdEn=1, wrEn=1, stkEn=1, bank=2.
        let mut mem = Memory::new();
        mem.set_ram_disk_mode(0xE8);

        assert_eq!(mem.global_addr(0x1234, MemKind::Read), 0x21234);
        assert_eq!(mem.global_addr(0x1234, MemKind::Fetch), 0x21234);
        assert_eq!(mem.global_addr(0x1234, MemKind::Write), 0x21234);
        assert_eq!(mem.global_addr(0x1234, MemKind::Stack), 0x21234);
        assert_eq!(mem.page(), 2);
    }

    #[test]
    fn remap_kinds_are_independent() {
        let mut mem = Memory::new();
        // Only writes remapped, bank 1.
        mem.set_ram_disk_mode(0x44);

        assert_eq!(mem.global_addr(0x0000, MemKind::Write), 0x1_0000);
        assert_eq!(mem.global_addr(0x0000, MemKind::Read), 0x0000);
        assert_eq!(mem.global_addr(0x0000, MemKind::Stack), 0x0000);

        // Write lands in bank 1, read still sees bank 0.
        mem.set_byte(0x2000, 0xAB, MemKind::Write);
        assert_eq!(mem.get_byte(0x2000, MemKind::Read), 0x00);
        assert_eq!(mem.get_global(0x1_2000), 0xAB);

        // Only stack remapped, bank 3.
        mem.set_ram_disk_mode(0x2C);
        mem.set_byte(0x8000, 0x55, MemKind::Stack);
        assert_eq!(mem.get_global(0x3_8000), 0x55);
        assert_eq!(mem.get_byte(0x8000, MemKind::Write), 0x00);
    }

    #[test]
    fn every_translation_stays_in_the_store() {
        let mut mem = Memory::new();
        for mode in 0..=255u8 {
            mem.set_ram_disk_mode(mode);
            for kind in [MemKind::Fetch, MemKind::Read, MemKind::Write, MemKind::Stack] {
                assert!(mem.global_addr(0xFFFF, kind) < GLOBAL_MEMORY_LEN);
            }
        }
    }

    #[test]
    fn load_rejects_overflow() {
        let mut mem = Memory::new();
        assert!(mem.load(&[1, 2, 3], 0xFFFD).is_ok());
        assert_eq!(mem.get_byte(0xFFFF, MemKind::Read), 3);

        let err = mem.load(&[1, 2, 3], 0xFFFE).unwrap_err();
        assert!(err.contains("exceeds"));
        // Failed load is a no-op.
        assert_eq!(mem.get_byte(0xFFFE, MemKind::Read), 2);
    }

    #[test]
    fn rom_is_writable_and_restored_on_reset() {
        let mut mem = Memory::new();
        mem.set_rom(&[0xC3, 0x00, 0x01]).unwrap();
        assert_eq!(mem.get_byte(0x0000, MemKind::Read), 0xC3);

        // Write-through: the raw store takes the write.
        mem.set_byte(0x0000, 0x76, MemKind::Write);
        assert_eq!(mem.get_byte(0x0000, MemKind::Read), 0x76);

        mem.reset();
        assert_eq!(mem.get_byte(0x0000, MemKind::Read), 0xC3);
        assert_eq!(mem.mapping_mode(), 0);
    }

    #[test]
    fn oversized_rom_is_rejected() {
        let mut mem = Memory::new();
        let err = mem.set_rom(&vec![0; ROM_MAX_LEN + 1]).unwrap_err();
        assert!(err.contains("too large"));
    }

    #[test]
    fn three_bytes_wrap_at_top_of_memory() {
        let mut mem = Memory::new();
        mem.load(&[0xAA], 0xFFFF).unwrap();
        mem.load(&[0xBB, 0xCC], 0x0000).unwrap();
        assert_eq!(mem.get_three_bytes(0xFFFF), 0x00CC_BBAA);
    }
}
