//! Vector06C I/O subsystem.
//!
//! Decodes the CPU port space onto the two 8255 PPIs, the 8253 timer, the
//! floppy controller, the palette latch and the RAM-disk select. Output
//! writes are not applied immediately: the hardware commits them a few
//! CPU cycles later, which several demos rely on for raster effects. The
//! generic path commits after 3 cycles, palette writes after 15.
//!
//! PPI2 is fitted but unused by stock software; its registers are latched
//! and read back, nothing more.

use kr1818wg93::Fdc1793;
use kr580vi53::Pit8253;

use crate::keyboard::Keyboard;
use crate::memory::Memory;

/// Cycles between an OUT and its commit.
pub const OUT_COMMIT_TIME: i32 = 3;
/// Cycles between a palette write and the palette update.
pub const PALETTE_COMMIT_TIME: i32 = 15;
/// Commit timer idle value.
const PORT_NO_COMMIT: i32 = -1;

pub const PALETTE_LEN: usize = 16;

/// The palette commit timer arms only on this port.
const PORT_OUT_BORDER_COLOR: u8 = 0x0C;

/// PPI and latch state, the commit timers, and the attached chips.
pub struct Io {
    /// PPI1 control word.
    cw: u8,
    /// PPI1 port A: keyboard row select / vertical scroll.
    port_a: u8,
    /// PPI1 port B: border colour index and display mode.
    port_b: u8,
    /// PPI1 port C: tape/RUS-LAT output, modifier-key input.
    port_c: u8,
    /// PPI2 registers, latched only.
    cw2: u8,
    port_a2: u8,
    port_b2: u8,
    port_c2: u8,
    /// Joystick bytes (idle 0xFF).
    pub joy0: u8,
    pub joy1: u8,
    /// Latched (port, value) awaiting the generic commit.
    out_port: u8,
    out_byte: u8,
    /// Latched palette byte awaiting the palette commit.
    hw_color: u8,
    /// Border colour index (palette slot the palette commit writes).
    brd_color_idx: u8,
    /// 512-pixel horizontal mode.
    display_mode_512: bool,
    /// RUS/LAT latch and its shift-register history.
    ruslat: u8,
    ruslat_history: u32,
    palette: [u32; PALETTE_LEN],
    out_commit_timer: i32,
    palette_commit_timer: i32,
    pub keyboard: Keyboard,
    pub timer: Pit8253,
    pub fdc: Fdc1793,
}

impl Io {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cw: 0x08,
            port_a: 0xFF,
            port_b: 0xFF,
            port_c: 0xFF,
            cw2: 0,
            port_a2: 0xFF,
            port_b2: 0xFF,
            port_c2: 0xFF,
            joy0: 0xFF,
            joy1: 0xFF,
            out_port: 0,
            out_byte: 0,
            hw_color: 0,
            brd_color_idx: 0,
            display_mode_512: false,
            ruslat: 0,
            ruslat_history: 0,
            palette: [0; PALETTE_LEN],
            out_commit_timer: PORT_NO_COMMIT,
            palette_commit_timer: PORT_NO_COMMIT,
            keyboard: Keyboard::new(),
            timer: Pit8253::new(),
            fdc: Fdc1793::new(),
        }
    }

    pub fn reset(&mut self) {
        let keyboard = std::mem::take(&mut self.keyboard);
        let mut fdc = std::mem::replace(&mut self.fdc, Fdc1793::new());
        fdc.reset();
        *self = Self::new();
        self.keyboard = keyboard;
        self.keyboard.release_all();
        self.fdc = fdc;
    }

    /// Port read. Honours the PPI1 control word's direction bits.
    pub fn port_in(&mut self, port: u8) -> u8 {
        match port {
            0x00 => 0xFF,
            0x01 => {
                let low = if self.cw & 0x01 != 0 {
                    0x0B
                } else {
                    self.port_c & 0x0F
                };
                let high = if self.cw & 0x08 != 0 {
                    (if self.keyboard.ss { 0 } else { 1 << 5 })
                        | (if self.keyboard.us { 0 } else { 1 << 6 })
                        | (if self.keyboard.rus { 0 } else { 1 << 7 })
                } else {
                    self.port_c & 0xF0
                };
                low | high
            }
            0x02 => {
                if self.cw & 0x02 != 0 {
                    self.keyboard.read(self.port_a)
                } else {
                    self.port_b
                }
            }
            0x03 => {
                if self.cw & 0x10 == 0 {
                    self.port_a
                } else {
                    0xFF
                }
            }
            0x04 => self.cw2,
            0x05 => self.port_c2,
            0x06 => self.port_b2,
            0x07 => self.port_a2,
            0x08..=0x0B => self.timer.read(port - 0x08),
            0x0E => self.joy0,
            0x0F => self.joy1,
            // AY sockets are empty.
            0x14 | 0x15 => 0xFF,
            0x18 => self.fdc.read_data(),
            0x19 => self.fdc.read_sector(),
            0x1A => self.fdc.read_track(),
            0x1B => self.fdc.read_status(),
            0x1C => self.fdc.read_ready(),
            _ => 0xFF,
        }
    }

    /// Port write: latch the pair and arm the commit timers. Nothing is
    /// applied until [`Io::commit_tick`] counts the delay down.
    pub fn port_out(&mut self, port: u8, val: u8) {
        self.out_port = port;
        self.out_byte = val;
        self.out_commit_timer = OUT_COMMIT_TIME;
        if port == PORT_OUT_BORDER_COLOR {
            self.palette_commit_timer = PALETTE_COMMIT_TIME;
        }
    }

    /// One CPU cycle of commit-timer countdown.
    pub fn commit_tick(&mut self, memory: &mut Memory) {
        if self.out_commit_timer >= 0 {
            self.out_commit_timer -= 1;
            if self.out_commit_timer == 0 {
                let (port, val) = (self.out_port, self.out_byte);
                self.port_out_handling(port, val, memory);
            }
        }
        if self.palette_commit_timer >= 0 {
            self.palette_commit_timer -= 1;
            if self.palette_commit_timer == 0 {
                self.palette[usize::from(self.brd_color_idx & 0x0F)] =
                    decode_color(self.hw_color);
            }
        }
    }

    /// Apply a committed port write.
    fn port_out_handling(&mut self, port: u8, val: u8, memory: &mut Memory) {
        match port {
            0x00 => {
                if val & 0x80 == 0 {
                    // Port C bit set/reset: bit 0 selects set, bits 1-3
                    // the bit index.
                    let bit = val >> 1 & 7;
                    if val & 1 != 0 {
                        self.port_c |= 1 << bit;
                    } else {
                        self.port_c &= !(1 << bit);
                    }
                } else {
                    self.cw = val;
                    self.port_out_handling(0x01, 0, memory);
                    self.port_out_handling(0x02, 0, memory);
                    self.port_out_handling(0x03, 0, memory);
                }
            }
            0x01 => {
                self.ruslat = self.port_c >> 3 & 1;
                self.ruslat_history = self.ruslat_history << 1 | u32::from(self.ruslat);
                self.port_c = val;
            }
            0x02 => {
                self.port_b = val;
                self.brd_color_idx = val & 0x0F;
                self.display_mode_512 = val & 0x10 != 0;
            }
            0x03 => self.port_a = val,
            0x04 => self.cw2 = val,
            0x05 => self.port_c2 = val,
            0x06 => self.port_b2 = val,
            0x07 => self.port_a2 = val,
            0x08..=0x0B => self.timer.write(port - 0x08, val),
            0x0C..=0x0F => self.hw_color = val,
            0x10 => memory.set_ram_disk_mode(val),
            // AY sockets are empty.
            0x14 | 0x15 => {}
            0x18 => self.fdc.write_data(val),
            0x19 => self.fdc.write_sector(val),
            0x1A => self.fdc.write_track(val),
            0x1B => self.fdc.write_command(val),
            0x1C => self.fdc.write_system(val),
            _ => {}
        }
    }

    #[must_use]
    pub fn palette(&self) -> &[u32; PALETTE_LEN] {
        &self.palette
    }

    #[must_use]
    pub fn border_color_idx(&self) -> u8 {
        self.brd_color_idx
    }

    #[must_use]
    pub fn display_mode_512(&self) -> bool {
        self.display_mode_512
    }

    /// Vertical scroll register (PPI1 port A).
    #[must_use]
    pub fn scroll_vert(&self) -> u8 {
        self.port_a
    }

    #[must_use]
    pub fn ruslat_history(&self) -> u32 {
        self.ruslat_history
    }
}

impl Default for Io {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a Vector06C palette byte (RRRGGGBB) into ARGB, expanding each
/// channel by bit replication.
#[must_use]
pub fn decode_color(val: u8) -> u32 {
    let r = u32::from(val >> 5 & 7);
    let g = u32::from(val >> 2 & 7);
    let b = u32::from(val & 3);
    let r8 = r << 5 | r << 2 | r >> 1;
    let g8 = g << 5 | g << 2 | g >> 1;
    let b8 = b * 0x55;
    0xFF00_0000 | r8 << 16 | g8 << 8 | b8
}
