//! Vector06C keyboard matrix.
//!
//! An 8×8 matrix scanned through PPI1: the CPU writes a row-select mask to
//! port A (active low) and reads the column data on port B, also active
//! low. Three modifier keys (СС, УС, РУС/LAT) bypass the matrix and appear
//! on the high bits of port C.

/// A key event target: a matrix position or one of the modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Matrix key at (row 0-7, bit 0-7).
    Matrix { row: u8, bit: u8 },
    /// СС modifier (port C bit 5).
    Ss,
    /// УС modifier (port C bit 6).
    Us,
    /// РУС/LAT modifier (port C bit 7).
    Rus,
}

/// Keyboard state: 8 rows of 8 keys plus the three modifiers.
pub struct Keyboard {
    /// Row state, bit set = key pressed (inverted on read).
    rows: [u8; 8],
    pub ss: bool,
    pub us: bool,
    pub rus: bool,
}

impl Keyboard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: [0; 8],
            ss: false,
            us: false,
            rus: false,
        }
    }

    /// Apply a key event.
    pub fn set(&mut self, key: Key, pressed: bool) {
        match key {
            Key::Matrix { row, bit } => self.set_key(row, bit, pressed),
            Key::Ss => self.ss = pressed,
            Key::Us => self.us = pressed,
            Key::Rus => self.rus = pressed,
        }
    }

    /// Set or clear a matrix key.
    pub fn set_key(&mut self, row: u8, bit: u8, pressed: bool) {
        if row < 8 && bit < 8 {
            if pressed {
                self.rows[row as usize] |= 1 << bit;
            } else {
                self.rows[row as usize] &= !(1 << bit);
            }
        }
    }

    /// Scan the matrix for a port B read.
    ///
    /// `row_select` is the port A value: a cleared bit selects that row.
    /// Selected rows are OR'd together and the result is inverted
    /// (pressed keys read as 0).
    #[must_use]
    pub fn read(&self, row_select: u8) -> u8 {
        let mut acc: u8 = 0;
        for (i, row) in self.rows.iter().enumerate() {
            if row_select & 1 << i == 0 {
                acc |= row;
            }
        }
        !acc
    }

    pub fn release_all(&mut self) {
        self.rows = [0; 8];
        self.ss = false;
        self.us = false;
        self.rus = false;
    }
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}
