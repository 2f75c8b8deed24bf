//! Raw Vector06C floppy disk images.
//!
//! The format is a raw byte dump ordered by (track, side, sector): for each
//! track 0..81, for each side 0..1, for each sector 1..5, 1024 data bytes.
//! No headers, no gaps - exactly 839,680 bytes.

use std::fmt;

use crate::{DISK_IMAGE_LEN, SECTOR_LEN, SECTORS_PER_TRACK, SIDES_PER_DISK};

/// Disk image validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskError {
    /// The image is not exactly the raw Vector06C size.
    WrongSize(usize),
}

impl fmt::Display for DiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskError::WrongSize(got) => write!(
                f,
                "disk image must be exactly {DISK_IMAGE_LEN} bytes, got {got}"
            ),
        }
    }
}

impl std::error::Error for DiskError {}

/// A mounted floppy disk.
///
/// Owns the raw image plus the six-byte header synthesised by the last
/// seek and a dirty flag for write-back on eject.
#[derive(Debug)]
pub struct FloppyDisk {
    data: Vec<u8>,
    /// Header of the last sought sector: track, side, sector, size code,
    /// two zero bytes.
    pub(crate) header: [u8; 6],
    dirty: bool,
}

impl FloppyDisk {
    /// A blank, freshly formatted disk (all zeroes).
    #[must_use]
    pub fn blank() -> Self {
        Self {
            data: vec![0; DISK_IMAGE_LEN],
            header: [0; 6],
            dirty: false,
        }
    }

    /// Mount a raw image.
    ///
    /// # Errors
    ///
    /// Returns [`DiskError::WrongSize`] unless the image is exactly
    /// 839,680 bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, DiskError> {
        if data.len() != DISK_IMAGE_LEN {
            return Err(DiskError::WrongSize(data.len()));
        }
        Ok(Self {
            data,
            header: [0; 6],
            dirty: false,
        })
    }

    /// The raw image bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        self.dirty = true;
        &mut self.data
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether the image has been written to since mount (or the last
    /// [`FloppyDisk::clear_dirty`]).
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Acknowledge a flush.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Header of the last sought sector.
    #[must_use]
    pub fn header(&self) -> &[u8; 6] {
        &self.header
    }

    /// Byte offset of a sector in the raw layout.
    ///
    /// Sector IDs start at 1 in CHS addressing; 0 is clamped.
    #[must_use]
    pub fn sector_offset(track_id: usize, side_id: usize, sector_id: usize) -> usize {
        let sectors = SECTORS_PER_TRACK * (track_id * SIDES_PER_DISK + side_id);
        (sectors + sector_id.saturating_sub(1)) * SECTOR_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_size_is_validated() {
        assert!(FloppyDisk::from_bytes(vec![0; DISK_IMAGE_LEN]).is_ok());
        let err = FloppyDisk::from_bytes(vec![0; 1000]).unwrap_err();
        assert_eq!(err, DiskError::WrongSize(1000));
    }

    #[test]
    fn sector_offsets_follow_raw_layout() {
        assert_eq!(FloppyDisk::sector_offset(0, 0, 1), 0);
        assert_eq!(FloppyDisk::sector_offset(0, 0, 2), 1024);
        assert_eq!(FloppyDisk::sector_offset(0, 1, 1), 5 * 1024);
        assert_eq!(FloppyDisk::sector_offset(1, 0, 1), 10 * 1024);
        // Sector 0 is clamped to sector 1.
        assert_eq!(FloppyDisk::sector_offset(0, 0, 0), 0);
        // Last sector of the last track ends exactly at the image length.
        assert_eq!(
            FloppyDisk::sector_offset(81, 1, 5) + SECTOR_LEN,
            DISK_IMAGE_LEN
        );
    }

    #[test]
    fn writes_mark_dirty() {
        let mut disk = FloppyDisk::blank();
        assert!(!disk.is_dirty());
        disk.data_mut()[0] = 1;
        assert!(disk.is_dirty());
        disk.clear_dirty();
        assert!(!disk.is_dirty());
    }
}
