//! Breakpoint table.
//!
//! Keyed by logical address. The table lives behind a mutex shared with
//! the UI context, which mutates it directly; the emulation context
//! consults it at every instruction boundary.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::memory::MAPPING_RAM_MODE_MASK;

/// Breakpoint life-cycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointStatus {
    Deleted,
    Disabled,
    Active,
}

/// Page mask matching every RAM-disk bank.
pub const BREAKPOINT_PAGES_ALL: u8 = 0x0F;

/// A single breakpoint.
#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub addr: u16,
    /// Bitmask over the four RAM-disk banks this breakpoint arms for.
    /// With no remapping active, bit 0 (the main bank) is consulted.
    pub pages: u8,
    pub status: BreakpointStatus,
    /// Erase the breakpoint on its first hit.
    pub auto_del: bool,
    pub comment: String,
}

impl Breakpoint {
    #[must_use]
    pub fn new(addr: u16) -> Self {
        Self {
            addr,
            pages: BREAKPOINT_PAGES_ALL,
            status: BreakpointStatus::Active,
            auto_del: false,
            comment: String::new(),
        }
    }

    #[must_use]
    pub fn with_pages(mut self, pages: u8) -> Self {
        self.pages = pages;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: BreakpointStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn auto_delete(mut self) -> Self {
        self.auto_del = true;
        self
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Does the page mask arm this breakpoint under the given mapping?
    fn page_matches(&self, mapping_mode: u8, page: u8) -> bool {
        if mapping_mode & MAPPING_RAM_MODE_MASK == 0 {
            self.pages & 1 != 0
        } else {
            self.pages & 1 << page != 0
        }
    }
}

/// The shared breakpoint table. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct Breakpoints {
    map: Arc<Mutex<BTreeMap<u16, Breakpoint>>>,
}

impl Breakpoints {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a breakpoint.
    pub fn add(&self, bp: Breakpoint) {
        self.map.lock().unwrap().insert(bp.addr, bp);
    }

    /// Change a breakpoint's status, creating an active one if absent.
    pub fn set_status(&self, addr: u16, status: BreakpointStatus) {
        let mut map = self.map.lock().unwrap();
        map.entry(addr)
            .or_insert_with(|| Breakpoint::new(addr))
            .status = status;
    }

    pub fn del(&self, addr: u16) {
        self.map.lock().unwrap().remove(&addr);
    }

    pub fn clear(&self) {
        self.map.lock().unwrap().clear();
    }

    /// Status for display purposes; `Deleted` when absent.
    #[must_use]
    pub fn status(&self, addr: u16) -> BreakpointStatus {
        self.map
            .lock()
            .unwrap()
            .get(&addr)
            .map_or(BreakpointStatus::Deleted, |bp| bp.status)
    }

    /// Snapshot for the UI.
    #[must_use]
    pub fn all(&self) -> Vec<Breakpoint> {
        self.map.lock().unwrap().values().cloned().collect()
    }

    /// Verdict for the instruction boundary at `addr`. An auto-delete
    /// breakpoint is erased on its first hit.
    pub fn check(&self, addr: u16, mapping_mode: u8, page: u8) -> bool {
        let mut map = self.map.lock().unwrap();
        let Some(bp) = map.get(&addr) else {
            return false;
        };
        let hit =
            bp.status == BreakpointStatus::Active && bp.page_matches(mapping_mode, page);
        if hit && bp.auto_del {
            map.remove(&addr);
        }
        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_breakpoint_hits_at_its_address() {
        let bps = Breakpoints::new();
        bps.add(Breakpoint::new(0x0100));

        assert!(bps.check(0x0100, 0, 0));
        assert!(!bps.check(0x0101, 0, 0));
        // Not auto-delete: keeps hitting.
        assert!(bps.check(0x0100, 0, 0));
    }

    #[test]
    fn disabled_and_deleted_never_hit() {
        let bps = Breakpoints::new();
        bps.add(Breakpoint::new(0x0100).with_status(BreakpointStatus::Disabled));
        assert!(!bps.check(0x0100, 0, 0));

        bps.del(0x0100);
        assert!(!bps.check(0x0100, 0, 0));
        assert_eq!(bps.status(0x0100), BreakpointStatus::Deleted);
    }

    #[test]
    fn auto_delete_fires_once() {
        let bps = Breakpoints::new();
        bps.add(Breakpoint::new(0x0100).auto_delete());

        assert!(bps.check(0x0100, 0, 0));
        assert!(!bps.check(0x0100, 0, 0));
        assert!(bps.all().is_empty());
    }

    #[test]
    fn page_mask_consulted_under_remapping() {
        let bps = Breakpoints::new();
        // Armed only for bank 2.
        bps.add(Breakpoint::new(0x0100).with_pages(0b0100));

        // No remapping: main bank, bit 0 not set.
        assert!(!bps.check(0x0100, 0x00, 0));
        // Read-remap to bank 2 (mode 0x88): bit 2 set.
        assert!(bps.check(0x0100, 0x88, 2));
        // Remap to bank 1: not armed.
        assert!(!bps.check(0x0100, 0x84, 1));
    }

    #[test]
    fn shared_clones_see_the_same_table() {
        let bps = Breakpoints::new();
        let ui_side = bps.clone();
        ui_side.add(Breakpoint::new(0x0200));
        assert!(bps.check(0x0200, 0, 0));
    }
}
