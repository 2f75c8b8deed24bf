//! Watchpoint table.
//!
//! Watchpoints observe data reads and writes by global address. A match
//! sets a one-shot `tripped` latch; the debugger ORs matches into its
//! `wpBreak` flag on the hot path and resets the latches when the break
//! is delivered.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub type WatchpointId = u32;

/// Which accesses the watchpoint observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchpointAccess {
    R,
    W,
    Rw,
}

impl WatchpointAccess {
    fn overlaps(self, access: WatchpointAccess) -> bool {
        self == WatchpointAccess::Rw || self == access
    }
}

/// Comparison against the configured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchpointCondition {
    Any,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl WatchpointCondition {
    fn holds(self, observed: u16, value: u16) -> bool {
        match self {
            WatchpointCondition::Any => true,
            WatchpointCondition::Eq => observed == value,
            WatchpointCondition::Ne => observed != value,
            WatchpointCondition::Lt => observed < value,
            WatchpointCondition::Gt => observed > value,
            WatchpointCondition::Le => observed <= value,
            WatchpointCondition::Ge => observed >= value,
        }
    }
}

/// Byte-wise or word-wise matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchpointType {
    /// Every byte in the range is compared on its own.
    Len,
    /// The two adjacent bytes at the range start form a 16-bit value;
    /// the matcher waits for both before comparing.
    Word,
}

/// A single watchpoint.
#[derive(Debug, Clone)]
pub struct Watchpoint {
    pub id: WatchpointId,
    pub access: WatchpointAccess,
    /// Watched global-address range `[global_addr, global_addr + len)`.
    pub global_addr: usize,
    /// Range length, 1-8.
    pub len: usize,
    pub cond: WatchpointCondition,
    pub value: u16,
    pub wtype: WatchpointType,
    pub active: bool,
    /// One-shot latch, cleared when the break is delivered.
    pub tripped: bool,
    /// WORD matcher: remembered low byte.
    low_byte: Option<u8>,
    pub comment: String,
}

impl Watchpoint {
    fn check(&mut self, access: WatchpointAccess, global_addr: usize, val: u8) -> bool {
        if !self.active || self.tripped || !self.access.overlaps(access) {
            return false;
        }
        if global_addr < self.global_addr || global_addr >= self.global_addr + self.len {
            return false;
        }
        let matched = match self.wtype {
            WatchpointType::Len => self.cond.holds(u16::from(val), self.value),
            WatchpointType::Word => {
                if global_addr == self.global_addr {
                    self.low_byte = Some(val);
                    false
                } else if global_addr == self.global_addr + 1 {
                    match self.low_byte.take() {
                        Some(lo) => {
                            let word = u16::from(val) << 8 | u16::from(lo);
                            self.cond.holds(word, self.value)
                        }
                        None => false,
                    }
                } else {
                    false
                }
            }
        };
        if matched {
            self.tripped = true;
        }
        matched
    }

    fn reset(&mut self) {
        self.tripped = false;
        self.low_byte = None;
    }
}

/// Construction parameters for [`Watchpoints::add`].
#[derive(Debug, Clone)]
pub struct WatchpointSpec {
    pub access: WatchpointAccess,
    pub global_addr: usize,
    pub len: usize,
    pub cond: WatchpointCondition,
    pub value: u16,
    pub wtype: WatchpointType,
    pub active: bool,
    pub comment: String,
}

impl WatchpointSpec {
    /// A byte-wise watchpoint over a range.
    #[must_use]
    pub fn bytes(access: WatchpointAccess, global_addr: usize, len: usize) -> Self {
        Self {
            access,
            global_addr,
            len: len.clamp(1, 8),
            cond: WatchpointCondition::Any,
            value: 0,
            wtype: WatchpointType::Len,
            active: true,
            comment: String::new(),
        }
    }

    #[must_use]
    pub fn with_condition(mut self, cond: WatchpointCondition, value: u16) -> Self {
        self.cond = cond;
        self.value = value;
        self
    }

    #[must_use]
    pub fn word(mut self) -> Self {
        self.wtype = WatchpointType::Word;
        self
    }
}

struct Table {
    map: BTreeMap<WatchpointId, Watchpoint>,
    next_id: WatchpointId,
}

/// The shared watchpoint table. Cloning shares the underlying map.
#[derive(Clone)]
pub struct Watchpoints {
    inner: Arc<Mutex<Table>>,
}

impl Watchpoints {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Table {
                map: BTreeMap::new(),
                next_id: 0,
            })),
        }
    }

    /// Create a watchpoint, returning its id.
    pub fn add(&self, spec: WatchpointSpec) -> WatchpointId {
        let mut table = self.inner.lock().unwrap();
        let id = table.next_id;
        table.next_id += 1;
        table.map.insert(
            id,
            Watchpoint {
                id,
                access: spec.access,
                global_addr: spec.global_addr,
                len: spec.len.clamp(1, 8),
                cond: spec.cond,
                value: spec.value,
                wtype: spec.wtype,
                active: spec.active,
                tripped: false,
                low_byte: None,
                comment: spec.comment,
            },
        );
        id
    }

    pub fn del(&self, id: WatchpointId) {
        self.inner.lock().unwrap().map.remove(&id);
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().map.clear();
    }

    /// Snapshot for the UI.
    #[must_use]
    pub fn all(&self) -> Vec<Watchpoint> {
        self.inner.lock().unwrap().map.values().cloned().collect()
    }

    /// Hot-path check: does any watchpoint match this access?
    pub fn check(&self, access: WatchpointAccess, global_addr: usize, val: u8) -> bool {
        let mut table = self.inner.lock().unwrap();
        let mut matched = false;
        for wp in table.map.values_mut() {
            matched |= wp.check(access, global_addr, val);
        }
        matched
    }

    /// Clear every one-shot latch (after a break is delivered).
    pub fn reset_tripped(&self) {
        for wp in self.inner.lock().unwrap().map.values_mut() {
            wp.reset();
        }
    }
}

impl Default for Watchpoints {
    fn default() -> Self {
        Self::new()
    }
}
