//! Request dispatcher and the emulation thread.
//!
//! The emulation context owns the [`Hardware`] and runs the instruction
//! loop; the UI context holds a [`HardwareHandle`] and submits requests
//! over a channel. Requests are serviced only between whole instructions.
//! While stopped, the thread blocks on the queue, so `STOP` suspends the
//! machine until `RUN`, `STEP`, `EXECUTE_FRAME` or `RESET` arrives.
//!
//! Breakpoint and watchpoint tables are shared directly (mutex-guarded),
//! so the UI mutates them without a request round-trip.

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;

use kr580vm80a::MemKind;
use serde::Serialize;

use crate::debug_data::DebugData;
use crate::debugger::{Breakpoints, DisasmLine, Watchpoints};
use crate::display::{FRAME_H, FRAME_W};
use crate::keyboard::Key;
use crate::machine::Hardware;

/// A request submitted by the UI context.
#[derive(Debug)]
pub enum Request {
    Run,
    Stop,
    Reset,
    IsRunning,
    /// Execute up to `count` instructions; a break cancels the batch.
    Step { count: u32 },
    /// Run to the next end-of-frame (honouring breaks).
    ExecuteFrame,
    GetRegs,
    GetByteRam { addr: u16 },
    GetThreeBytesRam { addr: u16 },
    GetGlobalAddrRam { addr: u16 },
    SetMem { addr: u16, value: u8 },
    ScrollVert,
    GetDisplayData,
    LoadRom { data: Vec<u8> },
    LoadFdd { drive: usize, data: Vec<u8> },
    /// Unmount a drive, returning the image and its dirty flag.
    EjectFdd { drive: usize },
    KeyHandling { key: Key, pressed: bool },
    Disasm {
        addr: u16,
        lines: usize,
        instruction_offset: i32,
    },
    GetTraceLog {
        offset: usize,
        lines: usize,
        filter: u8,
    },
    SetDebugData { data: DebugData },
    /// Fold the recent-access rings and read the packed recency value.
    GetLastRw { global_addr: u32 },
    Shutdown,
}

/// Register snapshot for the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegsSnapshot {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    pub iff: bool,
    pub halted: bool,
    pub cc: u64,
}

/// A produced frame.
#[derive(Debug, Clone)]
pub struct DisplayFrame {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u32>,
    pub frame_num: u64,
}

/// An ejected disk image.
#[derive(Debug, Clone)]
pub struct EjectedFdd {
    pub data: Vec<u8>,
    pub dirty: bool,
}

/// A request result.
#[derive(Debug)]
pub enum Reply {
    None,
    Bool(bool),
    Byte(u8),
    Dword(u32),
    Regs(RegsSnapshot),
    Display(Box<DisplayFrame>),
    Fdd(Option<EjectedFdd>),
    Disasm(Vec<DisasmLine>),
    Lines(Vec<String>),
    Error(String),
}

struct Envelope {
    request: Request,
    reply_tx: Sender<Reply>,
}

/// The UI context's endpoint: submits requests and owns shared handles
/// to the breakpoint/watchpoint tables.
pub struct HardwareHandle {
    tx: Sender<Envelope>,
    breakpoints: Breakpoints,
    watchpoints: Watchpoints,
    thread: Option<JoinHandle<()>>,
}

impl HardwareHandle {
    /// Move the hardware onto its own thread and return the handle.
    #[must_use]
    pub fn start(hardware: Hardware) -> Self {
        let breakpoints = hardware.debugger.breakpoints();
        let watchpoints = hardware.debugger.watchpoints();
        let (tx, rx) = channel();
        let thread = std::thread::spawn(move || emulation_loop(hardware, &rx));
        Self {
            tx,
            breakpoints,
            watchpoints,
            thread: Some(thread),
        }
    }

    /// Submit a request and wait for its reply.
    pub fn request(&self, request: Request) -> Reply {
        let (reply_tx, reply_rx) = channel();
        if self.tx.send(Envelope { request, reply_tx }).is_err() {
            return Reply::Error("emulation thread is gone".to_string());
        }
        reply_rx
            .recv()
            .unwrap_or_else(|_| Reply::Error("emulation thread is gone".to_string()))
    }

    /// Shared breakpoint table (mutated directly, no round-trip).
    #[must_use]
    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    /// Shared watchpoint table.
    #[must_use]
    pub fn watchpoints(&self) -> &Watchpoints {
        &self.watchpoints
    }
}

impl Drop for HardwareHandle {
    fn drop(&mut self) {
        let _ = self.request(Request::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn emulation_loop(mut hw: Hardware, rx: &Receiver<Envelope>) {
    let mut running = false;
    loop {
        if running {
            // Drain queued requests at the instruction boundary.
            loop {
                match rx.try_recv() {
                    Ok(envelope) => {
                        if !serve(&mut hw, &mut running, envelope) {
                            return;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return,
                }
            }
            if running && hw.execute_instruction() {
                running = false;
            }
        } else {
            // Stopped: block until the UI says otherwise.
            match rx.recv() {
                Ok(envelope) => {
                    if !serve(&mut hw, &mut running, envelope) {
                        return;
                    }
                }
                Err(_) => return,
            }
        }
    }
}

/// Serve one request. Returns false on shutdown.
fn serve(hw: &mut Hardware, running: &mut bool, envelope: Envelope) -> bool {
    if matches!(envelope.request, Request::Shutdown) {
        let _ = envelope.reply_tx.send(Reply::None);
        return false;
    }
    let reply = handle_request(hw, running, envelope.request);
    let _ = envelope.reply_tx.send(reply);
    true
}

fn handle_request(hw: &mut Hardware, running: &mut bool, request: Request) -> Reply {
    match request {
        Request::Run => {
            *running = true;
            Reply::None
        }
        Request::Stop => {
            *running = false;
            Reply::None
        }
        Request::Reset => {
            hw.reset();
            Reply::None
        }
        Request::IsRunning => Reply::Bool(*running),
        Request::Step { count } => {
            for _ in 0..count {
                if hw.execute_instruction() {
                    *running = false;
                    break;
                }
            }
            Reply::None
        }
        Request::ExecuteFrame => {
            let brk = hw.execute_frame();
            if brk {
                *running = false;
            }
            Reply::Bool(brk)
        }
        Request::GetRegs => {
            let regs = &hw.cpu.regs;
            Reply::Regs(RegsSnapshot {
                a: regs.a,
                f: regs.f,
                b: regs.b,
                c: regs.c,
                d: regs.d,
                e: regs.e,
                h: regs.h,
                l: regs.l,
                sp: regs.sp,
                pc: regs.pc,
                iff: hw.cpu.interrupts_enabled(),
                halted: hw.cpu.is_halted(),
                cc: hw.cpu.cycles(),
            })
        }
        Request::GetByteRam { addr } => Reply::Byte(hw.memory.get_byte(addr, MemKind::Read)),
        Request::GetThreeBytesRam { addr } => Reply::Dword(hw.memory.get_three_bytes(addr)),
        Request::GetGlobalAddrRam { addr } => {
            Reply::Dword(hw.memory.global_addr(addr, MemKind::Read) as u32)
        }
        Request::SetMem { addr, value } => {
            hw.memory.set_byte(addr, value, MemKind::Write);
            Reply::None
        }
        Request::ScrollVert => Reply::Byte(hw.io.scroll_vert()),
        Request::GetDisplayData => Reply::Display(Box::new(DisplayFrame {
            width: FRAME_W,
            height: FRAME_H,
            pixels: hw.display.frame_buffer().to_vec(),
            frame_num: hw.display.frame_num(),
        })),
        Request::LoadRom { data } => match hw.attach_rom(&data) {
            Ok(()) => Reply::None,
            Err(e) => Reply::Error(e),
        },
        Request::LoadFdd { drive, data } => match hw.load_fdd(drive, data) {
            Ok(()) => Reply::None,
            Err(e) => Reply::Error(e),
        },
        Request::EjectFdd { drive } => {
            if drive >= kr1818wg93::DRIVES_MAX {
                return Reply::Error(format!("no drive {drive}"));
            }
            Reply::Fdd(hw.io.fdc.eject(drive).map(|disk| EjectedFdd {
                dirty: disk.is_dirty(),
                data: disk.data().to_vec(),
            }))
        }
        Request::KeyHandling { key, pressed } => {
            hw.io.keyboard.set(key, pressed);
            Reply::None
        }
        Request::Disasm {
            addr,
            lines,
            instruction_offset,
        } => Reply::Disasm(hw.debugger.disasm(&hw.memory, addr, lines, instruction_offset)),
        Request::GetTraceLog {
            offset,
            lines,
            filter,
        } => Reply::Lines(hw.debugger.trace_log_lines(offset, lines, filter)),
        Request::SetDebugData { data } => {
            hw.debugger.set_debug_data(data);
            Reply::None
        }
        Request::GetLastRw { global_addr } => {
            hw.debugger.update_last_rw();
            Reply::Dword(hw.debugger.last_rw_value(global_addr as usize))
        }
        Request::Shutdown => Reply::None,
    }
}
