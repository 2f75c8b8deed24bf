//! Instruction-level tests for the 8080 core: cycle counts, flag
//! semantics, interrupt gating.

use kr580vm80a::{Bus, I8080, MemKind, AF, CF, PF, SF, ZF};

/// Flat 64 KiB test bus with port capture.
struct TestBus {
    mem: Vec<u8>,
    last_out: Option<(u8, u8)>,
    input_byte: u8,
}

impl TestBus {
    fn new(program: &[u8]) -> Self {
        let mut mem = vec![0u8; 0x1_0000];
        mem[..program.len()].copy_from_slice(program);
        Self {
            mem,
            last_out: None,
            input_byte: 0,
        }
    }
}

impl Bus for TestBus {
    fn read(&mut self, addr: u16, _kind: MemKind) -> u8 {
        self.mem[addr as usize]
    }

    fn write(&mut self, addr: u16, value: u8, _kind: MemKind) {
        self.mem[addr as usize] = value;
    }

    fn input(&mut self, _port: u8) -> u8 {
        self.input_byte
    }

    fn output(&mut self, port: u8, value: u8) {
        self.last_out = Some((port, value));
    }
}

fn run(cpu: &mut I8080, bus: &mut TestBus, steps: usize) -> u64 {
    (0..steps).map(|_| cpu.step(bus)).sum()
}

#[test]
fn lxi_mvi_hlt_cycles_and_state() {
    // LXI SP, 0xC000; MVI A, 0x42; HLT
    let mut bus = TestBus::new(&[0x31, 0x00, 0xC0, 0x3E, 0x42, 0x76]);
    let mut cpu = I8080::new();

    let cycles = run(&mut cpu, &mut bus, 3);

    assert_eq!(cpu.regs.sp, 0xC000);
    assert_eq!(cpu.regs.a, 0x42);
    assert_eq!(cpu.regs.pc, 0x0005, "HLT holds PC on the halt opcode");
    assert!(cpu.is_halted());
    assert_eq!(cycles, 10 + 7 + 7);
    assert_eq!(cpu.cycles(), 24);
}

#[test]
fn halted_cpu_keeps_refetching_hlt() {
    let mut bus = TestBus::new(&[0x76]);
    let mut cpu = I8080::new();

    cpu.step(&mut bus);
    assert!(cpu.is_halted());
    assert_eq!(cpu.regs.pc, 0x0000);

    // Further steps stay on the HLT and keep costing 7 states.
    assert_eq!(cpu.step(&mut bus), 7);
    assert_eq!(cpu.regs.pc, 0x0000);
}

#[test]
fn ei_takes_effect_one_instruction_late() {
    // DI; EI; NOP
    let mut bus = TestBus::new(&[0xF3, 0xFB, 0x00]);
    let mut cpu = I8080::new();

    cpu.step(&mut bus); // DI
    assert!(!cpu.interrupts_enabled());

    cpu.step(&mut bus); // EI
    assert!(!cpu.interrupts_enabled(), "EI is delayed one instruction");

    cpu.step(&mut bus); // NOP
    assert!(cpu.interrupts_enabled());
}

#[test]
fn di_after_ei_cancels_the_pending_enable() {
    // EI; DI; NOP
    let mut bus = TestBus::new(&[0xFB, 0xF3, 0x00]);
    let mut cpu = I8080::new();

    run(&mut cpu, &mut bus, 3);
    assert!(!cpu.interrupts_enabled());
}

#[test]
fn interrupt_injects_rst7_without_consuming_memory() {
    // EI; NOP; then loop of NOPs. RST 7 vector at 0x38 holds HLT.
    let mut program = vec![0xFB, 0x00, 0x00, 0x00];
    program.resize(0x38, 0x00);
    program.push(0x76); // HLT at 0x0038
    let mut bus = TestBus::new(&program);
    let mut cpu = I8080::new();
    cpu.regs.sp = 0x2000;

    cpu.step(&mut bus); // EI
    cpu.step(&mut bus); // NOP -> IFF now set
    cpu.interrupt();

    let cycles = cpu.step(&mut bus); // RST 7 injected
    assert_eq!(cycles, 11);
    assert_eq!(cpu.regs.pc, 0x0038);
    assert!(!cpu.interrupts_enabled(), "IFF cleared on acceptance");

    // The interrupted PC (0x0002) was pushed.
    assert_eq!(bus.mem[0x1FFE], 0x02);
    assert_eq!(bus.mem[0x1FFF], 0x00);
}

#[test]
fn interrupt_wakes_halted_cpu() {
    // EI; HLT; vector at 0x38: NOP
    let mut program = vec![0xFB, 0x76];
    program.resize(0x39, 0x00);
    let mut bus = TestBus::new(&program);
    let mut cpu = I8080::new();
    cpu.regs.sp = 0x2000;

    cpu.step(&mut bus); // EI
    cpu.step(&mut bus); // HLT (IFF set after it)
    assert!(cpu.is_halted());

    cpu.interrupt();
    cpu.step(&mut bus);
    assert!(!cpu.is_halted());
    assert_eq!(cpu.regs.pc, 0x0038);
}

#[test]
fn interrupt_not_taken_while_iff_clear() {
    let mut bus = TestBus::new(&[0x00, 0x00]);
    let mut cpu = I8080::new();

    cpu.interrupt();
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x0001, "NOP executed, no injection");
}

#[test]
fn add_sets_carry_and_aux_carry() {
    // MVI A, 0x0F; ADI 0x01
    let mut bus = TestBus::new(&[0x3E, 0x0F, 0xC6, 0x01]);
    let mut cpu = I8080::new();
    run(&mut cpu, &mut bus, 2);

    assert_eq!(cpu.regs.a, 0x10);
    assert!(cpu.regs.flag(AF), "carry out of bit 3");
    assert!(!cpu.regs.flag(CF));
    assert!(!cpu.regs.flag(ZF));

    // MVI A, 0xFF; ADI 0x01 -> zero with carry
    let mut bus = TestBus::new(&[0x3E, 0xFF, 0xC6, 0x01]);
    let mut cpu = I8080::new();
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.regs.a, 0x00);
    assert!(cpu.regs.flag(CF));
    assert!(cpu.regs.flag(ZF));
    assert!(cpu.regs.flag(AF));
}

#[test]
fn sub_borrow_and_aux_semantics() {
    // MVI A, 0x00; SUI 0x01
    let mut bus = TestBus::new(&[0x3E, 0x00, 0xD6, 0x01]);
    let mut cpu = I8080::new();
    run(&mut cpu, &mut bus, 2);

    assert_eq!(cpu.regs.a, 0xFF);
    assert!(cpu.regs.flag(CF), "borrow sets carry");
    assert!(cpu.regs.flag(SF));
    // 8080 aux carry on subtract: complement of the low-nibble borrow.
    assert!(!cpu.regs.flag(AF));

    // MVI A, 0x10; SUI 0x10: no low-nibble borrow
    let mut bus = TestBus::new(&[0x3E, 0x10, 0xD6, 0x10]);
    let mut cpu = I8080::new();
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.regs.a, 0x00);
    assert!(cpu.regs.flag(ZF));
    assert!(!cpu.regs.flag(CF));
    assert!(cpu.regs.flag(AF));
}

#[test]
fn parity_flag_even_parity_of_all_bits() {
    // MVI A, 0x03; ORA A (sets SZP from A)
    let mut bus = TestBus::new(&[0x3E, 0x03, 0xB7]);
    let mut cpu = I8080::new();
    run(&mut cpu, &mut bus, 2);
    assert!(cpu.regs.flag(PF), "0x03 has two set bits");

    let mut bus = TestBus::new(&[0x3E, 0x07, 0xB7]);
    let mut cpu = I8080::new();
    run(&mut cpu, &mut bus, 2);
    assert!(!cpu.regs.flag(PF), "0x07 has three set bits");
}

#[test]
fn daa_adjusts_bcd_addition() {
    // MVI A, 0x15; ADI 0x27; DAA  => 15 + 27 = 42 BCD
    let mut bus = TestBus::new(&[0x3E, 0x15, 0xC6, 0x27, 0x27]);
    let mut cpu = I8080::new();
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.regs.a, 0x42);
    assert!(!cpu.regs.flag(CF));

    // MVI A, 0x99; ADI 0x01; DAA => 100 BCD: A=0x00, CY=1
    let mut bus = TestBus::new(&[0x3E, 0x99, 0xC6, 0x01, 0x27]);
    let mut cpu = I8080::new();
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.regs.a, 0x00);
    assert!(cpu.regs.flag(CF));
}

#[test]
fn ana_aux_carry_is_or_of_bit3() {
    // MVI A, 0x08; ANI 0x00 -> result 0 but AC set from operand bit 3
    let mut bus = TestBus::new(&[0x3E, 0x08, 0xE6, 0x00]);
    let mut cpu = I8080::new();
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.regs.a, 0x00);
    assert!(cpu.regs.flag(AF));
    assert!(!cpu.regs.flag(CF));
}

#[test]
fn dad_sets_only_carry() {
    // LXI H, 0xFFFF; LXI B, 0x0001; STC-clearing op first: XRA A; DAD B
    let mut bus = TestBus::new(&[0x21, 0xFF, 0xFF, 0x01, 0x01, 0x00, 0xAF, 0x09]);
    let mut cpu = I8080::new();
    run(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.regs.hl(), 0x0000);
    assert!(cpu.regs.flag(CF));
    assert!(cpu.regs.flag(ZF), "ZF left over from XRA A, untouched by DAD");
}

#[test]
fn conditional_call_and_return_cycle_variance() {
    // XRA A (Z=1); CNZ 0x1000 (not taken, 11); CZ 0x0010 (taken, 17)
    let mut program = vec![0xAF, 0xC4, 0x00, 0x10, 0xCC, 0x10, 0x00];
    program.resize(0x10, 0x00);
    program.push(0xC8); // RZ at 0x10 (taken, 11)
    let mut bus = TestBus::new(&program);
    let mut cpu = I8080::new();
    cpu.regs.sp = 0x2000;

    cpu.step(&mut bus); // XRA A
    assert_eq!(cpu.step(&mut bus), 11, "CNZ not taken");
    assert_eq!(cpu.regs.pc, 0x0004);
    assert_eq!(cpu.step(&mut bus), 17, "CZ taken");
    assert_eq!(cpu.regs.pc, 0x0010);
    assert_eq!(cpu.step(&mut bus), 11, "RZ taken");
    assert_eq!(cpu.regs.pc, 0x0007);

    // Not-taken return costs 5.
    let mut bus = TestBus::new(&[0x3E, 0x01, 0xB7, 0xC8]); // MVI A,1; ORA A; RZ
    let mut cpu = I8080::new();
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.step(&mut bus), 5, "RZ not taken");
}

#[test]
fn stack_push_pop_roundtrip() {
    // LXI SP, 0x2000; LXI B, 0x1234; PUSH B; POP D
    let mut bus = TestBus::new(&[0x31, 0x00, 0x20, 0x01, 0x34, 0x12, 0xC5, 0xD1]);
    let mut cpu = I8080::new();
    run(&mut cpu, &mut bus, 4);

    assert_eq!(cpu.regs.de(), 0x1234);
    assert_eq!(cpu.regs.sp, 0x2000);
}

#[test]
fn push_pop_psw_keeps_fixed_flag_bits() {
    // LXI SP, 0x2000; PUSH PSW; POP PSW
    let mut bus = TestBus::new(&[0x31, 0x00, 0x20, 0xF5, 0xF1]);
    let mut cpu = I8080::new();
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.regs.f & 0x2A, 0x02, "bit 1 reads 1, bits 3/5 read 0");
}

#[test]
fn pchl_jumps_to_hl() {
    // LXI H, 0x0123; PCHL
    let mut bus = TestBus::new(&[0x21, 0x23, 0x01, 0xE9]);
    let mut cpu = I8080::new();
    cpu.step(&mut bus);
    assert_eq!(cpu.step(&mut bus), 5);
    assert_eq!(cpu.regs.pc, 0x0123);
}

#[test]
fn xthl_swaps_top_of_stack() {
    // LXI SP, 0x2000; LXI H, 0xAABB; PUSH H; LXI H, 0x1122; XTHL
    let mut bus = TestBus::new(&[
        0x31, 0x00, 0x20, 0x21, 0xBB, 0xAA, 0xE5, 0x21, 0x22, 0x11, 0xE3,
    ]);
    let mut cpu = I8080::new();
    run(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.step(&mut bus), 18);
    assert_eq!(cpu.regs.hl(), 0xAABB);
    assert_eq!(bus.mem[0x1FFE], 0x22);
    assert_eq!(bus.mem[0x1FFF], 0x11);
}

#[test]
fn in_out_move_accumulator() {
    let mut bus = TestBus::new(&[0x3E, 0x5A, 0xD3, 0x02, 0xDB, 0x03]);
    bus.input_byte = 0xA5;
    let mut cpu = I8080::new();

    run(&mut cpu, &mut bus, 2);
    assert_eq!(bus.last_out, Some((0x02, 0x5A)));

    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0xA5);
}

#[test]
fn observer_sees_operands_and_hl() {
    struct Spy {
        inner: TestBus,
        seen: Vec<(u16, u8, u8, u8, u16)>,
    }
    impl Bus for Spy {
        fn read(&mut self, addr: u16, kind: MemKind) -> u8 {
            self.inner.read(addr, kind)
        }
        fn write(&mut self, addr: u16, value: u8, kind: MemKind) {
            self.inner.write(addr, value, kind);
        }
        fn input(&mut self, port: u8) -> u8 {
            self.inner.input(port)
        }
        fn output(&mut self, port: u8, value: u8) {
            self.inner.output(port, value);
        }
        fn instr_fetched(&mut self, pc: u16, opcode: u8, data_h: u8, data_l: u8, hl: u16) {
            self.seen.push((pc, opcode, data_h, data_l, hl));
        }
    }

    // LXI H, 0x1234; JMP 0x0006
    let mut bus = Spy {
        inner: TestBus::new(&[0x21, 0x34, 0x12, 0xC3, 0x06, 0x00]),
        seen: Vec::new(),
    };
    let mut cpu = I8080::new();
    cpu.step(&mut bus);
    cpu.step(&mut bus);

    assert_eq!(bus.seen.len(), 2, "hook fires exactly once per instruction");
    assert_eq!(bus.seen[0], (0x0000, 0x21, 0x12, 0x34, 0x0000));
    assert_eq!(bus.seen[1], (0x0003, 0xC3, 0x00, 0x06, 0x1234));
}

#[test]
fn pc_and_sp_stay_in_range_across_wrap() {
    // JMP 0xFFFF; at 0xFFFF a NOP wraps PC to 0x0000.
    let mut program = vec![0xC3, 0xFF, 0xFF];
    program.resize(0x1_0000, 0x00);
    let mut bus = TestBus::new(&program);
    let mut cpu = I8080::new();

    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0xFFFF);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x0000);
}
