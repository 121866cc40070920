//! # interpreter
//!
//! The fetch/decode/execute engine. Each call to `step()` runs at most one
//! instruction:
//!
//!  1. drain any key edges the host queued since the last step
//!  2. if the program has exited, or is parked on `Fx0A`, do nothing
//!  3. fetch the big-endian word at PC, decode it, execute it
//!
//! Nothing in here sleeps or looks at a clock; the host decides how fast
//! to call `step()` and when to tick the timers.
//!
//! Policies that real interpreters disagree on:
//!  - I, PC and every address computed from them wrap at 12 bits
//!  - sprites wrap round both edges of the display
//!  - 8XY6/8XYE shift VX in place, VY is ignored
//!  - FX55/FX65 leave I alone
use crate::config::Config;
use crate::display::DisplayBuffer;
use crate::input::{KeyEvent, Keypad, WaitState};
use crate::memory::{
    Chip8MemoryMap, LoadError, MemoryMap, CHIP8_ADDR_MASK, CHIP8_FONT_ADDR,
    CHIP8_FONT_GLYPH_BYTES,
};
use crate::opcode::{AluOp, Instruction, Opcode};
use crate::registers::{RegisterFile, VF};
use crate::timer::{TimerPair, Tone};
use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::io;
use thiserror::Error;

/// most tone edges or diagnostics kept between drains; older ones are dropped
pub const OUTBOX_LIMIT: usize = 64;

/// what the host should do after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Continue,
    /// the display buffer changed
    Redraw,
    /// waiting on a key; stepping again won't do anything until one arrives
    Blocked,
    /// the program asked to exit with this status
    Terminated(u8),
}

/// something odd the program did that we carried on past
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Diagnostic {
    #[error("unknown opcode {opcode:04x} at {pc:03x}")]
    UnknownOpcode { pc: u16, opcode: u16 },
    #[error("call at {pc:03x} with a full stack; skipped")]
    StackOverflow { pc: u16 },
    #[error("return at {pc:03x} with an empty stack; ignored")]
    StackUnderflow { pc: u16 },
}

/// the whole machine; the engine owns all of it
pub struct Chip8 {
    memory: Chip8MemoryMap,
    registers: RegisterFile,
    display: DisplayBuffer,
    keypad: Keypad,
    timers: TimerPair,
    rng: StdRng,
    exit_code: Option<u8>,
    key_events: VecDeque<KeyEvent>,
    tones: VecDeque<Tone>,
    diagnostics: VecDeque<Diagnostic>,
}

impl Chip8 {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Chip8 {
            memory: Chip8MemoryMap::new(),
            registers: RegisterFile::new(),
            display: DisplayBuffer::new(),
            keypad: Keypad::new(),
            timers: TimerPair::new(),
            rng,
            exit_code: None,
            key_events: VecDeque::new(),
            tones: VecDeque::new(),
            diagnostics: VecDeque::new(),
        }
    }

    /// load a chip8 program at 0x200
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<usize, LoadError> {
        let len = self.memory.load_program(reader)?;
        debug!("loaded {} byte program at {:03x}", len, self.memory.program_addr);
        Ok(len)
    }

    pub fn memory(&self) -> &Chip8MemoryMap {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Chip8MemoryMap {
        &mut self.memory
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    pub fn display(&self) -> &DisplayBuffer {
        &self.display
    }

    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    pub fn timers(&self) -> &TimerPair {
        &self.timers
    }

    /// parked on `Fx0A`
    pub fn halted(&self) -> bool {
        self.keypad.wait_state() != WaitState::Running
    }

    /// register that'll receive the key once a pending wait resolves
    pub fn waiting_key_register(&self) -> Option<usize> {
        match self.keypad.wait_state() {
            WaitState::WaitingForKey { register, .. } => Some(register),
            WaitState::Running => None,
        }
    }

    pub fn terminated(&self) -> bool {
        self.exit_code.is_some()
    }

    pub fn exit_code(&self) -> Option<u8> {
        self.exit_code
    }

    /// queue a key edge; it's applied at the start of the next step
    pub fn queue_key_event(&mut self, event: KeyEvent) {
        self.key_events.push_back(event);
    }

    /// apply a key edge right now, resuming a pending `Fx0A` if it
    /// completes one
    pub fn apply_key_event(&mut self, event: KeyEvent) {
        if let Some((register, key)) = self.keypad.apply(event) {
            debug!("key {:x} released; V{:X} = {:x}, resuming", key, register, key);
            self.registers.v[register] = key;
            self.advance();
        }
    }

    /// one 60Hz timer tick
    pub fn tick_timers(&mut self) -> Option<Tone> {
        self.timers.tick()
    }

    /// tone edges caused by the program itself (`Fx18`)
    pub fn drain_tones(&mut self) -> Vec<Tone> {
        self.tones.drain(..).collect()
    }

    pub fn drain_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.drain(..).collect()
    }

    /// run a single instruction
    ///
    /// tone edges and diagnostics pile up until `drain_tones()` and
    /// `drain_diagnostics()` are called; only the last `OUTBOX_LIMIT` of each
    /// are kept
    pub fn step(&mut self) -> Signal {
        while let Some(event) = self.key_events.pop_front() {
            self.apply_key_event(event);
        }
        if let Some(code) = self.exit_code {
            return Signal::Terminated(code);
        }
        if self.halted() {
            return Signal::Blocked;
        }

        let pc = self.registers.pc;
        let opcode = Opcode(self.memory.get_word(pc));
        match Instruction::decode(opcode) {
            Some(insn) => {
                trace!("{:03x}: {}  {}", pc, opcode, insn);
                self.execute(insn)
            }
            None => {
                self.diagnose(Diagnostic::UnknownOpcode { pc, opcode: opcode.0 });
                self.advance();
                Signal::Continue
            }
        }
    }

    fn diagnose(&mut self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic);
        push_bounded(&mut self.diagnostics, diagnostic);
    }

    fn jump(&mut self, addr: u16) {
        self.registers.pc = addr & CHIP8_ADDR_MASK;
    }

    fn advance(&mut self) {
        self.jump(self.registers.pc.wrapping_add(2));
    }

    fn skip_if(&mut self, cond: bool) {
        self.advance();
        if cond {
            self.advance();
        }
    }

    /// address `offset` bytes past I
    fn index_addr(&self, offset: usize) -> u16 {
        self.registers.i.wrapping_add(offset as u16) & CHIP8_ADDR_MASK
    }

    fn execute(&mut self, insn: Instruction) -> Signal {
        use Instruction::*;
        let pc = self.registers.pc;
        match insn {
            ClearScreen => {
                self.display.clear();
                self.advance();
                return Signal::Redraw;
            }
            Return => match self.registers.pop() {
                Ok(addr) => self.jump(addr),
                Err(_) => self.diagnose(Diagnostic::StackUnderflow { pc }),
            },
            Exit { code } => {
                debug!("program exited with status {}", code);
                self.exit_code = Some(code);
                return Signal::Terminated(code);
            }
            Jump { addr } => self.jump(addr),
            Call { addr } => match self.registers.push(pc.wrapping_add(2) & CHIP8_ADDR_MASK) {
                Ok(()) => self.jump(addr),
                Err(_) => {
                    self.diagnose(Diagnostic::StackOverflow { pc });
                    self.advance();
                }
            },
            SkipEqImm { x, nn } => self.skip_if(self.registers.v[x] == nn),
            SkipNeImm { x, nn } => self.skip_if(self.registers.v[x] != nn),
            SkipEqReg { x, y } => self.skip_if(self.registers.v[x] == self.registers.v[y]),
            SkipNeReg { x, y } => self.skip_if(self.registers.v[x] != self.registers.v[y]),
            LoadImm { x, nn } => {
                self.registers.v[x] = nn;
                self.advance();
            }
            AddImm { x, nn } => {
                self.registers.v[x] = self.registers.v[x].wrapping_add(nn);
                self.advance();
            }
            Alu { op, x, y } => {
                self.alu(op, x, y);
                self.advance();
            }
            SetIndex { addr } => {
                self.registers.i = addr & CHIP8_ADDR_MASK;
                self.advance();
            }
            JumpOffset { addr } => self.jump(addr + self.registers.v[0] as u16),
            Random { x, mask } => {
                self.registers.v[x] = self.rng.gen::<u8>() & mask;
                self.advance();
            }
            Draw { x, y, rows } => {
                let sprite: Vec<u8> = (0..rows as usize)
                    .map(|row| self.memory.read_byte(self.index_addr(row)))
                    .collect();
                let (vx, vy) = (self.registers.v[x], self.registers.v[y]);
                let collision = self.display.xor_sprite(vx as usize, vy as usize, &sprite);
                self.registers.v[VF] = collision as u8;
                self.advance();
                return Signal::Redraw;
            }
            SkipKeyDown { x } => self.skip_if(self.keypad.is_pressed(self.registers.v[x])),
            SkipKeyUp { x } => self.skip_if(!self.keypad.is_pressed(self.registers.v[x])),
            ReadDelay { x } => {
                self.registers.v[x] = self.timers.delay();
                self.advance();
            }
            WaitKey { x } => {
                debug!("waiting for a key into V{:X}", x);
                self.keypad.begin_wait(x);
                return Signal::Blocked;
            }
            SetDelay { x } => {
                self.timers.set_delay(self.registers.v[x]);
                self.advance();
            }
            SetSound { x } => {
                if let Some(tone) = self.timers.set_sound(self.registers.v[x]) {
                    push_bounded(&mut self.tones, tone);
                }
                self.advance();
            }
            AddIndex { x } => {
                let sum = self.registers.i as u32 + self.registers.v[x] as u32;
                self.registers.i = sum as u16 & CHIP8_ADDR_MASK;
                self.registers.v[VF] = (sum > CHIP8_ADDR_MASK as u32) as u8;
                self.advance();
            }
            FontGlyph { x } => {
                let glyph = self.registers.v[x] as u16 * CHIP8_FONT_GLYPH_BYTES;
                self.registers.i = (CHIP8_FONT_ADDR + glyph) & CHIP8_ADDR_MASK;
                self.advance();
            }
            StoreBcd { x } => {
                let vx = self.registers.v[x];
                let digits = [vx / 100, (vx / 10) % 10, vx % 10];
                for (offset, digit) in digits.iter().enumerate() {
                    let addr = self.index_addr(offset);
                    self.memory.write_byte(addr, *digit);
                }
                self.advance();
            }
            StoreRegs { x } => {
                for r in 0..=x {
                    let addr = self.index_addr(r);
                    self.memory.write_byte(addr, self.registers.v[r]);
                }
                self.advance();
            }
            LoadRegs { x } => {
                for r in 0..=x {
                    self.registers.v[r] = self.memory.read_byte(self.index_addr(r));
                }
                self.advance();
            }
        }
        Signal::Continue
    }

    /// 8XYn; VF is always written last, from the pre-op values of VX and VY
    fn alu(&mut self, op: AluOp, x: usize, y: usize) {
        let (vx, vy) = (self.registers.v[x], self.registers.v[y]);
        let (result, flag) = match op {
            AluOp::Assign => (vy, None),
            AluOp::Or => (vx | vy, None),
            AluOp::And => (vx & vy, None),
            AluOp::Xor => (vx ^ vy, None),
            AluOp::Add => {
                let (sum, carry) = vx.overflowing_add(vy);
                (sum, Some(carry as u8))
            }
            AluOp::Sub => (vx.wrapping_sub(vy), Some((vx >= vy) as u8)),
            AluOp::ShiftRight => (vx >> 1, Some(vx & 0x01)),
            AluOp::SubReverse => (vy.wrapping_sub(vx), Some((vy > vx) as u8)),
            AluOp::ShiftLeft => (vx << 1, Some(vx >> 7)),
        };
        self.registers.v[x] = result;
        if let Some(flag) = flag {
            self.registers.v[VF] = flag;
        }
    }
}

fn push_bounded<T>(outbox: &mut VecDeque<T>, item: T) {
    if outbox.len() == OUTBOX_LIMIT {
        outbox.pop_front();
    }
    outbox.push_back(item);
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// a machine with `words` loaded at 0x200 and a fixed RNG
    fn machine(words: &[u16]) -> Chip8 {
        let mut m = Chip8::with_config(&Config {
            seed: Some(8),
            ..Config::default()
        });
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        m.load_program(&mut bytes.as_slice()).unwrap();
        m
    }

    fn run(m: &mut Chip8, steps: usize) -> Signal {
        let mut last = Signal::Continue;
        for _ in 0..steps {
            last = m.step();
        }
        last
    }

    #[test]
    fn test_load_and_add() {
        let mut m = machine(&[0x6105, 0x7105, 0x00e0]);
        run(&mut m, 2);
        assert_eq!(m.registers().v[1], 10);
        assert_eq!(m.registers().pc, 0x204);
    }

    #[test]
    fn test_add_imm_wraps_without_flag() {
        let mut m = machine(&[0x61ff, 0x7102]);
        m.registers_mut().v[VF] = 0x42;
        run(&mut m, 2);
        assert_eq!(m.registers().v[1], 1);
        assert_eq!(m.registers().v[VF], 0x42);
    }

    #[test]
    fn test_clear_screen_redraws() {
        let mut m = machine(&[0xd005, 0x00e0]);
        assert_eq!(m.step(), Signal::Redraw);
        assert!(m.display().lit_count() > 0);
        assert_eq!(m.step(), Signal::Redraw);
        assert_eq!(m.display().lit_count(), 0);
        assert_eq!(m.registers().pc, 0x204);
    }

    #[test]
    fn test_jump() {
        let mut m = machine(&[0x1abc]);
        assert_eq!(m.step(), Signal::Continue);
        assert_eq!(m.registers().pc, 0xabc);
    }

    #[test]
    fn test_call_and_return() {
        // 200: call 206; 202: ...; 206: ret
        let mut m = machine(&[0x2206, 0x0000, 0x0000, 0x00ee]);
        m.step();
        assert_eq!(m.registers().pc, 0x206);
        assert_eq!(m.registers().stack(), &[0x202]);
        m.step();
        assert_eq!(m.registers().pc, 0x202);
        assert_eq!(m.registers().sp(), 0);
    }

    #[test]
    fn test_return_on_empty_stack() {
        let mut m = machine(&[0x00ee]);
        assert_eq!(m.step(), Signal::Continue);
        assert_eq!(m.registers().pc, 0x200);
        assert_eq!(m.registers().sp(), 0);
        assert_eq!(
            m.drain_diagnostics(),
            vec![Diagnostic::StackUnderflow { pc: 0x200 }]
        );
    }

    #[test]
    fn test_call_with_full_stack() {
        // calls itself forever
        let mut m = machine(&[0x2200]);
        run(&mut m, 16);
        assert_eq!(m.registers().sp(), 16);
        assert_eq!(m.registers().pc, 0x200);
        m.step();
        assert_eq!(m.registers().sp(), 16);
        assert_eq!(m.registers().pc, 0x202);
        assert_eq!(
            m.drain_diagnostics(),
            vec![Diagnostic::StackOverflow { pc: 0x200 }]
        );
    }

    #[test]
    fn test_skip_eq_imm() {
        let mut m = machine(&[0x3000]);
        m.step();
        assert_eq!(m.registers().pc, 0x204);

        let mut m = machine(&[0x3001]);
        m.step();
        assert_eq!(m.registers().pc, 0x202);
    }

    #[test]
    fn test_skip_ne_imm() {
        let mut m = machine(&[0x4001]);
        m.step();
        assert_eq!(m.registers().pc, 0x204);

        let mut m = machine(&[0x4000]);
        m.step();
        assert_eq!(m.registers().pc, 0x202);
    }

    #[test]
    fn test_skip_reg_compares() {
        let mut m = machine(&[0x5120]);
        m.registers_mut().v[1] = 7;
        m.registers_mut().v[2] = 7;
        m.step();
        assert_eq!(m.registers().pc, 0x204);

        let mut m = machine(&[0x9120]);
        m.registers_mut().v[1] = 7;
        m.registers_mut().v[2] = 7;
        m.step();
        assert_eq!(m.registers().pc, 0x202);

        let mut m = machine(&[0x9120]);
        m.registers_mut().v[1] = 7;
        m.step();
        assert_eq!(m.registers().pc, 0x204);
    }

    #[test]
    fn test_alu_bitwise() {
        let mut m = machine(&[0x8121, 0x8132, 0x8143, 0x8150]);
        let v = &mut m.registers_mut().v;
        v[1] = 0b1100;
        v[2] = 0b0011;
        v[3] = 0b0110;
        v[4] = 0b1111;
        v[5] = 0x99;
        m.step();
        assert_eq!(m.registers().v[1], 0b1111);
        m.step();
        assert_eq!(m.registers().v[1], 0b0110);
        m.step();
        assert_eq!(m.registers().v[1], 0b1001);
        m.step();
        assert_eq!(m.registers().v[1], 0x99);
        assert_eq!(m.registers().pc, 0x208);
    }

    #[test]
    fn test_shift_right() {
        let mut m = machine(&[0x8106, 0x8106]);
        m.registers_mut().v[1] = 0b101;
        m.step();
        assert_eq!(m.registers().v[1], 0b10);
        assert_eq!(m.registers().v[VF], 1);
        m.step();
        assert_eq!(m.registers().v[1], 0b1);
        assert_eq!(m.registers().v[VF], 0);
    }

    #[test]
    fn test_shift_left() {
        let mut m = machine(&[0x810e, 0x810e]);
        m.registers_mut().v[1] = 0xc1;
        m.step();
        assert_eq!(m.registers().v[1], 0x82);
        assert_eq!(m.registers().v[VF], 1);
        m.step();
        assert_eq!(m.registers().v[1], 0x04);
        assert_eq!(m.registers().v[VF], 1);
    }

    #[test]
    fn test_sub_reverse() {
        let mut m = machine(&[0x8127]);
        m.registers_mut().v[1] = 3;
        m.registers_mut().v[2] = 10;
        m.step();
        assert_eq!(m.registers().v[1], 7);
        assert_eq!(m.registers().v[VF], 1);

        let mut m = machine(&[0x8127]);
        m.registers_mut().v[1] = 10;
        m.registers_mut().v[2] = 3;
        m.step();
        assert_eq!(m.registers().v[1], 249);
        assert_eq!(m.registers().v[VF], 0);
    }

    #[test]
    fn test_flag_wins_when_vf_is_target() {
        // VF += V1 overflowing; the carry overwrites the sum
        let mut m = machine(&[0x8f14]);
        m.registers_mut().v[VF] = 0xff;
        m.registers_mut().v[1] = 0x02;
        m.step();
        assert_eq!(m.registers().v[VF], 1);

        // VF -= V1 with no borrow; flag overwrites the difference
        let mut m = machine(&[0x8f15]);
        m.registers_mut().v[VF] = 0x10;
        m.registers_mut().v[1] = 0x01;
        m.step();
        assert_eq!(m.registers().v[VF], 1);

        // VF >>= 1; shifted-out bit overwrites 0x02
        let mut m = machine(&[0x8f06]);
        m.registers_mut().v[VF] = 0x05;
        m.step();
        assert_eq!(m.registers().v[VF], 1);

        // VF <<= 1; shifted-out bit overwrites 0x80
        let mut m = machine(&[0x8f0e]);
        m.registers_mut().v[VF] = 0x40;
        m.step();
        assert_eq!(m.registers().v[VF], 0);

        // VF = V1 - VF with V1 > VF; flag overwrites the difference
        let mut m = machine(&[0x8f17]);
        m.registers_mut().v[VF] = 0x03;
        m.registers_mut().v[1] = 0x10;
        m.step();
        assert_eq!(m.registers().v[VF], 1);
    }

    #[test]
    fn test_sub_reverse_equal_clears_flag() {
        let mut m = machine(&[0x8127]);
        m.registers_mut().v[1] = 9;
        m.registers_mut().v[2] = 9;
        m.registers_mut().v[VF] = 1;
        m.step();
        assert_eq!(m.registers().v[1], 0);
        assert_eq!(m.registers().v[VF], 0);
    }

    #[test]
    fn test_set_index_and_jump_offset() {
        let mut m = machine(&[0xa123, 0xb300]);
        m.registers_mut().v[0] = 0x10;
        m.step();
        assert_eq!(m.registers().i, 0x123);
        m.step();
        assert_eq!(m.registers().pc, 0x310);
    }

    #[test]
    fn test_jump_offset_wraps() {
        let mut m = machine(&[0xbfff]);
        m.registers_mut().v[0] = 0x03;
        m.step();
        assert_eq!(m.registers().pc, 0x002);
    }

    #[test]
    fn test_random_is_masked() {
        let mut m = machine(&[0xc10f, 0xc200]);
        run(&mut m, 2);
        assert_eq!(m.registers().v[1] & 0xf0, 0);
        assert_eq!(m.registers().v[2], 0);
    }

    #[test]
    fn test_random_is_seeded() {
        let mut a = machine(&[0xc1ff]);
        let mut b = machine(&[0xc1ff]);
        a.step();
        b.step();
        assert_eq!(a.registers().v[1], b.registers().v[1]);
    }

    #[test]
    fn test_draw_font_glyph() {
        // V0 = 0, I = glyph 0, draw 5 rows at (0, 0)
        let mut m = machine(&[0xf029, 0xd005]);
        m.step();
        assert_eq!(m.registers().i, 0x000);
        assert_eq!(m.step(), Signal::Redraw);
        assert_eq!(m.registers().v[VF], 0);
        // top row of a zero is 1111
        assert!((0..4).all(|x| m.display().pixel(x, 0)));
        assert!(!m.display().pixel(4, 0));
        // second row is 1..1
        assert!(m.display().pixel(0, 1));
        assert!(!m.display().pixel(1, 1));
        assert!(m.display().pixel(3, 1));
    }

    #[test]
    fn test_draw_twice_is_idempotent() {
        let mut m = machine(&[0xa050, 0xd125, 0xd125]);
        m.memory_mut().write(&[0xff, 0x81, 0x81, 0x81, 0xff], 0x050);
        m.registers_mut().v[1] = 60;
        m.registers_mut().v[2] = 30;
        m.step();
        let blank = m.display().clone();
        m.step();
        assert_eq!(m.registers().v[VF], 0);
        assert_ne!(m.display(), &blank);
        m.step();
        assert_eq!(m.registers().v[VF], 1);
        assert_eq!(m.display(), &blank);
    }

    #[test]
    fn test_draw_reads_sprite_through_wrapped_index() {
        let mut m = machine(&[0xaffe, 0xd012]);
        m.memory_mut().write(&[0x80, 0x40], 0xffe);
        run(&mut m, 2);
        assert!(m.display().pixel(0, 0));
        assert!(m.display().pixel(1, 1));
    }

    #[test]
    fn test_key_skips() {
        let mut m = machine(&[0xe19e, 0x0000, 0xe1a1]);
        m.registers_mut().v[1] = 0xb;
        m.apply_key_event(KeyEvent::Pressed(0xb));
        m.step();
        assert_eq!(m.registers().pc, 0x204);
        m.step();
        assert_eq!(m.registers().pc, 0x206);

        let mut m = machine(&[0xe19e, 0xe1a1]);
        m.registers_mut().v[1] = 0xb;
        m.step();
        assert_eq!(m.registers().pc, 0x202);
        m.step();
        assert_eq!(m.registers().pc, 0x206);
    }

    #[test]
    fn test_queued_keys_apply_before_fetch() {
        let mut m = machine(&[0xe09e]);
        m.queue_key_event(KeyEvent::Pressed(0));
        assert!(!m.keypad().is_pressed(0));
        m.step();
        assert!(m.keypad().is_pressed(0));
        assert_eq!(m.registers().pc, 0x204);
    }

    #[test]
    fn test_timers_through_registers() {
        let mut m = machine(&[0x6109, 0xf115, 0xf118, 0xf207]);
        run(&mut m, 3);
        assert_eq!(m.timers().delay(), 9);
        assert_eq!(m.timers().sound(), 9);
        assert_eq!(m.drain_tones(), vec![Tone::On]);
        m.tick_timers();
        m.step();
        assert_eq!(m.registers().v[2], 8);
    }

    #[test]
    fn test_step_never_ticks_timers() {
        let mut m = machine(&[0x610a, 0xf115, 0x1204]);
        run(&mut m, 10);
        assert_eq!(m.timers().delay(), 10);
    }

    #[test]
    fn test_add_index_flags_overflow() {
        let mut m = machine(&[0xaffe, 0xf11e, 0xf11e]);
        m.registers_mut().v[1] = 1;
        run(&mut m, 2);
        assert_eq!(m.registers().i, 0xfff);
        assert_eq!(m.registers().v[VF], 0);
        m.step();
        assert_eq!(m.registers().i, 0x000);
        assert_eq!(m.registers().v[VF], 1);
    }

    #[test]
    fn test_font_glyph_address() {
        let mut m = machine(&[0xf129]);
        m.registers_mut().v[1] = 0xa;
        m.step();
        assert_eq!(m.registers().i, 50);
    }

    #[test]
    fn test_bcd() {
        let mut m = machine(&[0xa300, 0xf133]);
        m.registers_mut().v[1] = 157;
        run(&mut m, 2);
        assert_eq!(m.memory().get_ro_slice(0x300, 3), &[1, 5, 7]);
    }

    #[test]
    fn test_store_and_load_registers() {
        let mut m = machine(&[0xa400, 0xf355, 0x6000, 0x6300, 0x6400, 0xf365]);
        for r in 0..5 {
            m.registers_mut().v[r] = 0x10 + r as u8;
        }
        run(&mut m, 2);
        assert_eq!(m.memory().get_ro_slice(0x400, 5), &[0x10, 0x11, 0x12, 0x13, 0]);
        assert_eq!(m.registers().i, 0x400);
        run(&mut m, 4);
        assert_eq!(&m.registers().v[..5], &[0x10, 0x11, 0x12, 0x13, 0x00]);
    }

    #[test]
    fn test_wait_for_key() {
        let mut m = machine(&[0xf50a, 0x1202]);
        assert_eq!(m.step(), Signal::Blocked);
        assert!(m.halted());
        assert_eq!(m.waiting_key_register(), Some(5));
        for _ in 0..3 {
            assert_eq!(m.step(), Signal::Blocked);
            assert_eq!(m.registers().pc, 0x200);
        }
        m.queue_key_event(KeyEvent::Pressed(0xc));
        assert_eq!(m.step(), Signal::Blocked);
        m.queue_key_event(KeyEvent::Released(0xc));
        // resolves, then runs the jump
        assert_eq!(m.step(), Signal::Continue);
        assert!(!m.halted());
        assert_eq!(m.registers().v[5], 0xc);
        assert_eq!(m.registers().pc, 0x202);
    }

    #[test]
    fn test_exit() {
        let mut m = machine(&[0x0013]);
        assert_eq!(m.step(), Signal::Terminated(3));
        assert!(m.terminated());
        assert_eq!(m.exit_code(), Some(3));
        assert_eq!(m.step(), Signal::Terminated(3));
        assert_eq!(m.registers().pc, 0x200);
    }

    #[test]
    fn test_unknown_opcodes_are_skipped() {
        let mut m = machine(&[0x0123, 0x8128, 0xe1ff, 0xf1ff, 0x5121]);
        let before = m.registers().v;
        run(&mut m, 5);
        assert_eq!(m.registers().pc, 0x20a);
        assert_eq!(m.registers().v, before);
        let diags = m.drain_diagnostics();
        assert_eq!(diags.len(), 5);
        assert_eq!(
            diags[0],
            Diagnostic::UnknownOpcode {
                pc: 0x200,
                opcode: 0x0123
            }
        );
        assert!(m.drain_diagnostics().is_empty());
    }

    #[test]
    fn test_undrained_diagnostics_are_bounded() {
        // nothing loaded: every fetch is an unknown 0000
        let mut m = machine(&[]);
        run(&mut m, OUTBOX_LIMIT * 3);
        let diags = m.drain_diagnostics();
        assert_eq!(diags.len(), OUTBOX_LIMIT);
        // the newest ones survive
        let last_pc = (0x200 + 2 * (OUTBOX_LIMIT * 3 - 1)) as u16;
        assert_eq!(
            diags.last(),
            Some(&Diagnostic::UnknownOpcode {
                pc: last_pc,
                opcode: 0x0000
            })
        );
    }

    #[test]
    fn test_undrained_tones_are_bounded() {
        // ST = 1 then ST = 0, forever
        let mut m = machine(&[0x6101, 0xf118, 0xf018, 0x1202]);
        run(&mut m, 1 + 3 * OUTBOX_LIMIT);
        let tones = m.drain_tones();
        assert_eq!(tones.len(), OUTBOX_LIMIT);
        assert!(m.drain_tones().is_empty());
    }

    #[test]
    fn test_fetch_wraps_at_top_of_memory() {
        let mut m = machine(&[0x1fff]);
        m.memory_mut().write_byte(0xfff, 0x61);
        m.memory_mut().write_byte(0x000, 0x2a);
        m.step();
        m.step();
        assert_eq!(m.registers().v[1], 0x2a);
        assert_eq!(m.registers().pc, 0x001);
    }

    #[test]
    fn test_non_flag_ops_leave_vf_alone() {
        let mut m = machine(&[
            0x6123, // LD V1
            0x7101, // ADD V1
            0x8120, // LD V1, V2
            0x8121, // OR
            0x8122, // AND
            0x8123, // XOR
            0xa300, // LD I
            0xf129, // LD F
            0xf133, // LD B
            0xf115, // LD DT
            0xf118, // LD ST
            0xf107, // LD V1, DT
            0xf155, // LD [I]
            0xc1ff, // RND
        ]);
        m.registers_mut().v[VF] = 0x5a;
        run(&mut m, 14);
        assert_eq!(m.registers().v[VF], 0x5a);
        assert!(m.drain_diagnostics().is_empty());
    }

    proptest! {
        #[test]
        fn prop_add_sets_carry(vx in any::<u8>(), vy in any::<u8>()) {
            let mut m = machine(&[0x8124]);
            m.registers_mut().v[1] = vx;
            m.registers_mut().v[2] = vy;
            m.step();
            prop_assert_eq!(m.registers().v[1], vx.wrapping_add(vy));
            prop_assert_eq!(m.registers().v[VF], (vx as u16 + vy as u16 > 255) as u8);
            prop_assert_eq!(m.registers().pc, 0x202);
        }

        #[test]
        fn prop_sub_sets_no_borrow(vx in any::<u8>(), vy in any::<u8>()) {
            let mut m = machine(&[0x8125]);
            m.registers_mut().v[1] = vx;
            m.registers_mut().v[2] = vy;
            m.step();
            prop_assert_eq!(m.registers().v[1], vx.wrapping_sub(vy));
            prop_assert_eq!(m.registers().v[VF], (vx >= vy) as u8);
        }

        #[test]
        fn prop_sub_reverse_flags_vy_greater(vx in any::<u8>(), vy in any::<u8>()) {
            let mut m = machine(&[0x8127]);
            m.registers_mut().v[1] = vx;
            m.registers_mut().v[2] = vy;
            m.step();
            prop_assert_eq!(m.registers().v[1], vy.wrapping_sub(vx));
            prop_assert_eq!(m.registers().v[VF], (vy > vx) as u8);
        }

        #[test]
        fn prop_skip_eq_imm(vx in any::<u8>(), nn in any::<u8>()) {
            let mut m = machine(&[0x3100 | nn as u16]);
            m.registers_mut().v[1] = vx;
            m.step();
            let expected = if vx == nn { 0x204 } else { 0x202 };
            prop_assert_eq!(m.registers().pc, expected);
        }
    }
}
