use std::fmt;

/// pull `count` nibbles out of an opcode, starting at nibble `start` where
/// nibble 0 is the most significant
///
/// `nibbles(0xd123, 1, 3) == 0x123`
pub fn nibbles(opcode: u16, start: u8, count: u8) -> u16 {
    debug_assert!(count > 0 && start + count <= 4, "nibble range out of bounds");
    let shift = 4 * (4 - (start + count));
    let mask = ((1u32 << (4 * count)) - 1) as u16;
    (opcode >> shift) & mask
}

/// a raw 16-bit instruction word, with the usual named fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode(pub u16);

impl Opcode {
    pub fn class(&self) -> u8 {
        nibbles(self.0, 0, 1) as u8
    }
    pub fn x(&self) -> usize {
        nibbles(self.0, 1, 1) as usize
    }
    pub fn y(&self) -> usize {
        nibbles(self.0, 2, 1) as usize
    }
    pub fn n(&self) -> u8 {
        nibbles(self.0, 3, 1) as u8
    }
    pub fn nn(&self) -> u8 {
        nibbles(self.0, 2, 2) as u8
    }
    pub fn nnn(&self) -> u16 {
        nibbles(self.0, 1, 3)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

/// register-to-register ALU operations (class 0x8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Assign,
    Or,
    And,
    Xor,
    Add,
    Sub,
    ShiftRight,
    SubReverse,
    ShiftLeft,
}

/// the base CHIP-8 instruction set, with operands already extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    ClearScreen,
    Return,
    Exit { code: u8 },
    Jump { addr: u16 },
    Call { addr: u16 },
    SkipEqImm { x: usize, nn: u8 },
    SkipNeImm { x: usize, nn: u8 },
    SkipEqReg { x: usize, y: usize },
    LoadImm { x: usize, nn: u8 },
    AddImm { x: usize, nn: u8 },
    Alu { op: AluOp, x: usize, y: usize },
    SkipNeReg { x: usize, y: usize },
    SetIndex { addr: u16 },
    JumpOffset { addr: u16 },
    Random { x: usize, mask: u8 },
    Draw { x: usize, y: usize, rows: u8 },
    SkipKeyDown { x: usize },
    SkipKeyUp { x: usize },
    ReadDelay { x: usize },
    WaitKey { x: usize },
    SetDelay { x: usize },
    SetSound { x: usize },
    AddIndex { x: usize },
    FontGlyph { x: usize },
    StoreBcd { x: usize },
    StoreRegs { x: usize },
    LoadRegs { x: usize },
}

impl Instruction {
    /// decode an opcode; `None` means it's not part of the base set
    pub fn decode(opcode: Opcode) -> Option<Instruction> {
        use Instruction::*;
        let (x, y) = (opcode.x(), opcode.y());
        let insn = match opcode.class() {
            0x0 => match opcode.nn() {
                0xe0 => ClearScreen,
                0xee => Return,
                0x10..=0x1f => Exit { code: opcode.n() },
                _ => return None,
            },
            0x1 => Jump { addr: opcode.nnn() },
            0x2 => Call { addr: opcode.nnn() },
            0x3 => SkipEqImm { x, nn: opcode.nn() },
            0x4 => SkipNeImm { x, nn: opcode.nn() },
            0x5 => match opcode.n() {
                0x0 => SkipEqReg { x, y },
                _ => return None,
            },
            0x6 => LoadImm { x, nn: opcode.nn() },
            0x7 => AddImm { x, nn: opcode.nn() },
            0x8 => {
                let op = match opcode.n() {
                    0x0 => AluOp::Assign,
                    0x1 => AluOp::Or,
                    0x2 => AluOp::And,
                    0x3 => AluOp::Xor,
                    0x4 => AluOp::Add,
                    0x5 => AluOp::Sub,
                    0x6 => AluOp::ShiftRight,
                    0x7 => AluOp::SubReverse,
                    0xe => AluOp::ShiftLeft,
                    _ => return None,
                };
                Alu { op, x, y }
            }
            0x9 => match opcode.n() {
                0x0 => SkipNeReg { x, y },
                _ => return None,
            },
            0xa => SetIndex { addr: opcode.nnn() },
            0xb => JumpOffset { addr: opcode.nnn() },
            0xc => Random { x, mask: opcode.nn() },
            0xd => Draw {
                x,
                y,
                rows: opcode.n(),
            },
            0xe => match opcode.nn() {
                0x9e => SkipKeyDown { x },
                0xa1 => SkipKeyUp { x },
                _ => return None,
            },
            // 0xf
            _ => match opcode.nn() {
                0x07 => ReadDelay { x },
                0x0a => WaitKey { x },
                0x15 => SetDelay { x },
                0x18 => SetSound { x },
                0x1e => AddIndex { x },
                0x29 => FontGlyph { x },
                0x33 => StoreBcd { x },
                0x55 => StoreRegs { x },
                0x65 => LoadRegs { x },
                _ => return None,
            },
        };
        Some(insn)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match *self {
            ClearScreen => write!(f, "CLS"),
            Return => write!(f, "RET"),
            Exit { code } => write!(f, "EXIT {}", code),
            Jump { addr } => write!(f, "JP {:03x}", addr),
            Call { addr } => write!(f, "CALL {:03x}", addr),
            SkipEqImm { x, nn } => write!(f, "SE V{:X}, {:02x}", x, nn),
            SkipNeImm { x, nn } => write!(f, "SNE V{:X}, {:02x}", x, nn),
            SkipEqReg { x, y } => write!(f, "SE V{:X}, V{:X}", x, y),
            LoadImm { x, nn } => write!(f, "LD V{:X}, {:02x}", x, nn),
            AddImm { x, nn } => write!(f, "ADD V{:X}, {:02x}", x, nn),
            Alu { op, x, y } => {
                let m = match op {
                    AluOp::Assign => "LD",
                    AluOp::Or => "OR",
                    AluOp::And => "AND",
                    AluOp::Xor => "XOR",
                    AluOp::Add => "ADD",
                    AluOp::Sub => "SUB",
                    AluOp::ShiftRight => "SHR",
                    AluOp::SubReverse => "SUBN",
                    AluOp::ShiftLeft => "SHL",
                };
                write!(f, "{} V{:X}, V{:X}", m, x, y)
            }
            SkipNeReg { x, y } => write!(f, "SNE V{:X}, V{:X}", x, y),
            SetIndex { addr } => write!(f, "LD I, {:03x}", addr),
            JumpOffset { addr } => write!(f, "JP V0, {:03x}", addr),
            Random { x, mask } => write!(f, "RND V{:X}, {:02x}", x, mask),
            Draw { x, y, rows } => write!(f, "DRW V{:X}, V{:X}, {}", x, y, rows),
            SkipKeyDown { x } => write!(f, "SKP V{:X}", x),
            SkipKeyUp { x } => write!(f, "SKNP V{:X}", x),
            ReadDelay { x } => write!(f, "LD V{:X}, DT", x),
            WaitKey { x } => write!(f, "LD V{:X}, K", x),
            SetDelay { x } => write!(f, "LD DT, V{:X}", x),
            SetSound { x } => write!(f, "LD ST, V{:X}", x),
            AddIndex { x } => write!(f, "ADD I, V{:X}", x),
            FontGlyph { x } => write!(f, "LD F, V{:X}", x),
            StoreBcd { x } => write!(f, "LD B, V{:X}", x),
            StoreRegs { x } => write!(f, "LD [I], V{:X}", x),
            LoadRegs { x } => write!(f, "LD V{:X}, [I]", x),
        }
    }
}
