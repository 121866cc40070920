use std::io;
use std::io::Read;
use thiserror::Error;

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

/// how much RAM we have
pub const CHIP8_RAM_SIZE_BYTES: usize = 4096;

/// addresses wrap at 12 bits
pub const CHIP8_ADDR_MASK: u16 = 0x0fff;

/// where the program is loaded
pub const CHIP8_PROGRAM_ADDR: u16 = 0x0200;

/// most a program can be before it runs off the top of RAM
pub const CHIP8_PROGRAM_CAPACITY: usize = CHIP8_RAM_SIZE_BYTES - CHIP8_PROGRAM_ADDR as usize;

/// the font lives at the very bottom of RAM; each glyph is 5 rows
pub const CHIP8_FONT_ADDR: u16 = 0x000;
pub const CHIP8_FONT_GLYPH_BYTES: u16 = 5;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("can't read program: {0}")]
    Io(#[from] io::Error),
    #[error("program is at least {len} bytes; only {capacity} fit above 0x200")]
    TooLarge { len: usize, capacity: usize },
}

/// Represents memory map, ROM, RAM etc.
pub trait MemoryMap {
    /// read a single byte
    fn read_byte(&self, addr: u16) -> u8;

    /// write a single byte
    fn write_byte(&mut self, addr: u16, value: u8);

    /// get a big-endian two-byte word (opcode fetch)
    fn get_word(&self, addr: u16) -> u16 {
        let hi = self.read_byte(addr) as u16;
        let lo = self.read_byte(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// write a chunk of bytes into "RAM", starting at `addr`
    fn write(&mut self, data: &[u8], addr: u16) {
        for (offset, byte) in data.iter().enumerate() {
            self.write_byte(addr.wrapping_add(offset as u16), *byte);
        }
    }

    /// get a r/o slice of the underlying memory
    fn get_ro_slice(&self, addr: u16, len: usize) -> &[u8];
}

/// Defines the CHIP-8 memory map as modern interpreters lay it out
///   0x0000-0x004f  font (16 glyphs x 5 bytes)
///   0x0050-0x01ff  unused; the interpreter lived here on the COSMAC VIP
///   0x0200-0x0fff  program and scratch data
///
/// the stack, registers and display live outside of addressable memory
pub struct Chip8MemoryMap {
    bytes: Box<[u8]>,
    pub program_addr: u16,
}

impl MemoryMap for Chip8MemoryMap {
    fn read_byte(&self, addr: u16) -> u8 {
        self.bytes[(addr & CHIP8_ADDR_MASK) as usize]
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        self.bytes[(addr & CHIP8_ADDR_MASK) as usize] = value;
    }

    fn get_ro_slice(&self, addr: u16, len: usize) -> &[u8] {
        let a = (addr & CHIP8_ADDR_MASK) as usize;
        &self.bytes[a..(a + len).min(CHIP8_RAM_SIZE_BYTES)]
    }
}

impl Chip8MemoryMap {
    /// initialises CHIP-8 with zeroed RAM and the font baked in
    pub fn new() -> Self {
        let mut mm = Chip8MemoryMap {
            bytes: vec![0u8; CHIP8_RAM_SIZE_BYTES].into_boxed_slice(),
            program_addr: CHIP8_PROGRAM_ADDR,
        };
        mm.write(&CHIP8_FONT, CHIP8_FONT_ADDR);
        mm
    }

    /// load a CHIP-8 program at 0x200; returns how many bytes were loaded
    ///
    /// nothing is written if the program is too big to fit
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<usize, LoadError> {
        // one byte over is enough to know it won't fit
        let mut buf = Vec::with_capacity(CHIP8_PROGRAM_CAPACITY + 1);
        let len = reader
            .take(CHIP8_PROGRAM_CAPACITY as u64 + 1)
            .read_to_end(&mut buf)?;
        if len > CHIP8_PROGRAM_CAPACITY {
            return Err(LoadError::TooLarge {
                len,
                capacity: CHIP8_PROGRAM_CAPACITY,
            });
        }
        self.write(&buf, self.program_addr);
        Ok(len)
    }
}

impl Default for Chip8MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

/// standard hex digit glyphs, 0-F, 4 pixels wide
pub const CHIP8_FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
