use crate::memory::CHIP8_PROGRAM_ADDR;
use thiserror::Error;

/// the flag register; overflow, borrow and collision land here
pub const VF: usize = 0xf;

/// how many return addresses the stack holds
pub const CHIP8_STACK_DEPTH: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StackError {
    #[error("call stack is full")]
    Overflow,
    #[error("return with an empty call stack")]
    Underflow,
}

/// everything the CHIP-8 program can see that isn't memory, display or timers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    /// V0-VF
    pub v: [u8; 16],
    /// index register
    pub i: u16,
    pub pc: u16,
    stack: [u16; CHIP8_STACK_DEPTH],
    sp: usize,
}

impl RegisterFile {
    pub fn new() -> Self {
        RegisterFile {
            v: [0; 16],
            i: 0,
            pc: CHIP8_PROGRAM_ADDR,
            stack: [0; CHIP8_STACK_DEPTH],
            sp: 0,
        }
    }

    /// number of return addresses currently pushed
    pub fn sp(&self) -> usize {
        self.sp
    }

    pub fn stack(&self) -> &[u16] {
        &self.stack[..self.sp]
    }

    pub fn push(&mut self, addr: u16) -> Result<(), StackError> {
        if self.sp == CHIP8_STACK_DEPTH {
            return Err(StackError::Overflow);
        }
        self.stack[self.sp] = addr;
        self.sp += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<u16, StackError> {
        if self.sp == 0 {
            return Err(StackError::Underflow);
        }
        self.sp -= 1;
        Ok(self.stack[self.sp])
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}
