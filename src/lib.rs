//! A CHIP-8 virtual machine.
//!
//! ## Design
//!
//! * the engine (`interpreter::Chip8`) is a single owned aggregate; `step()`
//!   runs one instruction and returns a `Signal` telling the host what to do
//! * no timing in the engine; the host ticks the timers at 60Hz and calls
//!   `step()` as fast as it likes
//! * abstract display, input and sound behind traits so alternatives can be
//!   plugged in; starting with TUI in-console
//! * key edges are queued by the host and applied between instructions
//! * odd programs shouldn't bring the interpreter down: unknown opcodes and
//!   stack misuse are logged, collected as diagnostics, and skipped over
//!
//! Model
//!
//! main
//!  |-- config (cli)
//!  |-- display, input, sound
//!  |-- interpreter(config)
//!  |    |-- memory (font, program)
//!  |    |-- registers, stack
//!  |    |-- display buffer, keypad, timers
//!  |    `-- opcode decode
//!  `-- host loop
//!       |-- input.poll() -> machine.queue_key_event()
//!       |-- machine.step() x cycles_per_frame, until Blocked
//!       |-- display.draw() if anything was redrawn
//!       |-- machine.tick_timers() -> sound
//!       `-- sleep out the rest of the frame
pub mod config;
pub mod display;
pub mod host;
pub mod input;
pub mod interpreter;
pub mod memory;
pub mod opcode;
pub mod registers;
pub mod sound;
pub mod timer;

pub use config::Config;
pub use interpreter::{Chip8, Diagnostic, Signal};
