use crate::config::Config;
use crate::display::Display;
use crate::input::{HostEvent, Input};
use crate::interpreter::{Chip8, Signal};
use crate::sound::Sound;
use crate::timer::Tone;
use log::info;
use std::io;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("audio error: {0}")]
    Audio(String),
}

/// why the run loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// the program exited with this status
    Terminated(u8),
    /// the user asked to quit
    Quit,
    /// hit the cycle limit passed to `run`
    CycleLimit,
}

/// wires a machine up to a display, keyboard and speaker, and paces it
///
/// each frame (one timer tick):
///  - pass any input on to the machine
///  - run a frame's worth of instructions, stopping early if blocked
///  - redraw if anything changed
///  - tick the timers, forward tone changes
///  - sleep off whatever's left of the frame
pub struct Chip8Host<'a> {
    machine: Chip8,
    display: &'a mut dyn Display,
    input: &'a mut dyn Input,
    sound: &'a mut dyn Sound,
    config: Config,
    /// when false, frames run back to back; handy for tests
    pub paced: bool,
}

impl<'a> Chip8Host<'a> {
    pub fn new(
        machine: Chip8,
        display: &'a mut dyn Display,
        input: &'a mut dyn Input,
        sound: &'a mut dyn Sound,
        config: Config,
    ) -> Self {
        Chip8Host {
            machine,
            display,
            input,
            sound,
            config,
            paced: true,
        }
    }

    pub fn machine(&self) -> &Chip8 {
        &self.machine
    }

    /// run until the program exits, the user quits, or `max_cycles`
    /// instructions have been attempted
    pub fn run(&mut self, max_cycles: Option<u64>) -> Result<RunOutcome, HostError> {
        info!(
            "running at {} cycles/s, {}Hz timers",
            self.config.cycles_per_second, self.config.timer_hz
        );
        let frame = self.config.frame_duration();
        let mut cycles: u64 = 0;
        // paint the initial blank screen
        self.display.draw(self.machine.display())?;

        loop {
            let started = Instant::now();

            for event in self.input.poll()? {
                match event {
                    HostEvent::Key(key) => self.machine.queue_key_event(key),
                    HostEvent::Quit => {
                        info!("quit after {} cycles", cycles);
                        self.stop_sound()?;
                        return Ok(RunOutcome::Quit);
                    }
                }
            }

            let mut redraw = false;
            for _ in 0..self.config.cycles_per_frame() {
                if max_cycles.map_or(false, |max| cycles >= max) {
                    info!("cycle limit reached");
                    self.stop_sound()?;
                    return Ok(RunOutcome::CycleLimit);
                }
                cycles += 1;
                match self.machine.step() {
                    Signal::Continue => {}
                    Signal::Redraw => redraw = true,
                    Signal::Blocked => break,
                    Signal::Terminated(code) => {
                        info!("program exited with status {} after {} cycles", code, cycles);
                        if redraw {
                            self.display.draw(self.machine.display())?;
                        }
                        self.stop_sound()?;
                        return Ok(RunOutcome::Terminated(code));
                    }
                }
            }
            // diagnostics have already been logged by the machine
            self.machine.drain_diagnostics();

            if redraw {
                self.display.draw(self.machine.display())?;
            }

            for tone in self.machine.drain_tones() {
                self.play(tone)?;
            }
            if let Some(tone) = self.machine.tick_timers() {
                self.play(tone)?;
            }

            if self.paced {
                if let Some(rest) = frame.checked_sub(started.elapsed()) {
                    spin_sleep::sleep(rest);
                }
            }
        }
    }

    fn play(&mut self, tone: Tone) -> Result<(), HostError> {
        self.sound
            .apply(tone)
            .map_err(|e| HostError::Audio(e.to_string()))
    }

    fn stop_sound(&mut self) -> Result<(), HostError> {
        if self.machine.timers().sound() > 0 {
            self.play(Tone::Off)?;
        }
        Ok(())
    }
}
