use crossterm::event::{poll, read, Event, KeyCode, KeyModifiers};
use crossterm::terminal;
use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

pub const CHIP8_KEY_COUNT: usize = 16;

/// map of keys on the left-hand side of a qwerty keyboard to the COSMAC hex
/// keypad
///
///   1 2 3 4        1 2 3 C
///   q w e r   =>   4 5 6 D
///   a s d f        7 8 9 E
///   z x c v        A 0 B F
const CHIP8_CONVENTIONAL_KEYMAP: [(char, u8); 16] = [
    ('x', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('q', 0x04),
    ('w', 0x05),
    ('e', 0x06),
    ('a', 0x07),
    ('s', 0x08),
    ('d', 0x09),
    ('z', 0x0a),
    ('c', 0x0b),
    ('4', 0x0c),
    ('r', 0x0d),
    ('f', 0x0e),
    ('v', 0x0f),
];

/// an edge on one of the 16 logical keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Pressed(u8),
    Released(u8),
}

/// whether the machine is running or parked on `Fx0A`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Running,
    /// waiting for a key to go down then up again; `pressed` is the key
    /// that went down first
    WaitingForKey { register: usize, pressed: Option<u8> },
}

/// the key latch, written by the host between cycles and read by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keypad {
    keys: [bool; CHIP8_KEY_COUNT],
    wait: WaitState,
}

impl Keypad {
    pub fn new() -> Self {
        Keypad {
            keys: [false; CHIP8_KEY_COUNT],
            wait: WaitState::Running,
        }
    }

    /// is key `k` held down? only the low nibble counts
    pub fn is_pressed(&self, k: u8) -> bool {
        self.keys[(k & 0xf) as usize]
    }

    pub fn wait_state(&self) -> WaitState {
        self.wait
    }

    /// park until a key is pressed and released; result goes to `register`
    pub fn begin_wait(&mut self, register: usize) {
        self.wait = WaitState::WaitingForKey {
            register,
            pressed: None,
        };
    }

    /// latch one edge; if it completes a pending wait, returns the register
    /// to fill and the key that satisfied it
    pub fn apply(&mut self, event: KeyEvent) -> Option<(usize, u8)> {
        match event {
            KeyEvent::Pressed(k) => {
                let k = k & 0xf;
                self.keys[k as usize] = true;
                if let WaitState::WaitingForKey {
                    register,
                    pressed: None,
                } = self.wait
                {
                    self.wait = WaitState::WaitingForKey {
                        register,
                        pressed: Some(k),
                    };
                }
                None
            }
            KeyEvent::Released(k) => {
                let k = k & 0xf;
                self.keys[k as usize] = false;
                match self.wait {
                    WaitState::WaitingForKey {
                        register,
                        pressed: Some(p),
                    } if p == k => {
                        self.wait = WaitState::Running;
                        Some((register, k))
                    }
                    _ => None,
                }
            }
        }
    }
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}

/// things the host's input device can tell the run loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Key(KeyEvent),
    Quit,
}

/// reads keypresses
pub trait Input {
    /// drain everything that's happened since the last poll, in order
    fn poll(&mut self) -> Result<Vec<HostEvent>, io::Error>;
}

/// simple implementation of Input, using the terminal
///
/// terminals only report presses, so each key is treated as held for
/// `hold` and a release is made up after that
pub struct TermInput {
    keymap: HashMap<char, u8>,
    held: HashMap<u8, Instant>,
    hold: Duration,
}

impl TermInput {
    pub fn new(hold: Duration) -> Result<Self, io::Error> {
        terminal::enable_raw_mode()?;
        Ok(TermInput {
            keymap: HashMap::from(CHIP8_CONVENTIONAL_KEYMAP),
            held: HashMap::new(),
            hold,
        })
    }

    fn expire_held(&mut self, now: Instant, events: &mut Vec<HostEvent>) {
        let hold = self.hold;
        let mut expired: Vec<u8> = self
            .held
            .iter()
            .filter(|(_, since)| now.duration_since(**since) >= hold)
            .map(|(k, _)| *k)
            .collect();
        expired.sort_unstable();
        for k in expired {
            self.held.remove(&k);
            events.push(HostEvent::Key(KeyEvent::Released(k)));
        }
    }
}

impl Drop for TermInput {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            log::warn!("couldn't leave raw mode: {}", e);
        }
    }
}

impl Input for TermInput {
    fn poll(&mut self) -> Result<Vec<HostEvent>, io::Error> {
        let mut events = Vec::new();
        while poll(Duration::from_millis(0))? {
            match read()? {
                Event::Key(evt) => match evt.code {
                    KeyCode::Esc => events.push(HostEvent::Quit),
                    KeyCode::Char('c') if evt.modifiers.contains(KeyModifiers::CONTROL) => {
                        events.push(HostEvent::Quit)
                    }
                    KeyCode::Char(key) => match self.keymap.get(&key.to_ascii_lowercase()) {
                        Some(mapped_key) => {
                            // auto-repeat just keeps the key held
                            if self.held.insert(*mapped_key, Instant::now()).is_none() {
                                events.push(HostEvent::Key(KeyEvent::Pressed(*mapped_key)));
                            }
                        }
                        None => log::warn!("can't map {:?} to a COSMAC key", key),
                    },
                    other => log::debug!("ignoring key {:?}", other),
                },
                other => log::debug!("ignoring event {:?}", other),
            }
        }
        self.expire_held(Instant::now(), &mut events);
        Ok(events)
    }
}

/// dummy Input implementation for testing; hands out one batch per poll
pub struct DummyInput {
    batches: Vec<Vec<HostEvent>>,
}

impl DummyInput {
    pub fn new(batches: Vec<Vec<HostEvent>>) -> Self {
        let mut batches = batches;
        batches.reverse();
        DummyInput { batches }
    }
}

impl Input for DummyInput {
    fn poll(&mut self) -> Result<Vec<HostEvent>, io::Error> {
        Ok(self.batches.pop().unwrap_or_default())
    }
}
