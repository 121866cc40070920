/// edges of the sound timer, for the audio collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    On,
    Off,
}

/// the delay and sound timers; both count down to zero at 60Hz
///
/// nothing in here knows about wall-clock time, the host calls `tick()`
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TimerPair {
    delay: u8,
    sound: u8,
}

impl TimerPair {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(&self) -> u8 {
        self.delay
    }

    pub fn sound(&self) -> u8 {
        self.sound
    }

    pub fn set_delay(&mut self, value: u8) {
        self.delay = value;
    }

    /// set the sound timer, reporting whether the tone starts or stops
    pub fn set_sound(&mut self, value: u8) -> Option<Tone> {
        let was = self.sound;
        self.sound = value;
        match (was, value) {
            (0, v) if v > 0 => Some(Tone::On),
            (w, 0) if w > 0 => Some(Tone::Off),
            _ => None,
        }
    }

    /// one 60Hz tick; reports `Tone::Off` when the sound timer runs out
    pub fn tick(&mut self) -> Option<Tone> {
        self.delay = self.delay.saturating_sub(1);
        if self.sound > 0 {
            self.sound -= 1;
            if self.sound == 0 {
                return Some(Tone::Off);
            }
        }
        None
    }
}
