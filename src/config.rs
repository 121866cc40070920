use std::time::Duration;

/// knobs for the machine and the host loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// how many instructions to run per second of wall-clock
    pub cycles_per_second: u32,
    /// how often the delay and sound timers tick; 60Hz on real hardware
    pub timer_hz: u32,
    /// fixed seed for `CxNN`; fresh entropy if unset
    pub seed: Option<u64>,
    /// how long a terminal keypress counts as held down
    pub key_hold: Duration,
}

impl Config {
    /// instructions to run between timer ticks; always at least one
    pub fn cycles_per_frame(&self) -> u32 {
        (self.cycles_per_second / self.timer_hz.max(1)).max(1)
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs(1) / self.timer_hz.max(1)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cycles_per_second: 700,
            timer_hz: 60,
            seed: None,
            key_hold: Duration::from_millis(100),
        }
    }
}
