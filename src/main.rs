use clap::Parser;
use std::error::Error;
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use chip8vm::display::MonoTermDisplay;
use chip8vm::host::{Chip8Host, RunOutcome};
use chip8vm::input::TermInput;
use chip8vm::sound::{Mute, SimpleBeep, Sound};
use chip8vm::{Chip8, Config};

/// run a CHIP-8 program in the terminal
///
/// keys: 1234/qwer/asdf/zxcv map onto the hex keypad; Esc quits.
/// logs go to stderr, so redirect it (e.g. `RUST_LOG=debug chip8vm rom 2>log`)
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// program to load at 0x200
    #[arg(value_name = "ROM_FILE")]
    rom: PathBuf,

    /// instructions per second
    #[arg(short, long, default_value = "700")]
    cycles_per_second: u32,

    /// seed for the random number opcode
    #[arg(short, long)]
    seed: Option<u64>,

    /// how long a keypress is held, in milliseconds
    #[arg(long, default_value = "100")]
    key_hold_ms: u64,

    /// use the PC speaker rather than staying silent
    #[arg(short, long)]
    beep: bool,

    /// stop after this many instructions
    #[arg(long)]
    max_cycles: Option<u64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = Config {
        cycles_per_second: args.cycles_per_second,
        seed: args.seed,
        key_hold: Duration::from_millis(args.key_hold_ms),
        ..Config::default()
    };

    // load the program before touching the terminal, so errors are readable
    let mut machine = Chip8::with_config(&config);
    let mut f = File::open(&args.rom)?;
    machine.load_program(&mut f)?;

    let outcome = {
        let mut display = MonoTermDisplay::new()?;
        let mut input = TermInput::new(config.key_hold)?;
        let mut sound: Box<dyn Sound> = if args.beep {
            Box::new(SimpleBeep::new())
        } else {
            Box::new(Mute::new())
        };
        let mut host = Chip8Host::new(
            machine,
            &mut display,
            &mut input,
            sound.as_mut(),
            config,
        );
        host.run(args.max_cycles)?
    };

    // shove some junk on stdout to stop the cli messing up the last frame
    for _ in 0..12 {
        println!();
    }

    if let RunOutcome::Terminated(code) = outcome {
        std::process::exit(code as i32);
    }
    Ok(())
}
