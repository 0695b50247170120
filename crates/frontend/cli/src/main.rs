mod settings;

use anyhow::{anyhow, Result};
use bitflags::parser::ParseHex;
use bitflags::Flags;
use clap::{Parser, ValueEnum};
use pad_core::sim::SimBoard;
use pad_core::Driver;
use serde::Serialize;
use settings::Settings;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Bus {
    Nes,
    Snes,
    Genesis,
    N64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Switch {
    On,
    Off,
}

/// Poll a simulated pad through the real bus driver and print each snapshot
/// as JSON.
#[derive(Parser)]
#[command(name = "padprobe")]
struct Args {
    /// Bus to probe
    bus: Bus,

    /// Buttons held on the pad, e.g. "A | START"
    #[arg(long)]
    press: Option<String>,

    /// Attach the bus accessory: Power Pad (nes), NTT keypad (snes),
    /// six-button pad (genesis) or rumble pak (n64)
    #[arg(long, default_value_t = false)]
    accessory: bool,

    /// Accessory keys: Power Pad buttons (nes) or keypad keys (snes)
    #[arg(long)]
    keys: Option<String>,

    /// Leave the port empty
    #[arg(long, default_value_t = false)]
    unplugged: bool,

    /// Number of polls to run
    #[arg(long, default_value_t = 1)]
    polls: u32,

    /// Drive the rumble motor before polling (n64 only)
    #[arg(long)]
    rumble: Option<Switch>,

    /// Settings file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective settings to this file
    #[arg(long)]
    save: Option<PathBuf>,
}

fn parse_flags<F>(text: Option<&str>, what: &str) -> Result<F>
where
    F: Flags,
    F::Bits: ParseHex,
{
    match text {
        None => Ok(F::empty()),
        Some(s) => {
            bitflags::parser::from_str(s).map_err(|e| anyhow!("invalid {} {:?}: {}", what, s, e))
        }
    }
}

fn poll_loop<D, F>(driver: &mut D, polls: u32, board: &SimBoard, mut report: F) -> Result<()>
where
    D: Driver,
    D::Snapshot: Serialize,
    F: FnMut(&D::Snapshot),
{
    driver.initialize();
    for n in 1..=polls {
        let snapshot = driver.poll();
        println!("{}", serde_json::to_string(&snapshot)?);
        report(&snapshot);
        log::debug!("poll {} done at {} ns", n, board.now_ns());
        // one frame between polls
        board.advance(16_666_667);
    }
    Ok(())
}

fn run_nes(args: &Args, settings: &Settings) -> Result<()> {
    use pad_nes::sim::{NesPad, NesPins};
    use pad_nes::{NesButtons, NesController, PowerPadButtons};

    let pins = NesPins::default();
    let board = SimBoard::with_clock(NesPins::LINES, settings.clock_hz);
    if !args.unplugged {
        let buttons: NesButtons = parse_flags(args.press.as_deref(), "NES buttons")?;
        let mut pad = NesPad::new(pins).with_buttons(buttons);
        if args.accessory {
            let mat: PowerPadButtons = parse_flags(args.keys.as_deref(), "Power Pad buttons")?;
            pad = pad.with_power_pad(mat);
        }
        board.attach_new(pad);
    }
    let mut nes = NesController::new(pins.lines(&board), board.delay());
    poll_loop(&mut nes, args.polls, &board, |_| {})
}

fn run_snes(args: &Args, settings: &Settings) -> Result<()> {
    use pad_snes::sim::{SnesPad, SnesPins};
    use pad_snes::{ntt_keypad, NttKeys, SnesButtons, SnesController};

    let pins = SnesPins::default();
    let board = SimBoard::with_clock(SnesPins::LINES, settings.clock_hz);
    if !args.unplugged {
        let buttons: SnesButtons = parse_flags(args.press.as_deref(), "SNES buttons")?;
        let mut pad = SnesPad::new(pins).with_buttons(buttons);
        if args.accessory {
            let keys: NttKeys = parse_flags(args.keys.as_deref(), "keypad keys")?;
            pad = pad.with_keypad(keys);
        }
        board.attach_new(pad);
    }
    let mut snes = SnesController::new(pins.lines(&board), board.delay());
    snes.set_player_number(settings.snes_player);
    poll_loop(&mut snes, args.polls, &board, |s| {
        if s.keypad_present {
            log::info!("keypad: \"{}\"", ntt_keypad::symbols(s.keypad));
        }
    })
}

fn run_genesis(args: &Args, settings: &Settings) -> Result<()> {
    use pad_genesis::sim::{GenesisPad, GenesisPins, PadModel};
    use pad_genesis::{GenesisButtons, GenesisController};

    let pins = GenesisPins::default();
    let board = SimBoard::with_clock(GenesisPins::LINES, settings.clock_hz);
    if !args.unplugged {
        let buttons: GenesisButtons = parse_flags(args.press.as_deref(), "Genesis buttons")?;
        let model = if args.accessory {
            PadModel::SixButton
        } else {
            PadModel::ThreeButton
        };
        board.attach_new(GenesisPad::new(pins, model).with_buttons(buttons));
    }
    let mut genesis = GenesisController::new(pins.lines(&board), board.delay());
    genesis.set_alternate_mode(settings.genesis_alternate_mode);
    poll_loop(&mut genesis, args.polls, &board, |_| {})
}

fn run_n64(args: &Args, settings: &Settings) -> Result<()> {
    use pad_n64::sim::{N64Pad, PakSlot, DATA_LINE};
    use pad_n64::{N64Buttons, N64Controller};

    let board = SimBoard::with_clock(1, settings.clock_hz);
    if !args.unplugged {
        let buttons: N64Buttons = parse_flags(args.press.as_deref(), "N64 buttons")?;
        let slot = if args.accessory {
            PakSlot::Rumble
        } else {
            PakSlot::Empty
        };
        board.attach_new(N64Pad::new(DATA_LINE).with_buttons(buttons).with_pak(slot));
    }
    let mut n64 = N64Controller::new(board.line(DATA_LINE), board.delay(), board.interrupts());
    n64.initialize();
    if let Some(switch) = args.rumble {
        if !n64.set_rumble(switch == Switch::On) {
            log::warn!("rumble request dropped: no rumble pak answered");
        }
    }
    match n64.identify() {
        Ok(info) => log::info!(
            "device type {:#06X}, pak {}",
            info.device_type,
            if info.pak_inserted() { "inserted" } else { "empty" }
        ),
        Err(e) => log::info!("identify failed: {}", e),
    }

    // initialize() would forget the armed pak, so poll directly
    for _ in 0..args.polls {
        println!("{}", serde_json::to_string(&n64.poll())?);
        board.advance(16_666_667);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => Settings::load_or_default(path),
        None => Settings::default(),
    };
    settings.apply()?;

    if args.rumble.is_some() && args.bus != Bus::N64 {
        log::warn!("--rumble only applies to the n64 bus");
    }

    match args.bus {
        Bus::Nes => run_nes(&args, &settings)?,
        Bus::Snes => run_snes(&args, &settings)?,
        Bus::Genesis => run_genesis(&args, &settings)?,
        Bus::N64 => run_n64(&args, &settings)?,
    }

    if let Some(path) = &args.save {
        settings.save(path)?;
        log::info!("settings written to {}", path.display());
    }
    Ok(())
}
