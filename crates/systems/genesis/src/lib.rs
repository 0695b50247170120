//! Mega Drive / Genesis pad driver (multi-phase select-line bus).
//!
//! A poll walks the eight-phase table of [`phases`] eight times in a row and
//! keeps only the last cycle. The repeats give a six-button pad's internal
//! counter time to line up with the table; anything decoded in cycles 1..7
//! is discarded.

pub mod phases;
pub mod sim;

use bitflags::bitflags;
use pad_core::line::{Direction, Line, Pull};
use pad_core::logging::{log, LogCategory, LogLevel};
use pad_core::timing::{Delay, TimeUnit};
use pad_core::{Driver, Snapshot};
use serde::{Deserialize, Serialize};

pub use phases::PadKind;
use phases::{decode_cycle, CycleWord, PhaseSample, PHASES, PHASES_PER_CYCLE};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct GenesisButtons: u16 {
        const UP = 1;
        const DOWN = 2;
        const LEFT = 4;
        const RIGHT = 8;
        const B = 16;
        const A = 32;
        const Y = 64;
        const X = 128;
        const Z = 256;
        const C = 512;
        const MODE = 1024;
        const START = 2048;
        const HOME = 4096;
    }
}

impl GenesisButtons {
    /// Alternate layout: A and B trade places, as do X and Y.
    pub fn swap_alternate(self) -> Self {
        let mut out = self - (Self::A | Self::B | Self::X | Self::Y);
        out.set(Self::A, self.contains(Self::B));
        out.set(Self::B, self.contains(Self::A));
        out.set(Self::X, self.contains(Self::Y));
        out.set(Self::Y, self.contains(Self::X));
        out
    }
}

/// Settle time after every select change (~10us).
pub const SELECT_SETTLE: TimeUnit = TimeUnit::Cycles(160);

/// Full cycles run per poll; more than the six-button counter needs to
/// settle.
pub const POLL_CYCLES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisSnapshot {
    pub buttons: GenesisButtons,
    pub kind: PadKind,
    pub connected: bool,
}

impl Default for GenesisSnapshot {
    fn default() -> Self {
        Self {
            buttons: GenesisButtons::empty(),
            kind: PadKind::Disconnected,
            connected: false,
        }
    }
}

impl Snapshot for GenesisSnapshot {
    fn connected(&self) -> bool {
        self.connected
    }

    /// The six-button extension is this bus's accessory.
    fn accessory_present(&self) -> bool {
        self.kind == PadKind::SixButton
    }
}

pub struct GenesisLines<L> {
    /// TH, DB9 pin 7.
    pub select: L,
    /// D0..D3, DB9 pins 1..4.
    pub data: [L; 4],
    /// DB9 pin 6.
    pub tl: L,
    /// DB9 pin 9.
    pub tr: L,
    /// Pad supply, DB9 pin 5.
    pub power: L,
}

pub struct GenesisController<L, D> {
    lines: GenesisLines<L>,
    delay: D,
    alternate_mode: bool,
    snapshot: GenesisSnapshot,
}

impl<L: Line, D: Delay> GenesisController<L, D> {
    pub fn new(lines: GenesisLines<L>, delay: D) -> Self {
        Self {
            lines,
            delay,
            alternate_mode: false,
            snapshot: GenesisSnapshot::default(),
        }
    }

    /// Toggled by the host configuration; applied to every later poll.
    pub fn set_alternate_mode(&mut self, enabled: bool) {
        self.alternate_mode = enabled;
    }

    pub fn alternate_mode(&self) -> bool {
        self.alternate_mode
    }

    fn sample(&self) -> PhaseSample {
        let data_low = self
            .lines
            .data
            .iter()
            .enumerate()
            .filter(|(_, line)| line.is_low())
            .fold(0u8, |acc, (bit, _)| acc | 1 << bit);
        PhaseSample {
            data_low,
            tl_low: self.lines.tl.is_low(),
            tr_low: self.lines.tr.is_low(),
        }
    }

    /// Walk the phase table once.
    pub fn read_cycle(&mut self) -> [PhaseSample; PHASES_PER_CYCLE] {
        let mut samples = [PhaseSample::default(); PHASES_PER_CYCLE];
        for (phase, slot) in PHASES.iter().zip(samples.iter_mut()) {
            self.lines.select.set(phase.select);
            self.delay.delay(SELECT_SETTLE);
            *slot = self.sample();
        }
        samples
    }

    fn read_word(&mut self) -> CycleWord {
        let mut word = decode_cycle(&self.read_cycle());
        for _ in 1..POLL_CYCLES {
            word = decode_cycle(&self.read_cycle());
        }
        word
    }
}

impl<L: Line, D: Delay> Driver for GenesisController<L, D> {
    type Snapshot = GenesisSnapshot;

    fn initialize(&mut self) {
        let l = &mut self.lines;
        l.power.configure(Direction::Output, Pull::None);
        l.power.set_high();
        l.select.configure(Direction::Output, Pull::None);
        l.select.set_high();
        for line in l.data.iter_mut() {
            line.configure(Direction::Input, Pull::Up);
        }
        l.tl.configure(Direction::Input, Pull::Up);
        l.tr.configure(Direction::Input, Pull::Up);
        self.snapshot = GenesisSnapshot::default();
    }

    fn poll(&mut self) -> GenesisSnapshot {
        let word = self.read_word();
        let buttons = if self.alternate_mode {
            word.buttons.swap_alternate()
        } else {
            word.buttons
        };
        let snapshot = GenesisSnapshot {
            buttons,
            kind: word.kind,
            connected: word.kind != PadKind::Disconnected,
        };

        log(LogCategory::Select, LogLevel::Trace, || {
            format!("genesis: {:?} {:?}", snapshot.kind, snapshot.buttons)
        });
        if snapshot.kind != self.snapshot.kind {
            log(LogCategory::Select, LogLevel::Info, || {
                format!("genesis: {:?} -> {:?}", self.snapshot.kind, snapshot.kind)
            });
        }

        self.snapshot = snapshot;
        snapshot
    }

    fn current_snapshot(&self) -> GenesisSnapshot {
        self.snapshot
    }

    fn reset(&mut self) {
        self.snapshot = GenesisSnapshot::default();
    }
}
