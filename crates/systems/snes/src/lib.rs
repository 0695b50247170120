//! 16-bit shift-register pad driver with NTT Data Keypad support.
//!
//! Same latch/clock shape as the 8-bit bus, with a data-dependent length:
//! 16 clocked bits normally, 32 when the keypad indicator shows up on bit 13.

pub mod ntt_keypad;
pub mod sim;

use bitflags::bitflags;
use pad_core::line::Line;
use pad_core::logging::{log, LogCategory, LogLevel};
use pad_core::shift_register::{configure_data_line, ShiftRegisterBus};
use pad_core::timing::Delay;
use pad_core::{Driver, Snapshot};
use serde::{Deserialize, Serialize};

pub use ntt_keypad::NttKeys;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct SnesButtons: u16 {
        const B = 0x0001;
        const Y = 0x0002;
        const SELECT = 0x0004;
        const START = 0x0008;
        const UP = 0x0010;
        const DOWN = 0x0020;
        const LEFT = 0x0040;
        const RIGHT = 0x0080;
        const A = 0x0100;
        const X = 0x0200;
        const L = 0x0400;
        const R = 0x0800;
    }
}

pub const STANDARD_BITS: u8 = 16;

/// Bit index to button for bits 0..12. Bits 12..16 carry the device
/// signature instead.
pub const BUTTON_MAP: [SnesButtons; 12] = [
    SnesButtons::B,
    SnesButtons::Y,
    SnesButtons::SELECT,
    SnesButtons::START,
    SnesButtons::UP,
    SnesButtons::DOWN,
    SnesButtons::LEFT,
    SnesButtons::RIGHT,
    SnesButtons::A,
    SnesButtons::X,
    SnesButtons::L,
    SnesButtons::R,
];

const SIGNATURE_SHIFT: u8 = 12;

pub const MIN_PLAYER: u8 = 1;
pub const MAX_PLAYER: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnesSnapshot {
    pub buttons: SnesButtons,
    /// Low bits 12..16 of the standard sequence, shifted down.
    pub signature: u8,
    /// Only meaningful when `keypad_present`.
    pub keypad: NttKeys,
    pub keypad_present: bool,
    pub connected: bool,
    /// Multitap player slot, 1..=4.
    pub player: u8,
}

impl Default for SnesSnapshot {
    fn default() -> Self {
        Self {
            buttons: SnesButtons::empty(),
            signature: 0,
            keypad: NttKeys::empty(),
            keypad_present: false,
            connected: false,
            player: MIN_PLAYER,
        }
    }
}

impl Snapshot for SnesSnapshot {
    fn connected(&self) -> bool {
        self.connected
    }

    fn accessory_present(&self) -> bool {
        self.keypad_present
    }
}

/// Low-bit masks sampled during one transaction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub data: u16,
    /// Extension bits on D2; zero when the extension was not clocked.
    pub d2: u16,
    pub d3: u16,
    /// Total clock pulses issued.
    pub clocks: u8,
}

impl RawSample {
    pub fn keypad_indicated(&self) -> bool {
        self.data & (1 << ntt_keypad::INDICATOR_BIT) != 0
    }

    pub fn decode(self, player: u8) -> SnesSnapshot {
        let buttons = BUTTON_MAP
            .iter()
            .enumerate()
            .filter(|(bit, _)| self.data & (1 << bit) != 0)
            .fold(SnesButtons::empty(), |acc, (_, b)| acc | *b);
        let keypad_present = self.keypad_indicated();
        let keypad = if keypad_present {
            ntt_keypad::decode(self.d2)
        } else {
            NttKeys::empty()
        };

        SnesSnapshot {
            buttons,
            signature: (self.data >> SIGNATURE_SHIFT) as u8,
            keypad,
            keypad_present,
            connected: self.data != 0 || keypad_present,
            player,
        }
    }
}

pub struct SnesLines<L> {
    pub latch: L,
    pub clock: L,
    pub data: L,
    pub d2: L,
    pub d3: L,
}

pub struct SnesController<L, D> {
    bus: ShiftRegisterBus<L, D>,
    data: L,
    d2: L,
    d3: L,
    player: u8,
    snapshot: SnesSnapshot,
}

impl<L: Line, D: Delay> SnesController<L, D> {
    pub fn new(lines: SnesLines<L>, delay: D) -> Self {
        Self {
            bus: ShiftRegisterBus::new(lines.latch, lines.clock, delay),
            data: lines.data,
            d2: lines.d2,
            d3: lines.d3,
            player: MIN_PLAYER,
            snapshot: SnesSnapshot::default(),
        }
    }

    /// Select the multitap slot reported in snapshots. Values outside 1..=4
    /// are ignored.
    pub fn set_player_number(&mut self, player: u8) {
        if !(MIN_PLAYER..=MAX_PLAYER).contains(&player) {
            log(LogCategory::Shift, LogLevel::Warn, || {
                format!("snes: ignoring player number {}", player)
            });
            return;
        }
        self.player = player;
        self.snapshot.player = player;
    }

    pub fn player_number(&self) -> u8 {
        self.player
    }

    pub fn read_raw(&mut self) -> RawSample {
        let Self {
            bus, data, d2, d3, ..
        } = self;
        let mut raw = RawSample::default();

        bus.latch();
        bus.clock_bits(0..STANDARD_BITS, |bit| {
            if data.is_low() {
                raw.data |= 1 << bit;
            }
        });
        raw.clocks = STANDARD_BITS;

        if raw.keypad_indicated() {
            let end = STANDARD_BITS + ntt_keypad::EXTENSION_BITS;
            bus.clock_bits(STANDARD_BITS..end, |bit| {
                let ext = bit - STANDARD_BITS;
                if d2.is_low() {
                    raw.d2 |= 1 << ext;
                }
                if d3.is_low() {
                    raw.d3 |= 1 << ext;
                }
            });
            raw.clocks = end;
        }
        raw
    }
}

impl<L: Line, D: Delay> Driver for SnesController<L, D> {
    type Snapshot = SnesSnapshot;

    fn initialize(&mut self) {
        self.bus.initialize();
        configure_data_line(&mut self.data);
        configure_data_line(&mut self.d2);
        configure_data_line(&mut self.d3);
        self.reset();
    }

    fn poll(&mut self) -> SnesSnapshot {
        let raw = self.read_raw();
        let snapshot = raw.decode(self.player);

        log(LogCategory::Shift, LogLevel::Trace, || {
            format!(
                "snes: data={:04X} d2={:04X} d3={:04X} clocks={}",
                raw.data, raw.d2, raw.d3, raw.clocks
            )
        });
        if snapshot.connected != self.snapshot.connected {
            log(LogCategory::Shift, LogLevel::Info, || {
                format!(
                    "snes: pad {} (player {})",
                    if snapshot.connected {
                        "connected"
                    } else {
                        "disconnected"
                    },
                    self.player
                )
            });
        }
        if snapshot.keypad_present != self.snapshot.keypad_present {
            log(LogCategory::Shift, LogLevel::Debug, || {
                format!("snes: keypad present={}", snapshot.keypad_present)
            });
        }

        self.snapshot = snapshot;
        snapshot
    }

    fn current_snapshot(&self) -> SnesSnapshot {
        self.snapshot
    }

    /// Clears the snapshot; the player number survives.
    fn reset(&mut self) {
        self.snapshot = SnesSnapshot {
            player: self.player,
            ..SnesSnapshot::default()
        };
    }
}
