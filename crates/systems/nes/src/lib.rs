//! 8-bit shift-register pad driver with Power Pad support.
//!
//! One poll latches the pad and clocks 8 bits. On every bit the primary data
//! line and both Power Pad lines (D3, D4) are sampled together, so the mat
//! costs no extra bus time.

pub mod power_pad;
pub mod sim;

use bitflags::bitflags;
use pad_core::line::Line;
use pad_core::logging::{log, LogCategory, LogLevel};
use pad_core::shift_register::{configure_data_line, ShiftRegisterBus};
use pad_core::timing::Delay;
use pad_core::{Driver, Snapshot};
use serde::{Deserialize, Serialize};

pub use power_pad::PowerPadButtons;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct NesButtons: u8 {
        const A = 0x01;
        const B = 0x02;
        const SELECT = 0x04;
        const START = 0x08;
        const UP = 0x10;
        const DOWN = 0x20;
        const LEFT = 0x40;
        const RIGHT = 0x80;
    }
}

/// Number of bits the pad shifts out.
pub const STANDARD_BITS: u8 = 8;

/// Bit index on the data line to button.
pub const BUTTON_MAP: [NesButtons; STANDARD_BITS as usize] = [
    NesButtons::A,
    NesButtons::B,
    NesButtons::SELECT,
    NesButtons::START,
    NesButtons::UP,
    NesButtons::DOWN,
    NesButtons::LEFT,
    NesButtons::RIGHT,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NesSnapshot {
    pub buttons: NesButtons,
    /// Only meaningful when `power_pad_present`.
    pub power_pad: PowerPadButtons,
    pub power_pad_present: bool,
    pub connected: bool,
}

impl Default for NesSnapshot {
    fn default() -> Self {
        Self {
            buttons: NesButtons::empty(),
            power_pad: PowerPadButtons::empty(),
            power_pad_present: false,
            connected: false,
        }
    }
}

impl Snapshot for NesSnapshot {
    fn connected(&self) -> bool {
        self.connected
    }

    fn accessory_present(&self) -> bool {
        self.power_pad_present
    }
}

/// Low-bit masks sampled during one transaction (bit `i` set = line low on
/// bit `i`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub data: u8,
    pub d3: u8,
    pub d4: u8,
}

impl RawSample {
    /// Map the sampled bits through the button tables.
    pub fn decode(self) -> NesSnapshot {
        let buttons = BUTTON_MAP
            .iter()
            .enumerate()
            .filter(|(bit, _)| self.data & (1 << bit) != 0)
            .fold(NesButtons::empty(), |acc, (_, b)| acc | *b);

        // Any mat bit at all counts as a mat; there is no indicator bit.
        let power_pad = power_pad::decode(self.d3, self.d4);
        let power_pad_present = !power_pad.is_empty();

        NesSnapshot {
            buttons,
            power_pad,
            power_pad_present,
            // an idle pulled-up data line reads all high, i.e. nothing low
            connected: self.data != 0 || power_pad_present,
        }
    }
}

/// Lines owned by one NES port.
pub struct NesLines<L> {
    pub latch: L,
    pub clock: L,
    pub data: L,
    pub d3: L,
    pub d4: L,
}

pub struct NesController<L, D> {
    bus: ShiftRegisterBus<L, D>,
    data: L,
    d3: L,
    d4: L,
    snapshot: NesSnapshot,
}

impl<L: Line, D: Delay> NesController<L, D> {
    pub fn new(lines: NesLines<L>, delay: D) -> Self {
        Self {
            bus: ShiftRegisterBus::new(lines.latch, lines.clock, delay),
            data: lines.data,
            d3: lines.d3,
            d4: lines.d4,
            snapshot: NesSnapshot::default(),
        }
    }

    /// Run the latch and 8 clocks, returning what was sampled.
    pub fn read_raw(&mut self) -> RawSample {
        let Self {
            bus, data, d3, d4, ..
        } = self;
        let mut raw = RawSample::default();

        bus.latch();
        bus.clock_bits(0..STANDARD_BITS, |bit| {
            if data.is_low() {
                raw.data |= 1 << bit;
            }
            if d3.is_low() {
                raw.d3 |= 1 << bit;
            }
            if d4.is_low() {
                raw.d4 |= 1 << bit;
            }
        });
        raw
    }
}

impl<L: Line, D: Delay> Driver for NesController<L, D> {
    type Snapshot = NesSnapshot;

    fn initialize(&mut self) {
        self.bus.initialize();
        configure_data_line(&mut self.data);
        configure_data_line(&mut self.d3);
        configure_data_line(&mut self.d4);
        self.snapshot = NesSnapshot::default();
    }

    fn poll(&mut self) -> NesSnapshot {
        let raw = self.read_raw();
        let snapshot = raw.decode();

        log(LogCategory::Shift, LogLevel::Trace, || {
            format!(
                "nes: data={:02X} d3={:02X} d4={:02X}",
                raw.data, raw.d3, raw.d4
            )
        });
        if snapshot.connected != self.snapshot.connected {
            log(LogCategory::Shift, LogLevel::Info, || {
                format!(
                    "nes: pad {}",
                    if snapshot.connected {
                        "connected"
                    } else {
                        "disconnected"
                    }
                )
            });
        }
        if snapshot.power_pad_present && !self.snapshot.power_pad_present {
            log(LogCategory::Shift, LogLevel::Debug, || {
                format!("nes: power pad activity {:?}", snapshot.power_pad)
            });
        }

        self.snapshot = snapshot;
        snapshot
    }

    fn current_snapshot(&self) -> NesSnapshot {
        self.snapshot
    }

    fn reset(&mut self) {
        self.snapshot = NesSnapshot::default();
    }
}
