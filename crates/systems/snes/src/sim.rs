//! Simulated SNES pad and NTT Data Keypad for [`pad_core::sim::SimBoard`].

use crate::ntt_keypad::{NttKeys, EXTENSION_BITS, INDICATOR_BIT};
use crate::{SnesButtons, SnesLines, BUTTON_MAP, STANDARD_BITS};
use pad_core::line::Level;
use pad_core::sim::{LineId, Peer, ShiftRegisterPeer, SimBoard, SimLine};

/// Wire assignment of one SNES port. The default shares latch and clock
/// with the default NES port and uses lines 5..8 for data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnesPins {
    pub latch: LineId,
    pub clock: LineId,
    pub data: LineId,
    pub d2: LineId,
    pub d3: LineId,
}

impl SnesPins {
    pub const LINES: usize = 8;

    pub fn lines(&self, board: &SimBoard) -> SnesLines<SimLine> {
        SnesLines {
            latch: board.line(self.latch),
            clock: board.line(self.clock),
            data: board.line(self.data),
            d2: board.line(self.d2),
            d3: board.line(self.d3),
        }
    }
}

impl Default for SnesPins {
    fn default() -> Self {
        Self {
            latch: 0,
            clock: 1,
            data: 5,
            d2: 6,
            d3: 7,
        }
    }
}

/// A standard pad, or a keypad when [`with_keypad`](Self::with_keypad) is
/// used. The keypad keeps its indicator bit low and shifts keys out on D2
/// after the standard 16 bits.
pub struct SnesPad {
    pins: SnesPins,
    buttons: SnesButtons,
    keypad: Option<NttKeys>,
    d3_noise: u16,
    register: ShiftRegisterPeer,
}

impl SnesPad {
    pub fn new(pins: SnesPins) -> Self {
        let register = ShiftRegisterPeer::new(pins.latch, pins.clock)
            .with_output(pins.data, 0)
            .with_output(pins.d2, 0)
            .with_output(pins.d3, 0);
        Self {
            pins,
            buttons: SnesButtons::empty(),
            keypad: None,
            d3_noise: 0,
            register,
        }
    }

    pub fn with_buttons(mut self, buttons: SnesButtons) -> Self {
        self.set_buttons(buttons);
        self
    }

    pub fn with_keypad(mut self, keys: NttKeys) -> Self {
        self.set_keypad(Some(keys));
        self
    }

    pub fn set_buttons(&mut self, buttons: SnesButtons) {
        self.buttons = buttons;
        self.refresh();
    }

    /// `None` turns the unit back into a standard pad.
    pub fn set_keypad(&mut self, keys: Option<NttKeys>) {
        self.keypad = keys;
        self.refresh();
    }

    /// Extension bits pulled low on D3.
    pub fn set_d3_noise(&mut self, bits: u16) {
        self.d3_noise = bits;
        self.refresh();
    }

    pub fn clocks_since_latch(&self) -> u32 {
        self.register.clocks_since_latch()
    }

    fn refresh(&mut self) {
        let mut data = BUTTON_MAP
            .iter()
            .enumerate()
            .filter(|(_, b)| self.buttons.contains(**b))
            .fold(0u32, |acc, (bit, _)| acc | 1 << bit);
        let mut d2 = 0u32;
        let mut d3 = 0u32;
        if let Some(keys) = self.keypad {
            data |= 1 << INDICATOR_BIT;
            d2 = (keys.bits() as u32) << STANDARD_BITS;
            d3 = (self.d3_noise as u32) << STANDARD_BITS;
        }
        debug_assert!(STANDARD_BITS + EXTENSION_BITS <= 32);
        self.register.set_pattern(self.pins.data, data);
        self.register.set_pattern(self.pins.d2, d2);
        self.register.set_pattern(self.pins.d3, d3);
    }
}

impl Peer for SnesPad {
    fn host_drive(&mut self, line: LineId, level: Level, now_ns: u64) {
        self.register.host_drive(line, level, now_ns);
    }

    fn peer_drive(&mut self, line: LineId, now_ns: u64) -> Option<Level> {
        self.register.peer_drive(line, now_ns)
    }
}
