//! Simulated NES pad and Power Pad for [`pad_core::sim::SimBoard`].

use crate::power_pad::{self, PowerPadButtons};
use crate::{NesButtons, NesLines, BUTTON_MAP};
use pad_core::line::Level;
use pad_core::sim::{LineId, Peer, ShiftRegisterPeer, SimBoard, SimLine};

/// Wire assignment of one NES port on a simulated board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NesPins {
    pub latch: LineId,
    pub clock: LineId,
    pub data: LineId,
    pub d3: LineId,
    pub d4: LineId,
}

impl NesPins {
    /// Board size needed for the default assignment. Lines 5..8 are left
    /// for the SNES port sharing latch and clock.
    pub const LINES: usize = 8;

    pub fn lines(&self, board: &SimBoard) -> NesLines<SimLine> {
        NesLines {
            latch: board.line(self.latch),
            clock: board.line(self.clock),
            data: board.line(self.data),
            d3: board.line(self.d3),
            d4: board.line(self.d4),
        }
    }
}

impl Default for NesPins {
    fn default() -> Self {
        Self {
            latch: 0,
            clock: 1,
            data: 2,
            d3: 3,
            d4: 4,
        }
    }
}

/// A 4021-style pad, optionally with a Power Pad on D3/D4.
pub struct NesPad {
    pins: NesPins,
    register: ShiftRegisterPeer,
}

impl NesPad {
    pub fn new(pins: NesPins) -> Self {
        let register = ShiftRegisterPeer::new(pins.latch, pins.clock)
            .with_output(pins.data, 0)
            .with_output(pins.d3, 0)
            .with_output(pins.d4, 0);
        Self { pins, register }
    }

    pub fn with_buttons(mut self, buttons: NesButtons) -> Self {
        self.set_buttons(buttons);
        self
    }

    pub fn with_power_pad(mut self, pressed: PowerPadButtons) -> Self {
        self.set_power_pad(pressed);
        self
    }

    pub fn set_buttons(&mut self, buttons: NesButtons) {
        let pattern = BUTTON_MAP
            .iter()
            .enumerate()
            .filter(|(_, b)| buttons.contains(**b))
            .fold(0u32, |acc, (bit, _)| acc | 1 << bit);
        self.register.set_pattern(self.pins.data, pattern);
    }

    pub fn set_power_pad(&mut self, pressed: PowerPadButtons) {
        let (d3, d4) = power_pad::encode(pressed);
        self.register.set_pattern(self.pins.d3, d3 as u32);
        self.register.set_pattern(self.pins.d4, d4 as u32);
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.register.set_connected(connected);
    }

    pub fn latch_count(&self) -> u32 {
        self.register.latch_count()
    }

    pub fn clocks_since_latch(&self) -> u32 {
        self.register.clocks_since_latch()
    }
}

impl Peer for NesPad {
    fn host_drive(&mut self, line: LineId, level: Level, now_ns: u64) {
        self.register.host_drive(line, level, now_ns);
    }

    fn peer_drive(&mut self, line: LineId, now_ns: u64) -> Option<Level> {
        self.register.peer_drive(line, now_ns)
    }
}
