//! Simulated DB9 pads for [`pad_core::sim::SimBoard`].
//!
//! The six-button model counts select rising edges modulo 4 and drops the
//! count back to zero after 1.5 ms without one, the same way the pad's
//! internal counter behaves on hardware.

use crate::{GenesisButtons, GenesisLines};
use pad_core::line::Level;
use pad_core::sim::{LineId, Peer, SimBoard, SimLine};

/// Idle time after which a six-button pad forgets its select count.
pub const COUNTER_RESET_NS: u64 = 1_500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenesisPins {
    pub select: LineId,
    pub data: [LineId; 4],
    pub tl: LineId,
    pub tr: LineId,
    pub power: LineId,
}

impl GenesisPins {
    pub const LINES: usize = 8;

    pub fn lines(&self, board: &SimBoard) -> GenesisLines<SimLine> {
        GenesisLines {
            select: board.line(self.select),
            data: self.data.map(|id| board.line(id)),
            tl: board.line(self.tl),
            tr: board.line(self.tr),
            power: board.line(self.power),
        }
    }
}

impl Default for GenesisPins {
    fn default() -> Self {
        Self {
            select: 0,
            data: [1, 2, 3, 4],
            tl: 5,
            tr: 6,
            power: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadModel {
    /// Ignores select; button 1 on TL, button 2 on TR.
    MasterSystem,
    ThreeButton,
    SixButton,
    /// Six-button pad that also reports Home on D0 in the last low phase.
    EightBitDo,
}

pub struct GenesisPad {
    pins: GenesisPins,
    model: PadModel,
    buttons: GenesisButtons,
    /// Buttons per cycle of a burst; the last entry repeats.
    script: Vec<GenesisButtons>,
    select_high: bool,
    counter: u8,
    rises: u32,
    last_rise_ns: Option<u64>,
    connected: bool,
}

impl GenesisPad {
    pub fn new(pins: GenesisPins, model: PadModel) -> Self {
        Self {
            pins,
            model,
            buttons: GenesisButtons::empty(),
            script: Vec::new(),
            select_high: true,
            counter: 0,
            rises: 0,
            last_rise_ns: None,
            connected: true,
        }
    }

    pub fn with_buttons(mut self, buttons: GenesisButtons) -> Self {
        self.buttons = buttons;
        self
    }

    /// Change the held buttons from one read cycle to the next. Cycles are
    /// counted from the first select edge after an idle gap.
    pub fn with_script(mut self, script: Vec<GenesisButtons>) -> Self {
        self.script = script;
        self
    }

    pub fn set_buttons(&mut self, buttons: GenesisButtons) {
        self.buttons = buttons;
        self.script.clear();
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    fn expire(&mut self, now_ns: u64) {
        if let Some(last) = self.last_rise_ns {
            if now_ns.saturating_sub(last) > COUNTER_RESET_NS {
                self.counter = 0;
                self.rises = 0;
                self.last_rise_ns = None;
            }
        }
    }

    fn held(&self) -> GenesisButtons {
        if self.script.is_empty() {
            return self.buttons;
        }
        let cycle = (self.rises / 4) as usize;
        self.script[cycle.min(self.script.len() - 1)]
    }

    fn counts_edges(&self) -> bool {
        matches!(self.model, PadModel::SixButton | PadModel::EightBitDo)
    }

    /// Levels of (D0, D1, D2, D3, TL, TR) as "pulled low" flags.
    fn outputs(&self) -> [bool; 6] {
        let b = self.held();
        let dirs = [
            b.contains(GenesisButtons::UP),
            b.contains(GenesisButtons::DOWN),
            b.contains(GenesisButtons::LEFT),
            b.contains(GenesisButtons::RIGHT),
        ];
        let high_fire = [b.contains(GenesisButtons::B), b.contains(GenesisButtons::C)];
        let low_fire = [b.contains(GenesisButtons::A), b.contains(GenesisButtons::START)];

        if self.model == PadModel::MasterSystem {
            return [dirs[0], dirs[1], dirs[2], dirs[3], high_fire[0], high_fire[1]];
        }

        let count = if self.counts_edges() { self.counter } else { 0 };
        match (count, self.select_high) {
            (3, true) => [
                b.contains(GenesisButtons::Z),
                b.contains(GenesisButtons::Y),
                b.contains(GenesisButtons::X),
                b.contains(GenesisButtons::MODE),
                high_fire[0],
                high_fire[1],
            ],
            (_, true) => [dirs[0], dirs[1], dirs[2], dirs[3], high_fire[0], high_fire[1]],
            (2, false) => [true, true, true, true, low_fire[0], low_fire[1]],
            (3, false) => [
                self.model == PadModel::EightBitDo && b.contains(GenesisButtons::HOME),
                false,
                false,
                false,
                low_fire[0],
                low_fire[1],
            ],
            (_, false) => [dirs[0], dirs[1], true, true, low_fire[0], low_fire[1]],
        }
    }
}

impl Peer for GenesisPad {
    fn host_drive(&mut self, line: LineId, level: Level, now_ns: u64) {
        if line != self.pins.select {
            return;
        }
        self.expire(now_ns);
        let high = level.is_high();
        if high && !self.select_high {
            self.rises += 1;
            self.counter = (self.counter + 1) % 4;
            self.last_rise_ns = Some(now_ns);
        }
        self.select_high = high;
    }

    fn peer_drive(&mut self, line: LineId, now_ns: u64) -> Option<Level> {
        if !self.connected {
            return None;
        }
        self.expire(now_ns);
        let p = &self.pins;
        let idx = if let Some(i) = p.data.iter().position(|&d| d == line) {
            i
        } else if line == p.tl {
            4
        } else if line == p.tr {
            5
        } else {
            return None;
        };
        self.outputs()[idx].then_some(Level::Low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_resets_after_idle_gap() {
        let pins = GenesisPins::default();
        let mut pad = GenesisPad::new(pins, PadModel::SixButton);
        pad.host_drive(pins.select, Level::Low, 0);
        pad.host_drive(pins.select, Level::High, 10_000);
        pad.host_drive(pins.select, Level::Low, 20_000);
        pad.host_drive(pins.select, Level::High, 30_000);
        assert_eq!(pad.counter, 2);

        pad.host_drive(pins.select, Level::Low, 30_000 + COUNTER_RESET_NS + 1);
        assert_eq!(pad.counter, 0);
        assert_eq!(pad.rises, 0);
    }

    #[test]
    fn test_counter_kept_up_to_reset_time() {
        let pins = GenesisPins::default();
        let mut pad = GenesisPad::new(pins, PadModel::SixButton);
        pad.host_drive(pins.select, Level::Low, 0);
        pad.host_drive(pins.select, Level::High, 10_000);
        assert_eq!(pad.counter, 1);

        pad.host_drive(pins.select, Level::Low, 10_000 + COUNTER_RESET_NS);
        assert_eq!(pad.counter, 1);
        pad.host_drive(pins.select, Level::High, 10_000 + COUNTER_RESET_NS + 10_000);
        assert_eq!(pad.counter, 2);
        assert_eq!(pad.rises, 2);
    }

    #[test]
    fn test_three_button_low_phase_identifies() {
        let pins = GenesisPins::default();
        let mut pad = GenesisPad::new(pins, PadModel::ThreeButton);
        pad.host_drive(pins.select, Level::Low, 0);
        assert_eq!(pad.peer_drive(pins.data[2], 0), Some(Level::Low));
        assert_eq!(pad.peer_drive(pins.data[3], 0), Some(Level::Low));
        assert_eq!(pad.peer_drive(pins.data[0], 0), None);
        assert_eq!(pad.peer_drive(pins.power, 0), None);
    }
}
