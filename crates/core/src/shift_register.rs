//! Latch/clock engine shared by the 8-bit and 16-bit shift-register pads.
//!
//! Both consoles use the same shape: this side drives a latch and a clock
//! line, the pad drives one or more active-low data lines.
//!
//! ```text
//! latch  __|‾‾‾‾‾‾‾‾‾‾‾‾|_______________________________________
//!            12us         4.5us
//! clock  ______________________|‾‾‾‾‾‾|______|‾‾‾‾‾‾|______ ...
//!                        ^sample  6us   4.5us ^sample
//! ```
//!
//! A latch pulse makes the pad copy its buttons into an internal shift
//! register; each clock pulse shifts the next bit onto the data lines. Data is
//! sampled *before* every clock pulse, so bit 0 is read right after the latch
//! settle period.
//!
//! Bit counts are fixed by the protocol, so a transaction always completes
//! in bounded time. There is no timeout and no error path: a missing pad just
//! leaves the pulled-up data lines high.

use crate::line::{Direction, Level, Line, Pull};
use crate::timing::{Delay, TimeUnit};

/// Latch high time (~12us).
pub const LATCH_PULSE: TimeUnit = TimeUnit::Cycles(192);
/// Latch low settle time before the first sample (~4.5us).
pub const LATCH_SETTLE: TimeUnit = TimeUnit::Cycles(72);
/// Clock high time (~6us).
pub const CLOCK_HIGH: TimeUnit = TimeUnit::Cycles(96);
/// Clock low time (~4.5us).
pub const CLOCK_LOW: TimeUnit = TimeUnit::Cycles(72);

/// Owns the latch and clock lines of one shift-register port.
///
/// Two ports may be wired to the same physical latch/clock pins; each driver
/// then holds its own handle to them and the poll loop runs the transactions
/// back to back.
pub struct ShiftRegisterBus<L, D> {
    latch: L,
    clock: L,
    delay: D,
}

impl<L: Line, D: Delay> ShiftRegisterBus<L, D> {
    pub fn new(latch: L, clock: L, delay: D) -> Self {
        Self {
            latch,
            clock,
            delay,
        }
    }

    /// Latch and clock become outputs, both idle low.
    pub fn initialize(&mut self) {
        self.latch.configure(Direction::Output, Pull::None);
        self.clock.configure(Direction::Output, Pull::None);
        self.latch.set(Level::Low);
        self.clock.set(Level::Low);
    }

    /// Pulse the latch so the pad snapshots its buttons.
    pub fn latch(&mut self) {
        self.latch.set_high();
        self.delay.delay(LATCH_PULSE);
        self.latch.set_low();
        self.delay.delay(LATCH_SETTLE);
    }

    /// Pulse the clock once, shifting the pad's register by one bit.
    pub fn clock(&mut self) {
        self.clock.set_high();
        self.delay.delay(CLOCK_HIGH);
        self.clock.set_low();
        self.delay.delay(CLOCK_LOW);
    }

    /// For every bit index in `bits`: call `sample(bit)`, then pulse the clock.
    pub fn clock_bits(&mut self, bits: std::ops::Range<u8>, mut sample: impl FnMut(u8)) {
        for bit in bits {
            sample(bit);
            self.clock();
        }
    }
}

/// Configure a pad data line: input with the internal pull-up enabled.
pub fn configure_data_line<L: Line>(line: &mut L) {
    line.configure(Direction::Input, Pull::Up);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBoard;

    const LATCH: usize = 0;
    const CLOCK: usize = 1;

    fn bus(board: &SimBoard) -> ShiftRegisterBus<crate::sim::SimLine, crate::sim::SimDelay> {
        let mut bus = ShiftRegisterBus::new(board.line(LATCH), board.line(CLOCK), board.delay());
        bus.initialize();
        bus
    }

    #[test]
    fn test_latch_pulse_width() {
        let board = SimBoard::new(2);
        let mut bus = bus(&board);
        board.clear_trace();

        bus.latch();

        let edges = board.edges_on(LATCH);
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].level, Level::High);
        assert_eq!(edges[1].level, Level::Low);
        assert_eq!(edges[1].at_ns - edges[0].at_ns, 12_000);
        assert_eq!(board.now_ns() - edges[1].at_ns, 4_500);
    }

    #[test]
    fn test_clock_bits_samples_before_each_pulse() {
        let board = SimBoard::new(2);
        let mut bus = bus(&board);
        board.clear_trace();

        let probe = board.clone();
        let mut rising_before_sample = Vec::new();
        bus.clock_bits(0..8, |_| {
            rising_before_sample.push(
                probe
                    .edges_on(CLOCK)
                    .iter()
                    .filter(|e| e.level == Level::High)
                    .count(),
            );
        });

        assert_eq!(rising_before_sample, vec![0, 1, 2, 3, 4, 5, 6, 7]);
        let highs: Vec<_> = board
            .edges_on(CLOCK)
            .into_iter()
            .filter(|e| e.level == Level::High)
            .collect();
        assert_eq!(highs.len(), 8);
        // 6us high + 4.5us low per bit
        assert_eq!(highs[1].at_ns - highs[0].at_ns, 10_500);
    }
}
