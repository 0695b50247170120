//! Blocking delays.
//!
//! Bus timing constants throughout the workspace are written in CPU cycles of
//! the reference board (an ATmega32U4 at 16 MHz, 62.5 ns per cycle), which is
//! the unit the protocol margins were measured in. A [`TimeUnit`] is only ever
//! passed to [`Delay::delay`]; it is never stored in driver state.
//!
//! # Non-preemption
//!
//! `delay` is a busy wait with no yield point. Drivers depend on this: the
//! shift-register buses tolerate some jitter, but the half-duplex bus has a
//! bit window of a few microseconds and no framing to recover from a
//! stretched pulse (see [`crate::critical`]).

use std::time::{Duration, Instant};

/// Clock of the reference board, in Hz.
pub const DEFAULT_CLOCK_HZ: u32 = 16_000_000;

/// A duration expressed either in device cycles or in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Cycles(u32),
    Nanos(u32),
}

impl TimeUnit {
    pub const fn micros(us: u32) -> Self {
        TimeUnit::Nanos(us * 1_000)
    }

    /// Length of this span in nanoseconds on a board clocked at `clock_hz`.
    pub fn as_nanos(self, clock_hz: u32) -> u64 {
        match self {
            TimeUnit::Cycles(cycles) => cycles as u64 * 1_000_000_000 / clock_hz as u64,
            TimeUnit::Nanos(ns) => ns as u64,
        }
    }

    /// Length of this span in cycles on a board clocked at `clock_hz`,
    /// rounded up so that a delay never comes out shorter than requested.
    pub fn as_cycles(self, clock_hz: u32) -> u64 {
        match self {
            TimeUnit::Cycles(cycles) => cycles as u64,
            TimeUnit::Nanos(ns) => (ns as u64 * clock_hz as u64).div_ceil(1_000_000_000),
        }
    }
}

/// Busy-wait delay primitive.
pub trait Delay {
    fn delay(&mut self, span: TimeUnit);
}

impl<D: Delay + ?Sized> Delay for &mut D {
    fn delay(&mut self, span: TimeUnit) {
        (**self).delay(span)
    }
}

/// Spin delay for hosted targets.
///
/// Spins on [`Instant`] with [`std::hint::spin_loop`]; it never sleeps, so
/// accuracy is bounded by the resolution of the monotonic clock rather than
/// by the scheduler tick.
#[derive(Debug, Clone, Copy)]
pub struct SpinDelay {
    clock_hz: u32,
}

impl SpinDelay {
    /// # Panics
    ///
    /// Panics if `clock_hz` is zero.
    pub fn new(clock_hz: u32) -> Self {
        assert!(clock_hz > 0, "delay clock must be non-zero");
        Self { clock_hz }
    }

    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }
}

impl Default for SpinDelay {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK_HZ)
    }
}

impl Delay for SpinDelay {
    fn delay(&mut self, span: TimeUnit) {
        let target = Duration::from_nanos(span.as_nanos(self.clock_hz));
        let start = Instant::now();
        while start.elapsed() < target {
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycles_to_nanos_at_16mhz() {
        assert_eq!(TimeUnit::Cycles(16).as_nanos(DEFAULT_CLOCK_HZ), 1_000);
        assert_eq!(TimeUnit::Cycles(192).as_nanos(DEFAULT_CLOCK_HZ), 12_000);
        assert_eq!(TimeUnit::Cycles(72).as_nanos(DEFAULT_CLOCK_HZ), 4_500);
    }

    #[test]
    fn test_nanos_round_up_to_cycles() {
        assert_eq!(TimeUnit::Nanos(1_000).as_cycles(DEFAULT_CLOCK_HZ), 16);
        // 100ns is 1.6 cycles, never round a delay down
        assert_eq!(TimeUnit::Nanos(100).as_cycles(DEFAULT_CLOCK_HZ), 2);
        assert_eq!(TimeUnit::micros(10), TimeUnit::Nanos(10_000));
    }

    #[test]
    fn test_spin_delay_waits_at_least_requested() {
        let mut d = SpinDelay::default();
        let start = Instant::now();
        d.delay(TimeUnit::micros(200));
        assert!(start.elapsed() >= Duration::from_micros(200));
    }

    #[test]
    #[should_panic(expected = "delay clock must be non-zero")]
    fn test_zero_clock_delay_is_refused() {
        SpinDelay::new(0);
    }
}
