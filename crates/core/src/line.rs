//! Single-bit digital lines.
//!
//! Every bus driver talks to the hardware exclusively through [`Line`]. A
//! line is owned by the driver that issues timing on it; the peer on the
//! other end of the cable only ever observes it.
//!
//! All controller buses handled here are **active-low**: a pressed button (or
//! a peer pulling a shared wire) reads as [`Level::Low`], and an idle,
//! pulled-up wire reads as [`Level::High`].

use serde::{Deserialize, Serialize};

/// Logic level of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    Low,
    High,
}

impl Level {
    #[inline]
    pub fn is_low(self) -> bool {
        self == Level::Low
    }

    #[inline]
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl From<bool> for Level {
    /// `true` is [`Level::High`].
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Electrical direction of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Sampled only.
    Input,
    /// Push-pull output.
    Output,
    /// Driven low or released; a released line floats to its pull level.
    /// Used by the single-wire half-duplex bus.
    OpenDrain,
}

/// Pull configuration of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pull {
    None,
    Up,
}

/// A single digital I/O line.
///
/// Implementations target a concrete platform (a GPIO port bit, or the
/// simulated board in [`crate::sim`]). Calls must be cheap and must not
/// block: drivers rely on the cost of `set`/`read` being negligible next to
/// their explicit [`crate::timing::Delay`] calls.
pub trait Line {
    /// Configure direction and pull. Called from a driver's `initialize()`.
    fn configure(&mut self, direction: Direction, pull: Pull);

    /// Drive the line. On an [`Direction::OpenDrain`] line `High` releases it.
    fn set(&mut self, level: Level);

    /// Sample the current level of the wire.
    fn read(&self) -> Level;

    #[inline]
    fn set_high(&mut self) {
        self.set(Level::High);
    }

    #[inline]
    fn set_low(&mut self) {
        self.set(Level::Low);
    }

    /// `true` when the wire is pulled low, i.e. a button is pressed on an
    /// active-low bus.
    #[inline]
    fn is_low(&self) -> bool {
        self.read().is_low()
    }
}
