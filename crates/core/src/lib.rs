//! Core primitives and traits shared by every controller bus driver.
//!
//! Drivers are written against three small hardware contracts:
//!
//! - [`line::Line`]: one digital wire (configure, set, read)
//! - [`timing::Delay`]: busy-wait for a [`timing::TimeUnit`]
//! - [`critical::InterruptControl`]: mask interrupts around a bit-exact
//!   exchange
//!
//! and expose the uniform [`Driver`] interface to the poll loop. The
//! [`sim`] module implements all three contracts on a virtual clock.

pub mod critical;
pub mod line;
pub mod logging;
pub mod shift_register;
pub mod sim;
pub mod timing;

/// Decoded state of one pad, produced by one poll.
pub trait Snapshot {
    /// Something answered on the bus during the poll that produced this
    /// snapshot.
    fn connected(&self) -> bool;

    /// The bus-specific accessory (Power Pad, keypad, six-button pad, rumble
    /// pak) was detected. Accessory payloads are empty when this is false.
    fn accessory_present(&self) -> bool;
}

/// A controller bus driver.
///
/// Lifecycle: construct, [`initialize`](Driver::initialize) once, then
/// [`poll`](Driver::poll) once per scheduler cycle. A poll is a complete,
/// self-contained bus transaction; it never fails, a missing pad just yields
/// a disconnected snapshot.
pub trait Driver {
    type Snapshot: Snapshot + Copy;

    /// Configure line directions and idle levels.
    fn initialize(&mut self);

    /// Run one full bus transaction and return the fresh snapshot.
    fn poll(&mut self) -> Self::Snapshot;

    /// Snapshot from the most recent poll.
    fn current_snapshot(&self) -> Self::Snapshot;

    fn is_connected(&self) -> bool {
        self.current_snapshot().connected()
    }

    fn is_accessory_present(&self) -> bool {
        self.current_snapshot().accessory_present()
    }

    /// Clear the snapshot back to disconnected. Safe to call repeatedly.
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, Copy, PartialEq)]
    struct MockSnapshot {
        value: u8,
        connected: bool,
    }

    impl Snapshot for MockSnapshot {
        fn connected(&self) -> bool {
            self.connected
        }

        fn accessory_present(&self) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct MockDriver {
        polls: u8,
        initialized: bool,
        snapshot: MockSnapshot,
    }

    impl Driver for MockDriver {
        type Snapshot = MockSnapshot;

        fn initialize(&mut self) {
            self.initialized = true;
        }

        fn poll(&mut self) -> MockSnapshot {
            self.polls += 1;
            self.snapshot = MockSnapshot {
                value: self.polls,
                connected: true,
            };
            self.snapshot
        }

        fn current_snapshot(&self) -> MockSnapshot {
            self.snapshot
        }

        fn reset(&mut self) {
            self.snapshot = MockSnapshot::default();
        }
    }

    #[test]
    fn test_default_flags_follow_current_snapshot() {
        let mut d = MockDriver::default();
        d.initialize();
        assert!(d.initialized);
        assert!(!d.is_connected());

        let s = d.poll();
        assert_eq!(s, d.current_snapshot());
        assert!(d.is_connected());
        assert!(!d.is_accessory_present());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut d = MockDriver::default();
        d.poll();
        d.reset();
        let once = d.current_snapshot();
        d.reset();
        assert_eq!(once, d.current_snapshot());
        assert!(!d.is_connected());
    }
}
