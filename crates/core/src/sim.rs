//! Simulated board for hosted builds and tests.
//!
//! [`SimBoard`] implements the [`Line`], [`Delay`] and [`InterruptControl`]
//! contracts on a virtual clock, so the real drivers can run bit-for-bit
//! against modelled pads with no hardware attached.
//!
//! # Model
//!
//! - Time only moves when a driver calls [`Delay::delay`] (or a test calls
//!   [`SimBoard::advance`]). Line reads and writes are instantaneous.
//! - Every wire is wired-AND: it reads low if the host drives it low or any
//!   attached [`Peer`] pulls it low, and high otherwise. All bus wires on the
//!   reference board have pull-ups, so an undriven wire reads high.
//! - Host level changes are delivered to every peer and recorded in an edge
//!   trace together with the interrupt mask state at that instant.

use crate::critical::InterruptControl;
use crate::line::{Direction, Level, Line, Pull};
use crate::logging::{log, LogCategory, LogLevel};
use crate::timing::{Delay, TimeUnit, DEFAULT_CLOCK_HZ};
use std::cell::RefCell;
use std::rc::Rc;

/// Index of a wire on a [`SimBoard`].
pub type LineId = usize;

/// A host-driven level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub line: LineId,
    pub level: Level,
    pub at_ns: u64,
    pub interrupts_enabled: bool,
}

/// A modelled device on the far end of the cable.
pub trait Peer {
    /// The host changed the level it drives on `line`.
    fn host_drive(&mut self, line: LineId, level: Level, now_ns: u64) {
        let _ = (line, level, now_ns);
    }

    /// What this peer drives on `line` at `now_ns`; `None` when released.
    fn peer_drive(&mut self, line: LineId, now_ns: u64) -> Option<Level>;
}

#[derive(Debug, Clone, Copy)]
struct HostPin {
    direction: Direction,
    output: Level,
}

impl Default for HostPin {
    fn default() -> Self {
        Self {
            direction: Direction::Input,
            output: Level::High,
        }
    }
}

struct BoardState {
    clock_hz: u32,
    now_ns: u64,
    pins: Vec<HostPin>,
    peers: Vec<Rc<RefCell<dyn Peer>>>,
    interrupts_enabled: bool,
    trace: Vec<Edge>,
}

/// Shared handle to the simulated board. Cloning is cheap.
#[derive(Clone)]
pub struct SimBoard {
    state: Rc<RefCell<BoardState>>,
}

impl SimBoard {
    /// A board with `lines` wires clocked like the reference board.
    pub fn new(lines: usize) -> Self {
        Self::with_clock(lines, DEFAULT_CLOCK_HZ)
    }

    /// # Panics
    ///
    /// Panics if `clock_hz` is zero.
    pub fn with_clock(lines: usize, clock_hz: u32) -> Self {
        assert!(clock_hz > 0, "board clock must be non-zero");
        Self {
            state: Rc::new(RefCell::new(BoardState {
                clock_hz,
                now_ns: 0,
                pins: vec![HostPin::default(); lines],
                peers: Vec::new(),
                interrupts_enabled: true,
                trace: Vec::new(),
            })),
        }
    }

    /// Plug a peer into the board.
    pub fn attach(&self, peer: Rc<RefCell<dyn Peer>>) {
        let mut s = self.state.borrow_mut();
        s.peers.push(peer);
        let count = s.peers.len();
        drop(s);
        log(LogCategory::Sim, LogLevel::Debug, || {
            format!("sim: peer attached ({} on board)", count)
        });
    }

    /// Plug in `peer` and return a handle the caller can keep inspecting.
    pub fn attach_new<P: Peer + 'static>(&self, peer: P) -> Rc<RefCell<P>> {
        let peer = Rc::new(RefCell::new(peer));
        self.attach(peer.clone());
        peer
    }

    pub fn line(&self, id: LineId) -> SimLine {
        assert!(
            id < self.state.borrow().pins.len(),
            "line {} not on this board",
            id
        );
        SimLine {
            board: self.clone(),
            id,
        }
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay {
            board: self.clone(),
        }
    }

    pub fn interrupts(&self) -> SimInterrupts {
        SimInterrupts {
            board: self.clone(),
        }
    }

    pub fn clock_hz(&self) -> u32 {
        self.state.borrow().clock_hz
    }

    pub fn now_ns(&self) -> u64 {
        self.state.borrow().now_ns
    }

    /// Let `ns` of idle time pass, e.g. between two polls.
    pub fn advance(&self, ns: u64) {
        self.state.borrow_mut().now_ns += ns;
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.state.borrow().interrupts_enabled
    }

    /// Current wired-AND level of a wire.
    pub fn level(&self, id: LineId) -> Level {
        let (host_low, peers, now) = {
            let s = self.state.borrow();
            let pin = s.pins[id];
            let host_low = pin.direction != Direction::Input && pin.output.is_low();
            (host_low, s.peers.clone(), s.now_ns)
        };
        if host_low {
            return Level::Low;
        }
        // Every peer is asked, even after one pulled low, so time-driven
        // models observe each sample.
        let mut level = Level::High;
        for peer in peers {
            if peer.borrow_mut().peer_drive(id, now) == Some(Level::Low) {
                level = Level::Low;
            }
        }
        level
    }

    pub fn trace(&self) -> Vec<Edge> {
        self.state.borrow().trace.clone()
    }

    pub fn edges_on(&self, id: LineId) -> Vec<Edge> {
        self.state
            .borrow()
            .trace
            .iter()
            .filter(|e| e.line == id)
            .copied()
            .collect()
    }

    /// Number of low-to-high host edges on `id` in the current trace.
    pub fn rising_edges(&self, id: LineId) -> usize {
        self.edges_on(id)
            .iter()
            .filter(|e| e.level == Level::High)
            .count()
    }

    pub fn clear_trace(&self) {
        self.state.borrow_mut().trace.clear();
    }

    fn host_set(&self, id: LineId, level: Level) {
        let (peers, now) = {
            let mut s = self.state.borrow_mut();
            let now = s.now_ns;
            let irq = s.interrupts_enabled;
            let pin = &mut s.pins[id];
            if pin.output == level {
                return;
            }
            pin.output = level;
            s.trace.push(Edge {
                line: id,
                level,
                at_ns: now,
                interrupts_enabled: irq,
            });
            (s.peers.clone(), now)
        };
        for peer in peers {
            peer.borrow_mut().host_drive(id, level, now);
        }
    }
}

/// One wire of a [`SimBoard`].
#[derive(Clone)]
pub struct SimLine {
    board: SimBoard,
    id: LineId,
}

impl SimLine {
    pub fn id(&self) -> LineId {
        self.id
    }
}

impl Line for SimLine {
    fn configure(&mut self, direction: Direction, pull: Pull) {
        // every bus wire has an external pull-up, so `pull` only shows up in the log
        self.board.state.borrow_mut().pins[self.id].direction = direction;
        log(LogCategory::Sim, LogLevel::Trace, || {
            format!("sim: line {} as {:?}, pull {:?}", self.id, direction, pull)
        });
    }

    fn set(&mut self, level: Level) {
        self.board.host_set(self.id, level);
    }

    fn read(&self) -> Level {
        self.board.level(self.id)
    }
}

/// Virtual-clock delay.
#[derive(Clone)]
pub struct SimDelay {
    board: SimBoard,
}

impl Delay for SimDelay {
    fn delay(&mut self, span: TimeUnit) {
        let mut s = self.board.state.borrow_mut();
        let ns = span.as_nanos(s.clock_hz);
        s.now_ns += ns;
    }
}

/// Interrupt mask of the simulated board.
#[derive(Clone)]
pub struct SimInterrupts {
    board: SimBoard,
}

impl InterruptControl for SimInterrupts {
    fn disable(&mut self) {
        self.board.state.borrow_mut().interrupts_enabled = false;
    }

    fn enable(&mut self) {
        self.board.state.borrow_mut().interrupts_enabled = true;
    }
}

/// Generic parallel-in/serial-out pad: the model behind both shift-register
/// consoles.
///
/// Each output wire carries a 32-bit pattern; bit `n` set means the wire is
/// pulled low while bit `n` is presented. A latch pulse loads the patterns
/// (and holds bit 0 while the latch is high); every clock rising edge
/// advances to the next bit. Beyond bit 31 the wires are released.
pub struct ShiftRegisterPeer {
    latch: LineId,
    clock: LineId,
    outputs: Vec<(LineId, u32)>,
    loaded: Vec<u32>,
    latch_high: bool,
    bit: u32,
    latches: u32,
    clocks_since_latch: u32,
    connected: bool,
}

impl ShiftRegisterPeer {
    pub fn new(latch: LineId, clock: LineId) -> Self {
        Self {
            latch,
            clock,
            outputs: Vec::new(),
            loaded: Vec::new(),
            latch_high: false,
            bit: 0,
            latches: 0,
            clocks_since_latch: 0,
            connected: true,
        }
    }

    /// Add (or replace) the pattern driven on `line`.
    pub fn with_output(mut self, line: LineId, pattern: u32) -> Self {
        self.set_pattern(line, pattern);
        self
    }

    /// Change the pattern on `line`; takes effect at the next latch.
    pub fn set_pattern(&mut self, line: LineId, pattern: u32) {
        match self.outputs.iter_mut().find(|(l, _)| *l == line) {
            Some(entry) => entry.1 = pattern,
            None => self.outputs.push((line, pattern)),
        }
    }

    pub fn pattern(&self, line: LineId) -> u32 {
        self.outputs
            .iter()
            .find(|(l, _)| *l == line)
            .map_or(0, |(_, p)| *p)
    }

    /// Unplugged pads release every wire.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn latch_count(&self) -> u32 {
        self.latches
    }

    /// Clock rising edges seen since the last latch pulse.
    pub fn clocks_since_latch(&self) -> u32 {
        self.clocks_since_latch
    }

    fn load(&mut self) {
        self.loaded = self.outputs.iter().map(|(_, p)| *p).collect();
        self.bit = 0;
        self.clocks_since_latch = 0;
    }
}

impl Peer for ShiftRegisterPeer {
    fn host_drive(&mut self, line: LineId, level: Level, _now_ns: u64) {
        if line == self.latch {
            self.latch_high = level.is_high();
            if level.is_high() {
                self.latches += 1;
            }
            self.load();
        } else if line == self.clock && level.is_high() && !self.latch_high {
            self.bit += 1;
            self.clocks_since_latch += 1;
        }
    }

    fn peer_drive(&mut self, line: LineId, _now_ns: u64) -> Option<Level> {
        if !self.connected || self.bit >= 32 {
            return None;
        }
        let idx = self.outputs.iter().position(|(l, _)| *l == line)?;
        let pattern = *self.loaded.get(idx)?;
        (pattern & (1 << self.bit) != 0).then_some(Level::Low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critical::CriticalSection;

    struct PullsLow(LineId);

    impl Peer for PullsLow {
        fn peer_drive(&mut self, line: LineId, _now_ns: u64) -> Option<Level> {
            (line == self.0).then_some(Level::Low)
        }
    }

    #[test]
    fn test_undriven_lines_read_high() {
        let board = SimBoard::new(3);
        let mut line = board.line(1);
        line.configure(Direction::Input, Pull::Up);
        assert_eq!(line.read(), Level::High);
    }

    #[test]
    fn test_wired_and_host_and_peer() {
        let board = SimBoard::new(2);
        board.attach_new(PullsLow(0));

        let mut a = board.line(0);
        let mut b = board.line(1);
        a.configure(Direction::OpenDrain, Pull::None);
        b.configure(Direction::OpenDrain, Pull::None);

        a.set_high();
        b.set_high();
        assert_eq!(a.read(), Level::Low, "peer holds line 0 low");
        assert_eq!(b.read(), Level::High);

        b.set_low();
        assert_eq!(b.read(), Level::Low);
    }

    #[test]
    fn test_delay_advances_virtual_clock() {
        let board = SimBoard::new(1);
        let mut d = board.delay();
        d.delay(TimeUnit::Cycles(16));
        d.delay(TimeUnit::micros(3));
        assert_eq!(board.now_ns(), 4_000);
        board.advance(1_000);
        assert_eq!(board.now_ns(), 5_000);
    }

    #[test]
    #[should_panic(expected = "board clock must be non-zero")]
    fn test_zero_clock_board_is_refused() {
        SimBoard::with_clock(1, 0);
    }

    #[test]
    fn test_trace_records_interrupt_state() {
        let board = SimBoard::new(1);
        let mut line = board.line(0);
        line.configure(Direction::Output, Pull::None);
        let mut irq = board.interrupts();

        line.set_low();
        {
            let _cs = CriticalSection::enter(&mut irq);
            line.set_high();
        }
        assert!(board.interrupts_enabled());

        let trace = board.trace();
        assert_eq!(trace.len(), 2);
        assert!(trace[0].interrupts_enabled);
        assert!(!trace[1].interrupts_enabled);
    }

    #[test]
    fn test_repeated_level_is_not_an_edge() {
        let board = SimBoard::new(1);
        let mut line = board.line(0);
        line.configure(Direction::Output, Pull::None);
        line.set_low();
        line.set_low();
        assert_eq!(board.edges_on(0).len(), 1);
    }

    #[test]
    fn test_shift_register_peer_presents_bits_in_order() {
        let board = SimBoard::new(3);
        let pad = board.attach_new(ShiftRegisterPeer::new(0, 1).with_output(2, 0b101));

        let mut latch = board.line(0);
        let mut clock = board.line(1);
        let data = board.line(2);
        latch.configure(Direction::Output, Pull::None);
        clock.configure(Direction::Output, Pull::None);
        latch.set_low();
        clock.set_low();

        latch.set_high();
        latch.set_low();
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(data.is_low());
            clock.set_high();
            clock.set_low();
        }
        assert_eq!(seen, vec![true, false, true, false]);
        assert_eq!(pad.borrow().latch_count(), 1);
        assert_eq!(pad.borrow().clocks_since_latch(), 4);
    }

    #[test]
    fn test_disconnected_shift_register_peer_releases_lines() {
        let board = SimBoard::new(3);
        let pad = board.attach_new(ShiftRegisterPeer::new(0, 1).with_output(2, u32::MAX));
        pad.borrow_mut().set_connected(false);
        let mut latch = board.line(0);
        latch.configure(Direction::Output, Pull::None);
        latch.set_high();
        latch.set_low();
        assert_eq!(board.level(2), Level::High);
    }
}
