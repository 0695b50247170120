//! Half-duplex single-wire transceiver.
//!
//! The line is open-drain and idles high. Every bit occupies a 4us window
//! that starts with a falling edge; the value is carried by how long the
//! line stays low:
//!
//! ```text
//!        1us     3us               3us      1us
//! "1"  |_____|‾‾‾‾‾‾‾‾‾‾‾‾|   "0" |_____________|‾‾‾‾|
//! ```
//!
//! A command is sent MSB first and closed with a stop bit (1us low, then
//! release). The peer answers about 2-4us later using the same encoding.
//! Receiving spins on the line: wait for the falling edge of a bit, sample
//! 2us later, wait for the line to come back up.
//!
//! Transmit and receive run inside one [`CriticalSection`]. There is no
//! framing or checksum to recover from a stretched pulse, so every wait
//! loop is bounded by a spin count instead of a clock.

use pad_core::critical::{CriticalSection, InterruptControl};
use pad_core::line::{Direction, Level, Line, Pull};
use pad_core::logging::{log, LogCategory, LogLevel};
use pad_core::timing::{Delay, TimeUnit};
use std::fmt;
use thiserror::Error;

/// Device identify / status.
pub const CMD_INFO: u8 = 0x00;
/// Buttons and stick.
pub const CMD_STATUS: u8 = 0x01;
pub const CMD_PAK_READ: u8 = 0x02;
pub const CMD_PAK_WRITE: u8 = 0x03;
/// Identify and reset.
pub const CMD_RESET: u8 = 0xFF;

pub const ONE_LOW: TimeUnit = TimeUnit::Cycles(16);
pub const ONE_HIGH: TimeUnit = TimeUnit::Cycles(48);
pub const ZERO_LOW: TimeUnit = TimeUnit::Cycles(48);
pub const ZERO_HIGH: TimeUnit = TimeUnit::Cycles(16);
pub const STOP_LOW: TimeUnit = TimeUnit::Cycles(16);
/// Delay from a detected falling edge to the sample point.
pub const SAMPLE_OFFSET: TimeUnit = TimeUnit::Cycles(32);
/// Cost of one iteration of a wait loop.
pub const SPIN: TimeUnit = TimeUnit::Cycles(5);

/// Spin budget while waiting for the line to be released after transmit.
pub const IDLE_TIMEOUT: u8 = 0x7F;
/// Spin budget while waiting for the falling edge that starts a bit.
pub const FALLING_TIMEOUT: u8 = 0x7F;
/// Spin budget while waiting for the line to rise after a sample.
pub const RISING_TIMEOUT: u8 = 0x3F;

/// Which wait loop ran out of spins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    LineRelease,
    FallingEdge,
    RisingEdge,
}

impl fmt::Display for WaitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WaitPhase::LineRelease => "line release",
            WaitPhase::FallingEdge => "falling edge",
            WaitPhase::RisingEdge => "rising edge",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoybusError {
    #[error("command must contain at least one byte")]
    EmptyCommand,
    /// The response buffer holds the first `received_bits` bits.
    #[error("timed out waiting for {phase} after {received_bits} response bits")]
    Timeout {
        phase: WaitPhase,
        received_bits: usize,
    },
}

pub struct Transceiver<L, D, I> {
    line: L,
    delay: D,
    irq: I,
}

impl<L: Line, D: Delay, I: InterruptControl> Transceiver<L, D, I> {
    pub fn new(line: L, delay: D, irq: I) -> Self {
        Self { line, delay, irq }
    }

    /// Release the line and let the pull-up hold it high.
    pub fn initialize(&mut self) {
        self.line.configure(Direction::OpenDrain, Pull::Up);
        self.line.set_high();
    }

    /// Send `command`, then read `response.len()` bytes back.
    ///
    /// Returns the number of bytes received. On timeout the response buffer
    /// is left partially filled; callers must treat that as no response.
    pub fn exchange(&mut self, command: &[u8], response: &mut [u8]) -> Result<usize, JoybusError> {
        if command.is_empty() {
            return Err(JoybusError::EmptyCommand);
        }
        response.fill(0);

        let Self { line, delay, irq } = self;
        let result = {
            let _cs = CriticalSection::enter(irq);
            transmit(line, delay, command);
            receive(line, delay, response)
        };

        match &result {
            Ok(n) => log(LogCategory::Joybus, LogLevel::Trace, || {
                format!("joybus: cmd {:02X} -> {} bytes {:02X?}", command[0], n, response)
            }),
            Err(e) => log(LogCategory::Joybus, LogLevel::Debug, || {
                format!("joybus: cmd {:02X}: {}", command[0], e)
            }),
        }
        result
    }
}

fn send_bit<L: Line, D: Delay>(line: &mut L, delay: &mut D, one: bool) {
    line.set_low();
    if one {
        delay.delay(ONE_LOW);
        line.set_high();
        delay.delay(ONE_HIGH);
    } else {
        delay.delay(ZERO_LOW);
        line.set_high();
        delay.delay(ZERO_HIGH);
    }
}

fn transmit<L: Line, D: Delay>(line: &mut L, delay: &mut D, command: &[u8]) {
    for &byte in command {
        for bit in (0..8).rev() {
            send_bit(line, delay, (byte >> bit) & 1 != 0);
        }
    }
    line.set_low();
    delay.delay(STOP_LOW);
    line.set_high();
}

/// Spin until the line reads `level`; `false` once `budget` spins are used.
fn wait_for<L: Line, D: Delay>(line: &L, delay: &mut D, level: Level, budget: u8) -> bool {
    let mut remaining = budget;
    while line.read() != level {
        remaining -= 1;
        if remaining == 0 {
            return false;
        }
        delay.delay(SPIN);
    }
    true
}

fn receive<L: Line, D: Delay>(
    line: &mut L,
    delay: &mut D,
    response: &mut [u8],
) -> Result<usize, JoybusError> {
    let timeout = |phase, received_bits| JoybusError::Timeout {
        phase,
        received_bits,
    };

    if !wait_for(line, delay, Level::High, IDLE_TIMEOUT) {
        return Err(timeout(WaitPhase::LineRelease, 0));
    }

    let total = response.len() * 8;
    for bit in 0..total {
        if !wait_for(line, delay, Level::Low, FALLING_TIMEOUT) {
            return Err(timeout(WaitPhase::FallingEdge, bit));
        }
        delay.delay(SAMPLE_OFFSET);
        if line.read().is_high() {
            response[bit / 8] |= 0x80 >> (bit % 8);
        }
        if bit + 1 == total {
            break;
        }
        if !wait_for(line, delay, Level::High, RISING_TIMEOUT) {
            return Err(timeout(WaitPhase::RisingEdge, bit + 1));
        }
    }
    Ok(response.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{N64Pad, DATA_LINE};
    use pad_core::sim::{SimBoard, SimDelay, SimInterrupts, SimLine};

    fn transceiver(board: &SimBoard) -> Transceiver<SimLine, SimDelay, SimInterrupts> {
        let mut t = Transceiver::new(board.line(DATA_LINE), board.delay(), board.interrupts());
        t.initialize();
        t
    }

    #[test]
    fn test_bit_encoding_widths() {
        let board = SimBoard::new(1);
        let mut t = transceiver(&board);
        board.clear_trace();

        let mut resp = [0u8; 0];
        let _ = t.exchange(&[0b1000_0000], &mut resp);

        let edges = board.edges_on(DATA_LINE);
        // 8 bits + stop, each a low/high pair
        assert_eq!(edges.len(), 18);
        let low = |i: usize| edges[2 * i + 1].at_ns - edges[2 * i].at_ns;
        assert_eq!(low(0), 1_000, "a one is 1us low");
        assert_eq!(low(1), 3_000, "a zero is 3us low");
        assert_eq!(low(8), 1_000, "stop bit");
        // bit windows are 4us
        assert_eq!(edges[2].at_ns - edges[0].at_ns, 4_000);
        assert_eq!(edges[4].at_ns - edges[2].at_ns, 4_000);
    }

    #[test]
    fn test_every_edge_is_sent_with_interrupts_masked() {
        let board = SimBoard::new(1);
        board.attach_new(N64Pad::new(DATA_LINE));
        let mut t = transceiver(&board);
        board.clear_trace();

        let mut resp = [0u8; 4];
        assert_eq!(t.exchange(&[CMD_STATUS], &mut resp), Ok(4));
        let trace = board.trace();
        assert!(!trace.is_empty());
        assert!(trace.iter().all(|e| !e.interrupts_enabled));
        assert!(board.interrupts_enabled());
    }

    #[test]
    fn test_silent_line_times_out_and_unmasks() {
        let board = SimBoard::new(1);
        let mut t = transceiver(&board);
        let start = board.now_ns();

        let mut resp = [0xAAu8; 4];
        let err = t.exchange(&[CMD_STATUS], &mut resp).unwrap_err();
        assert_eq!(
            err,
            JoybusError::Timeout {
                phase: WaitPhase::FallingEdge,
                received_bits: 0
            }
        );
        assert_eq!(resp, [0; 4]);
        assert!(board.interrupts_enabled());
        // 8 command bits, the stop bit and a bounded spin wait
        assert!(board.now_ns() - start < 100_000);
    }

    #[test]
    fn test_empty_command_is_rejected() {
        let board = SimBoard::new(1);
        let mut t = transceiver(&board);
        let mut resp = [0u8; 1];
        assert_eq!(t.exchange(&[], &mut resp), Err(JoybusError::EmptyCommand));
        assert!(board.trace().is_empty());
    }

    #[test]
    fn test_command_buffer_is_not_consumed() {
        let board = SimBoard::new(1);
        let pad = board.attach_new(N64Pad::new(DATA_LINE));
        let mut t = transceiver(&board);

        let command = [CMD_INFO];
        let mut resp = [0u8; 3];
        t.exchange(&command, &mut resp).expect("first");
        t.exchange(&command, &mut resp).expect("second");
        assert_eq!(command, [CMD_INFO]);
        assert_eq!(pad.borrow().commands(), &[vec![CMD_INFO], vec![CMD_INFO]]);
    }

    #[test]
    fn test_short_response_reports_partial_bits() {
        let board = SimBoard::new(1);
        board.attach_new(N64Pad::new(DATA_LINE));
        let mut t = transceiver(&board);

        // identify answers 3 bytes; asking for 4 runs out after the 24 data
        // bits and the peer's stop bit, which samples as a one
        let mut resp = [0u8; 4];
        let err = t.exchange(&[CMD_INFO], &mut resp).unwrap_err();
        match err {
            JoybusError::Timeout {
                phase: WaitPhase::FallingEdge,
                received_bits,
            } => assert_eq!(received_bits, 25),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(resp[3], 0x80);
        assert_eq!(resp[0], 0x05);
    }

    #[test]
    fn test_timeout_message_names_phase() {
        let e = JoybusError::Timeout {
            phase: WaitPhase::RisingEdge,
            received_bits: 3,
        };
        assert_eq!(
            e.to_string(),
            "timed out waiting for rising edge after 3 response bits"
        );
    }
}
