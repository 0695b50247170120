//! Simulated controller on the single-wire bus.
//!
//! [`N64Pad`] decodes host bits from the pulse widths it observes, answers
//! identify, status and pak commands after a short turnaround, and models a
//! rumble pak (or an empty slot). Replies are generated from the virtual
//! clock, so the transceiver's spin waits see real edges.

use crate::crc::{address_crc_ok, data_crc};
use crate::joybus::{CMD_INFO, CMD_PAK_READ, CMD_PAK_WRITE, CMD_RESET, CMD_STATUS};
use crate::pak::{Block, BLOCK_SIZE, RUMBLE_CONTROL_ADDRESS, RUMBLE_INIT_ADDRESS, RUMBLE_INIT_BYTE};
use crate::N64Buttons;
use pad_core::line::Level;
use pad_core::sim::{LineId, Peer};

pub const DATA_LINE: LineId = 0;

/// Low pulses shorter than this are ones.
const ONE_THRESHOLD_NS: u64 = 2_000;
/// A host falling edge this long after the previous bit starts a new command.
const FRAME_GAP_NS: u64 = 50_000;
const TURNAROUND_NS: u64 = 3_000;
const BIT_NS: u64 = 4_000;
const REPLY_ONE_LOW_NS: u64 = 1_000;
const REPLY_ZERO_LOW_NS: u64 = 3_000;
const REPLY_STOP_LOW_NS: u64 = 2_000;

const DEVICE_TYPE: [u8; 2] = [0x05, 0x00];
const PAK_INSERTED: u8 = 0x01;
const PAK_EMPTY: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PakSlot {
    #[default]
    Empty,
    Rumble,
}

/// Total command length in bytes, known once the first byte is in.
fn command_len(command: u8) -> usize {
    match command {
        CMD_PAK_READ => 3,
        CMD_PAK_WRITE => 3 + BLOCK_SIZE,
        _ => 1,
    }
}

struct Reply {
    start_ns: u64,
    bits: Vec<bool>,
}

impl Reply {
    fn new(start_ns: u64, bytes: &[u8]) -> Self {
        let bits = bytes
            .iter()
            .flat_map(|&b| (0..8).rev().map(move |i| (b >> i) & 1 != 0))
            .collect();
        Self { start_ns, bits }
    }

    fn drive(&self, now_ns: u64) -> Option<Level> {
        let elapsed = now_ns.checked_sub(self.start_ns)?;
        let index = (elapsed / BIT_NS) as usize;
        let offset = elapsed % BIT_NS;
        let low_for = match self.bits.get(index) {
            Some(true) => REPLY_ONE_LOW_NS,
            Some(false) => REPLY_ZERO_LOW_NS,
            None if index == self.bits.len() => REPLY_STOP_LOW_NS,
            None => return None,
        };
        (offset < low_for).then_some(Level::Low)
    }
}

pub struct N64Pad {
    line: LineId,
    buttons: N64Buttons,
    stick: (i8, i8),
    slot: PakSlot,
    connected: bool,

    fell_at: Option<u64>,
    last_rise: u64,
    bits: Vec<bool>,
    reply: Option<Reply>,

    commands: Vec<Vec<u8>>,
    pak: Vec<(u16, Block)>,
    writes: Vec<(u16, Block)>,
    armed: bool,
    motor: bool,
    corrupt_crc: bool,
}

impl N64Pad {
    pub fn new(line: LineId) -> Self {
        Self {
            line,
            buttons: N64Buttons::empty(),
            stick: (0, 0),
            slot: PakSlot::Empty,
            connected: true,
            fell_at: None,
            last_rise: 0,
            bits: Vec::new(),
            reply: None,
            commands: Vec::new(),
            pak: Vec::new(),
            writes: Vec::new(),
            armed: false,
            motor: false,
            corrupt_crc: false,
        }
    }

    pub fn with_buttons(mut self, buttons: N64Buttons) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn with_stick(mut self, x: i8, y: i8) -> Self {
        self.stick = (x, y);
        self
    }

    pub fn with_pak(mut self, slot: PakSlot) -> Self {
        self.slot = slot;
        self
    }

    pub fn set_buttons(&mut self, buttons: N64Buttons) {
        self.buttons = buttons;
    }

    pub fn set_stick(&mut self, x: i8, y: i8) {
        self.stick = (x, y);
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
        if !connected {
            self.reply = None;
            self.bits.clear();
        }
    }

    /// Every command decoded so far, in order.
    pub fn commands(&self) -> &[Vec<u8>] {
        &self.commands
    }

    /// Pak writes as `(address on the wire, data)`.
    pub fn pak_writes(&self) -> &[(u16, Block)] {
        &self.writes
    }

    pub fn rumble_armed(&self) -> bool {
        self.armed
    }

    pub fn motor_on(&self) -> bool {
        self.motor
    }

    /// Invert the CRC of the next pak reply: the write ack or the byte
    /// appended to a read.
    pub fn corrupt_next_crc(&mut self) {
        self.corrupt_crc = true;
    }

    fn reply_crc(&mut self, data: &Block) -> u8 {
        let crc = data_crc(data);
        if std::mem::take(&mut self.corrupt_crc) {
            !crc
        } else {
            crc
        }
    }

    fn bytes(&self) -> Vec<u8> {
        self.bits
            .chunks(8)
            .map(|byte| byte.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8))
            .collect()
    }

    fn stored(&self, base: u16) -> Block {
        self.pak
            .iter()
            .find(|(a, _)| *a == base)
            .map_or([0; BLOCK_SIZE], |(_, b)| *b)
    }

    fn store(&mut self, base: u16, data: Block) {
        match self.pak.iter_mut().find(|(a, _)| *a == base) {
            Some(entry) => entry.1 = data,
            None => self.pak.push((base, data)),
        }
    }

    fn answer(&mut self, command: &[u8]) -> Option<Vec<u8>> {
        let pak = self.slot == PakSlot::Rumble;
        // a pak frame whose address fails its CRC gets no reply
        let address = command
            .get(1..3)
            .map(|a| u16::from_be_bytes([a[0], a[1]]))
            .filter(|&a| address_crc_ok(a));
        match command[0] {
            CMD_INFO | CMD_RESET => {
                let status = if pak { PAK_INSERTED } else { PAK_EMPTY };
                Some(vec![DEVICE_TYPE[0], DEVICE_TYPE[1], status])
            }
            CMD_STATUS => {
                let [hi, lo] = self.buttons.bits().to_be_bytes();
                Some(vec![hi, lo, self.stick.0 as u8, self.stick.1 as u8])
            }
            CMD_PAK_WRITE if pak => {
                let wire = address?;
                let base = wire & !0x1F;
                let mut data = [0u8; BLOCK_SIZE];
                data.copy_from_slice(&command[3..]);
                self.writes.push((wire, data));
                self.store(base, data);
                if base == RUMBLE_INIT_ADDRESS {
                    self.armed = data.iter().all(|&b| b == RUMBLE_INIT_BYTE);
                } else if base == RUMBLE_CONTROL_ADDRESS {
                    self.motor = self.armed && data[0] & 1 != 0;
                }
                Some(vec![self.reply_crc(&data)])
            }
            CMD_PAK_READ if pak => {
                let base = address? & !0x1F;
                let data = self.stored(base);
                let crc = self.reply_crc(&data);
                let mut reply = data.to_vec();
                reply.push(crc);
                Some(reply)
            }
            _ => None,
        }
    }

    fn end_of_pulse(&mut self, width_ns: u64, now_ns: u64) {
        let expected = self.bits.get(..8).map(|first| {
            let cmd = first.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8);
            command_len(cmd) * 8
        });
        if expected == Some(self.bits.len()) {
            // stop bit
            let command = self.bytes();
            self.bits.clear();
            let reply = self.answer(&command);
            self.commands.push(command);
            self.reply = reply.map(|bytes| Reply::new(now_ns + TURNAROUND_NS, &bytes));
        } else {
            self.bits.push(width_ns < ONE_THRESHOLD_NS);
        }
    }
}

impl Peer for N64Pad {
    fn host_drive(&mut self, line: LineId, level: Level, now_ns: u64) {
        if line != self.line || !self.connected {
            return;
        }
        match level {
            Level::Low => {
                self.reply = None;
                if now_ns.saturating_sub(self.last_rise) > FRAME_GAP_NS {
                    self.bits.clear();
                }
                self.fell_at = Some(now_ns);
            }
            Level::High => {
                if let Some(fell) = self.fell_at.take() {
                    self.end_of_pulse(now_ns - fell, now_ns);
                }
                self.last_rise = now_ns;
            }
        }
    }

    fn peer_drive(&mut self, line: LineId, now_ns: u64) -> Option<Level> {
        if line != self.line || !self.connected {
            return None;
        }
        self.reply.as_ref()?.drive(now_ns)
    }
}
