//! Controller-pak sub-protocol, layered on the [`Transceiver`].
//!
//! Frames:
//!
//! | command | bytes sent                             | bytes back        |
//! |---------|----------------------------------------|-------------------|
//! | write   | `03 addr_hi addr_lo` + 32 data bytes   | data CRC          |
//! | read    | `02 addr_hi addr_lo`                   | 32 data + CRC     |
//!
//! Addresses go out with their 5-bit CRC filled in (see [`crate::crc`]).
//!
//! A rumble pak is armed by writing `0x80` to every byte of the block at
//! 0x8000; an all-zero block does not arm it. The motor is then driven by
//! writing `0x01` (on) or `0x00` (off) blocks at 0xC000.

use crate::crc::{address_with_crc, data_crc};
use crate::joybus::{JoybusError, Transceiver, CMD_PAK_READ, CMD_PAK_WRITE};
use pad_core::critical::InterruptControl;
use pad_core::line::Line;
use pad_core::logging::{log, LogCategory, LogLevel};
use pad_core::timing::Delay;
use thiserror::Error;

pub const BLOCK_SIZE: usize = 32;

pub const RUMBLE_INIT_ADDRESS: u16 = 0x8000;
pub const RUMBLE_CONTROL_ADDRESS: u16 = 0xC000;
pub const RUMBLE_INIT_BYTE: u8 = 0x80;
pub const RUMBLE_ON_BYTE: u8 = 0x01;
pub const RUMBLE_OFF_BYTE: u8 = 0x00;

pub type Block = [u8; BLOCK_SIZE];

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PakError {
    #[error(transparent)]
    Bus(#[from] JoybusError),
    #[error("data CRC mismatch at {address:#06X}: expected {expected:#04X}, got {actual:#04X}")]
    Crc { address: u16, expected: u8, actual: u8 },
}

/// Build the 35-byte write frame for `address`.
pub fn write_frame(address: u16, data: &Block) -> [u8; 3 + BLOCK_SIZE] {
    let [hi, lo] = address_with_crc(address).to_be_bytes();
    let mut frame = [0u8; 3 + BLOCK_SIZE];
    frame[0] = CMD_PAK_WRITE;
    frame[1] = hi;
    frame[2] = lo;
    frame[3..].copy_from_slice(data);
    frame
}

/// Write one block. Any completed response counts as success; the returned
/// byte is the pak's CRC acknowledgement.
pub fn write_block<L, D, I>(
    bus: &mut Transceiver<L, D, I>,
    address: u16,
    data: &Block,
) -> Result<u8, PakError>
where
    L: Line,
    D: Delay,
    I: InterruptControl,
{
    let frame = write_frame(address, data);
    let mut ack = [0u8; 1];
    bus.exchange(&frame, &mut ack)?;

    let expected = data_crc(data);
    if ack[0] != expected {
        // a controller with no pak inserted answers with the CRC inverted
        log(LogCategory::Pak, LogLevel::Warn, || {
            format!(
                "pak: write {:#06X} ack {:#04X}, CRC {:#04X}",
                address, ack[0], expected
            )
        });
    } else {
        log(LogCategory::Pak, LogLevel::Trace, || {
            format!("pak: write {:#06X} ok", address)
        });
    }
    Ok(ack[0])
}

/// Read one block into `out`, checking its CRC.
pub fn read_block<L, D, I>(
    bus: &mut Transceiver<L, D, I>,
    address: u16,
    out: &mut Block,
) -> Result<(), PakError>
where
    L: Line,
    D: Delay,
    I: InterruptControl,
{
    let [hi, lo] = address_with_crc(address).to_be_bytes();
    let mut response = [0u8; BLOCK_SIZE + 1];
    bus.exchange(&[CMD_PAK_READ, hi, lo], &mut response)?;

    out.copy_from_slice(&response[..BLOCK_SIZE]);
    let expected = data_crc(out);
    let actual = response[BLOCK_SIZE];
    if actual != expected {
        return Err(PakError::Crc {
            address,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Arm a rumble pak.
pub fn init_rumble<L, D, I>(bus: &mut Transceiver<L, D, I>) -> Result<(), PakError>
where
    L: Line,
    D: Delay,
    I: InterruptControl,
{
    write_block(bus, RUMBLE_INIT_ADDRESS, &[RUMBLE_INIT_BYTE; BLOCK_SIZE])?;
    Ok(())
}

/// Start or stop the rumble motor.
pub fn set_rumble<L, D, I>(bus: &mut Transceiver<L, D, I>, on: bool) -> Result<(), PakError>
where
    L: Line,
    D: Delay,
    I: InterruptControl,
{
    let fill = if on { RUMBLE_ON_BYTE } else { RUMBLE_OFF_BYTE };
    write_block(bus, RUMBLE_CONTROL_ADDRESS, &[fill; BLOCK_SIZE])?;
    Ok(())
}
