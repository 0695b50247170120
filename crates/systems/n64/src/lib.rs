//! Single-wire controller driver.
//!
//! Every poll sends the status command and decodes the 4-byte answer:
//!
//! ```text
//! byte 0: A B Z Start DUp DDown DLeft DRight
//! byte 1: Reset - L R CUp CDown CLeft CRight
//! byte 2: stick X (two's complement)
//! byte 3: stick Y (two's complement)
//! ```
//!
//! Rumble goes through the pak sub-protocol in [`pak`]. The pak is armed
//! lazily on the first rumble request and forgotten whenever a status poll
//! fails, so a re-plugged controller is armed again.

pub mod crc;
pub mod joybus;
pub mod pak;
pub mod sim;

use bitflags::bitflags;
use joybus::{JoybusError, Transceiver, CMD_INFO, CMD_STATUS};
use pad_core::critical::InterruptControl;
use pad_core::line::Line;
use pad_core::logging::{log, LogCategory, LogLevel};
use pad_core::timing::Delay;
use pad_core::{Driver, Snapshot};
use pak::{Block, PakError};
use serde::{Deserialize, Serialize};

bitflags! {
    /// Buttons in wire order: bit 15 is the first bit of the response.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct N64Buttons: u16 {
        const A = 0x8000;
        const B = 0x4000;
        const Z = 0x2000;
        const START = 0x1000;
        const D_UP = 0x0800;
        const D_DOWN = 0x0400;
        const D_LEFT = 0x0200;
        const D_RIGHT = 0x0100;
        /// Set by the controller after L+R+Start re-centres the stick.
        const RESET = 0x0080;
        const L = 0x0020;
        const R = 0x0010;
        const C_UP = 0x0008;
        const C_DOWN = 0x0004;
        const C_LEFT = 0x0002;
        const C_RIGHT = 0x0001;
    }
}

/// Unsigned mid-scale of a stick axis.
pub const AXIS_CENTER: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct N64Snapshot {
    pub buttons: N64Buttons,
    pub stick_x: i8,
    pub stick_y: i8,
    pub rumble_pak_present: bool,
    pub rumble_active: bool,
    pub connected: bool,
}

impl N64Snapshot {
    /// X axis with 0x80 as centre.
    pub fn stick_x_unsigned(&self) -> u8 {
        (self.stick_x as u8) ^ AXIS_CENTER
    }

    /// Y axis with 0x80 as centre.
    pub fn stick_y_unsigned(&self) -> u8 {
        (self.stick_y as u8) ^ AXIS_CENTER
    }

    fn from_status(status: [u8; 4]) -> Self {
        Self {
            buttons: N64Buttons::from_bits_retain(u16::from_be_bytes([status[0], status[1]])),
            stick_x: status[2] as i8,
            stick_y: status[3] as i8,
            rumble_pak_present: false,
            rumble_active: false,
            connected: true,
        }
    }
}

impl Default for N64Snapshot {
    fn default() -> Self {
        Self {
            buttons: N64Buttons::empty(),
            stick_x: 0,
            stick_y: 0,
            rumble_pak_present: false,
            rumble_active: false,
            connected: false,
        }
    }
}

impl Snapshot for N64Snapshot {
    fn connected(&self) -> bool {
        self.connected
    }

    fn accessory_present(&self) -> bool {
        self.rumble_pak_present
    }
}

/// Answer to the identify command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_type: u16,
    pub pak_status: u8,
}

impl DeviceInfo {
    pub const STANDARD_CONTROLLER: u16 = 0x0500;

    pub fn pak_inserted(&self) -> bool {
        self.pak_status & 0x01 != 0
    }
}

pub struct N64Controller<L, D, I> {
    bus: Transceiver<L, D, I>,
    snapshot: N64Snapshot,
    rumble_pak_present: bool,
    rumble_active: bool,
}

impl<L: Line, D: Delay, I: InterruptControl> N64Controller<L, D, I> {
    pub fn new(line: L, delay: D, irq: I) -> Self {
        Self {
            bus: Transceiver::new(line, delay, irq),
            snapshot: N64Snapshot::default(),
            rumble_pak_present: false,
            rumble_active: false,
        }
    }

    fn forget_pak(&mut self) {
        self.rumble_pak_present = false;
        self.rumble_active = false;
        self.snapshot.rumble_pak_present = false;
        self.snapshot.rumble_active = false;
    }

    /// Arm the rumble pak. Presence is only recorded once the pak answers.
    pub fn init_rumble_pak(&mut self) -> bool {
        match pak::init_rumble(&mut self.bus) {
            Ok(()) => {
                if !self.rumble_pak_present {
                    log(LogCategory::Pak, LogLevel::Info, || {
                        "n64: rumble pak detected".to_string()
                    });
                }
                self.rumble_pak_present = true;
                self.snapshot.rumble_pak_present = true;
                true
            }
            Err(e) => {
                log(LogCategory::Pak, LogLevel::Debug, || {
                    format!("n64: rumble init failed: {}", e)
                });
                self.forget_pak();
                false
            }
        }
    }

    /// Start or stop the motor, arming the pak first if needed. Returns
    /// `false` when the request was dropped.
    pub fn set_rumble(&mut self, on: bool) -> bool {
        if !self.rumble_pak_present && !self.init_rumble_pak() {
            return false;
        }
        match pak::set_rumble(&mut self.bus, on) {
            Ok(()) => {
                self.rumble_active = on;
                self.snapshot.rumble_active = on;
                true
            }
            Err(e) => {
                log(LogCategory::Pak, LogLevel::Warn, || {
                    format!("n64: rumble {} failed: {}", if on { "on" } else { "off" }, e)
                });
                self.forget_pak();
                false
            }
        }
    }

    pub fn identify(&mut self) -> Result<DeviceInfo, JoybusError> {
        let mut resp = [0u8; 3];
        self.bus.exchange(&[CMD_INFO], &mut resp)?;
        Ok(DeviceInfo {
            device_type: u16::from_be_bytes([resp[0], resp[1]]),
            pak_status: resp[2],
        })
    }

    pub fn read_pak(&mut self, address: u16, out: &mut Block) -> Result<(), PakError> {
        pak::read_block(&mut self.bus, address, out)
    }

    /// Returns the pak's CRC acknowledgement.
    pub fn write_pak(&mut self, address: u16, data: &Block) -> Result<u8, PakError> {
        pak::write_block(&mut self.bus, address, data)
    }
}

impl<L: Line, D: Delay, I: InterruptControl> Driver for N64Controller<L, D, I> {
    type Snapshot = N64Snapshot;

    fn initialize(&mut self) {
        self.bus.initialize();
        self.reset();
    }

    fn poll(&mut self) -> N64Snapshot {
        let mut status = [0u8; 4];
        let snapshot = match self.bus.exchange(&[CMD_STATUS], &mut status) {
            Ok(_) => N64Snapshot {
                rumble_pak_present: self.rumble_pak_present,
                rumble_active: self.rumble_active,
                ..N64Snapshot::from_status(status)
            },
            Err(e) => {
                if self.snapshot.connected {
                    log(LogCategory::Joybus, LogLevel::Info, || {
                        format!("n64: controller lost ({})", e)
                    });
                }
                self.forget_pak();
                N64Snapshot::default()
            }
        };

        if snapshot.connected && !self.snapshot.connected {
            log(LogCategory::Joybus, LogLevel::Info, || {
                "n64: controller connected".to_string()
            });
        }
        self.snapshot = snapshot;
        snapshot
    }

    fn current_snapshot(&self) -> N64Snapshot {
        self.snapshot
    }

    fn reset(&mut self) {
        self.rumble_pak_present = false;
        self.rumble_active = false;
        self.snapshot = N64Snapshot::default();
    }
}
