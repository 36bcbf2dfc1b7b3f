//! NAND programmer protocol constants and device profiles.
//!
//! Commands are vendor control transfers: the opcode rides in the
//! request byte and an 8-byte little-endian data stage carries the two
//! command arguments. Block payloads and status words move over a bulk
//! IN/OUT endpoint pair.

#![allow(dead_code)]

// USB device identifiers
pub const NP_USB_VENDOR: u16 = 0x0547;
pub const NP100_USB_PRODUCT: u16 = 0x1002;
pub const NP200_USB_PRODUCT: u16 = 0x1003;

// USB endpoints
pub const BULK_IN_EP: u8 = 0x81; // EP1 IN
pub const BULK_OUT_EP: u8 = 0x02; // EP2 OUT

pub const USB_INTERFACE: u8 = 0;

// USB request type for commands
pub const REQTYPE_CMD_OUT: u8 = 0x40; // LIBUSB_ENDPOINT_OUT | LIBUSB_REQUEST_TYPE_VENDOR | LIBUSB_RECIPIENT_DEVICE

// Reliability parameters. Every transfer gets a short per-attempt
// timeout and a fixed number of attempts before the channel gives up.
pub const ATTEMPT_TIMEOUT_MS: u64 = 1000;
pub const TRANSFER_ATTEMPTS: u32 = 10;

/// Settle time after cutting target power before reopening the device.
pub const POWER_CYCLE_DELAY_MS: u64 = 1000;

/// Every block operation answers with one 4-byte status word.
pub const STATUS_LEN: usize = 4;

/// Command opcodes, sent as the vendor request byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Read a block. argA = block id, argB = byte count to read back.
    Read = 0x01,
    /// Write blocks. argA = first block, argB = byte count to follow.
    Write = 0x02,
    /// Initialize the flash subsystem. Answers with the config word.
    Init = 0x03,
    /// Shut the flash subsystem down.
    Deinit = 0x04,
    /// Query status. argB = reply length to expect.
    Status = 0x05,
    /// Erase blocks. argA = first block, argB = reply length.
    Erase = 0x06,
    /// Commit/execute the previously transferred write data.
    Exec = 0x07,
    /// Query the firmware version word.
    Version = 0x08,
    /// Run an XSVF player pass on the JTAG port.
    XsvfExec = 0x09,
    /// Switch target power on.
    PowerOn = 0x10,
    /// Switch target power off.
    PowerOff = 0x11,
    /// Enter the firmware updater.
    Update = 0xF0,
}

/// Encode the 8-byte little-endian data stage for a command.
#[inline]
pub fn command_payload(arg_a: u32, arg_b: u32) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf[..4].copy_from_slice(&arg_a.to_le_bytes());
    buf[4..].copy_from_slice(&arg_b.to_le_bytes());
    buf
}

/// Firmware version encoding, matching the version word the device
/// answers to [`Opcode::Version`].
#[inline]
pub const fn firmware_version(major: u32, minor: u32, patch: u32) -> u32 {
    (major << 16) | (minor << 8) | patch
}

/// Programmer model, keyed off the USB product id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceModel {
    Np100,
    Np200,
}

impl DeviceModel {
    pub fn from_product_id(product: u16) -> Option<Self> {
        match product {
            NP100_USB_PRODUCT => Some(DeviceModel::Np100),
            NP200_USB_PRODUCT => Some(DeviceModel::Np200),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceModel::Np100 => write!(f, "NP100"),
            DeviceModel::Np200 => write!(f, "NP200"),
        }
    }
}

/// Per-model protocol quirks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    pub model: DeviceModel,
    /// Issue a zero-length Status poll before each erase so the
    /// firmware flushes its pipeline first.
    pub flush_before_status: bool,
    /// Send an explicit Exec after each block write to commit it.
    pub exec_after_write: bool,
}

impl DeviceProfile {
    pub fn for_model(model: DeviceModel) -> Self {
        match model {
            DeviceModel::Np100 => DeviceProfile {
                model,
                flush_before_status: true,
                exec_after_write: false,
            },
            DeviceModel::Np200 => DeviceProfile {
                model,
                flush_before_status: false,
                exec_after_write: true,
            },
        }
    }
}
