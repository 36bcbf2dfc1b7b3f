//! Error taxonomy for the NAND programmer driver.
//!
//! Every fault is classified into one of four families:
//! - precondition violations (session/flash state, bad arguments) fail
//!   immediately and are only recoverable by the caller fixing state;
//! - transport faults surface as [`Error::Usb`] once the reliable byte
//!   channel has exhausted its retry budget;
//! - device faults ([`Error::DeviceCrashed`], [`Error::ResetFailed`],
//!   [`Error::ConfigMismatch`]) are fatal to the current bulk call;
//! - data faults (bad blocks, verify mismatches) are *not* errors; they
//!   are reported per block and the operation runs to completion.

use thiserror::Error;

/// Result type used throughout the driver.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the transport, device and engine layers.
#[derive(Debug, Error)]
pub enum Error {
    /// No matching adapter showed up on the bus, even after the
    /// open-time power cycle.
    #[error("no NAND programmer found on the USB bus")]
    NoDeviceFound,

    /// The transport-error monitor saw the device drop off the bus
    /// while the session still claimed to be open.
    #[error("device crashed or disconnected mid-session")]
    DeviceCrashed,

    /// A protocol operation was attempted without an open session.
    #[error("device session is not open")]
    DeviceNotInitialized,

    /// A block operation was attempted before `init_flash`.
    #[error("flash subsystem is not initialized")]
    FlashNotInitialized,

    /// A bulk or control transfer failed after the retry budget was
    /// exhausted. Carries the libusb error code of the last attempt.
    #[error("USB transfer failed (libusb code {0})")]
    Usb(i32),

    /// The device reset issued during session release failed.
    #[error("device reset failed during release")]
    ResetFailed,

    /// The init status word does not decode to a usable geometry.
    #[error("init status word {0:#010x} does not decode to a valid geometry")]
    BadConfigWord(u32),

    /// The geometry reported after a power cycle differs from the one
    /// fetched at the start of the bulk call.
    #[error("flash geometry changed across a power cycle")]
    ConfigMismatch,

    /// A block id past the end of the device was requested.
    #[error("block {block} out of range (device has {total} blocks)")]
    BlockOutOfRange { block: u32, total: u32 },

    /// A block payload of the wrong size was supplied.
    #[error("block payload must be {expected} bytes, got {actual}")]
    InvalidBlockLength { expected: usize, actual: usize },

    /// The user declined to open an output file mid-operation.
    #[error("operation cancelled by the user")]
    Cancelled,

    /// The spare-data codec rejected a block.
    #[error("spare codec failed: {0}")]
    Codec(String),

    /// File source/sink I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
