//! The device seam: what the engine needs from a programmer.
//!
//! The USB device layer (nandlink-usb) implements this trait; tests
//! implement it with an in-memory mock. Keeping the engine generic
//! over this trait is what makes the phase logic testable without
//! hardware.

use crate::config::XConfig;
use crate::error::Result;

/// Bit set in a block-operation status word when the firmware flags
/// the addressed block as bad.
pub const STATUS_BAD_BLOCK: u32 = 1 << 8;

/// Status word returned by every single-block operation.
///
/// The exact layout is firmware-defined; only the bad-block test is
/// meaningful to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStatus(pub u32);

impl BlockStatus {
    /// A status word with no fault bits set.
    pub const OK: BlockStatus = BlockStatus(0);

    pub fn is_bad_block(self) -> bool {
        self.0 & STATUS_BAD_BLOCK != 0
    }
}

/// Single-block operations plus session/flash lifecycle.
///
/// Protocol ops require an open session; block ops additionally
/// require the flash subsystem to be initialized. Bad-block status is
/// returned, not raised: classifying it as non-fatal is the engine's
/// job.
pub trait NandProgrammer {
    /// Initialize the flash subsystem and fetch the geometry.
    fn init_flash(&mut self) -> Result<XConfig>;

    /// Shut the flash subsystem down and drain the inbound buffer.
    fn deinit_flash(&mut self) -> Result<()>;

    /// Close and reopen the transport so the device re-enumerates.
    /// Must never run concurrently with an in-flight block operation.
    fn power_cycle(&mut self) -> Result<()>;

    /// Release the session. Idempotent; safe from any cleanup path.
    fn release(&mut self) -> Result<()>;

    /// Erase one block and return its status word.
    fn erase_block(&mut self, block: u32) -> Result<BlockStatus>;

    /// Write one raw-sized block and return its status word.
    fn write_block(&mut self, block: u32, data: &[u8]) -> Result<BlockStatus>;

    /// Read one raw-sized block into `buf` and return its status word.
    fn read_block(&mut self, block: u32, buf: &mut [u8]) -> Result<BlockStatus>;
}
