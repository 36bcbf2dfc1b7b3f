//! nandlink-usb - USB transport and device driver for the NAND
//! programmer adapters.
//!
//! Commands travel as vendor control transfers with an 8-byte
//! little-endian argument stage; block payloads and status words move
//! over one bulk IN/OUT endpoint pair. The channel treats timeouts and
//! short transfers as routine: every logical read or write retries up
//! to a fixed attempt budget before reporting the last error.
//!
//! # Example
//!
//! ```ignore
//! use nandlink_core::{BulkEngine, LogReport, WriteMode, ZeroSpare, SliceSource};
//! use nandlink_usb::{NandFlasher, UsbSession};
//!
//! let session = UsbSession::open()?;
//! let mut dev = NandFlasher::new(session);
//! let mut report = LogReport;
//! let mut engine = BulkEngine::new(&mut dev, &mut report);
//! let image = std::fs::read("image.bin")?;
//! let mut source = SliceSource::new(&image);
//! let mode = WriteMode::ERASE_FIRST | WriteMode::VERIFY_AFTER;
//! engine.write_range(0, 0, &mut source, mode, &ZeroSpare)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(rust_2018_idioms)]

pub mod device;
pub mod protocol;
pub mod session;
pub mod transport;

pub use device::NandFlasher;
pub use protocol::{DeviceModel, DeviceProfile, Opcode};
pub use session::UsbSession;
pub use transport::Transport;
