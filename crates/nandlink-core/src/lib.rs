//! nandlink-core - device-independent NAND programmer engine
//!
//! This crate holds everything about driving a block-oriented NAND
//! programmer that does not depend on the transport: the flash
//! geometry model, the bulk erase/write/read orchestration with its
//! phase chain (erase, power-cycle, write, power-cycle, verify),
//! cooperative abort, progress reporting and the spare-data codec
//! seam.
//!
//! The hardware enters through one trait, [`NandProgrammer`]. The USB
//! implementation lives in `nandlink-usb`; tests drive the engine with
//! an in-memory mock.
//!
//! # Example
//!
//! ```ignore
//! use nandlink_core::{BulkEngine, LogReport, SliceSource, WriteMode, ZeroSpare};
//!
//! fn flash_image<D: nandlink_core::NandProgrammer>(dev: &mut D, image: &[u8]) {
//!     let mut report = LogReport;
//!     let mut engine = BulkEngine::new(dev, &mut report);
//!     let mut source = SliceSource::new(image);
//!     let mode = WriteMode::ERASE_FIRST | WriteMode::VERIFY_AFTER;
//!     if let Err(e) = engine.write_range(0, 0, &mut source, mode, &ZeroSpare) {
//!         eprintln!("write failed: {}", e);
//!     }
//! }
//! ```

#![warn(rust_2018_idioms)]

pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod mode;
pub mod programmer;
pub mod report;
pub mod spare;

pub use cancel::AbortToken;
pub use config::XConfig;
pub use engine::{BlockSource, BulkEngine, OutputProvider, ReaderSource, SliceSource};
pub use error::{Error, Result};
pub use mode::WriteMode;
pub use programmer::{BlockStatus, NandProgrammer};
pub use report::{LogReport, NoReport, StatusReport};
pub use spare::{SpareCodec, ZeroSpare};
