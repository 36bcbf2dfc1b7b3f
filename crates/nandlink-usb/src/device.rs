//! The programmer device: protocol operations over a [`Transport`].
//!
//! `NandFlasher` turns the raw command/byte channels into the
//! [`NandProgrammer`] operations the engine drives. It enforces the
//! session and flash-init preconditions, carries the cached firmware
//! version and geometry, and applies the per-model quirks from the
//! device profile.

use nandlink_core::programmer::{BlockStatus, NandProgrammer};
use nandlink_core::{Error, Result, XConfig};

use crate::protocol::{Opcode, STATUS_LEN};
use crate::transport::{self, Transport};

pub struct NandFlasher<T: Transport> {
    link: T,
    firmware_version: Option<u32>,
    config: Option<XConfig>,
}

impl<T: Transport> NandFlasher<T> {
    pub fn new(link: T) -> Self {
        Self {
            link,
            firmware_version: None,
            config: None,
        }
    }

    /// Firmware version word, fetched once per session.
    pub fn firmware_version(&mut self) -> Result<u32> {
        if let Some(v) = self.firmware_version {
            return Ok(v);
        }
        self.send_command(Opcode::Version, 0, 0)?;
        let version = transport::read_u32(&mut self.link)?;
        log::info!(
            "firmware {}.{}.{}",
            version >> 16,
            (version >> 8) & 0xFF,
            version & 0xFF
        );
        self.firmware_version = Some(version);
        Ok(version)
    }

    /// Switch target power without a full power cycle.
    pub fn set_power(&mut self, on: bool) -> Result<()> {
        let op = if on { Opcode::PowerOn } else { Opcode::PowerOff };
        self.send_command(op, 0, 0)
    }

    /// Play an XSVF stream on the JTAG port and return the player's
    /// status word.
    pub fn run_xsvf(&mut self, stream: &[u8]) -> Result<BlockStatus> {
        self.send_command(Opcode::XsvfExec, stream.len() as u32, 0)?;
        transport::write_all(&mut self.link, stream)?;
        self.read_status()
    }

    /// Drop the device into its firmware updater. The session is dead
    /// afterwards; the device re-enumerates as the updater.
    pub fn enter_updater(mut self) -> Result<()> {
        self.send_command(Opcode::Update, 0, 0)?;
        self.link.release()
    }

    fn send_command(&mut self, op: Opcode, arg_a: u32, arg_b: u32) -> Result<()> {
        if !self.link.is_open() {
            return Err(Error::DeviceNotInitialized);
        }
        if self.link.crashed() {
            return Err(Error::DeviceCrashed);
        }
        transport::send_control(&mut self.link, op, arg_a, arg_b)
    }

    fn read_status(&mut self) -> Result<BlockStatus> {
        Ok(BlockStatus(transport::read_u32(&mut self.link)?))
    }

    fn config(&self) -> Result<&XConfig> {
        self.config.as_ref().ok_or(Error::FlashNotInitialized)
    }

    fn check_block(&self, block: u32) -> Result<()> {
        let total = self.config()?.total_blocks;
        if block >= total {
            return Err(Error::BlockOutOfRange { block, total });
        }
        Ok(())
    }
}

impl<T: Transport> NandProgrammer for NandFlasher<T> {
    fn init_flash(&mut self) -> Result<XConfig> {
        self.firmware_version()?;
        self.send_command(Opcode::Init, 0, 0)?;
        let word = transport::read_u32(&mut self.link)?;
        let cfg = XConfig::decode(word)?;
        log::info!(
            "flash: {} blocks of {} bytes ({} raw), meta type {}",
            cfg.total_blocks,
            cfg.small_block_size,
            cfg.raw_block_size,
            cfg.meta_type
        );
        self.config = Some(cfg);
        Ok(cfg)
    }

    fn deinit_flash(&mut self) -> Result<()> {
        self.config()?;
        self.send_command(Opcode::Deinit, 0, 0)?;
        // Leftover bytes from an interrupted transfer would otherwise
        // corrupt the next command's reply.
        transport::drain(&mut self.link)?;
        self.config = None;
        Ok(())
    }

    fn power_cycle(&mut self) -> Result<()> {
        self.link.power_cycle()
    }

    fn release(&mut self) -> Result<()> {
        self.link.release()
    }

    fn erase_block(&mut self, block: u32) -> Result<BlockStatus> {
        self.check_block(block)?;
        if self.link.profile().flush_before_status {
            // Stale bytes from an earlier reply would be mistaken for
            // this erase's status word.
            transport::drain(&mut self.link)?;
        }
        self.send_command(Opcode::Erase, block, STATUS_LEN as u32)?;
        self.read_status()
    }

    fn write_block(&mut self, block: u32, data: &[u8]) -> Result<BlockStatus> {
        self.check_block(block)?;
        let raw = self.config()?.raw_block_size as usize;
        if data.len() != raw {
            return Err(Error::InvalidBlockLength {
                expected: raw,
                actual: data.len(),
            });
        }
        self.send_command(Opcode::Write, block, data.len() as u32)?;
        transport::write_all(&mut self.link, data)?;
        if self.link.profile().exec_after_write {
            self.send_command(Opcode::Exec, block, 0)?;
        }
        self.read_status()
    }

    fn read_block(&mut self, block: u32, buf: &mut [u8]) -> Result<BlockStatus> {
        self.check_block(block)?;
        let raw = self.config()?.raw_block_size as usize;
        if buf.len() != raw {
            return Err(Error::InvalidBlockLength {
                expected: raw,
                actual: buf.len(),
            });
        }
        self.send_command(Opcode::Read, block, raw as u32)?;
        transport::read_exact(&mut self.link, buf)?;
        self.read_status()
    }
}
