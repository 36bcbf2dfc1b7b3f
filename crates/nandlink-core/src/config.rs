//! Flash geometry decoded from the adapter's init status word.
//!
//! The firmware reports the attached chip's geometry as a single
//! 32-bit word in response to the Init command:
//!
//! ```text
//! bits 31..16   total small-block count
//! bits 11..8    small-block size as a power-of-two multiple of 0x400
//! bits  7..0    metadata-layout selector (opaque, forwarded to the
//!               spare codec)
//! ```
//!
//! The "raw" block size adds the per-sub-page spare area: 16 bytes of
//! ECC/metadata for every 512 bytes of payload, so a 0x4000-byte small
//! block maps to a 0x4200-byte raw block.

use crate::error::{Error, Result};

/// Payload bytes covered by one spare group.
pub const SUBPAGE_SIZE: u32 = 512;

/// Spare bytes carried per sub-page.
pub const SPARE_PER_SUBPAGE: u32 = 16;

/// Fixed per-block write unit when the caller supplies spare-stripped
/// payload (the spare codec expands each unit to [`WRITE_UNIT_RAW`]).
pub const WRITE_UNIT_SMALL: usize = 0x4000;

/// Fixed per-block write unit when the caller supplies raw payload.
pub const WRITE_UNIT_RAW: usize = 0x4200;

/// Immutable geometry snapshot for the attached NAND chip.
///
/// Fetched once per bulk call (Init) and discarded at its end
/// (Deinit). Must be byte-identical across a power cycle within one
/// bulk call; the engine treats a mismatch as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XConfig {
    /// Native addressing unit, without spare data.
    pub small_block_size: u32,
    /// Block size including the interleaved spare areas.
    pub raw_block_size: u32,
    /// Number of small blocks on the device.
    pub total_blocks: u32,
    /// Firmware-defined metadata-layout selector, opaque to the
    /// driver; forwarded to the spare codec.
    pub meta_type: u8,
}

impl XConfig {
    /// Decode the Init status word into a geometry snapshot.
    pub fn decode(word: u32) -> Result<Self> {
        let meta_type = (word & 0xFF) as u8;
        let size_exp = (word >> 8) & 0xF;
        let small_block_size = 0x400u32 << size_exp;
        let total_blocks = word >> 16;

        if total_blocks == 0 {
            return Err(Error::BadConfigWord(word));
        }

        let spare = small_block_size / SUBPAGE_SIZE * SPARE_PER_SUBPAGE;
        Ok(Self {
            small_block_size,
            raw_block_size: small_block_size + spare,
            total_blocks,
            meta_type,
        })
    }

    /// Clamp a requested block count to what the device can hold from
    /// `start`. A requested count of 0 means "the rest of the device".
    ///
    /// Fails with [`Error::BlockOutOfRange`] when `start` itself is
    /// past the end.
    pub fn fix_block_count(&self, start: u32, requested: u32) -> Result<u32> {
        if start >= self.total_blocks {
            return Err(Error::BlockOutOfRange {
                block: start,
                total: self.total_blocks,
            });
        }

        let remaining = self.total_blocks - start;
        if requested == 0 || requested > remaining {
            Ok(remaining)
        } else {
            Ok(requested)
        }
    }

    /// Raw byte length of `count` blocks.
    pub fn raw_len(&self, count: u32) -> u64 {
        u64::from(count) * u64::from(self.raw_block_size)
    }
}

/// Number of blocks needed to hold `payload_len` bytes at `unit` bytes
/// per block. A short tail still occupies a whole block.
pub fn required_blocks(payload_len: u64, unit: usize) -> u32 {
    payload_len.div_ceil(unit as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1024 blocks of 0x4000 bytes, meta type 1.
    const WORD: u32 = (1024 << 16) | (4 << 8) | 0x01;

    #[test]
    fn decode_standard_geometry() {
        let cfg = XConfig::decode(WORD).unwrap();
        assert_eq!(cfg.small_block_size, 0x4000);
        assert_eq!(cfg.raw_block_size, 0x4200);
        assert_eq!(cfg.total_blocks, 1024);
        assert_eq!(cfg.meta_type, 1);
    }

    #[test]
    fn decode_rejects_zero_blocks() {
        assert!(matches!(
            XConfig::decode(0x0000_0401),
            Err(Error::BadConfigWord(_))
        ));
    }

    #[test]
    fn zero_count_means_rest_of_device() {
        let cfg = XConfig::decode(WORD).unwrap();
        assert_eq!(cfg.fix_block_count(0, 0).unwrap(), 1024);
        assert_eq!(cfg.fix_block_count(1000, 0).unwrap(), 24);
        assert_eq!(cfg.fix_block_count(1023, 0).unwrap(), 1);
    }

    #[test]
    fn count_is_clamped_to_remaining_blocks() {
        let cfg = XConfig::decode(WORD).unwrap();
        assert_eq!(cfg.fix_block_count(1000, 100).unwrap(), 24);
        assert_eq!(cfg.fix_block_count(1000, 24).unwrap(), 24);
        assert_eq!(cfg.fix_block_count(1000, 10).unwrap(), 10);
    }

    #[test]
    fn start_past_end_is_rejected() {
        let cfg = XConfig::decode(WORD).unwrap();
        assert!(matches!(
            cfg.fix_block_count(1024, 0),
            Err(Error::BlockOutOfRange { block: 1024, total: 1024 })
        ));
        assert!(cfg.fix_block_count(2000, 1).is_err());
    }

    #[test]
    fn required_blocks_rounds_up() {
        assert_eq!(required_blocks(0, WRITE_UNIT_RAW), 0);
        assert_eq!(required_blocks(2 * 0x4200, WRITE_UNIT_RAW), 2);
        assert_eq!(required_blocks(2 * 0x4200 + 1, WRITE_UNIT_RAW), 3);
        assert_eq!(required_blocks(2 * 0x4000, WRITE_UNIT_SMALL), 2);
    }
}
