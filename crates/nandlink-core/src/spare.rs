//! Spare-data codec contract.
//!
//! The per-block ECC transform lives outside this crate; the engine
//! only relies on the shape of the conversion: spare-stripped payload
//! in, raw (spare-augmented) block out, or a raw block corrected in
//! place. The `meta_type` selector from [`crate::config::XConfig`] is
//! forwarded untouched.

use crate::config::{SPARE_PER_SUBPAGE, SUBPAGE_SIZE};
use crate::error::Result;

/// Per-block ECC/metadata transform.
pub trait SpareCodec {
    /// Expand a spare-stripped payload into a raw block by computing
    /// and interleaving the spare areas for `block`.
    fn add_spare(&self, payload: &[u8], block: u32, meta_type: u8) -> Result<Vec<u8>>;

    /// Recompute the spare areas of a raw block in place.
    fn correct_spare(&self, block: &mut [u8], block_id: u32, meta_type: u8) -> Result<()>;
}

/// Trivial codec that fills every spare area with zeroes and leaves
/// raw blocks untouched. Useful for adapters whose firmware computes
/// the ECC itself.
pub struct ZeroSpare;

impl SpareCodec for ZeroSpare {
    fn add_spare(&self, payload: &[u8], _block: u32, _meta_type: u8) -> Result<Vec<u8>> {
        let subpage = SUBPAGE_SIZE as usize;
        let spare = SPARE_PER_SUBPAGE as usize;
        let mut out = Vec::with_capacity(payload.len() + payload.len() / subpage * spare);
        for chunk in payload.chunks(subpage) {
            out.extend_from_slice(chunk);
            out.resize(out.len() + spare, 0);
        }
        Ok(out)
    }

    fn correct_spare(&self, _block: &mut [u8], _block_id: u32, _meta_type: u8) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{WRITE_UNIT_RAW, WRITE_UNIT_SMALL};

    #[test]
    fn zero_spare_expands_small_to_raw() {
        let payload = vec![0xAB; WRITE_UNIT_SMALL];
        let raw = ZeroSpare.add_spare(&payload, 0, 1).unwrap();
        assert_eq!(raw.len(), WRITE_UNIT_RAW);
        // First sub-page payload survives, followed by a zeroed spare.
        assert_eq!(&raw[..512], &payload[..512]);
        assert_eq!(&raw[512..528], &[0u8; 16]);
    }
}
