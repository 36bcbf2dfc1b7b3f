//! Write-mode flags for bulk write operations.

use bitflags::bitflags;

bitflags! {
    /// Options controlling a bulk write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WriteMode: u8 {
        /// Expand spare-stripped payload with spare data per block.
        const ADD_SPARE = 1 << 0;
        /// Re-derive the spare data of raw payload in place.
        const CORRECT_SPARE = 1 << 1;
        /// Erase the target range before writing.
        const ERASE_FIRST = 1 << 2;
        /// Read every written block back and compare.
        const VERIFY_AFTER = 1 << 3;
    }
}

/// Which spare transform a write applies per block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpareTransform {
    /// `add_spare`: payload grows to raw block size.
    Add,
    /// `correct_spare`: raw payload is fixed up in place.
    Correct,
}

impl WriteMode {
    /// Resolve the spare transform for this mode. ADD_SPARE takes
    /// precedence when both flags are set.
    pub fn spare_transform(self) -> Option<SpareTransform> {
        if self.contains(WriteMode::ADD_SPARE) {
            Some(SpareTransform::Add)
        } else if self.contains(WriteMode::CORRECT_SPARE) {
            Some(SpareTransform::Correct)
        } else {
            None
        }
    }
}
