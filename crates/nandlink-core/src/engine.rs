//! Bulk erase/write/read orchestration across block ranges.
//!
//! A bulk call moves through the phases
//!
//! ```text
//! Idle -> Initializing -> (ErasePhase) -> Write|ReadPhase
//!      -> (VerifyPhase) -> Finalizing -> Idle
//! ```
//!
//! Every phase loop re-checks the abort token before each block; an
//! abort stops that loop, and each later phase re-evaluates the token
//! as its own guard instead of short-circuiting to the end. The
//! finalizing step (deinit + release) always runs, aborted or not, so
//! the device is never left claimed.

use std::io::{Read, Write};

use crate::cancel::AbortToken;
use crate::config::{required_blocks, XConfig, WRITE_UNIT_RAW, WRITE_UNIT_SMALL};
use crate::error::{Error, Result};
use crate::mode::{SpareTransform, WriteMode};
use crate::programmer::NandProgrammer;
use crate::report::StatusReport;
use crate::spare::SpareCodec;

// =============================================================================
// Payload sources and output sinks
// =============================================================================

/// Source of block-sized payload units for a write operation.
pub trait BlockSource {
    /// Total payload length in bytes.
    fn len(&self) -> u64;

    /// Fill `buf` with the next payload unit. A short tail is padded
    /// with 0xFF, the erased value.
    fn fill(&mut self, buf: &mut [u8]) -> Result<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Payload held in memory.
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl BlockSource for SliceSource<'_> {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        buf[n..].fill(0xFF);
        self.pos += n;
        Ok(())
    }
}

/// Payload streamed from a reader of known length (typically a file).
pub struct ReaderSource<R: Read> {
    reader: R,
    len: u64,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R, len: u64) -> Self {
        Self { reader, len }
    }
}

impl<R: Read> BlockSource for ReaderSource<R> {
    fn len(&self) -> u64 {
        self.len
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        buf[filled..].fill(0xFF);
        Ok(())
    }
}

/// Supplies one output sink per file for the multi-file read form.
pub trait OutputProvider {
    type Sink: Write;

    /// Open the sink for file `index`. A user-cancelled open must
    /// return [`Error::Cancelled`], which aborts the bulk call.
    fn open_output(&mut self, index: u32) -> Result<Self::Sink>;
}

// =============================================================================
// The engine
// =============================================================================

/// Drives bulk operations over one programmer session.
///
/// One engine drives one device; callers must serialize access. The
/// engine applies no internal locking.
pub struct BulkEngine<'a, D: NandProgrammer, R: StatusReport> {
    dev: &'a mut D,
    report: &'a mut R,
    abort: AbortToken,
}

impl<'a, D: NandProgrammer, R: StatusReport> BulkEngine<'a, D, R> {
    pub fn new(dev: &'a mut D, report: &'a mut R) -> Self {
        Self::with_token(dev, report, AbortToken::new())
    }

    /// Build an engine observing an externally held abort token.
    pub fn with_token(dev: &'a mut D, report: &'a mut R, abort: AbortToken) -> Self {
        Self { dev, report, abort }
    }

    /// Handle for requesting cancellation from another thread.
    pub fn abort_token(&self) -> AbortToken {
        self.abort.clone()
    }

    /// Erase `count` blocks starting at `start` (0 = rest of device).
    pub fn erase_range(&mut self, start: u32, count: u32) -> Result<()> {
        self.run(|eng, cfg| {
            let count = cfg.fix_block_count(start, count)?;
            let last = start + count - 1;
            eng.report
                .status(&format!("erasing blocks {}..={}", start, last));
            eng.erase_phase(start, count, 0, last, count)
        })
    }

    /// Write payload from `source` to `count` blocks starting at
    /// `start`, honoring the phase and spare options in `mode`.
    ///
    /// The block count is estimated from the payload length at the
    /// fixed per-block write unit (spare-stripped when ADD_SPARE is
    /// set, raw otherwise); an explicit non-zero `count` only shrinks
    /// that estimate.
    pub fn write_range<S: BlockSource>(
        &mut self,
        start: u32,
        count: u32,
        source: &mut S,
        mode: WriteMode,
        codec: &dyn SpareCodec,
    ) -> Result<()> {
        let unit = if mode.contains(WriteMode::ADD_SPARE) {
            WRITE_UNIT_SMALL
        } else {
            WRITE_UNIT_RAW
        };
        let needed = required_blocks(source.len(), unit);
        if needed == 0 {
            log::debug!("write: empty payload, nothing to do");
            return Ok(());
        }
        let requested = if count != 0 && count < needed {
            count
        } else {
            needed
        };

        self.run(|eng, cfg| eng.write_phases(cfg, start, requested, source, mode, codec))
    }

    /// Read `count` blocks starting at `start` into `sink`.
    pub fn read_range<W: Write>(&mut self, start: u32, count: u32, sink: &mut W) -> Result<()> {
        self.run(|eng, cfg| {
            let count = cfg.fix_block_count(start, count)?;
            let last = start + count - 1;
            eng.report
                .status(&format!("reading blocks {}..={}", start, last));
            eng.read_phase(cfg, start, count, 0, last, count, sink)
        })
    }

    /// Read `count` blocks split across `parts` output files, with a
    /// power cycle between files. Each file is an independently
    /// abortable unit.
    pub fn read_range_split<P: OutputProvider>(
        &mut self,
        start: u32,
        count: u32,
        parts: u32,
        provider: &mut P,
    ) -> Result<()> {
        self.run(|eng, cfg| {
            let count = cfg.fix_block_count(start, count)?;
            let parts = parts.max(1).min(count);
            let per_part = count / parts;
            let remainder = count % parts;

            let mut block = start;
            for index in 0..parts {
                if eng.abort.is_aborted() {
                    log::info!("multi-file read aborted before part {}", index);
                    break;
                }
                let n = per_part + u32::from(index < remainder);
                let last = block + n - 1;
                let mut sink = provider.open_output(index)?;
                eng.report.status(&format!(
                    "reading blocks {}..={} into part {}",
                    block, last, index
                ));
                eng.read_phase(cfg, block, n, 0, last, n, &mut sink)?;
                block += n;
                if index + 1 < parts {
                    eng.cycle(cfg)?;
                }
            }
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Phase plumbing
    // -------------------------------------------------------------------------

    /// Initialize, run `op`, then finalize. Finalizing always runs;
    /// its faults propagate only when `op` itself succeeded.
    fn run<F>(&mut self, op: F) -> Result<()>
    where
        F: FnOnce(&mut Self, &XConfig) -> Result<()>,
    {
        let mut initialized = false;
        let op_result = match self.dev.init_flash() {
            Ok(cfg) => {
                initialized = true;
                op(self, &cfg)
            }
            Err(e) => Err(e),
        };

        let mut finalize_result = Ok(());
        if initialized {
            if let Err(e) = self.dev.deinit_flash() {
                log::error!("deinit failed while finalizing: {}", e);
                finalize_result = Err(e);
            }
        }
        if let Err(e) = self.dev.release() {
            log::error!("release failed while finalizing: {}", e);
            if finalize_result.is_ok() {
                finalize_result = Err(e);
            }
        }

        op_result.and(finalize_result)
    }

    /// Power-cycle the device mid-call and re-fetch the geometry,
    /// which must come back byte-identical.
    fn cycle(&mut self, expect: &XConfig) -> Result<()> {
        self.dev.deinit_flash()?;
        self.dev.power_cycle()?;
        let cfg = self.dev.init_flash()?;
        if cfg != *expect {
            log::error!(
                "geometry changed across power cycle: {:?} -> {:?}",
                expect,
                cfg
            );
            return Err(Error::ConfigMismatch);
        }
        Ok(())
    }

    fn erase_phase(
        &mut self,
        start: u32,
        count: u32,
        phase_offset: u32,
        last: u32,
        total: u32,
    ) -> Result<()> {
        for i in 0..count {
            if self.abort.is_aborted() {
                log::info!("erase phase aborted before block {}", start + i);
                break;
            }
            let block = start + i;
            let status = self.dev.erase_block(block)?;
            if status.is_bad_block() {
                self.report
                    .error(&format!("bad block detected while erasing block {}", block));
            }
            self.report.progress(block + phase_offset, last, total);
        }
        Ok(())
    }

    fn write_phases<S: BlockSource>(
        &mut self,
        cfg: &XConfig,
        start: u32,
        requested: u32,
        source: &mut S,
        mode: WriteMode,
        codec: &dyn SpareCodec,
    ) -> Result<()> {
        let count = cfg.fix_block_count(start, requested)?;
        let last = start + count - 1;
        let raw_size = cfg.raw_block_size as usize;
        let unit = if mode.contains(WriteMode::ADD_SPARE) {
            cfg.small_block_size as usize
        } else {
            raw_size
        };

        // One progress scale across all enabled phases.
        let phases = 1
            + u32::from(mode.contains(WriteMode::ERASE_FIRST))
            + u32::from(mode.contains(WriteMode::VERIFY_AFTER));
        let total = count * phases;
        let mut phase_offset = 0;

        if mode.contains(WriteMode::ERASE_FIRST) {
            self.report
                .status(&format!("erasing blocks {}..={}", start, last));
            self.erase_phase(start, count, phase_offset, last, total)?;
            phase_offset += count;
            // The adapter only settles back into a known state after a
            // full power cycle once a range has been erased.
            self.cycle(cfg)?;
        }

        let mut retained = if mode.contains(WriteMode::VERIFY_AFTER) {
            Vec::with_capacity(count as usize * raw_size)
        } else {
            Vec::new()
        };
        let mut payload = vec![0u8; unit];

        self.report
            .status(&format!("writing blocks {}..={}", start, last));
        for i in 0..count {
            if self.abort.is_aborted() {
                log::info!("write phase aborted before block {}", start + i);
                break;
            }
            let block = start + i;
            source.fill(&mut payload)?;

            let block_data = match mode.spare_transform() {
                Some(SpareTransform::Add) => codec.add_spare(&payload, block, cfg.meta_type)?,
                Some(SpareTransform::Correct) => {
                    let mut raw = payload.clone();
                    codec.correct_spare(&mut raw, block, cfg.meta_type)?;
                    raw
                }
                None => payload.clone(),
            };
            if block_data.len() != raw_size {
                return Err(Error::InvalidBlockLength {
                    expected: raw_size,
                    actual: block_data.len(),
                });
            }

            let status = self.dev.write_block(block, &block_data)?;
            if status.is_bad_block() {
                self.report
                    .error(&format!("bad block detected while writing block {}", block));
            }
            if mode.contains(WriteMode::VERIFY_AFTER) {
                retained.extend_from_slice(&block_data);
            }
            self.report.progress(block + phase_offset, last, total);
        }

        if mode.contains(WriteMode::VERIFY_AFTER) {
            phase_offset += count;
            self.cycle(cfg)?;
            self.report
                .status(&format!("verifying blocks {}..={}", start, last));
            let mut readback = vec![0u8; raw_size];
            for i in 0..count {
                if self.abort.is_aborted() {
                    log::info!("verify phase aborted before block {}", start + i);
                    break;
                }
                let offset = i as usize * raw_size;
                if offset + raw_size > retained.len() {
                    // The write phase stopped early; nothing retained
                    // past this point to compare against.
                    break;
                }
                let block = start + i;
                let status = self.dev.read_block(block, &mut readback)?;
                if status.is_bad_block() {
                    self.report
                        .error(&format!("bad block detected while verifying block {}", block));
                }
                if readback != retained[offset..offset + raw_size] {
                    self.report
                        .error(&format!("verify mismatch on block {}", block));
                }
                self.report.progress(block + phase_offset, last, total);
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn read_phase<W: Write>(
        &mut self,
        cfg: &XConfig,
        start: u32,
        count: u32,
        phase_offset: u32,
        last: u32,
        total: u32,
        sink: &mut W,
    ) -> Result<()> {
        let mut buf = vec![0u8; cfg.raw_block_size as usize];
        for i in 0..count {
            if self.abort.is_aborted() {
                log::info!("read phase aborted before block {}", start + i);
                break;
            }
            let block = start + i;
            let status = self.dev.read_block(block, &mut buf)?;
            if status.is_bad_block() {
                self.report
                    .error(&format!("bad block detected while reading block {}", block));
            }
            sink.write_all(&buf)?;
            self.report.progress(block + phase_offset, last, total);
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
