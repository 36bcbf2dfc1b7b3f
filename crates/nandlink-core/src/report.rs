//! Progress and status reporting.
//!
//! The engine never talks to a UI directly; it pushes text lines and
//! `(current, last, total)` progress triples into a [`StatusReport`]
//! sink. Implementations must be non-blocking and may no-op.

/// Sink for status text, progress updates and per-block errors.
pub trait StatusReport {
    /// A human-readable status line ("erasing blocks 0..=63").
    fn status(&mut self, text: &str);

    /// Progress within the current bulk call. When erase/write/verify
    /// phases are chained, `total` spans all enabled phases so one
    /// progress scale covers the whole call.
    fn progress(&mut self, current: u32, last: u32, total: u32);

    /// A non-fatal per-block error (bad block, verify mismatch).
    fn error(&mut self, text: &str);
}

/// A reporter that discards everything.
pub struct NoReport;

impl StatusReport for NoReport {
    fn status(&mut self, _text: &str) {}
    fn progress(&mut self, _current: u32, _last: u32, _total: u32) {}
    fn error(&mut self, _text: &str) {}
}

/// A reporter that forwards to the `log` facade.
pub struct LogReport;

impl StatusReport for LogReport {
    fn status(&mut self, text: &str) {
        log::info!("{}", text);
    }

    fn progress(&mut self, current: u32, last: u32, total: u32) {
        log::trace!("progress {}/{} (last block {})", current, total, last);
    }

    fn error(&mut self, text: &str) {
        log::error!("{}", text);
    }
}
