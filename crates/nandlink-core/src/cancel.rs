//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag, checked by the engine at per-block loop
/// boundaries only. An in-flight transfer always completes or times
/// out on its own terms before the flag is observed.
///
/// Clones share the same flag, so a UI thread can hold one handle and
/// abort an operation running on another.
#[derive(Debug, Clone, Default)]
pub struct AbortToken {
    flag: Arc<AtomicBool>,
}

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The current phase loop stops before its
    /// next block; later phases re-check the flag as their own guard.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = AbortToken::new();
        let clone = token.clone();
        assert!(!token.is_aborted());
        clone.abort();
        assert!(token.is_aborted());
    }
}
