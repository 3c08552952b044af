//! Cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracedex_core::{Error, Result};

/// Shared cancellation flag
///
/// Clones observe the same flag. Long operations poll it per call or per
/// frame and stop with `Error::Cancelled`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// New token, not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Has cancellation been requested?
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Clear the flag
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// Guard that clears the flag when the current operation ends
    ///
    /// A cancel requested while no operation runs stops the next one.
    pub(crate) fn clear_on_exit(&self) -> ClearOnExit<'_> {
        ClearOnExit(self)
    }

    /// `Err(Cancelled)` if cancellation was requested
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Clears a `CancelToken` on drop
pub(crate) struct ClearOnExit<'a>(&'a CancelToken);

impl Drop for ClearOnExit<'_> {
    fn drop(&mut self) {
        self.0.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(a.check().is_ok());
        b.cancel();
        assert!(a.is_cancelled());
        assert!(matches!(a.check(), Err(Error::Cancelled)));
        a.reset();
        assert!(!b.is_cancelled());
    }

    #[test]
    fn test_guard_clears_on_exit() {
        let token = CancelToken::new();
        token.cancel();
        {
            let _guard = token.clear_on_exit();
            assert!(token.check().is_err());
        }
        assert!(token.check().is_ok());
    }
}
