use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::error::{LauncherError, LauncherResult};

/// Cooperative cancellation flag shared between an import task and its
/// sub-jobs (download, extraction, dependency resolution).
///
/// Cloning produces another handle to the same flag. Sub-jobs observe the
/// flag at their own pace: per download chunk, per archive entry, between
/// resolver requests. Cancellation therefore surfaces as a normal
/// `LauncherError::Aborted` from whichever stage notices it first.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Bail out with `LauncherError::Aborted` if cancellation was requested.
    pub fn check(&self) -> LauncherResult<()> {
        if self.is_aborted() {
            Err(LauncherError::Aborted)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_is_visible_through_clones() {
        let flag = AbortFlag::new();
        let handle = flag.clone();
        assert!(flag.check().is_ok());

        handle.abort();

        assert!(flag.is_aborted());
        assert!(matches!(flag.check(), Err(LauncherError::Aborted)));
    }
}
