use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ApplyError;

/// Cooperative cancellation flag shared between the signal handler and the
/// enumeration/apply loops.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Return `ApplyError::Cancelled` once cancellation has been requested.
    pub fn check(&self) -> Result<(), ApplyError> {
        if self.is_cancelled() {
            Err(ApplyError::Cancelled)
        } else {
            Ok(())
        }
    }
}
