// SPDX-License-Identifier: GPL-3.0-only

//! Continuation token for surviving execution suspension
//!
//! An owner acquires at most one token per stop-triggered finalize; the
//! persistence handoff releases it exactly once, whatever the outcome. The
//! release is an atomic swap, so a double release is a no-op, and a token
//! dropped without release is released by the drop backstop with a warning.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Permission to keep executing past normal foreground lifetime
pub struct ContinuationToken {
    released: Arc<AtomicBool>,
    label: String,
}

/// Cheap read-only view of a token's release state, for owners and tests
#[derive(Clone)]
pub struct TokenObserver {
    released: Arc<AtomicBool>,
}

impl TokenObserver {
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl ContinuationToken {
    /// Acquire a token; `label` names the work it covers in logs
    pub fn acquire(label: &str) -> Self {
        debug!(label = %label, "Continuation token acquired");
        Self {
            released: Arc::new(AtomicBool::new(false)),
            label: label.to_string(),
        }
    }

    pub fn observer(&self) -> TokenObserver {
        TokenObserver {
            released: Arc::clone(&self.released),
        }
    }

    /// Release the token; safe to reach from any outcome path
    pub fn release(self) {
        self.release_inner();
    }

    fn release_inner(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            debug!(label = %self.label, "Continuation token released");
        }
    }
}

impl Drop for ContinuationToken {
    fn drop(&mut self) {
        if !self.released.load(Ordering::SeqCst) {
            warn!(label = %self.label, "Continuation token leaked, releasing on drop");
            self.release_inner();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_exactly_once() {
        let token = ContinuationToken::acquire("test-finalize");
        let observer = token.observer();
        assert!(!observer.is_released());

        token.release();
        assert!(observer.is_released());
    }

    #[test]
    fn test_drop_backstop_releases() {
        let observer = {
            let token = ContinuationToken::acquire("leaked");
            token.observer()
        };
        assert!(observer.is_released());
    }
}
