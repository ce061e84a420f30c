//! Supersession-based cancellation.
//!
//! Every request takes a ticket from a shared epoch counter. Issuing a newer
//! ticket (or cancelling outright) bumps the epoch, and any work holding an
//! older ticket observes itself as cancelled at its next check.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out tickets; only the most recently issued one stays live.
#[derive(Clone, Debug, Default)]
pub struct Supersession {
    epoch: Arc<AtomicU64>,
}

impl Supersession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersede all outstanding tokens and return a fresh one.
    pub fn issue(&self) -> CancelToken {
        let ticket = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        CancelToken {
            epoch: Arc::clone(&self.epoch),
            ticket,
        }
    }

    /// Cancel every outstanding token without issuing a new one.
    pub fn cancel_all(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Whether `ticket` is still the newest.
    pub fn is_current(&self, ticket: u64) -> bool {
        self.epoch.load(Ordering::Acquire) == ticket
    }
}

#[derive(Clone, Debug)]
pub struct CancelToken {
    epoch: Arc<AtomicU64>,
    ticket: u64,
}

impl CancelToken {
    /// A token nothing can cancel.
    pub fn never() -> Self {
        CancelToken {
            epoch: Arc::new(AtomicU64::new(0)),
            ticket: 0,
        }
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn is_cancelled(&self) -> bool {
        self.epoch.load(Ordering::Acquire) != self.ticket
    }

    /// `Err(Cancelled)` once superseded, for use with `?` between chunks.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_ticket_supersedes_older() {
        let sup = Supersession::new();
        let first = sup.issue();
        assert!(!first.is_cancelled());
        let second = sup.issue();
        assert!(first.is_cancelled());
        assert!(first.check().is_err());
        assert!(!second.is_cancelled());
        assert!(sup.is_current(second.ticket()));

        sup.cancel_all();
        assert!(second.is_cancelled());
    }

    #[test]
    fn test_never_token() {
        assert!(!CancelToken::never().is_cancelled());
    }
}
