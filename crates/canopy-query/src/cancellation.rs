//! Cooperative cancellation for the query pipeline (spec §5).
//!
//! The core does not spawn its own threads or own an executor; a driver
//! that wants to cancel an in-flight query flips an `AtomicBool` it shares
//! with the engine. This mirrors the teacher's avoidance of a heavier
//! cancellation crate (`tokio_util::sync::CancellationToken`) for a signal
//! this simple — a single flag checked at well-defined suspension points.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheaply cloneable flag a driver can flip to request cancellation of
/// an in-flight query. Checked at every suspension point named in spec §5:
/// before/after the Bloom probe, before/after each graph-store call, and
/// before each per-dependency re-parse.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        CancellationFlag(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        assert!(!CancellationFlag::new().is_cancelled());
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
