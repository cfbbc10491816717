//! Process-wide evaluation counters.
//!
//! Incremented silently by the orchestrator; [`Metrics::flush`] emits the
//! current values as one `info!` event at the end of a command.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    pairs_evaluated: AtomicU64,
    pairs_failed: AtomicU64,
    retries_scheduled: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            pairs_evaluated: AtomicU64::new(0),
            pairs_failed: AtomicU64::new(0),
            retries_scheduled: AtomicU64::new(0),
        }
    }

    pub fn inc_evaluated(&self) {
        self.pairs_evaluated.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "pairs_evaluated", "counter incremented");
    }

    pub fn inc_failed(&self) {
        self.pairs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "pairs_failed", "counter incremented");
    }

    pub fn inc_retries(&self) {
        self.retries_scheduled.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "retries_scheduled", "counter incremented");
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            pairs_evaluated = self.pairs_evaluated(),
            pairs_failed = self.pairs_failed(),
            retries_scheduled = self.retries_scheduled()
        );
    }

    pub fn pairs_evaluated(&self) -> u64 {
        self.pairs_evaluated.load(Ordering::Relaxed)
    }

    pub fn pairs_failed(&self) -> u64 {
        self.pairs_failed.load(Ordering::Relaxed)
    }

    pub fn retries_scheduled(&self) -> u64 {
        self.retries_scheduled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_independent() {
        let m = Metrics::new();
        m.inc_evaluated();
        m.inc_evaluated();
        m.inc_retries();
        assert_eq!(m.pairs_evaluated(), 2);
        assert_eq!(m.pairs_failed(), 0);
        assert_eq!(m.retries_scheduled(), 1);
        m.flush();
    }
}
