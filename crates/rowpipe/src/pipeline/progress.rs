//! Send/receive counters shared by the extractor and the loader.

use std::sync::atomic::{AtomicU64, Ordering};

/// Rows sent into and received out of the row channel for one job.
#[derive(Debug, Default)]
pub struct Progress {
    sent: AtomicU64,
    received: AtomicU64,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add to the send counter, returning the new total.
    pub fn add_sent(&self, rows: u64) -> u64 {
        self.sent.fetch_add(rows, Ordering::Relaxed) + rows
    }

    /// Add to the receive counter, returning the new total.
    pub fn add_received(&self, rows: u64) -> u64 {
        self.received.fetch_add(rows, Ordering::Relaxed) + rows
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

/// Whether a counter moving from `before` to `after` passed a multiple of `interval`.
pub fn crossed_interval(before: u64, after: u64, interval: u64) -> bool {
    interval > 0 && before / interval != after / interval
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let progress = Progress::new();
        assert_eq!(progress.add_sent(1), 1);
        assert_eq!(progress.add_sent(1), 2);
        assert_eq!(progress.add_received(2000), 2000);
        assert_eq!(progress.sent(), 2);
        assert_eq!(progress.received(), 2000);
    }

    #[test]
    fn test_crossed_interval() {
        assert!(crossed_interval(9_999, 10_000, 10_000));
        assert!(!crossed_interval(10_000, 10_001, 10_000));
        // Chunked increments can jump over the exact multiple.
        assert!(crossed_interval(8_000, 12_000, 10_000));
        assert!(!crossed_interval(0, 5, 0));
    }
}
