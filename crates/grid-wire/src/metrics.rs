//! Byte and operation counters shared by every connection of a pool.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live transfer counters. One instance is shared across all connections the
/// pool hands out; connections bump it on every framed exchange.
#[derive(Debug, Default)]
pub struct TransferMetrics {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    ops: AtomicU64,
}

impl TransferMetrics {
    /// Record one request/response exchange.
    pub fn record_exchange(&self, sent: u64, received: u64) {
        self.bytes_sent.fetch_add(sent, Ordering::Relaxed);
        self.bytes_received.fetch_add(received, Ordering::Relaxed);
        self.ops.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> TransferMetricsSnapshot {
        TransferMetricsSnapshot {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            ops: self.ops.load(Ordering::Relaxed),
        }
    }
}

/// A consistent-enough snapshot of [`TransferMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferMetricsSnapshot {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub ops: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchanges_accumulate() {
        let metrics = TransferMetrics::default();
        metrics.record_exchange(100, 50);
        metrics.record_exchange(10, 5);
        let snap = metrics.snapshot();
        assert_eq!(snap.bytes_sent, 110);
        assert_eq!(snap.bytes_received, 55);
        assert_eq!(snap.ops, 2);
    }
}
